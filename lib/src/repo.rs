// Copyright 2025 The Szz Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Temporary working copies of the repositories under analysis.
//!
//! [`RepoAccess`] is the seam between the algorithms and git: production
//! code uses [`GitWorkingCopy`], tests use the in-memory fake from the
//! `testutils` module.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use bstr::ByteSlice as _;
use tempfile::TempDir;
use thiserror::Error;

use crate::blame::BlameOptions;
use crate::blame::LineRange;
use crate::commit::ChangeType;
use crate::commit::Commit;
use crate::commit::FileModification;
use crate::file_util;
use crate::file_util::PathError;
use crate::git_subprocess;
use crate::git_subprocess::BlameEntry;
use crate::git_subprocess::GitContext;
use crate::git_subprocess::GitError;
use crate::git_subprocess::PatchedFile;
use crate::git_subprocess::RawChange;

/// Error accessing a repository working copy.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A git subprocess failed.
    #[error(transparent)]
    Git(#[from] GitError),
    /// `repos_dir` was given but does not contain the repository.
    #[error("unable to find local repository path: {0}")]
    MissingLocalRepo(PathBuf),
    /// HEAD did not point at a branch after resetting to the fix commit.
    #[error("HEAD is detached after reset to {0}")]
    DetachedHead(String),
    /// Copying the pre-cloned repository failed.
    #[error(transparent)]
    Copy(#[from] PathError),
    /// The temporary directory could not be created.
    #[error("failed to create temporary directory")]
    TempDir(#[source] io::Error),
    /// The commit does not exist (only reported by in-memory fakes).
    #[error("commit not found: {0}")]
    UnknownCommit(String),
}

/// Read access to one repository working copy, as the algorithms need it.
pub trait RepoAccess {
    /// Loads commit metadata including parsed file modifications.
    fn commit(&self, hash: &str) -> Result<Commit, RepoError>;

    /// Hashes reachable from `rev`, newest first, starting at `rev` itself.
    fn history_from(&self, rev: &str) -> Result<Vec<String>, RepoError>;

    /// Incremental blame of the given ranges of `file_path` at `rev`.
    fn blame(
        &self,
        rev: &str,
        file_path: &str,
        ranges: &[LineRange],
        options: &BlameOptions,
    ) -> Result<Vec<BlameEntry>, RepoError>;

    /// Contents of `path` as of `commit`, lossily decoded.
    fn file_at(&self, commit: &str, path: &str) -> Result<String, RepoError>;

    /// `git show --summary` lines of the commit.
    fn change_summary(&self, hash: &str) -> Result<Vec<String>, RepoError>;

    /// Total added plus deleted line count across all files of the commit.
    fn modified_line_count(&self, hash: &str) -> Result<u64, RepoError>;

    /// Hard-resets HEAD, index and working tree to `rev`, verifying that
    /// HEAD still points at a branch afterwards.
    fn set_head(&self, rev: &str) -> Result<(), RepoError>;
}

/// A throwaway checkout of one repository, owned for the duration of one
/// fix-commit analysis and removed on drop.
pub struct GitWorkingCopy {
    git: GitContext,
    path: PathBuf,
    // owns the on-disk tree; dropping it removes everything
    _temp_dir: TempDir,
}

impl GitWorkingCopy {
    /// Prepares a working copy for `repo_name` (`owner/repo`), either
    /// copied from `repos_dir` or cloned from `repo_url`.
    pub fn prepare(
        repo_name: &str,
        repo_url: &str,
        repos_dir: Option<&Path>,
    ) -> Result<Self, RepoError> {
        let temp_dir = tempfile::Builder::new()
            .prefix("szz-")
            .tempdir()
            .map_err(RepoError::TempDir)?;
        let path = temp_dir.path().join(repo_name.replace('/', "_"));
        match repos_dir {
            Some(repos_dir) => {
                let local = repos_dir.join(repo_name);
                if !local.is_dir() {
                    return Err(RepoError::MissingLocalRepo(local));
                }
                file_util::copy_dir_recursive(&local, &path)?;
            }
            None => {
                tracing::info!(repo = repo_name, "cloning repository");
                git_subprocess::clone_repository(repo_url, &path)?;
            }
        }
        Ok(GitWorkingCopy {
            git: GitContext::new(&path),
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Location of the checkout inside the temporary directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RepoAccess for GitWorkingCopy {
    fn commit(&self, hash: &str) -> Result<Commit, RepoError> {
        let header = self.git.commit_header(hash)?;
        let first_parent = header.parents.first().map(String::as_str);
        let raw = self.git.diff_raw(&header.hash, first_parent)?;
        let patched = self.git.diff_patch(&header.hash, first_parent)?;
        Ok(Commit {
            hash: header.hash,
            parents: header.parents,
            authored: header.authored,
            committed: header.committed,
            modifications: build_modifications(raw, patched),
        })
    }

    fn history_from(&self, rev: &str) -> Result<Vec<String>, RepoError> {
        Ok(self.git.rev_list(rev)?)
    }

    fn blame(
        &self,
        rev: &str,
        file_path: &str,
        ranges: &[LineRange],
        options: &BlameOptions,
    ) -> Result<Vec<BlameEntry>, RepoError> {
        Ok(self.git.blame_incremental(rev, file_path, ranges, options)?)
    }

    fn file_at(&self, commit: &str, path: &str) -> Result<String, RepoError> {
        let contents = self.git.file_at(commit, path)?;
        Ok(contents.to_str_lossy().into_owned())
    }

    fn change_summary(&self, hash: &str) -> Result<Vec<String>, RepoError> {
        Ok(self.git.summary_lines(hash)?)
    }

    fn modified_line_count(&self, hash: &str) -> Result<u64, RepoError> {
        Ok(self.git.numstat_total(hash)?)
    }

    fn set_head(&self, rev: &str) -> Result<(), RepoError> {
        self.git.reset_hard(rev)?;
        if !self.git.head_is_symbolic()? {
            return Err(RepoError::DetachedHead(rev.to_string()));
        }
        Ok(())
    }
}

/// Joins the `--raw` statuses with the line numbers recovered from the
/// patch. Changes without patch text (pure renames, mode changes, binary
/// files) keep empty line sets.
fn build_modifications(raw: Vec<RawChange>, patched: Vec<PatchedFile>) -> Vec<FileModification> {
    raw.into_iter()
        .map(|change| {
            let lines = patched.iter().find(|file| {
                file.old_path == change.old_path && file.new_path == change.new_path
            });
            FileModification {
                change_type: ChangeType::from_status(&change.status),
                old_path: change.old_path,
                new_path: change.new_path,
                added_lines: lines.map(|file| file.added_lines.clone()).unwrap_or_default(),
                deleted_lines: lines
                    .map(|file| file.deleted_lines.clone())
                    .unwrap_or_default(),
            }
        })
        .collect()
}
