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

//! In-memory fakes for exercising the algorithms without a git checkout.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::blame::BlameOptions;
use crate::blame::LineRange;
use crate::commit::ChangeType;
use crate::commit::Commit;
use crate::commit::FileModification;
use crate::git_subprocess::BlameEntry;
use crate::refactor::RefactoringDetector;
use crate::refactor::RefactoringSpan;
use crate::repo::RepoAccess;
use crate::repo::RepoError;

/// Builds a [`Commit`] for tests.
pub fn commit(
    hash: &str,
    parents: &[&str],
    committed: i64,
    modifications: Vec<FileModification>,
) -> Commit {
    Commit {
        hash: hash.to_string(),
        parents: parents.iter().map(|p| p.to_string()).collect(),
        authored: committed - 50,
        committed,
        modifications,
    }
}

/// Builds a [`FileModification`] for tests.
pub fn modification(
    old_path: Option<&str>,
    new_path: Option<&str>,
    change_type: ChangeType,
    added_lines: &[u32],
    deleted_lines: &[u32],
) -> FileModification {
    FileModification {
        old_path: old_path.map(str::to_string),
        new_path: new_path.map(str::to_string),
        change_type,
        added_lines: added_lines.to_vec(),
        deleted_lines: deleted_lines.to_vec(),
    }
}

/// A modification of `path` deleting the given lines.
pub fn edit(path: &str, deleted_lines: &[u32]) -> FileModification {
    modification(
        Some(path),
        Some(path),
        ChangeType::Modified,
        &[],
        deleted_lines,
    )
}

/// An in-memory repository.
///
/// Blame is modeled as a per-line chain of owning commits, newest first
/// (see [`FakeRepo::set_blame_chain`]): a blame call attributes each
/// requested line to the first commit of its chain that is not masked by
/// the ignore-revs list, mirroring how the real engine walks past ignored
/// commits. Original paths and line numbers map identically.
#[derive(Default)]
pub struct FakeRepo {
    commits: HashMap<String, Commit>,
    /// Newest first, as `rev-list` would produce it.
    history: Vec<String>,
    blame_chains: HashMap<(String, u32), Vec<String>>,
    files: HashMap<(String, String), String>,
    summaries: HashMap<String, Vec<String>>,
    line_counts: HashMap<String, u64>,
    /// Every revision `set_head` was called with.
    pub head_resets: RefCell<Vec<String>>,
    /// Ignore-revs lists seen by blame calls, in call order.
    pub seen_ignore_revs: RefCell<Vec<Vec<String>>>,
}

impl FakeRepo {
    /// Creates an empty fake repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a commit. Commits must be added newest first to keep the
    /// fake history in `rev-list` order.
    pub fn add_commit(&mut self, commit: Commit) -> &mut Self {
        self.history.push(commit.hash.clone());
        self.commits.insert(commit.hash.clone(), commit);
        self
    }

    /// Declares the chain of commits that touched `path:line`, newest
    /// first.
    pub fn set_blame_chain(&mut self, path: &str, line: u32, chain: &[&str]) -> &mut Self {
        self.blame_chains.insert(
            (path.to_string(), line),
            chain.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Provides file contents at a commit, used for line text extraction
    /// and comment skipping.
    pub fn set_file(&mut self, commit: &str, path: &str, contents: &str) -> &mut Self {
        self.files.insert(
            (commit.to_string(), path.to_string()),
            contents.to_string(),
        );
        self
    }

    /// Provides `--summary` lines for a commit.
    pub fn set_summary(&mut self, commit: &str, lines: &[&str]) -> &mut Self {
        self.summaries.insert(
            commit.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    /// Provides the total modified-line count of a commit.
    pub fn set_line_count(&mut self, commit: &str, count: u64) -> &mut Self {
        self.line_counts.insert(commit.to_string(), count);
        self
    }
}

impl RepoAccess for FakeRepo {
    fn commit(&self, hash: &str) -> Result<Commit, RepoError> {
        self.commits
            .get(hash)
            .cloned()
            .ok_or_else(|| RepoError::UnknownCommit(hash.to_string()))
    }

    fn history_from(&self, rev: &str) -> Result<Vec<String>, RepoError> {
        let position = self
            .history
            .iter()
            .position(|hash| hash == rev)
            .ok_or_else(|| RepoError::UnknownCommit(rev.to_string()))?;
        Ok(self.history[position..].to_vec())
    }

    fn blame(
        &self,
        _rev: &str,
        file_path: &str,
        ranges: &[LineRange],
        options: &BlameOptions,
    ) -> Result<Vec<BlameEntry>, RepoError> {
        self.seen_ignore_revs
            .borrow_mut()
            .push(options.ignore_revs.clone());
        let mut entries = Vec::new();
        for range in ranges {
            for line in range.start..=range.end {
                let Some(chain) = self.blame_chains.get(&(file_path.to_string(), line)) else {
                    continue;
                };
                let owner = chain
                    .iter()
                    .find(|commit| !options.ignore_revs.contains(*commit))
                    .or_else(|| chain.last());
                let Some(owner) = owner else {
                    continue;
                };
                entries.push(BlameEntry {
                    commit: owner.clone(),
                    orig_start: line,
                    final_start: line,
                    num_lines: 1,
                    orig_path: file_path.to_string(),
                });
            }
        }
        Ok(entries)
    }

    fn file_at(&self, commit: &str, path: &str) -> Result<String, RepoError> {
        Ok(self
            .files
            .get(&(commit.to_string(), path.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn change_summary(&self, hash: &str) -> Result<Vec<String>, RepoError> {
        Ok(self.summaries.get(hash).cloned().unwrap_or_default())
    }

    fn modified_line_count(&self, hash: &str) -> Result<u64, RepoError> {
        Ok(self.line_counts.get(hash).copied().unwrap_or_default())
    }

    fn set_head(&self, rev: &str) -> Result<(), RepoError> {
        if !self.commits.contains_key(rev) {
            return Err(RepoError::UnknownCommit(rev.to_string()));
        }
        self.head_resets.borrow_mut().push(rev.to_string());
        Ok(())
    }
}

/// A refactoring detector returning canned regions.
#[derive(Default)]
pub struct FakeDetector {
    spans: HashMap<String, Vec<RefactoringSpan>>,
    /// Commits the detector was queried for, in call order.
    pub queried: RefCell<Vec<String>>,
}

impl FakeDetector {
    /// Creates a detector that knows no refactorings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a refactored region in `commit`'s post-image.
    pub fn add_span(&mut self, commit: &str, kind: &str, path: &str, lines: (u32, u32)) -> &mut Self {
        self.spans
            .entry(commit.to_string())
            .or_default()
            .push(RefactoringSpan {
                kind: kind.to_string(),
                file_path: path.to_string(),
                start_line: lines.0,
                end_line: lines.1,
            });
        self
    }
}

impl RefactoringDetector for FakeDetector {
    fn refactored_regions(&mut self, commit: &str) -> Vec<RefactoringSpan> {
        self.queried.borrow_mut().push(commit.to_string());
        self.spans.get(commit).cloned().unwrap_or_default()
    }
}
