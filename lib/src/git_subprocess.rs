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

//! Thin wrapper around the system `git` binary.
//!
//! Every repository operation shells out to `git` with explicit arguments
//! and parses the captured output. The parsers are free functions over raw
//! bytes so they can be exercised on captured samples.

use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::process::Stdio;

use bstr::ByteSlice as _;
use thiserror::Error;

use crate::blame::BlameOptions;
use crate::blame::DetectLineMoved;
use crate::blame::LineRange;

/// Error from a git subprocess invocation.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` executable could not be started.
    #[error("could not execute the git process")]
    Spawn(#[source] io::Error),
    /// Waiting for the process failed.
    #[error("failed to wait for the git process")]
    Wait(#[source] io::Error),
    /// The process exited unsuccessfully.
    #[error("git process failed: {0}")]
    External(String),
    /// The process succeeded but printed something unparseable.
    #[error("unexpected git output: {0}")]
    UnexpectedOutput(String),
}

fn unexpected(detail: impl Into<String>) -> GitError {
    GitError::UnexpectedOutput(detail.into())
}

fn wait_with_output(mut command: Command) -> Result<Output, GitError> {
    tracing::debug!(cmd = ?command, "running git");
    let child = command.spawn().map_err(GitError::Spawn)?;
    child.wait_with_output().map_err(GitError::Wait)
}

/// Clones `url` into `target` with full history.
pub(crate) fn clone_repository(url: &str, target: &Path) -> Result<(), GitError> {
    let mut command = Command::new("git");
    command
        .arg("clone")
        .arg(url)
        .arg(target)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let output = wait_with_output(command)?;
    if !output.status.success() {
        return Err(GitError::External(
            output.stderr.to_str_lossy().into_owned(),
        ));
    }
    Ok(())
}

/// One entry group from `git blame --incremental` output: `num_lines`
/// lines starting at `final_start` in the blamed file were attributed to
/// `commit`, where they lived at `orig_start` in `orig_path`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlameEntry {
    /// Commit the group was attributed to.
    pub commit: String,
    /// 1-based first line of the group in `orig_path` as of `commit`.
    pub orig_start: u32,
    /// 1-based first line of the group in the file that was blamed.
    pub final_start: u32,
    /// Number of consecutive lines in the group.
    pub num_lines: u32,
    /// Path of the file as of `commit`.
    pub orig_path: String,
}

/// Parsed `--format=%H%n%P%n%at%n%ct` header of one commit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct CommitHeader {
    pub hash: String,
    pub parents: Vec<String>,
    pub authored: i64,
    pub committed: i64,
}

/// One change line from `git diff-tree --raw`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RawChange {
    pub status: String,
    pub old_path: Option<String>,
    pub new_path: Option<String>,
}

/// Line numbers recovered from one file section of patch text.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct PatchedFile {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub added_lines: Vec<u32>,
    pub deleted_lines: Vec<u32>,
}

/// Runs git against one working copy.
pub(crate) struct GitContext {
    work_dir: PathBuf,
}

impl GitContext {
    pub(crate) fn new(work_dir: impl Into<PathBuf>) -> Self {
        GitContext {
            work_dir: work_dir.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new("git");
        command
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    fn run_checked(&self, command: Command) -> Result<Output, GitError> {
        let output = wait_with_output(command)?;
        if !output.status.success() {
            return Err(GitError::External(
                output.stderr.to_str_lossy().into_owned(),
            ));
        }
        Ok(output)
    }

    /// Resets HEAD, index and working tree to `rev`.
    pub(crate) fn reset_hard(&self, rev: &str) -> Result<(), GitError> {
        let mut command = self.command();
        command.args(["reset", "--hard", rev]);
        self.run_checked(command)?;
        Ok(())
    }

    /// Whether HEAD points at a branch rather than a detached commit.
    pub(crate) fn head_is_symbolic(&self) -> Result<bool, GitError> {
        let mut command = self.command();
        command.args(["symbolic-ref", "-q", "HEAD"]);
        let output = wait_with_output(command)?;
        Ok(output.status.success())
    }

    /// Contents of `path` as of `commit`.
    pub(crate) fn file_at(&self, commit: &str, path: &str) -> Result<Vec<u8>, GitError> {
        let mut command = self.command();
        command.arg("show").arg(format!("{commit}:{path}"));
        Ok(self.run_checked(command)?.stdout)
    }

    pub(crate) fn commit_header(&self, rev: &str) -> Result<CommitHeader, GitError> {
        let mut command = self.command();
        command.args(["show", "--no-patch", "--format=%H%n%P%n%at%n%ct", rev]);
        let output = self.run_checked(command)?;
        parse_commit_header(&output.stdout)
    }

    /// File statuses of the commit's diff against `first_parent` (or the
    /// empty tree for root commits), with rename and copy detection.
    pub(crate) fn diff_raw(
        &self,
        rev: &str,
        first_parent: Option<&str>,
    ) -> Result<Vec<RawChange>, GitError> {
        let mut command = self.command();
        command.args(["diff-tree", "-r", "-M", "-C", "--raw"]);
        match first_parent {
            Some(parent) => command.args([parent, rev]),
            None => command.args(["--root", rev]),
        };
        let output = self.run_checked(command)?;
        Ok(parse_raw_changes(&output.stdout))
    }

    /// Per-file added/deleted line numbers of the commit's diff.
    pub(crate) fn diff_patch(
        &self,
        rev: &str,
        first_parent: Option<&str>,
    ) -> Result<Vec<PatchedFile>, GitError> {
        let mut command = self.command();
        command.args(["diff-tree", "-r", "-M", "-C", "-p"]);
        match first_parent {
            Some(parent) => command.args([parent, rev]),
            None => command.args(["--root", rev]),
        };
        let output = self.run_checked(command)?;
        Ok(parse_patch(&output.stdout))
    }

    /// `git show --summary` lines for the commit (mode changes, creations,
    /// deletions, renames).
    pub(crate) fn summary_lines(&self, rev: &str) -> Result<Vec<String>, GitError> {
        let mut command = self.command();
        command.args(["show", "--summary", "--format=", rev]);
        let output = self.run_checked(command)?;
        Ok(output
            .stdout
            .lines()
            .map(|line| line.to_str_lossy().into_owned())
            .collect())
    }

    /// Total added plus deleted line count across all files of the commit.
    pub(crate) fn numstat_total(&self, rev: &str) -> Result<u64, GitError> {
        let mut command = self.command();
        command.args(["show", "--numstat", "--format=", rev]);
        let output = self.run_checked(command)?;
        Ok(parse_numstat_total(&output.stdout))
    }

    /// Hashes reachable from `rev`, newest first, starting at `rev` itself.
    pub(crate) fn rev_list(&self, rev: &str) -> Result<Vec<String>, GitError> {
        let mut command = self.command();
        command.args(["rev-list", rev]);
        let output = self.run_checked(command)?;
        Ok(output
            .stdout
            .lines()
            .map(|line| line.to_str_lossy().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// Incremental blame of the given line ranges of `file_path` at `rev`.
    pub(crate) fn blame_incremental(
        &self,
        rev: &str,
        file_path: &str,
        ranges: &[LineRange],
        options: &BlameOptions,
    ) -> Result<Vec<BlameEntry>, GitError> {
        let mut command = self.command();
        command.args(["blame", "--incremental"]);
        for range in ranges {
            command.arg("-L").arg(format!("{},{}", range.start, range.end));
        }
        if options.ignore_whitespace {
            command.arg("-w");
        }
        if let Some(file) = &options.ignore_revs_file {
            command.arg("--ignore-revs-file").arg(file);
        }
        for commit in &options.ignore_revs {
            command.arg(format!("--ignore-rev={commit}"));
        }
        if options.detect_move_within_file {
            command.arg("-M");
        }
        let cross_file_flags = match options.detect_move_cross_file {
            None => 0,
            Some(DetectLineMoved::SameCommit) => 1,
            Some(DetectLineMoved::ParentCommit) => 2,
            Some(DetectLineMoved::AnyCommit) => 3,
        };
        for _ in 0..cross_file_flags {
            command.arg("-C");
        }
        command.arg(rev).arg("--").arg(file_path);
        let output = self.run_checked(command)?;
        parse_blame_incremental(&output.stdout)
    }
}

pub(crate) fn parse_commit_header(stdout: &[u8]) -> Result<CommitHeader, GitError> {
    let text = stdout.to_str_lossy();
    let mut lines = text.lines();
    let hash = lines
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(|| unexpected("commit header is missing the hash line"))?;
    let parents = lines
        .next()
        .unwrap_or("")
        .split_ascii_whitespace()
        .map(str::to_string)
        .collect();
    let authored = lines
        .next()
        .and_then(|line| line.trim().parse().ok())
        .ok_or_else(|| unexpected("commit header is missing the author date"))?;
    let committed = lines
        .next()
        .and_then(|line| line.trim().parse().ok())
        .ok_or_else(|| unexpected("commit header is missing the committer date"))?;
    Ok(CommitHeader {
        hash: hash.to_string(),
        parents,
        authored,
        committed,
    })
}

// A raw change line reads
// `:<old_mode> <new_mode> <old_sha> <new_sha> <status>\t<path>[\t<path>]`;
// rename and copy lines carry both paths. diff-tree may print the commit id
// on a line of its own first, which has no leading colon.
pub(crate) fn parse_raw_changes(stdout: &[u8]) -> Vec<RawChange> {
    let mut changes = Vec::new();
    for line in stdout.lines() {
        let Some(rest) = line.strip_prefix(b":") else {
            continue;
        };
        let text = rest.to_str_lossy();
        let mut fields = text.split('\t');
        let Some(status) = fields
            .next()
            .and_then(|meta| meta.split_ascii_whitespace().last())
        else {
            continue;
        };
        let Some(first_path) = fields.next().map(str::to_string) else {
            continue;
        };
        let second_path = fields.next().map(str::to_string);
        let (old_path, new_path) = match status.as_bytes().first() {
            Some(b'A') => (None, Some(first_path)),
            Some(b'D') => (Some(first_path), None),
            Some(b'R' | b'C') => (Some(first_path), second_path),
            _ => (Some(first_path.clone()), Some(first_path)),
        };
        changes.push(RawChange {
            status: status.to_string(),
            old_path,
            new_path,
        });
    }
    changes
}

/// Walks a patch, tracking the pre- and post-image line cursors per hunk to
/// recover the absolute numbers of deleted and added lines.
pub(crate) fn parse_patch(stdout: &[u8]) -> Vec<PatchedFile> {
    let mut files = Vec::new();
    let mut current: Option<PatchedFile> = None;
    let mut in_hunk = false;
    let mut old_cursor = 0u32;
    let mut new_cursor = 0u32;
    for line in stdout.lines() {
        if line.starts_with_str("diff --git ") {
            if let Some(file) = current.take() {
                files.push(file);
            }
            current = Some(PatchedFile::default());
            in_hunk = false;
        } else if let Some(file) = &mut current {
            if !in_hunk && line.starts_with_str("--- ") {
                file.old_path = parse_patch_path(&line[4..], b"a/");
            } else if !in_hunk && line.starts_with_str("+++ ") {
                file.new_path = parse_patch_path(&line[4..], b"b/");
            } else if line.starts_with_str("@@ ") {
                if let Some((old_start, new_start)) = parse_hunk_header(line) {
                    old_cursor = old_start;
                    new_cursor = new_start;
                    in_hunk = true;
                }
            } else if in_hunk {
                match line.first() {
                    Some(b'-') => {
                        file.deleted_lines.push(old_cursor);
                        old_cursor += 1;
                    }
                    Some(b'+') => {
                        file.added_lines.push(new_cursor);
                        new_cursor += 1;
                    }
                    Some(b' ') => {
                        old_cursor += 1;
                        new_cursor += 1;
                    }
                    // "\ No newline at end of file" and blank separators
                    _ => {}
                }
            }
        }
    }
    if let Some(file) = current.take() {
        files.push(file);
    }
    files
}

fn parse_patch_path(raw: &[u8], prefix: &[u8]) -> Option<String> {
    let raw = raw.trim_end();
    if raw == b"/dev/null" {
        return None;
    }
    let raw = raw.strip_prefix(prefix).unwrap_or(raw);
    Some(raw.to_str_lossy().into_owned())
}

// `@@ -<old>[,<count>] +<new>[,<count>] @@ …`
fn parse_hunk_header(line: &[u8]) -> Option<(u32, u32)> {
    let text = line.to_str().ok()?;
    let mut fields = text.split_ascii_whitespace();
    let _marker = fields.next()?;
    let old = fields.next()?.strip_prefix('-')?;
    let new = fields.next()?.strip_prefix('+')?;
    let start = |field: &str| field.split(',').next()?.parse::<u32>().ok();
    Some((start(old)?, start(new)?))
}

pub(crate) fn parse_numstat_total(stdout: &[u8]) -> u64 {
    let mut total = 0;
    for line in stdout.lines() {
        let text = line.to_str_lossy();
        let mut fields = text.split_ascii_whitespace();
        let (Some(added), Some(deleted)) = (fields.next(), fields.next()) else {
            continue;
        };
        // binary files report "-" in both columns
        if let Ok(count) = added.parse::<u64>() {
            total += count;
        }
        if let Ok(count) = deleted.parse::<u64>() {
            total += count;
        }
    }
    total
}

/// Entry groups start with `<hash> <orig_line> <final_line> <num_lines>`
/// and are terminated by their `filename` line; the header lines in
/// between (author, summary, `previous`, `boundary`, …) are skipped.
pub(crate) fn parse_blame_incremental(stdout: &[u8]) -> Result<Vec<BlameEntry>, GitError> {
    let mut entries = Vec::new();
    let mut current: Option<(String, u32, u32, u32)> = None;
    for line in stdout.lines() {
        if let Some(header) = parse_blame_entry_header(line) {
            current = Some(header);
        } else if let Some(path) = line.strip_prefix(b"filename ") {
            let Some((commit, orig_start, final_start, num_lines)) = current.take() else {
                return Err(unexpected("blame filename line without an entry header"));
            };
            entries.push(BlameEntry {
                commit,
                orig_start,
                final_start,
                num_lines,
                orig_path: path.to_str_lossy().into_owned(),
            });
        }
    }
    Ok(entries)
}

fn parse_blame_entry_header(line: &[u8]) -> Option<(String, u32, u32, u32)> {
    let text = line.to_str().ok()?;
    let mut fields = text.split_ascii_whitespace();
    let commit = fields.next()?;
    if commit.len() != 40 || !commit.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let orig_start = fields.next()?.parse().ok()?;
    let final_start = fields.next()?.parse().ok()?;
    let num_lines = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((commit.to_string(), orig_start, final_start, num_lines))
}
