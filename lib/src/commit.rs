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

//! Commit metadata of the repository under analysis.

/// How a commit changed one file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeType {
    /// The file did not exist in the parent revision.
    Added,
    /// The file no longer exists after the commit.
    Deleted,
    /// Content (or mode) edit in place.
    Modified,
    /// The file moved; `old_path` and `new_path` differ.
    Renamed,
    /// The file was copied from `old_path`.
    Copied,
}

impl ChangeType {
    /// Maps a raw `git diff-tree` status field (`A`, `D`, `M`, `R095`, …).
    ///
    /// Unrecognized statuses (type changes, unmerged entries) are treated as
    /// plain modifications.
    pub fn from_status(status: &str) -> Self {
        match status.as_bytes().first() {
            Some(b'A') => Self::Added,
            Some(b'D') => Self::Deleted,
            Some(b'R') => Self::Renamed,
            Some(b'C') => Self::Copied,
            _ => Self::Modified,
        }
    }
}

/// One file-level change within a commit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileModification {
    /// Pre-image path; `None` for added files.
    pub old_path: Option<String>,
    /// Post-image path; `None` for deleted files.
    pub new_path: Option<String>,
    /// Kind of change.
    pub change_type: ChangeType,
    /// 1-based line numbers added on the post-image side.
    pub added_lines: Vec<u32>,
    /// 1-based line numbers removed from the pre-image side.
    pub deleted_lines: Vec<u32>,
}

impl FileModification {
    /// Base name of the file, preferring the post-image path.
    pub fn file_name(&self) -> Option<&str> {
        let path = self.new_path.as_deref().or(self.old_path.as_deref())?;
        Some(path.rsplit('/').next().unwrap_or(path))
    }

    /// Whether either side of the change refers to `path`.
    pub fn touches(&self, path: &str) -> bool {
        self.old_path.as_deref() == Some(path) || self.new_path.as_deref() == Some(path)
    }
}

/// Metadata of one commit, with its parsed file modifications.
///
/// Merge commits carry the diff against their first parent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Commit {
    /// Full hex object id.
    pub hash: String,
    /// Parent object ids, first parent first.
    pub parents: Vec<String>,
    /// Author timestamp, UNIX seconds.
    pub authored: i64,
    /// Committer timestamp, UNIX seconds.
    pub committed: i64,
    /// File changes relative to the first parent (or the empty tree).
    pub modifications: Vec<FileModification>,
}

impl Commit {
    /// Whether the commit has more than one parent.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}
