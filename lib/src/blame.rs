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

//! Line-level blame of the lines a fix commit touched.
//!
//! The adapter drives the incremental blame engine and expands its entries
//! into one record per *original* line, with the line's trimmed text and
//! optional comment skipping.

use std::collections::HashSet;
use std::hash::Hash;
use std::hash::Hasher;
use std::path::PathBuf;

use itertools::Itertools as _;

use crate::comment;
use crate::repo::RepoAccess;
use crate::repo::RepoError;

/// Intensity of cross-file move detection, i.e. how many `-C` flags the
/// blame engine receives.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DetectLineMoved {
    /// Lines moved or copied from files modified in the same commit.
    SameCommit,
    /// Also consider the commit creating the file (`-C -C`).
    ParentCommit,
    /// Consider any commit (`-C -C -C`).
    AnyCommit,
}

impl DetectLineMoved {
    /// Maps the configuration levels 1, 2 and 3.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::SameCommit),
            2 => Some(Self::ParentCommit),
            3 => Some(Self::AnyCommit),
            _ => None,
        }
    }
}

/// An inclusive, 1-based run of line numbers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LineRange {
    /// First line of the run.
    pub start: u32,
    /// Last line of the run.
    pub end: u32,
}

/// Compresses line numbers into maximal contiguous ranges.
///
/// The input is sorted and deduplicated first; a lone line becomes a
/// single-line range.
pub fn line_ranges(lines: &[u32]) -> Vec<LineRange> {
    let mut ranges = Vec::new();
    let mut sorted = lines.iter().copied().sorted().dedup();
    let Some(first) = sorted.next() else {
        return ranges;
    };
    let mut start = first;
    let mut end = first;
    for line in sorted {
        if line == end + 1 {
            end = line;
        } else {
            ranges.push(LineRange { start, end });
            start = line;
            end = line;
        }
    }
    ranges.push(LineRange { start, end });
    ranges
}

/// Options of one blame call.
///
/// `skip_comments` is applied by the adapter after the engine ran; all
/// other fields translate directly to blame engine flags.
#[derive(Clone, Debug, Default)]
pub struct BlameOptions {
    /// Drop records whose original line is inside a comment.
    pub skip_comments: bool,
    /// Ignore whitespace-only changes when attributing lines (`-w`).
    pub ignore_whitespace: bool,
    /// Commits the engine must treat as transparent (`--ignore-rev`).
    pub ignore_revs: Vec<String>,
    /// File of commits to treat as transparent (`--ignore-revs-file`).
    pub ignore_revs_file: Option<PathBuf>,
    /// Detect lines moved or copied within a file (`-M`).
    pub detect_move_within_file: bool,
    /// Detect lines moved or copied from other files (`-C` intensity).
    pub detect_move_cross_file: Option<DetectLineMoved>,
}

/// One blamed source line, attributed to the commit that introduced it.
///
/// Equality and hashing cover `(file_path, line_num)` only: when two blame
/// passes attribute the same line to different commits, the records must
/// collapse so the ignore-revs loop can reach its fixpoint.
#[derive(Clone, Debug, Eq)]
pub struct BlameRecord {
    /// Commit the line was attributed to.
    pub commit: String,
    /// 1-based line number in `file_path` as of `commit`.
    pub line_num: u32,
    /// Trimmed text of the line.
    pub line_str: String,
    /// Path of the file as of `commit`.
    pub file_path: String,
}

impl PartialEq for BlameRecord {
    fn eq(&self, other: &Self) -> bool {
        self.file_path == other.file_path && self.line_num == other.line_num
    }
}

impl Hash for BlameRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file_path.hash(state);
        self.line_num.hash(state);
    }
}

/// Blames `modified_lines` of `file_path` at `rev` and expands the result
/// into per-original-line records.
pub fn blame_modified_lines(
    repo: &dyn RepoAccess,
    rev: &str,
    file_path: &str,
    modified_lines: &[u32],
    options: &BlameOptions,
) -> Result<HashSet<BlameRecord>, RepoError> {
    let ranges = line_ranges(modified_lines);
    tracing::info!(file = file_path, rev, "processing file");

    let mut records = HashSet::new();
    for entry in repo.blame(rev, file_path, &ranges, options)? {
        let contents = repo.file_at(&entry.commit, &entry.orig_path)?;
        let lines: Vec<&str> = contents.lines().collect();
        let comment_ranges = options
            .skip_comments
            .then(|| comment::comment_ranges(&contents, base_name(&entry.orig_path)));

        for line_num in entry.orig_start..entry.orig_start + entry.num_lines {
            let line_str = lines
                .get(line_num as usize - 1)
                .map(|line| line.trim().to_string())
                .unwrap_or_default();
            if let Some(comment_ranges) = &comment_ranges {
                if comment_ranges.iter().any(|range| range.contains(line_num)) {
                    tracing::info!(line = line_num, text = %line_str, "skipping comment line");
                    continue;
                }
            }
            records.insert(BlameRecord {
                commit: entry.commit.clone(),
                line_num,
                line_str,
                file_path: entry.orig_path.clone(),
            });
        }
    }
    Ok(records)
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
