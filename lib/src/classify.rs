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

//! Heuristics that flag blame candidates to be ignored.
//!
//! All predicates isolate per-commit analysis failures: a commit that
//! cannot be loaded is logged and classified as nothing.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::rc::Rc;

use crate::commit::ChangeType;
use crate::commit::Commit;
use crate::repo::RepoAccess;

/// Classifies commits for the ignore-revs loop, memoizing lookups for the
/// duration of one fix analysis.
pub struct CommitClassifier<'a> {
    repo: &'a dyn RepoAccess,
    max_change_size: usize,
    change_types_to_ignore: Vec<ChangeType>,
    commits: HashMap<String, Option<Rc<Commit>>>,
    large_walks: HashMap<String, BTreeSet<String>>,
}

impl<'a> CommitClassifier<'a> {
    /// Creates a classifier treating commits with more than
    /// `max_change_size` modified files as noise.
    pub fn new(repo: &'a dyn RepoAccess, max_change_size: usize) -> Self {
        CommitClassifier {
            repo,
            max_change_size,
            change_types_to_ignore: vec![ChangeType::Renamed, ChangeType::Copied],
            commits: HashMap::new(),
            large_walks: HashMap::new(),
        }
    }

    /// Cached commit lookup. Analysis failures are logged once and treated
    /// as missing data.
    pub fn commit(&mut self, hash: &str) -> Option<Rc<Commit>> {
        if !self.commits.contains_key(hash) {
            let loaded = match self.repo.commit(hash) {
                Ok(commit) => Some(Rc::new(commit)),
                Err(err) => {
                    tracing::error!(commit = hash, %err, "unable to analyze commit");
                    None
                }
            };
            self.commits.insert(hash.to_string(), loaded);
        }
        self.commits.get(hash).unwrap().clone()
    }

    fn is_large(commit: &Commit, max_change_size: usize) -> bool {
        commit.modifications.len() > max_change_size
    }

    /// Walks history backward from `from` (inclusive), accumulating the
    /// contiguous run of large commits and stopping at the first commit
    /// that is not large.
    ///
    /// The walk both grows the ignore set and re-filters the final
    /// candidates: a candidate is a member of its own walk exactly when it
    /// is itself large.
    pub fn large_commit_walk(&mut self, from: &str) -> BTreeSet<String> {
        if let Some(cached) = self.large_walks.get(from) {
            return cached.clone();
        }
        let mut excluded = BTreeSet::new();
        match self.repo.history_from(from) {
            Ok(hashes) => {
                for hash in hashes {
                    match self.commit(&hash) {
                        Some(commit) if Self::is_large(&commit, self.max_change_size) => {
                            excluded.insert(hash);
                        }
                        Some(_) => break,
                        // unloadable commits are skipped, the walk goes on
                        None => {}
                    }
                }
            }
            Err(err) => {
                tracing::error!(commit = from, %err, "unable to walk history");
            }
        }
        if !excluded.is_empty() {
            tracing::info!(
                count = excluded.len(),
                max_change_size = self.max_change_size,
                "commits excluded by change size"
            );
        }
        self.large_walks.insert(from.to_string(), excluded.clone());
        excluded
    }

    /// The singleton set `{hash}` when the commit is a merge, else empty.
    pub fn merge_commits(&mut self, hash: &str) -> BTreeSet<String> {
        let mut merges = BTreeSet::new();
        if self.commit(hash).is_some_and(|commit| commit.is_merge()) {
            merges.insert(hash.to_string());
        }
        if !merges.is_empty() {
            tracing::info!(count = merges.len(), "merge commits");
        }
        merges
    }

    /// The singleton set `{hash}` when the commit's effect on
    /// `current_file` is a mode change, rename or copy, else empty.
    pub fn meta_changes(&mut self, hash: &str, current_file: &str) -> BTreeSet<String> {
        let mut meta = BTreeSet::new();
        let summary = match self.repo.change_summary(hash) {
            Ok(summary) => summary,
            Err(err) => {
                tracing::error!(commit = hash, %err, "unable to analyze commit");
                return meta;
            }
        };
        if has_mode_change(&summary, current_file) {
            tracing::info!(
                file = current_file,
                commit = hash,
                "exclude meta-change (file mode change)"
            );
            meta.insert(hash.to_string());
        } else if let Some(commit) = self.commit(hash) {
            for modification in &commit.modifications {
                if modification.touches(current_file)
                    && self.change_types_to_ignore.contains(&modification.change_type)
                {
                    tracing::info!(
                        file = current_file,
                        commit = hash,
                        change_type = ?modification.change_type,
                        "exclude meta-change"
                    );
                    meta.insert(hash.to_string());
                }
            }
        }
        meta
    }
}

/// True if a `--summary` line reports a mode change involving `file`.
fn has_mode_change(summary_lines: &[String], file: &str) -> bool {
    summary_lines
        .iter()
        .any(|line| line.trim().starts_with("mode change") && line.contains(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_mode_change() {
        let summary = vec![
            " create mode 100644 docs/new.md".to_string(),
            " mode change 100644 => 100755 scripts/run.sh".to_string(),
        ];
        assert!(has_mode_change(&summary, "scripts/run.sh"));
        assert!(!has_mode_change(&summary, "docs/new.md"));
        assert!(!has_mode_change(&[], "scripts/run.sh"));
    }
}
