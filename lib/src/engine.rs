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

//! The bug-introducing-commit search.
//!
//! One engine instance analyzes one fix commit against a prepared working
//! copy. The variants share the blame-and-classify fixpoint; what differs
//! is which filters run, which blame flags are set, and how the final
//! candidate set is reduced.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;

use crate::blame;
use crate::blame::BlameOptions;
use crate::blame::BlameRecord;
use crate::blame::DetectLineMoved;
use crate::classify::CommitClassifier;
use crate::commit::Commit;
use crate::config::Config;
use crate::impact;
use crate::impact::ImpactedFile;
use crate::refactor::RefactoringDetector;
use crate::refactor::RefactoringSpan;
use crate::repo::RepoAccess;
use crate::repo::RepoError;

/// Wall-clock budget for the ignore-revs fixpoint of a single fix commit.
const BLAME_TIME_BUDGET: Duration = Duration::from_secs(60 * 60);

/// Bound on reblame nesting in the refactoring-aware variant. The growing
/// ignore-revs list terminates the recursion in practice; the cap guards
/// against degenerate detector output.
const MAX_REBLAME_DEPTH: usize = 16;

/// The algorithm variant to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Variant {
    /// Plain blame of the impacted lines.
    Base,
    /// Iterated blame with the large-commit filter.
    AnnotationGraph,
    /// Per-file iterated blame with large-commit, merge and meta-change
    /// filters and move detection.
    MetaAware,
    /// Meta-aware candidates reduced to the most recent commit.
    Recent,
    /// Meta-aware candidates reduced to the commit with the most modified
    /// lines.
    Largest,
    /// Meta-aware search that skips and re-blames refactored lines.
    RefactoringAware,
}

impl Variant {
    /// Parses the configuration name of a variant.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "b" => Some(Self::Base),
            "ag" => Some(Self::AnnotationGraph),
            "ma" => Some(Self::MetaAware),
            "r" => Some(Self::Recent),
            "l" => Some(Self::Largest),
            "ra" => Some(Self::RefactoringAware),
            _ => None,
        }
    }

    /// The configuration name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Base => "b",
            Self::AnnotationGraph => "ag",
            Self::MetaAware => "ma",
            Self::Recent => "r",
            Self::Largest => "l",
            Self::RefactoringAware => "ra",
        }
    }
}

/// One SZZ analysis over a prepared working copy.
pub struct SzzEngine<'a> {
    repo: &'a dyn RepoAccess,
    variant: Variant,
    detect_move_cross_file: DetectLineMoved,
    ignore_revs_file: Option<PathBuf>,
    classifier: CommitClassifier<'a>,
    detector: Option<Box<dyn RefactoringDetector + 'a>>,
}

impl<'a> SzzEngine<'a> {
    /// Creates an engine for `variant` configured by `config`.
    pub fn new(repo: &'a dyn RepoAccess, variant: Variant, config: &Config) -> Self {
        SzzEngine {
            repo,
            variant,
            detect_move_cross_file: config.detect_move_cross_file(),
            ignore_revs_file: config.ignore_revs_file_path.clone(),
            classifier: CommitClassifier::new(repo, config.max_change_size),
            detector: None,
        }
    }

    /// Installs the refactoring detector used by the refactoring-aware
    /// variant.
    pub fn with_refactoring_detector(
        mut self,
        detector: Box<dyn RefactoringDetector + 'a>,
    ) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Computes the impacted files of the fix commit, applying the
    /// refactoring pruning when the variant calls for it.
    pub fn impacted_files(
        &mut self,
        fix_commit_hash: &str,
        file_ext_to_parse: &[String],
        only_deleted_lines: bool,
    ) -> Result<Vec<ImpactedFile>, RepoError> {
        let fix_commit = self.repo.commit(fix_commit_hash)?;
        let mut impacted =
            impact::impacted_files(&fix_commit, file_ext_to_parse, only_deleted_lines);
        if self.variant == Variant::RefactoringAware {
            if let Some(detector) = self.detector.as_mut() {
                let spans = detector.refactored_regions(fix_commit_hash);
                impacted = prune_refactored_lines(impacted, &spans);
            }
        }
        Ok(impacted)
    }

    /// Finds the bug-introducing-commit candidates of one fix commit.
    ///
    /// `issue_date` (UNIX seconds), when given, restricts candidates to
    /// commits not newer than the reported issue.
    pub fn find_bic(
        &mut self,
        fix_commit_hash: &str,
        impacted_files: &[ImpactedFile],
        issue_date: Option<i64>,
    ) -> Result<Vec<Rc<Commit>>, RepoError> {
        self.repo.set_head(fix_commit_hash)?;

        let candidates = match self.variant {
            Variant::Base => self.candidates_base(impacted_files),
            Variant::AnnotationGraph => self.candidates_annotation_graph(impacted_files),
            Variant::MetaAware
            | Variant::Recent
            | Variant::Largest
            | Variant::RefactoringAware => self.candidates_meta_aware(impacted_files),
        };
        let candidates = self.filter_by_issue_date(candidates, issue_date);

        Ok(match self.variant {
            Variant::Recent => select_most_recent(candidates),
            Variant::Largest => self.select_largest(candidates),
            _ => candidates,
        })
    }

    /// Base variant: a single blame pass per impacted file, honoring only
    /// the configured ignore-revs file.
    fn candidates_base(&mut self, impacted_files: &[ImpactedFile]) -> Vec<Rc<Commit>> {
        let options = BlameOptions {
            ignore_revs_file: self.ignore_revs_file.clone(),
            ..BlameOptions::default()
        };
        let mut hashes = BTreeSet::new();
        for file in impacted_files {
            match blame::blame_modified_lines(
                self.repo,
                "HEAD^",
                &file.file_path,
                &file.modified_lines,
                &options,
            ) {
                Ok(records) => hashes.extend(records.into_iter().map(|record| record.commit)),
                Err(err) => {
                    tracing::error!(file = %file.file_path, %err, "blame failed");
                }
            }
        }
        self.resolve_commits(hashes)
    }

    /// Annotation-graph variant: blame all impacted files, grow the ignore
    /// set with the large-commit walk, and repeat until no new commit gets
    /// ignored (or the time budget runs out).
    fn candidates_annotation_graph(&mut self, impacted_files: &[ImpactedFile]) -> Vec<Rc<Commit>> {
        let mut options = BlameOptions {
            ignore_whitespace: true,
            skip_comments: true,
            ignore_revs_file: self.ignore_revs_file.clone(),
            ..BlameOptions::default()
        };

        tracing::info!("starting blame");
        let start = Instant::now();
        let mut commits_to_ignore: BTreeSet<String> = BTreeSet::new();
        let mut blame_data: HashSet<BlameRecord> = HashSet::new();
        loop {
            tracing::info!(excluded = commits_to_ignore.len(), "blaming impacted files");
            options.ignore_revs = commits_to_ignore.iter().cloned().collect();
            blame_data = self.annotate_all(impacted_files, &options);

            let mut new_ignore = BTreeSet::new();
            for record in &blame_data {
                if !new_ignore.contains(&record.commit)
                    && !commits_to_ignore.contains(&record.commit)
                {
                    new_ignore.append(&mut self.classifier.large_commit_walk(&record.commit));
                }
            }

            let done = new_ignore.is_empty();
            let timed_out = !done && start.elapsed() > BLAME_TIME_BUDGET;
            if timed_out {
                tracing::error!("blame timeout");
            }
            commits_to_ignore.append(&mut new_ignore);
            if done || timed_out {
                break;
            }
        }

        let hashes: BTreeSet<String> = blame_data
            .iter()
            .map(|record| record.commit.clone())
            .filter(|hash| !self.classifier.large_commit_walk(hash).contains(hash))
            .collect();
        self.resolve_commits(hashes)
    }

    /// Meta-aware variants: the ignore-revs loop runs per impacted file
    /// with a file-local ignore set seeded from the global one, and merge
    /// and meta-change commits are ignored in addition to large ones.
    fn candidates_meta_aware(&mut self, impacted_files: &[ImpactedFile]) -> Vec<Rc<Commit>> {
        let base_options = BlameOptions {
            ignore_whitespace: true,
            skip_comments: true,
            detect_move_within_file: true,
            detect_move_cross_file: Some(self.detect_move_cross_file),
            ignore_revs_file: self.ignore_revs_file.clone(),
            ..BlameOptions::default()
        };

        tracing::info!("starting blame");
        let start = Instant::now();
        let mut commits_to_ignore: BTreeSet<String> = BTreeSet::new();
        let mut bic_hashes: BTreeSet<String> = BTreeSet::new();
        for file in impacted_files {
            let mut commits_to_ignore_current_file = commits_to_ignore.clone();
            let mut blame_data: HashSet<BlameRecord>;
            loop {
                let mut options = base_options.clone();
                options.ignore_revs = commits_to_ignore_current_file.iter().cloned().collect();
                tracing::info!(
                    file = %file.file_path,
                    excluded = options.ignore_revs.len(),
                    "blaming file"
                );
                blame_data = match self.blame_wrapper(
                    "HEAD^",
                    &file.file_path,
                    &file.modified_lines,
                    &options,
                    0,
                ) {
                    Ok(records) => records,
                    Err(err) => {
                        tracing::error!(file = %file.file_path, %err, "blame failed");
                        HashSet::new()
                    }
                };

                let mut new_ignore = BTreeSet::new();
                let mut new_ignore_current_file = BTreeSet::new();
                for record in &blame_data {
                    if !new_ignore.contains(&record.commit)
                        && !new_ignore_current_file.contains(&record.commit)
                        && !commits_to_ignore_current_file.contains(&record.commit)
                    {
                        new_ignore.append(&mut self.classifier.large_commit_walk(&record.commit));
                        new_ignore.append(&mut self.classifier.merge_commits(&record.commit));
                        new_ignore_current_file
                            .append(&mut self.classifier.meta_changes(&record.commit, &record.file_path));
                    }
                }

                let done = new_ignore.is_empty() && new_ignore_current_file.is_empty();
                let timed_out = !done && start.elapsed() > BLAME_TIME_BUDGET;
                if timed_out {
                    tracing::error!("blame timeout");
                }
                commits_to_ignore.append(&mut new_ignore);
                commits_to_ignore_current_file.extend(commits_to_ignore.iter().cloned());
                commits_to_ignore_current_file.append(&mut new_ignore_current_file);
                if done || timed_out {
                    break;
                }
            }

            bic_hashes.extend(
                blame_data
                    .iter()
                    .map(|record| record.commit.clone())
                    .filter(|hash| !self.classifier.large_commit_walk(hash).contains(hash)),
            );
        }
        self.resolve_commits(bic_hashes)
    }

    fn annotate_all(
        &mut self,
        impacted_files: &[ImpactedFile],
        options: &BlameOptions,
    ) -> HashSet<BlameRecord> {
        let mut records = HashSet::new();
        for file in impacted_files {
            match self.blame_wrapper("HEAD^", &file.file_path, &file.modified_lines, options, 0) {
                Ok(file_records) => records.extend(file_records),
                Err(err) => {
                    tracing::error!(file = %file.file_path, %err, "blame failed");
                }
            }
        }
        records
    }

    /// Blame entry point shared by all variants. For the refactoring-aware
    /// variant, records falling inside a refactored region of their commit
    /// are withheld and their lines re-blamed at the refactoring commit
    /// itself, with that commit appended to the ignore-revs list.
    fn blame_wrapper(
        &mut self,
        rev: &str,
        file_path: &str,
        modified_lines: &[u32],
        options: &BlameOptions,
        depth: usize,
    ) -> Result<HashSet<BlameRecord>, RepoError> {
        if self.variant != Variant::RefactoringAware {
            return blame::blame_modified_lines(
                self.repo,
                rev,
                file_path,
                modified_lines,
                options,
            );
        }

        let records =
            blame::blame_modified_lines(self.repo, rev, file_path, modified_lines, options)?;
        let mut kept = HashSet::new();
        let mut to_reblame: BTreeMap<(String, String), Vec<u32>> = BTreeMap::new();
        {
            let Some(detector) = self.detector.as_mut() else {
                return Ok(records);
            };
            for record in records {
                let spans = detector.refactored_regions(&record.commit);
                match spans
                    .iter()
                    .find(|span| span.contains(&record.file_path, record.line_num))
                {
                    Some(span) => {
                        tracing::info!(
                            file = %record.file_path,
                            line = record.line_num,
                            refactoring = %span.kind,
                            "ignoring refactored line"
                        );
                        to_reblame
                            .entry((record.commit.clone(), record.file_path.clone()))
                            .or_default()
                            .push(record.line_num);
                    }
                    None => {
                        kept.insert(record);
                    }
                }
            }
        }

        if !to_reblame.is_empty() && depth >= MAX_REBLAME_DEPTH {
            tracing::error!(depth, "re-blame nesting limit reached");
            return Ok(kept);
        }
        for ((commit, path), lines) in to_reblame {
            tracing::info!(
                file = %path,
                rev = %commit,
                ?lines,
                "re-blaming lines replaced by a refactoring"
            );
            let mut nested_options = options.clone();
            nested_options.ignore_revs.push(commit.clone());
            match self.blame_wrapper(&commit, &path, &lines, &nested_options, depth + 1) {
                Ok(nested) => kept.extend(nested),
                Err(err) => {
                    tracing::error!(file = %path, %err, "re-blame failed");
                }
            }
        }
        Ok(kept)
    }

    fn resolve_commits(&mut self, hashes: BTreeSet<String>) -> Vec<Rc<Commit>> {
        hashes
            .iter()
            .filter_map(|hash| self.classifier.commit(hash))
            .collect()
    }

    /// Timestamp the issue-date filter compares against. The
    /// annotation-graph variant historically filters on the author date,
    /// all others on the committer date.
    fn date_field(&self, commit: &Commit) -> i64 {
        match self.variant {
            Variant::AnnotationGraph => commit.authored,
            _ => commit.committed,
        }
    }

    fn filter_by_issue_date(
        &self,
        candidates: Vec<Rc<Commit>>,
        issue_date: Option<i64>,
    ) -> Vec<Rc<Commit>> {
        let Some(issue_date) = issue_date else {
            tracing::info!("not filtering by issue date");
            return candidates;
        };
        let before = candidates.len();
        let filtered: Vec<Rc<Commit>> = candidates
            .into_iter()
            .filter(|commit| self.date_field(commit) <= issue_date)
            .collect();
        tracing::info!(
            kept = filtered.len(),
            before,
            "filtered candidates by issue date"
        );
        filtered
    }

    /// Largest variant: the candidate whose commit modified the most lines
    /// in total. A candidate with zero counted lines is never selected.
    fn select_largest(&mut self, candidates: Vec<Rc<Commit>>) -> Vec<Rc<Commit>> {
        let mut selected: Option<Rc<Commit>> = None;
        let mut max_modified_lines = 0;
        for commit in candidates {
            let count = match self.repo.modified_line_count(&commit.hash) {
                Ok(count) => count,
                Err(err) => {
                    tracing::error!(commit = %commit.hash, %err, "unable to count modified lines");
                    0
                }
            };
            if count > max_modified_lines {
                max_modified_lines = count;
                selected = Some(commit);
            }
        }
        if let Some(commit) = &selected {
            tracing::info!(commit = %commit.hash, "selected bug introducing commit");
        }
        selected.into_iter().collect()
    }
}

/// Recent variant: the candidate with the newest committer date.
fn select_most_recent(candidates: Vec<Rc<Commit>>) -> Vec<Rc<Commit>> {
    let latest = candidates.into_iter().max_by_key(|commit| commit.committed);
    if let Some(commit) = &latest {
        tracing::info!(commit = %commit.hash, "selected bug introducing commit");
    }
    latest.into_iter().collect()
}

/// Removes from each impacted file the lines falling inside a refactored
/// region of the fix commit; files left without lines are dropped.
pub fn prune_refactored_lines(
    impacted: Vec<ImpactedFile>,
    spans: &[RefactoringSpan],
) -> Vec<ImpactedFile> {
    impacted
        .into_iter()
        .filter_map(|file| {
            let ImpactedFile {
                file_path,
                mut modified_lines,
            } = file;
            modified_lines.retain(|&line| {
                match spans.iter().find(|span| span.contains(&file_path, line)) {
                    Some(span) => {
                        tracing::info!(
                            file = %file_path,
                            line,
                            refactoring = %span.kind,
                            "ignoring refactored line"
                        );
                        false
                    }
                    None => true,
                }
            });
            (!modified_lines.is_empty()).then_some(ImpactedFile {
                file_path,
                modified_lines,
            })
        })
        .collect()
}
