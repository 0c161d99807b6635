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

use std::rc::Rc;

use szz_lib::commit::ChangeType;
use szz_lib::commit::Commit;
use szz_lib::commit::FileModification;
use szz_lib::config::Config;
use szz_lib::engine::SzzEngine;
use szz_lib::engine::Variant;
use szz_lib::testutils::FakeDetector;
use szz_lib::testutils::FakeRepo;
use szz_lib::testutils::commit;
use szz_lib::testutils::edit;
use szz_lib::testutils::modification;

fn config() -> Config {
    Config {
        szz_name: String::new(),
        file_ext_to_parse: vec![],
        only_deleted_lines: true,
        ignore_revs_file_path: None,
        max_change_size: 20,
        detect_move_from_other_files: None,
        issue_date_filter: false,
    }
}

fn many_edits(count: usize) -> Vec<FileModification> {
    (0..count)
        .map(|i| edit(&format!("bulk/file{i}.py"), &[1]))
        .collect()
}

fn hashes(candidates: &[Rc<Commit>]) -> Vec<&str> {
    candidates.iter().map(|c| c.hash.as_str()).collect()
}

#[test]
fn test_base_variant_collects_blamed_commits() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["c1"], 4000, vec![edit("a.py", &[3, 4])]))
        .add_commit(commit("c1", &["c2"], 3000, vec![edit("a.py", &[3])]))
        .add_commit(commit("c2", &[], 2000, vec![edit("a.py", &[4])]))
        .set_blame_chain("a.py", 3, &["c1"])
        .set_blame_chain("a.py", 4, &["c2"]);

    let mut engine = SzzEngine::new(&repo, Variant::Base, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    assert_eq!(impacted.len(), 1);
    assert_eq!(impacted[0].modified_lines, vec![3, 4]);

    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    assert_eq!(hashes(&bic), vec!["c1", "c2"]);
    assert_eq!(*repo.head_resets.borrow(), vec!["fix".to_string()]);
}

#[test]
fn test_fix_that_only_adds_files_has_no_candidates() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit(
        "fix",
        &["c1"],
        4000,
        vec![modification(
            None,
            Some("new.py"),
            ChangeType::Added,
            &[1, 2, 3],
            &[],
        )],
    ))
    .add_commit(commit("c1", &[], 3000, vec![]));

    let mut engine = SzzEngine::new(&repo, Variant::Base, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    assert_eq!(impacted, vec![]);
    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    assert_eq!(bic, vec![]);
}

#[test]
fn test_annotation_graph_walks_past_large_commits() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["big"], 5000, vec![edit("a.py", &[3])]))
        .add_commit(commit("big", &["c1"], 4000, many_edits(21)))
        .add_commit(commit("c1", &["root"], 3000, vec![edit("a.py", &[3])]))
        .add_commit(commit("root", &[], 1000, vec![]))
        .set_blame_chain("a.py", 3, &["big", "c1"]);

    let mut engine = SzzEngine::new(&repo, Variant::AnnotationGraph, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    assert_eq!(hashes(&bic), vec!["c1"]);

    // the ignore set only ever grows
    let seen = repo.seen_ignore_revs.borrow();
    assert!(seen.len() >= 2);
    for window in seen.windows(2) {
        assert!(window[1].len() >= window[0].len());
        assert!(window[0].iter().all(|hash| window[1].contains(hash)));
    }
    assert!(seen.last().unwrap().contains(&"big".to_string()));
}

#[test]
fn test_annotation_graph_drops_candidates_that_stay_large() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["big"], 5000, vec![edit("a.py", &[3])]))
        .add_commit(commit("big", &[], 4000, many_edits(25)))
        .set_blame_chain("a.py", 3, &["big"]);

    let mut engine = SzzEngine::new(&repo, Variant::AnnotationGraph, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    assert_eq!(bic, vec![]);
}

#[test]
fn test_meta_aware_skips_renames_merges_and_mode_changes() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["rename"], 9000, vec![edit("m.py", &[5, 6, 7])]))
        .add_commit(commit(
            "rename",
            &["merge"],
            8000,
            vec![modification(
                Some("old_m.py"),
                Some("m.py"),
                ChangeType::Renamed,
                &[],
                &[],
            )],
        ))
        .add_commit(commit("merge", &["modes", "side"], 7000, vec![]))
        .add_commit(commit("modes", &["c3"], 6000, vec![edit("m.py", &[5])]))
        .add_commit(commit("side", &["c3"], 5500, vec![]))
        .add_commit(commit("c3", &[], 5000, vec![edit("m.py", &[5, 6, 7])]))
        .set_summary("modes", &[" mode change 100644 => 100755 m.py"])
        .set_blame_chain("m.py", 5, &["rename", "c3"])
        .set_blame_chain("m.py", 6, &["merge", "c3"])
        .set_blame_chain("m.py", 7, &["modes", "c3"]);

    let mut engine = SzzEngine::new(&repo, Variant::MetaAware, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    assert_eq!(hashes(&bic), vec!["c3"]);
}

#[test]
fn test_recent_variant_picks_latest_committer_date() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["c1"], 9000, vec![edit("a.py", &[3, 4])]))
        .add_commit(commit("c1", &["c2"], 3000, vec![edit("a.py", &[3])]))
        .add_commit(commit("c2", &[], 2000, vec![edit("a.py", &[4])]))
        .set_blame_chain("a.py", 3, &["c1"])
        .set_blame_chain("a.py", 4, &["c2"]);

    let mut engine = SzzEngine::new(&repo, Variant::Recent, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    assert_eq!(hashes(&bic), vec!["c1"]);
}

#[test]
fn test_recent_variant_empty_candidates() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &[], 9000, vec![]));
    let mut engine = SzzEngine::new(&repo, Variant::Recent, &config());
    let bic = engine.find_bic("fix", &[], None).unwrap();
    assert_eq!(bic, vec![]);
}

#[test]
fn test_largest_variant_picks_most_modified_lines() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["c1"], 9000, vec![edit("a.py", &[3, 4])]))
        .add_commit(commit("c1", &["c2"], 3000, vec![edit("a.py", &[3])]))
        .add_commit(commit("c2", &[], 2000, vec![edit("a.py", &[4])]))
        .set_blame_chain("a.py", 3, &["c1"])
        .set_blame_chain("a.py", 4, &["c2"])
        .set_line_count("c1", 12)
        .set_line_count("c2", 80);

    let mut engine = SzzEngine::new(&repo, Variant::Largest, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    assert_eq!(hashes(&bic), vec!["c2"]);
}

#[test]
fn test_largest_variant_ignores_zero_counts() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["c1"], 9000, vec![edit("a.py", &[3])]))
        .add_commit(commit("c1", &[], 3000, vec![edit("a.py", &[3])]))
        .set_blame_chain("a.py", 3, &["c1"]);

    let mut engine = SzzEngine::new(&repo, Variant::Largest, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    // no candidate has a non-zero modified-line count
    assert_eq!(bic, vec![]);
}

#[test]
fn test_issue_date_filter_uses_authored_date_for_annotation_graph() {
    // c1: committed 3000, authored 2950 (testutils offsets by 50)
    let build = || {
        let mut repo = FakeRepo::new();
        repo.add_commit(commit("fix", &["c1"], 9000, vec![edit("a.py", &[3])]))
            .add_commit(commit("c1", &[], 3000, vec![edit("a.py", &[3])]))
            .set_blame_chain("a.py", 3, &["c1"]);
        repo
    };

    let repo = build();
    let mut engine = SzzEngine::new(&repo, Variant::AnnotationGraph, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, Some(2975)).unwrap();
    assert_eq!(hashes(&bic), vec!["c1"]);

    let repo = build();
    let mut engine = SzzEngine::new(&repo, Variant::MetaAware, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, Some(2975)).unwrap();
    assert_eq!(bic, vec![]);

    let repo = build();
    let mut engine = SzzEngine::new(&repo, Variant::MetaAware, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, Some(3000)).unwrap();
    assert_eq!(hashes(&bic), vec!["c1"]);
}

#[test]
fn test_issue_date_before_history_yields_empty_set() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["c1"], 9000, vec![edit("a.py", &[3])]))
        .add_commit(commit("c1", &[], 3000, vec![edit("a.py", &[3])]))
        .set_blame_chain("a.py", 3, &["c1"]);

    let mut engine = SzzEngine::new(&repo, Variant::Base, &config());
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, Some(100)).unwrap();
    assert_eq!(bic, vec![]);
}

#[test]
fn test_refactoring_aware_prunes_impacted_lines() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["c1"], 9000, vec![edit("A.java", &[3, 4, 12])]))
        .add_commit(commit("c1", &[], 3000, vec![]));

    let mut detector = FakeDetector::new();
    detector.add_span("fix", "Extract Method", "A.java", (3, 10));

    let mut engine = SzzEngine::new(&repo, Variant::RefactoringAware, &config())
        .with_refactoring_detector(Box::new(detector));
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    assert_eq!(impacted.len(), 1);
    assert_eq!(impacted[0].modified_lines, vec![12]);
}

#[test]
fn test_refactoring_covering_all_lines_yields_empty_set() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["c1"], 9000, vec![edit("A.java", &[3, 4])]))
        .add_commit(commit("c1", &[], 3000, vec![]));

    let mut detector = FakeDetector::new();
    detector.add_span("fix", "Move Class", "A.java", (1, 100));

    let mut engine = SzzEngine::new(&repo, Variant::RefactoringAware, &config())
        .with_refactoring_detector(Box::new(detector));
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    assert_eq!(impacted, vec![]);
    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    assert_eq!(bic, vec![]);
}

#[test]
fn test_refactoring_aware_reblames_refactored_lines() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["refac"], 9000, vec![edit("B.java", &[7])]))
        .add_commit(commit("refac", &["orig"], 5000, vec![edit("B.java", &[7])]))
        .add_commit(commit("orig", &[], 2000, vec![edit("B.java", &[7])]))
        .set_blame_chain("B.java", 7, &["refac", "orig"]);

    let mut detector = FakeDetector::new();
    detector.add_span("refac", "Extract Method", "B.java", (1, 100));

    let mut engine = SzzEngine::new(&repo, Variant::RefactoringAware, &config())
        .with_refactoring_detector(Box::new(detector));
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    // the blame hit on the refactoring commit is rejected and the line is
    // re-blamed past it
    assert_eq!(hashes(&bic), vec!["orig"]);
}

#[test]
fn test_refactoring_aware_keeps_unrefactored_hits() {
    let mut repo = FakeRepo::new();
    repo.add_commit(commit("fix", &["plain"], 9000, vec![edit("B.java", &[7])]))
        .add_commit(commit("plain", &[], 5000, vec![edit("B.java", &[7])]))
        .set_blame_chain("B.java", 7, &["plain"]);

    let mut detector = FakeDetector::new();
    detector.add_span("plain", "Rename Method", "Other.java", (1, 100));

    let mut engine = SzzEngine::new(&repo, Variant::RefactoringAware, &config())
        .with_refactoring_detector(Box::new(detector));
    let impacted = engine.impacted_files("fix", &[], true).unwrap();
    let bic = engine.find_bic("fix", &impacted, None).unwrap();
    assert_eq!(hashes(&bic), vec!["plain"]);
}

#[test]
fn test_meta_aware_failing_reset_aborts_fix() {
    let repo = FakeRepo::new();
    let mut engine = SzzEngine::new(&repo, Variant::MetaAware, &config());
    assert!(engine.find_bic("does-not-exist", &[], None).is_err());
}
