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

//! Port to the external refactoring detector used by the RA variant.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use bstr::ByteSlice as _;
use serde::Deserialize;
use thiserror::Error;

/// A post-image source region reported as the result of a refactoring.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RefactoringSpan {
    /// Kind of refactoring, as named by the detector.
    pub kind: String,
    /// Path of the affected file.
    pub file_path: String,
    /// First affected line, 1-based inclusive.
    pub start_line: u32,
    /// Last affected line, 1-based inclusive.
    pub end_line: u32,
}

impl RefactoringSpan {
    /// Whether `(path, line)` falls inside the region.
    pub fn contains(&self, path: &str, line: u32) -> bool {
        self.file_path == path && self.start_line <= line && line <= self.end_line
    }
}

/// Detects source regions produced by refactoring operations.
pub trait RefactoringDetector {
    /// Regions of `commit`'s post-image affected by refactorings.
    ///
    /// Detector failures are reported as an empty region list.
    fn refactored_regions(&mut self, commit: &str) -> Vec<RefactoringSpan>;
}

#[derive(Debug, Error)]
enum MinerError {
    #[error("could not execute the refactoring miner process")]
    Spawn(#[source] io::Error),
    #[error("refactoring miner failed: {0}")]
    Failed(String),
    #[error("unparseable refactoring miner output")]
    Parse(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct MinerOutput {
    #[serde(default)]
    commits: Vec<MinerCommit>,
}

#[derive(Debug, Deserialize)]
struct MinerCommit {
    #[serde(default)]
    refactorings: Vec<MinerRefactoring>,
}

#[derive(Debug, Deserialize)]
struct MinerRefactoring {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(rename = "rightSideLocations", default)]
    right_side_locations: Vec<MinerLocation>,
}

#[derive(Debug, Deserialize)]
struct MinerLocation {
    #[serde(rename = "filePath")]
    file_path: String,
    #[serde(rename = "startLine")]
    start_line: u32,
    #[serde(rename = "endLine")]
    end_line: u32,
}

/// Runs the RefactoringMiner command-line tool against a working copy.
///
/// Results are memoized per commit for the lifetime of the detector (one
/// fix analysis), since the RA loop revisits the same commits.
pub struct RefactoringMiner {
    executable: PathBuf,
    repo_path: PathBuf,
    cache: HashMap<String, Vec<RefactoringSpan>>,
}

impl RefactoringMiner {
    /// Environment variable overriding the executable location.
    pub const EXECUTABLE_ENV: &'static str = "SZZ_REFACTORING_MINER";

    /// Creates a detector invoking `executable` against `repo_path`.
    pub fn new(executable: impl Into<PathBuf>, repo_path: impl Into<PathBuf>) -> Self {
        RefactoringMiner {
            executable: executable.into(),
            repo_path: repo_path.into(),
            cache: HashMap::new(),
        }
    }

    /// Creates a detector using `$SZZ_REFACTORING_MINER`, falling back to
    /// `RefactoringMiner` on the search path.
    pub fn from_env(repo_path: impl Into<PathBuf>) -> Self {
        let executable =
            std::env::var_os(Self::EXECUTABLE_ENV).unwrap_or_else(|| "RefactoringMiner".into());
        Self::new(PathBuf::from(executable), repo_path)
    }

    fn run(&self, commit: &str) -> Result<Vec<RefactoringSpan>, MinerError> {
        tracing::info!(commit, "running refactoring detection");
        let output = Command::new(&self.executable)
            .arg("-c")
            .arg(&self.repo_path)
            .arg(commit)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(MinerError::Spawn)?;
        if !output.status.success() {
            return Err(MinerError::Failed(
                output.stderr.to_str_lossy().into_owned(),
            ));
        }
        let parsed: MinerOutput =
            serde_json::from_slice(&output.stdout).map_err(MinerError::Parse)?;
        Ok(flatten_spans(parsed))
    }
}

impl RefactoringDetector for RefactoringMiner {
    fn refactored_regions(&mut self, commit: &str) -> Vec<RefactoringSpan> {
        if let Some(cached) = self.cache.get(commit) {
            return cached.clone();
        }
        let spans = match self.run(commit) {
            Ok(spans) => spans,
            Err(err) => {
                tracing::error!(commit, %err, "refactoring detection failed");
                Vec::new()
            }
        };
        self.cache.insert(commit.to_string(), spans.clone());
        spans
    }
}

fn flatten_spans(output: MinerOutput) -> Vec<RefactoringSpan> {
    output
        .commits
        .into_iter()
        .flat_map(|commit| commit.refactorings)
        .flat_map(|refactoring| {
            let kind = refactoring.kind;
            refactoring
                .right_side_locations
                .into_iter()
                .map(move |location| RefactoringSpan {
                    kind: kind.clone(),
                    file_path: location.file_path,
                    start_line: location.start_line,
                    end_line: location.end_line,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_flatten_spans_from_miner_json() {
        let raw = r#"{
            "commits": [{
                "repository": "https://example.com/r.git",
                "sha1": "8163d101571659a4cb1c2b59f92371d80130a0b3",
                "refactorings": [{
                    "type": "Extract Method",
                    "leftSideLocations": [
                        {"filePath": "src/A.java", "startLine": 3, "endLine": 9}
                    ],
                    "rightSideLocations": [
                        {"filePath": "src/A.java", "startLine": 14, "endLine": 20},
                        {"filePath": "src/B.java", "startLine": 1, "endLine": 4}
                    ]
                }]
            }]
        }"#;
        let parsed: MinerOutput = serde_json::from_str(raw).unwrap();
        let spans = flatten_spans(parsed);
        assert_eq!(
            spans,
            vec![
                RefactoringSpan {
                    kind: "Extract Method".to_string(),
                    file_path: "src/A.java".to_string(),
                    start_line: 14,
                    end_line: 20,
                },
                RefactoringSpan {
                    kind: "Extract Method".to_string(),
                    file_path: "src/B.java".to_string(),
                    start_line: 1,
                    end_line: 4,
                },
            ]
        );
    }

    #[test]
    fn test_empty_document() {
        let parsed: MinerOutput = serde_json::from_str(r#"{"commits": []}"#).unwrap();
        assert_eq!(flatten_spans(parsed), vec![]);
    }

    #[test]
    fn test_span_containment() {
        let span = RefactoringSpan {
            kind: "Move Method".to_string(),
            file_path: "src/A.java".to_string(),
            start_line: 5,
            end_line: 8,
        };
        assert!(span.contains("src/A.java", 5));
        assert!(span.contains("src/A.java", 8));
        assert!(!span.contains("src/A.java", 4));
        assert!(!span.contains("src/A.java", 9));
        assert!(!span.contains("src/B.java", 6));
    }
}
