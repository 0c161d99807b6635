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

//! Run configuration loaded from the user's YAML file.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::blame::DetectLineMoved;
use crate::engine::Variant;

/// Error loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read configuration file {path}")]
    Read {
        /// Location of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        error: io::Error,
    },
    /// The file is not valid YAML for the expected schema.
    #[error("invalid configuration file {path}")]
    Parse {
        /// Location of the file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        error: serde_yaml::Error,
    },
}

/// Options recognized in the configuration file.
///
/// Unknown keys are ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Algorithm variant to run: `b`, `ag`, `ma`, `r`, `l` or `ra`.
    #[serde(default)]
    pub szz_name: String,
    /// Extensions (without the dot) to restrict impact extraction to.
    #[serde(default)]
    pub file_ext_to_parse: Vec<String>,
    /// Treat every deleted line as impacted; otherwise only lines both
    /// deleted and re-added.
    #[serde(default = "default_only_deleted_lines")]
    pub only_deleted_lines: bool,
    /// File of commits the blame engine must always treat as transparent.
    #[serde(default)]
    pub ignore_revs_file_path: Option<PathBuf>,
    /// Commits touching more files than this are excluded as noise.
    #[serde(default = "default_max_change_size")]
    pub max_change_size: usize,
    /// Cross-file move detection level: 1, 2 or 3.
    #[serde(default)]
    pub detect_move_from_other_files: Option<u8>,
    /// Restrict candidates to commits no newer than the issue report.
    #[serde(default)]
    pub issue_date_filter: bool,
}

fn default_only_deleted_lines() -> bool {
    true
}

fn default_max_change_size() -> usize {
    20
}

impl Config {
    /// Loads and parses the YAML configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        serde_yaml::from_str(&contents).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// The configured variant, if `szz_name` names one.
    pub fn variant(&self) -> Option<Variant> {
        Variant::from_name(&self.szz_name)
    }

    /// Cross-file move detection for the meta-aware variants, defaulting
    /// to same-commit detection.
    pub fn detect_move_cross_file(&self) -> DetectLineMoved {
        self.detect_move_from_other_files
            .and_then(DetectLineMoved::from_level)
            .unwrap_or(DetectLineMoved::SameCommit)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_full_config() {
        let config: Config = serde_yaml::from_str(indoc! {"
            szz_name: ma
            file_ext_to_parse:
              - py
              - java
            only_deleted_lines: false
            ignore_revs_file_path: /tmp/ignore-revs
            max_change_size: 30
            detect_move_from_other_files: 2
            issue_date_filter: true
        "})
        .unwrap();
        assert_eq!(config.variant(), Some(Variant::MetaAware));
        assert_eq!(config.file_ext_to_parse, vec!["py", "java"]);
        assert!(!config.only_deleted_lines);
        assert_eq!(
            config.ignore_revs_file_path,
            Some(PathBuf::from("/tmp/ignore-revs"))
        );
        assert_eq!(config.max_change_size, 30);
        assert_eq!(
            config.detect_move_cross_file(),
            DetectLineMoved::ParentCommit
        );
        assert!(config.issue_date_filter);
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("szz_name: b\n").unwrap();
        assert_eq!(config.variant(), Some(Variant::Base));
        assert!(config.only_deleted_lines);
        assert_eq!(config.max_change_size, 20);
        assert_eq!(config.file_ext_to_parse, Vec::<String>::new());
        assert_eq!(config.ignore_revs_file_path, None);
        assert_eq!(config.detect_move_cross_file(), DetectLineMoved::SameCommit);
        assert!(!config.issue_date_filter);
    }

    #[test]
    fn test_unknown_variant() {
        let config: Config = serde_yaml::from_str("szz_name: nope\n").unwrap();
        assert_eq!(config.variant(), None);
        let config: Config = serde_yaml::from_str("max_change_size: 5\n").unwrap();
        assert_eq!(config.variant(), None);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config: Config =
            serde_yaml::from_str("szz_name: ra\nsome_future_option: 42\n").unwrap();
        assert_eq!(config.variant(), Some(Variant::RefactoringAware));
    }
}
