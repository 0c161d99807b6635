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

//! Deriving the impacted files and lines from a fix commit's diff.

use crate::commit::ChangeType;
use crate::commit::Commit;

/// A file touched by a fix commit, with the parent-revision line numbers
/// the fix modified.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImpactedFile {
    /// Pre-fix path of the file.
    pub file_path: String,
    /// 1-based line numbers in the parent revision, strictly increasing
    /// and never empty.
    pub modified_lines: Vec<u32>,
}

/// Enumerates the files impacted by `fix_commit`, in diff order.
///
/// Newly added files have no pre-image to blame and are skipped. When
/// `file_ext_to_parse` is non-empty, only files whose final dot-suffix is
/// listed are kept, and files without an extension are skipped. With
/// `only_deleted_lines` every deleted line counts as modified; otherwise
/// only deleted line numbers that also occur among the added ones do.
pub fn impacted_files(
    fix_commit: &Commit,
    file_ext_to_parse: &[String],
    only_deleted_lines: bool,
) -> Vec<ImpactedFile> {
    let mut impacted = Vec::new();
    for modification in &fix_commit.modifications {
        // skip newly added files
        let Some(old_path) = modification.old_path.as_deref().filter(|path| !path.is_empty())
        else {
            continue;
        };

        if !file_ext_to_parse.is_empty() {
            let extension = modification
                .file_name()
                .and_then(|name| name.rsplit_once('.'))
                .map(|(_, extension)| extension);
            let keep = extension
                .is_some_and(|extension| file_ext_to_parse.iter().any(|e| e == extension));
            if !keep {
                tracing::info!(file = ?modification.file_name(), "skip file");
                continue;
            }
        }

        let file_path = match modification.change_type {
            ChangeType::Deleted | ChangeType::Renamed => old_path,
            _ => modification.new_path.as_deref().unwrap_or(old_path),
        };

        let modified_lines: Vec<u32> = if only_deleted_lines {
            modification.deleted_lines.clone()
        } else {
            modification
                .deleted_lines
                .iter()
                .copied()
                .filter(|line| modification.added_lines.contains(line))
                .collect()
        };

        if !modified_lines.is_empty() {
            impacted.push(ImpactedFile {
                file_path: file_path.to_string(),
                modified_lines,
            });
        }
    }
    tracing::info!(?impacted, "impacted files");
    impacted
}
