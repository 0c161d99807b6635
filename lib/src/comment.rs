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

//! Locating comment lines in source files.
//!
//! Dispatch is purely by file extension: a handful of languages are scanned
//! line by line here, C-family and Java sources are delegated to the
//! external `srcml` tool, and everything else is reported comment-free.

use std::io::Write as _;
use std::process::Command;
use std::process::Stdio;
use std::sync::LazyLock;

use bstr::ByteSlice as _;
use regex::Regex;

/// An inclusive, 1-based range of lines forming one comment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CommentRange {
    /// First line of the comment.
    pub start: u32,
    /// Last line of the comment.
    pub end: u32,
}

impl CommentRange {
    /// Whether `line` falls inside the range.
    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }
}

/// Extensions delegated to `srcml`.
const SRCML_EXTENSIONS: &[&str] = &[
    ".c", ".h", ".hh", ".hpp", ".hxx", ".cxx", ".cpp", ".cc", ".cs", ".java",
];

/// Returns the comment ranges of `contents`, choosing a parser from the
/// extension of `file_name`.
///
/// Unsupported extensions yield an empty set. An unterminated block comment
/// yields no range; scanning continues on the following line.
pub fn comment_ranges(contents: &str, file_name: &str) -> Vec<CommentRange> {
    if file_name.ends_with(".py") {
        scan_python(contents)
    } else if file_name.ends_with(".js") {
        scan_slash_block(contents, false)
    } else if file_name.ends_with(".php") || file_name.ends_with(".phpt") {
        scan_slash_block(contents, true)
    } else if file_name.ends_with(".rb") {
        scan_ruby(contents)
    } else if SRCML_EXTENSIONS.iter().any(|ext| file_name.ends_with(ext)) {
        srcml_ranges(contents, file_name)
    } else {
        tracing::debug!(file = file_name, "no comment parser for extension");
        Vec::new()
    }
}

/// Python: `#` line comments plus triple-quoted blocks.
///
/// The opening line has its leading triple quote stripped before the
/// closure test, so a one-line docstring closes on its own line.
fn scan_python(contents: &str) -> Vec<CommentRange> {
    let lines: Vec<&str> = contents.lines().collect();
    let mut ranges = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx].trim();
        if line.starts_with("'''") || line.starts_with("\"\"\"") {
            for i in idx..lines.len() {
                let mut line = lines[i].trim();
                if i == idx {
                    line = &line[3..];
                }
                if !line.is_empty()
                    && (line.ends_with("'''")
                        || line.ends_with("\"\"\"")
                        || line.starts_with("'''")
                        || line.starts_with("\"\"\""))
                {
                    ranges.push(CommentRange {
                        start: idx as u32 + 1,
                        end: i as u32 + 1,
                    });
                    idx = i;
                    break;
                }
            }
        } else if line.starts_with('#') {
            ranges.push(CommentRange {
                start: idx as u32 + 1,
                end: idx as u32 + 1,
            });
        }
        idx += 1;
    }
    ranges
}

/// JavaScript and PHP: `//` (and for PHP also `#`) line comments plus
/// `/* … */` blocks closing at the first line that ends with `*/`.
fn scan_slash_block(contents: &str, allow_hash: bool) -> Vec<CommentRange> {
    let lines: Vec<&str> = contents.lines().collect();
    let mut ranges = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx].trim();
        if line.starts_with("/*") {
            for i in idx..lines.len() {
                let mut line = lines[i].trim();
                if i == idx {
                    line = &line[2..];
                }
                if !line.is_empty() && line.ends_with("*/") {
                    ranges.push(CommentRange {
                        start: idx as u32 + 1,
                        end: i as u32 + 1,
                    });
                    idx = i;
                    break;
                }
            }
        } else if line.starts_with("//") || (allow_hash && line.starts_with('#')) {
            ranges.push(CommentRange {
                start: idx as u32 + 1,
                end: idx as u32 + 1,
            });
        }
        idx += 1;
    }
    ranges
}

/// Ruby: `#` line comments plus `=begin … =end` blocks. The opening line is
/// not stripped, and `//` is accepted as a line comment as well.
fn scan_ruby(contents: &str) -> Vec<CommentRange> {
    let lines: Vec<&str> = contents.lines().collect();
    let mut ranges = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx].trim();
        if line.starts_with("=begin") {
            for i in idx..lines.len() {
                let line = lines[i].trim();
                if !line.is_empty() && line.ends_with("=end") {
                    ranges.push(CommentRange {
                        start: idx as u32 + 1,
                        end: i as u32 + 1,
                    });
                    idx = i;
                    break;
                }
            }
        } else if line.starts_with("//") || line.starts_with('#') {
            ranges.push(CommentRange {
                start: idx as u32 + 1,
                end: idx as u32 + 1,
            });
        }
        idx += 1;
    }
    ranges
}

/// Writes the contents to a temp file carrying the original extension (the
/// tool chooses its grammar from it) and extracts `<comment>` positions
/// from `srcml --position` output.
///
/// Failures of the external tool are logged and reported as "no comments".
fn srcml_ranges(contents: &str, file_name: &str) -> Vec<CommentRange> {
    let temp_file = tempfile::Builder::new()
        .prefix("comment-")
        .suffix(&format!("-{file_name}"))
        .tempfile();
    let mut temp_file = match temp_file {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(%err, "failed to create temp file for srcml");
            return Vec::new();
        }
    };
    if let Err(err) = temp_file.write_all(contents.as_bytes()) {
        tracing::error!(%err, "failed to write temp file for srcml");
        return Vec::new();
    }

    let output = Command::new("srcml")
        .arg("--position")
        .arg(temp_file.path())
        .stdin(Stdio::null())
        .output();
    match output {
        Ok(output) if output.status.success() => parse_srcml_positions(&output.stdout),
        Ok(output) => {
            tracing::error!(
                file = file_name,
                stderr = %output.stderr.to_str_lossy(),
                "srcml failed"
            );
            Vec::new()
        }
        Err(err) => {
            tracing::error!(%err, "could not execute srcml");
            Vec::new()
        }
    }
}

/// Scans srcml XML output for `<comment …>` elements and their
/// `pos:start`/`pos:end` line attributes.
fn parse_srcml_positions(stdout: &[u8]) -> Vec<CommentRange> {
    static START: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"pos:start="(\d+):"#).unwrap());
    static END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"pos:end="(\d+):"#).unwrap());

    let mut ranges = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if !line.starts_with_str("<comment") {
            continue;
        }
        let line = line.to_str_lossy();
        let start = START
            .captures(&line)
            .and_then(|captures| captures[1].parse().ok());
        let end = END
            .captures(&line)
            .and_then(|captures| captures[1].parse().ok());
        if let (Some(start), Some(end)) = (start, end) {
            ranges.push(CommentRange { start, end });
        }
    }
    ranges
}
