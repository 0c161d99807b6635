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

//! Filesystem helpers for the working-copy lifecycle.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

/// An I/O error annotated with the path it happened on.
#[derive(Debug, Error)]
#[error("Cannot access {path}")]
pub struct PathError {
    /// The path the failing operation was applied to.
    pub path: PathBuf,
    /// The underlying I/O error.
    #[source]
    pub error: io::Error,
}

pub(crate) trait IoResultExt<T> {
    fn context(self, path: impl AsRef<Path>) -> Result<T, PathError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn context(self, path: impl AsRef<Path>) -> Result<T, PathError> {
        self.map_err(|error| PathError {
            path: path.as_ref().to_path_buf(),
            error,
        })
    }
}

/// Recursively copies the directory `src` to `dst`, recreating symlinks on
/// platforms that support them.
///
/// Used to seed a temporary working copy from a pre-cloned repository.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), PathError> {
    fs::create_dir_all(dst).context(dst)?;
    for entry in fs::read_dir(src).context(src)? {
        let entry = entry.context(src)?;
        let source = entry.path();
        let target = dst.join(entry.file_name());
        let file_type = entry.file_type().context(&source)?;
        if file_type.is_dir() {
            copy_dir_recursive(&source, &target)?;
        } else if file_type.is_symlink() {
            copy_symlink(&source, &target)?;
        } else {
            fs::copy(&source, &target).context(&source)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<(), PathError> {
    let link = fs::read_link(source).context(source)?;
    std::os::unix::fs::symlink(&link, target).context(target)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> Result<(), PathError> {
    // Git checkouts on these platforms materialize symlinks as files.
    fs::copy(source, target).context(source)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_copy_dir_recursive() {
        let temp_dir = tempfile::tempdir().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("nested/deep")).unwrap();
        fs::write(src.join("top.txt"), b"top").unwrap();
        fs::write(src.join("nested/deep/leaf.txt"), b"leaf").unwrap();

        let dst = temp_dir.path().join("dst");
        copy_dir_recursive(&src, &dst).unwrap();

        assert_eq!(fs::read(dst.join("top.txt")).unwrap(), b"top");
        assert_eq!(fs::read(dst.join("nested/deep/leaf.txt")).unwrap(), b"leaf");
    }

    #[test]
    fn test_copy_dir_recursive_missing_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("nope");
        let dst = temp_dir.path().join("dst");
        let err = copy_dir_recursive(&missing, &dst).unwrap_err();
        assert_eq!(err.path, missing);
    }
}
