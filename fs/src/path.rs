// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Path validation (`checkPath` in the source, §4.6).

use colafs_err::{Error, FsError, Result};
use colafs_store::NAME_LEN;

/// Validate an absolute path and return the portion after the leading
/// separator (empty string for the root).
///
/// Rejects a path when the portion after the leading separator exceeds
/// [`NAME_LEN`] bytes, when its first byte is `.`, or when the path
/// contains `~` anywhere.
pub fn check_path(path: &str) -> Result<&str> {
    let rel = path.strip_prefix('/').ok_or(Error::Fs(FsError::AccessDenied))?;

    if rel.len() > NAME_LEN {
        return Err(Error::Fs(FsError::AccessDenied));
    }
    if rel.starts_with('.') {
        return Err(Error::Fs(FsError::AccessDenied));
    }
    if path.contains('~') {
        return Err(Error::Fs(FsError::AccessDenied));
    }

    Ok(rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_accepted() {
        assert_eq!(check_path("/").unwrap(), "");
    }

    #[test]
    fn ordinary_path_is_accepted() {
        assert_eq!(check_path("/foo/bar").unwrap(), "foo/bar");
    }

    #[test]
    fn too_long_is_rejected() {
        let name = "a".repeat(31);
        let path = format!("/{name}");
        assert!(check_path(&path).is_err());
    }

    #[test]
    fn exactly_at_limit_is_accepted() {
        let name = "a".repeat(30);
        let path = format!("/{name}");
        assert!(check_path(&path).is_ok());
    }

    #[test]
    fn leading_dot_is_rejected() {
        assert!(check_path("/.hidden").is_err());
    }

    #[test]
    fn tilde_anywhere_is_rejected() {
        assert!(check_path("/foo~bar").is_err());
        assert!(check_path("/foo/~").is_err());
    }

    #[test]
    fn relative_path_is_rejected() {
        assert!(check_path("no-leading-slash").is_err());
    }
}
