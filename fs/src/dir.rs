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

//! Directory listing (§4.5).
//!
//! Entry names carry no separate parent pointer; a directory's children
//! are recovered by matching name prefixes against the whole COLA.

use colafs_cola::Cola;
use colafs_err::Result;
use colafs_store::{BackingStore, DataStorage};

/// List the children of `rel` (the validated, separator-stripped path;
/// the empty string names the root). Always seeds `.` and `..` first.
pub fn list<DS: DataStorage>(store: &BackingStore<DS>, rel: &str) -> Result<Vec<String>> {
    let cola = Cola::new(store);
    let mut out = vec![".".to_string(), "..".to_string()];

    if rel.is_empty() {
        for entry in cola.entries()? {
            if !entry.name().contains('/') {
                out.push(entry.name().to_string());
            }
        }
        return Ok(out);
    }

    let prefix = format!("{rel}/");
    for entry in cola.entries()? {
        if let Some(child) = entry.name().strip_prefix(prefix.as_str()) {
            if !child.is_empty() && !child.contains('/') {
                out.push(child.to_string());
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use colafs_store::{mem::MemDataStorage, Entry};

    fn store() -> BackingStore<MemDataStorage> {
        let s = BackingStore::new(MemDataStorage::new(), 4096);
        s.init().unwrap();
        s
    }

    #[test]
    fn root_lists_only_top_level_names() {
        let store = store();
        let cola = Cola::new(&store);
        cola.insert(Entry::new_file("top", 0)).unwrap();
        cola.insert(Entry::new_dir("sub")).unwrap();
        cola.insert(Entry::new_file("sub/child", 1)).unwrap();

        let mut names = list(&store, "").unwrap();
        names.sort();
        assert_eq!(names, vec![".", "..", "sub", "top"]);
    }

    #[test]
    fn subdirectory_lists_only_its_direct_children() {
        let store = store();
        let cola = Cola::new(&store);
        cola.insert(Entry::new_dir("sub")).unwrap();
        cola.insert(Entry::new_file("sub/a", 0)).unwrap();
        cola.insert(Entry::new_file("sub/b", 1)).unwrap();
        // a deeper path must not leak into "sub"'s listing
        cola.insert(Entry::new_dir("sub/nested")).unwrap();
        cola.insert(Entry::new_file("sub/nested/c", 2)).unwrap();

        let mut names = list(&store, "sub").unwrap();
        names.sort();
        assert_eq!(names, vec![".", "..", "a", "b", "nested"]);
    }

    #[test]
    fn empty_directory_lists_just_dot_entries() {
        let store = store();
        let cola = Cola::new(&store);
        cola.insert(Entry::new_dir("empty")).unwrap();

        let names = list(&store, "empty").unwrap();
        assert_eq!(names, vec![".".to_string(), "..".to_string()]);
    }
}
