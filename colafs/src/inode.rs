//! Inode <-> path table.
//!
//! FUSE's lowlevel API is inode-based; everything in `colafs_fs` is
//! path-based, per the spec's single flat name index. This table is the
//! seam between the two: it hands out a stable inode number the first
//! time a path is seen and remembers it for the life of the mount.
//!
//! This is purely a bridge concern — there is no on-disk inode table,
//! and the mapping is rebuilt empty on every mount.

use std::collections::HashMap;

pub const ROOT_INO: u64 = 1;

#[derive(Default)]
pub struct InodeTable {
    path_of: HashMap<u64, String>,
    ino_of: HashMap<String, u64>,
    next: u64,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut path_of = HashMap::new();
        path_of.insert(ROOT_INO, "/".to_string());
        let mut ino_of = HashMap::new();
        ino_of.insert("/".to_string(), ROOT_INO);
        InodeTable { path_of, ino_of, next: ROOT_INO + 1 }
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        self.path_of.get(&ino).map(String::as_str)
    }

    /// Return the inode for `path`, assigning a fresh one if this is the
    /// first time it has been seen.
    pub fn intern(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.ino_of.get(path) {
            return *ino;
        }
        let ino = self.next;
        self.next += 1;
        self.path_of.insert(ino, path.to_string());
        self.ino_of.insert(path.to_string(), ino);
        ino
    }

    /// Join a parent's path with a child name. The root's own path is
    /// `/`, so it must not gain a doubled separator.
    pub fn child_path(parent: &str, name: &str) -> String {
        if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_preseeded() {
        let table = InodeTable::new();
        assert_eq!(table.path(ROOT_INO), Some("/"));
    }

    #[test]
    fn intern_is_stable_across_calls() {
        let mut table = InodeTable::new();
        let a = table.intern("/foo");
        let b = table.intern("/foo");
        assert_eq!(a, b);
        assert_ne!(a, ROOT_INO);
    }

    #[test]
    fn child_path_does_not_double_the_root_separator() {
        assert_eq!(InodeTable::child_path("/", "foo"), "/foo");
        assert_eq!(InodeTable::child_path("/dir", "foo"), "/dir/foo");
    }
}
