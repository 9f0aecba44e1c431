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

//! Filesystem facade (§4.6): the single entry point FUSE handlers (or
//! tests) call into. Combines the COLA name index, the FAT allocator and
//! the file I/O engine behind one `RwLock`-guarded surface, matching the
//! concurrency model in §5 — readers take a shared lock, writers take an
//! exclusive one, and every operation holds it for its whole duration.

mod dir;
mod io;
mod path;

use colafs_cola::Cola;
use colafs_err::{Error, FsError, Result};
use colafs_fat::FatAllocator;
use colafs_store::{BackingStore, DataStorage};
use log::warn;
use parking_lot::RwLock;

pub use path::check_path;

/// Whether a looked-up entry names a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// Attributes reported for `getattr`. Every entry is mode `0777`; files
/// report `nlink = 1`, directories `nlink = 2` (source convention: a
/// directory always has itself and its non-existent `.` as links, there
/// is no nested-directory link accounting — see §4.6).
#[derive(Debug, Clone, Copy)]
pub struct Attr {
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub nlink: u32,
}

impl Attr {
    fn dir() -> Self {
        Attr { kind: EntryKind::Dir, size: 0, mode: 0o777, nlink: 2 }
    }

    fn file(size: u64) -> Self {
        Attr { kind: EntryKind::File, size, mode: 0o777, nlink: 1 }
    }
}

/// Everything a caller (a FUSE bridge, a test harness) can do to one
/// mounted COLA filesystem.
pub trait FileSystem {
    fn getattr(&self, path: &str) -> Result<Attr>;
    fn readdir(&self, path: &str) -> Result<Vec<String>>;
    fn mknod(&self, path: &str) -> Result<()>;
    fn mkdir(&self, path: &str) -> Result<()>;
    fn open(&self, path: &str) -> Result<()>;
    fn read(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<usize>;
    fn write(&self, path: &str, offset: u64, buf: &[u8]) -> Result<usize>;
    fn truncate(&self, path: &str, size: u64) -> Result<()>;
    fn utime(&self, path: &str) -> Result<()>;
}

/// The mounted filesystem: one backing store behind one lock.
pub struct ColaFs<DS: DataStorage> {
    store: BackingStore<DS>,
    lock: RwLock<()>,
}

impl<DS: DataStorage> ColaFs<DS> {
    pub fn new(store: BackingStore<DS>) -> Self {
        ColaFs { store, lock: RwLock::new(()) }
    }

    pub fn store(&self) -> &BackingStore<DS> {
        &self.store
    }

    fn lookup(&self, rel: &str) -> Result<usize> {
        Cola::new(&self.store).find(rel)?.ok_or(Error::Fs(FsError::NotFound))
    }
}

impl<DS: DataStorage> FileSystem for ColaFs<DS> {
    fn getattr(&self, path: &str) -> Result<Attr> {
        let _guard = self.lock.read();
        if path == "/" {
            return Ok(Attr::dir());
        }
        let rel = path::check_path(path)?;
        let idx = self.lookup(rel)?;
        let entry = self.store.read_entry(idx)?;
        Ok(if entry.is_dir() { Attr::dir() } else { Attr::file(entry.size() as u64) })
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let _guard = self.lock.read();
        let rel = if path == "/" { "" } else { path::check_path(path)? };
        if !rel.is_empty() {
            let idx = self.lookup(rel)?;
            if !self.store.read_entry(idx)?.is_dir() {
                return Err(Error::Fs(FsError::NotFound));
            }
        }
        dir::list(&self.store, rel)
    }

    fn mknod(&self, path: &str) -> Result<()> {
        let _guard = self.lock.write();
        let rel = path::check_path(path)?;
        let cola = Cola::new(&self.store);
        if cola.find(rel)?.is_some() {
            return Err(Error::Fs(FsError::AlreadyExists));
        }
        let fat = FatAllocator::new(&self.store);
        let head = fat.allocate()?;
        // A failed insert (COLA full) leaves this block allocated and
        // unreachable; the source has the same leak and there is no
        // unlink to reclaim it through.
        cola.insert(colafs_store::Entry::new_file(rel, head as i32))
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let _guard = self.lock.write();
        let rel = path::check_path(path)?;
        let cola = Cola::new(&self.store);
        if cola.find(rel)?.is_some() {
            return Err(Error::Fs(FsError::AlreadyExists));
        }
        cola.insert(colafs_store::Entry::new_dir(rel))
    }

    fn open(&self, path: &str) -> Result<()> {
        let _guard = self.lock.read();
        let rel = path::check_path(path)?;
        self.lookup(rel).map(|_| ())
    }

    fn read(&self, path: &str, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let _guard = self.lock.read();
        let rel = path::check_path(path)?;
        let idx = self.lookup(rel)?;
        let entry = self.store.read_entry(idx)?;
        if entry.is_dir() {
            return Err(Error::Fs(FsError::AccessDenied));
        }
        io::read(&self.store, &entry, offset, buf)
    }

    fn write(&self, path: &str, offset: u64, buf: &[u8]) -> Result<usize> {
        let _guard = self.lock.write();
        let rel = path::check_path(path)?;
        let idx = self.lookup(rel)?;
        let entry = self.store.read_entry(idx)?;
        if entry.is_dir() {
            return Err(Error::Fs(FsError::AccessDenied));
        }
        let outcome = io::write(&self.store, &entry, offset, buf);
        // Commit whatever made it to disk even on failure — §7's
        // partial-write contract — then surface the error, if any.
        let mut updated = entry;
        updated.set_size(outcome.new_size);
        self.store.write_entry(idx, &updated)?;
        match outcome.error {
            Some(e) => Err(e),
            None => Ok(outcome.written),
        }
    }

    fn truncate(&self, path: &str, size: u64) -> Result<()> {
        let _guard = self.lock.write();
        let rel = path::check_path(path)?;
        let idx = self.lookup(rel)?;
        let entry = self.store.read_entry(idx)?;
        if entry.is_dir() {
            return Err(Error::Fs(FsError::AccessDenied));
        }
        if size > u32::MAX as u64 {
            warn!("truncate target {size} exceeds the on-disk size field width");
            return Err(Error::Fs(FsError::NoMemory));
        }
        // Size-field only, per §4.4.3: no block allocation or release.
        let mut updated = entry;
        updated.set_size(size as u32);
        self.store.write_entry(idx, &updated)
    }

    fn utime(&self, path: &str) -> Result<()> {
        let _guard = self.lock.read();
        let rel = path::check_path(path)?;
        self.lookup(rel)?;
        // Timestamps are not part of the on-disk entry; nothing to do.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colafs_store::mem::MemDataStorage;

    fn fs() -> ColaFs<MemDataStorage> {
        let store = BackingStore::new(MemDataStorage::new(), 64);
        store.init().unwrap();
        ColaFs::new(store)
    }

    #[test]
    fn root_getattr_is_a_directory() {
        let fs = fs();
        let attr = fs.getattr("/").unwrap();
        assert_eq!(attr.kind, EntryKind::Dir);
    }

    #[test]
    fn mknod_then_getattr_reports_an_empty_file() {
        let fs = fs();
        fs.mknod("/foo").unwrap();
        let attr = fs.getattr("/foo").unwrap();
        assert_eq!(attr.kind, EntryKind::File);
        assert_eq!(attr.size, 0);
    }

    #[test]
    fn mknod_twice_fails_with_already_exists() {
        let fs = fs();
        fs.mknod("/foo").unwrap();
        assert!(matches!(fs.mknod("/foo"), Err(Error::Fs(FsError::AlreadyExists))));
    }

    #[test]
    fn getattr_on_missing_path_fails_with_not_found() {
        let fs = fs();
        assert!(matches!(fs.getattr("/nope"), Err(Error::Fs(FsError::NotFound))));
    }

    #[test]
    fn path_validation_rejects_bad_paths_before_lookup() {
        let fs = fs();
        assert!(matches!(fs.getattr("/a~b"), Err(Error::Fs(FsError::AccessDenied))));
        assert!(matches!(fs.mknod("/.hidden"), Err(Error::Fs(FsError::AccessDenied))));
    }

    #[test]
    fn write_then_read_round_trips() {
        let fs = fs();
        fs.mknod("/foo").unwrap();
        let n = fs.write("/foo", 0, b"hello world").unwrap();
        assert_eq!(n, 11);

        let mut buf = [0u8; 11];
        let n = fs.read("/foo", 0, &mut buf).unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");

        assert_eq!(fs.getattr("/foo").unwrap().size, 11);
    }

    #[test]
    fn write_spans_multiple_blocks() {
        let fs = fs();
        fs.mknod("/foo").unwrap();
        let data = vec![7u8; 200];
        let n = fs.write("/foo", 0, &data).unwrap();
        assert_eq!(n, 200);

        let mut buf = vec![0u8; 200];
        fs.read("/foo", 0, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn truncate_shrinks_without_touching_readable_prefix() {
        let fs = fs();
        fs.mknod("/foo").unwrap();
        fs.write("/foo", 0, b"0123456789").unwrap();
        fs.truncate("/foo", 3).unwrap();
        assert_eq!(fs.getattr("/foo").unwrap().size, 3);

        let mut buf = [0u8; 3];
        fs.read("/foo", 0, &mut buf).unwrap();
        assert_eq!(&buf, b"012");
    }

    #[test]
    fn directory_round_trip() {
        let fs = fs();
        fs.mkdir("/d").unwrap();
        fs.mknod("/d/a").unwrap();
        fs.mknod("/d/b").unwrap();

        let mut names = fs.readdir("/d").unwrap();
        names.sort();
        assert_eq!(names, vec![".".to_string(), "..".to_string(), "a".to_string(), "b".to_string()]);
        assert_eq!(fs.getattr("/d").unwrap().kind, EntryKind::Dir);
    }

    #[test]
    fn read_and_write_reject_directories() {
        let fs = fs();
        fs.mkdir("/d").unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(fs.read("/d", 0, &mut buf), Err(Error::Fs(FsError::AccessDenied))));
        assert!(matches!(fs.write("/d", 0, b"x"), Err(Error::Fs(FsError::AccessDenied))));
    }

    #[test]
    fn open_succeeds_on_existing_file_and_fails_on_missing() {
        let fs = fs();
        fs.mknod("/foo").unwrap();
        fs.open("/foo").unwrap();
        assert!(matches!(fs.open("/missing"), Err(Error::Fs(FsError::NotFound))));
    }
}
