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

//! Backing store for the COLA filesystem.
//!
//! A backing file is three concatenated regions at page-aligned offsets:
//! COLA entries, FAT entries, data blocks. This crate owns the region
//! layout math and the byte-precise accessors on top of a generic
//! [`DataStorage`]; it knows nothing about what a name lookup or a block
//! chain means — that's [`colafs_cola`] and [`colafs_fat`].

pub mod mem;
pub mod std_fs;

use colafs_err::{Error, FsError, Result};
use zerocopy::little_endian::I32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// `k` in the spec: the COLA has `2^k - 1` slots across `k` runs.
pub const LEVELS: u32 = 15;

/// `N = 2^k - 1`, the number of COLA slots and FAT/data blocks.
pub const CAPACITY: usize = (1usize << LEVELS) - 1;

/// Maximum length, in bytes, of the portion of `name` after the leading
/// separator.
pub const NAME_LEN: usize = 30;

pub const EMPTY: i32 = -1;
pub const DIR: i32 = -2;
pub const END: i32 = -3;

/// A byte-range read/write surface over the single host backing file.
///
/// Mirrors the role of `hyrax_ds::DataStorage`: everything above this
/// trait is generic over storage, so the same COLA/FAT/file-engine code
/// runs against a real file or an in-memory double.
pub trait DataStorage: Send + Sync {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()>;
    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()>;
}

/// One COLA slot: a file or directory entry, or an empty slot.
///
/// Byte layout (little-endian, no padding): 4-byte `size`, 31-byte
/// null-terminated `name`, 4-byte `head`.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Entry {
    pub size: I32,
    pub name: [u8; NAME_LEN + 1],
    pub head: I32,
}

impl Entry {
    pub fn empty() -> Self {
        Entry {
            size: I32::new(0),
            name: [0u8; NAME_LEN + 1],
            head: I32::new(EMPTY),
        }
    }

    pub fn new_file(name: &str, head: i32) -> Self {
        let mut raw = [0u8; NAME_LEN + 1];
        let bytes = name.as_bytes();
        raw[..bytes.len()].copy_from_slice(bytes);
        Entry {
            size: I32::new(0),
            name: raw,
            head: I32::new(head),
        }
    }

    pub fn new_dir(name: &str) -> Self {
        Self::new_file(name, DIR)
    }

    pub fn is_empty_slot(&self) -> bool {
        self.head.get() == EMPTY
    }

    pub fn is_dir(&self) -> bool {
        self.head.get() == DIR
    }

    pub fn name(&self) -> &str {
        let nul = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        std::str::from_utf8(&self.name[..nul]).unwrap_or("")
    }

    pub fn size(&self) -> u32 {
        self.size.get() as u32
    }

    pub fn head(&self) -> i32 {
        self.head.get()
    }

    pub fn set_size(&mut self, size: u32) {
        self.size = I32::new(size as i32);
    }
}

fn ceil_to_page(bytes: u64, page: u64) -> u64 {
    bytes.div_ceil(page) * page
}

/// Region offsets and the typed accessors layered on top of a [`DataStorage`].
pub struct BackingStore<DS: DataStorage> {
    data_storage: DS,
    block_size: u64,
    off_cola: u64,
    off_fat: u64,
    off_data: u64,
}

impl<DS: DataStorage> BackingStore<DS> {
    pub fn new(data_storage: DS, block_size: u64) -> Self {
        let entry_size = size_of::<Entry>() as u64;
        let cola_bytes = CAPACITY as u64 * entry_size;
        let fat_bytes = CAPACITY as u64 * 4;

        let off_cola = 0;
        let off_fat = ceil_to_page(cola_bytes, block_size);
        let off_data = off_fat + ceil_to_page(fat_bytes, block_size);

        BackingStore {
            data_storage,
            block_size,
            off_cola,
            off_fat,
            off_data,
        }
    }

    /// Total size the backing file must be allocated to, including the
    /// two pages of trailing slack the source leaves.
    pub fn total_size(&self) -> u64 {
        self.off_data + CAPACITY as u64 * self.block_size + 2 * self.block_size
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn capacity(&self) -> usize {
        CAPACITY
    }

    pub fn data_storage(&self) -> &DS {
        &self.data_storage
    }

    /// Zero every COLA slot and every FAT entry. Called once, on a freshly
    /// created backing file.
    pub fn init(&self) -> Result<()> {
        let empty = Entry::empty();
        for i in 0..CAPACITY {
            self.write_entry(i, &empty)?;
        }
        for i in 0..CAPACITY {
            self.write_fat(i, EMPTY)?;
        }
        Ok(())
    }

    pub fn read_entry(&self, index: usize) -> Result<Entry> {
        let mut entry = Entry::empty();
        let offset = self.off_cola + index as u64 * size_of::<Entry>() as u64;
        self.data_storage.read(offset, entry.as_mut_bytes())?;
        Ok(entry)
    }

    pub fn write_entry(&self, index: usize, entry: &Entry) -> Result<()> {
        let offset = self.off_cola + index as u64 * size_of::<Entry>() as u64;
        self.data_storage.write(offset, entry.as_bytes())
    }

    pub fn read_fat(&self, index: usize) -> Result<i32> {
        let mut raw = I32::new(0);
        let offset = self.off_fat + index as u64 * 4;
        self.data_storage.read(offset, raw.as_mut_bytes())?;
        Ok(raw.get())
    }

    pub fn write_fat(&self, index: usize, value: i32) -> Result<()> {
        let raw = I32::new(value);
        let offset = self.off_fat + index as u64 * 4;
        self.data_storage.write(offset, raw.as_bytes())
    }

    /// Read `buffer.len()` bytes from block `block` starting at
    /// `inner_offset`. Requires `inner_offset + buffer.len() <= block_size`.
    pub fn read_block_at(&self, block: usize, inner_offset: u64, buffer: &mut [u8]) -> Result<()> {
        if inner_offset + buffer.len() as u64 > self.block_size {
            return Err(Error::Fs(FsError::NoMemory));
        }
        let offset = self.off_data + block as u64 * self.block_size + inner_offset;
        self.data_storage.read(offset, buffer)
    }

    pub fn write_block_at(&self, block: usize, inner_offset: u64, buffer: &[u8]) -> Result<()> {
        if inner_offset + buffer.len() as u64 > self.block_size {
            return Err(Error::Fs(FsError::NoMemory));
        }
        let offset = self.off_data + block as u64 * self.block_size + inner_offset;
        self.data_storage.write(offset, buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_round_trips_name() {
        let e = Entry::new_file("foo/bar", 3);
        assert_eq!(e.name(), "foo/bar");
        assert_eq!(e.head(), 3);
        assert!(!e.is_dir());
        assert!(!e.is_empty_slot());
    }

    #[test]
    fn entry_has_no_padding() {
        // size(4) + name(31) + head(4); the byteorder wrapper types are
        // 1-aligned so there must be no inserted padding.
        assert_eq!(size_of::<Entry>(), 4 + (NAME_LEN + 1) + 4);
    }

    #[test]
    fn layout_offsets_are_page_aligned() {
        let store = BackingStore::new(mem::MemDataStorage::new(), 4096);
        assert_eq!(store.off_cola, 0);
        assert_eq!(store.off_fat % 4096, 0);
        assert_eq!(store.off_data % 4096, 0);
        assert!(store.off_fat >= CAPACITY as u64 * size_of::<Entry>() as u64);
        assert!(store.off_data >= store.off_fat + CAPACITY as u64 * 4);
    }

    #[test]
    fn init_clears_every_slot() {
        let store = BackingStore::new(mem::MemDataStorage::new(), 4096);
        store.init().unwrap();
        for i in 0..CAPACITY {
            assert!(store.read_entry(i).unwrap().is_empty_slot());
            assert_eq!(store.read_fat(i).unwrap(), EMPTY);
        }
    }

    #[test]
    fn block_access_rejects_overrun() {
        let store = BackingStore::new(mem::MemDataStorage::new(), 4096);
        let buf = vec![0u8; 4097];
        assert!(store.read_block_at(0, 0, &mut buf.clone()).is_err());
        assert!(store.write_block_at(0, 4000, &buf[..4097.min(200)]).is_err());
    }
}
