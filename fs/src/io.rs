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

//! The file I/O engine (§4.4.1, §4.4.2): reading and writing through a
//! FAT block chain located via the COLA entry's `head`.

use colafs_fat::FatAllocator;
use colafs_err::Result;
use colafs_store::{BackingStore, DataStorage, Entry, END};

/// Read up to `buf.len()` bytes starting at `offset`, clamped to the
/// entry's recorded size. Returns the number of bytes actually read.
pub fn read<DS: DataStorage>(
    store: &BackingStore<DS>,
    entry: &Entry,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize> {
    let size = entry.size() as u64;
    if offset >= size || buf.is_empty() {
        return Ok(0);
    }

    let block_size = store.block_size();
    let want = (buf.len() as u64).min(size - offset) as usize;
    let fat = FatAllocator::new(store);

    let mut cur = fat.walk(entry.head() as usize, (offset / block_size) as usize)?;
    let mut inner = offset % block_size;
    let mut done = 0usize;

    while done < want {
        let room = (block_size - inner) as usize;
        let n = room.min(want - done);
        store.read_block_at(cur, inner, &mut buf[done..done + n])?;
        done += n;
        inner = 0;
        if done < want {
            cur = store.read_fat(cur)? as usize;
        }
    }

    Ok(done)
}

/// Outcome of a [`write`]: the number of bytes actually placed, the size
/// the entry should be updated to, and (on a mid-write failure) the
/// error that stopped it.
///
/// The source assigns `entry.size = written + offset` unconditionally,
/// even when a write is cut short by `OUT_OF_SPACE` — bytes already
/// placed stay on disk and the recorded size grows to match them. This
/// type lets the caller commit that size update regardless of outcome,
/// matching §7's "partial writes ... left on disk with size updated"
/// behaviour.
pub struct WriteOutcome {
    pub written: usize,
    pub new_size: u32,
    pub error: Option<colafs_err::Error>,
}

/// Write `buf` at `offset`, extending the block chain as needed. Frees
/// any chain tail beyond the last block written. Never returns `Err`
/// directly — a failure partway through is reported via
/// [`WriteOutcome::error`] alongside however many bytes made it to disk.
pub fn write<DS: DataStorage>(
    store: &BackingStore<DS>,
    entry: &Entry,
    offset: u64,
    buf: &[u8],
) -> WriteOutcome {
    let block_size = store.block_size();
    let fat = FatAllocator::new(store);

    let skip = (offset / block_size) as usize;
    let mut inner = offset % block_size;
    let mut cur = match fat.walk_extending(entry.head() as usize, skip) {
        Ok(cur) => cur,
        Err(e) => return WriteOutcome { written: 0, new_size: entry.size(), error: Some(e) },
    };

    let total = buf.len();
    let mut written = 0usize;

    loop {
        if written >= total {
            break;
        }
        let room = (block_size - inner) as usize;
        let n = room.min(total - written);
        if let Err(e) = store.write_block_at(cur, inner, &buf[written..written + n]) {
            return finish(&fat, cur, offset, written, Some(e));
        }
        written += n;
        inner = 0;

        if written < total {
            let next = match store.read_fat(cur) {
                Ok(next) => next,
                Err(e) => return finish(&fat, cur, offset, written, Some(e)),
            };
            cur = if next == END {
                match fat.extend(cur) {
                    Ok(next) => next,
                    Err(e) => return finish(&fat, cur, offset, written, Some(e)),
                }
            } else {
                next as usize
            };
        }
    }

    finish(&fat, cur, offset, written, None)
}

fn finish<DS: DataStorage>(
    fat: &FatAllocator<'_, DS>,
    cur: usize,
    offset: u64,
    written: usize,
    error: Option<colafs_err::Error>,
) -> WriteOutcome {
    // best-effort: if even truncation fails, the size update below still
    // reflects what was actually written, which is the contract callers rely on.
    let _ = fat.truncate_after(cur);
    WriteOutcome { written, new_size: (offset + written as u64) as u32, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colafs_cola::Cola;
    use colafs_store::mem::MemDataStorage;

    fn store(block_size: u64) -> BackingStore<MemDataStorage> {
        let s = BackingStore::new(MemDataStorage::new(), block_size);
        s.init().unwrap();
        s
    }

    fn make_file<DS: DataStorage>(store: &BackingStore<DS>, name: &str) -> Entry {
        let fat = FatAllocator::new(store);
        let head = fat.allocate().unwrap();
        let entry = Entry::new_file(name, head as i32);
        Cola::new(store).insert(entry).unwrap();
        entry
    }

    #[test]
    fn write_then_read_round_trips_within_one_block() {
        let store = store(64);
        let entry = make_file(&store, "f");
        let out = write(&store, &entry, 0, b"hello");
        assert!(out.error.is_none());
        assert_eq!(out.written, 5);
        assert_eq!(out.new_size, 5);

        let mut entry = entry;
        entry.set_size(out.new_size);
        let mut buf = [0u8; 5];
        let read_n = read(&store, &entry, 0, &mut buf).unwrap();
        assert_eq!(read_n, 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn write_spanning_blocks_extends_the_chain() {
        let store = store(4);
        let entry = make_file(&store, "f");
        let data = b"abcdefghijkl"; // 12 bytes, 3 blocks of 4
        let out = write(&store, &entry, 0, data);
        assert!(out.error.is_none());
        assert_eq!(out.written, 12);
        assert_eq!(out.new_size, 12);

        let mut entry = entry;
        entry.set_size(out.new_size);
        let mut buf = [0u8; 12];
        read(&store, &entry, 0, &mut buf).unwrap();
        assert_eq!(&buf, data);
    }

    #[test]
    fn write_at_offset_past_end_extends_via_walk() {
        let store = store(4);
        let entry = make_file(&store, "f");
        let out = write(&store, &entry, 9, b"z");
        assert!(out.error.is_none());
        assert_eq!(out.written, 1);
        assert_eq!(out.new_size, 10);
    }

    #[test]
    fn write_ending_on_block_boundary_allocates_no_extra_block() {
        let store = store(4);
        let entry = make_file(&store, "f");
        let out = write(&store, &entry, 0, b"abcd");
        assert_eq!(out.written, 4);
        assert_eq!(store.read_fat(entry.head() as usize).unwrap(), END);
    }

    #[test]
    fn overwrite_near_start_frees_the_old_tail() {
        let store = store(4);
        let entry = make_file(&store, "f");
        let out = write(&store, &entry, 0, b"0123456789");
        let mut entry = entry;
        entry.set_size(out.new_size);

        let out2 = write(&store, &entry, 1, b"x");
        assert!(out2.error.is_none());
        assert_eq!(out2.written, 1);
        assert_eq!(out2.new_size, 2);

        let block1 = store.read_fat(entry.head() as usize).unwrap();
        assert_eq!(block1, END);
    }

    #[test]
    fn read_past_end_of_file_returns_zero() {
        let store = store(64);
        let entry = make_file(&store, "f");
        let out = write(&store, &entry, 0, b"hi");
        let mut entry = entry;
        entry.set_size(out.new_size);

        let mut buf = [0u8; 10];
        assert_eq!(read(&store, &entry, 2, &mut buf).unwrap(), 0);
        assert_eq!(read(&store, &entry, 100, &mut buf).unwrap(), 0);
    }

    #[test]
    fn write_that_exhausts_the_fat_still_commits_bytes_already_placed() {
        let store = store(4);
        let fat = FatAllocator::new(&store);
        // consume every block except the one the file starts with
        let head = fat.allocate().unwrap();
        loop {
            if fat.allocate().is_err() {
                break;
            }
        }
        let entry = Entry::new_file("f", head as i32);
        Cola::new(&store).insert(entry).unwrap();

        // one block's worth fits; the second block can't be allocated
        let out = write(&store, &entry, 0, b"abcdEFGH");
        assert!(out.error.is_some());
        assert_eq!(out.written, 4);
        assert_eq!(out.new_size, 4);
    }
}
