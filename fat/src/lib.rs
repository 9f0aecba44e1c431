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

//! The FAT allocator (§4.2): a flat array of `N` integers chaining data
//! blocks together. `FAT[b]` is `EMPTY` (free), `END` (last block of a
//! chain), or the index of the next block.

use colafs_err::{Error, FsError, Result};
use colafs_store::{BackingStore, DataStorage, CAPACITY, EMPTY, END};
use log::warn;

pub struct FatAllocator<'a, DS: DataStorage> {
    store: &'a BackingStore<DS>,
}

impl<'a, DS: DataStorage> FatAllocator<'a, DS> {
    pub fn new(store: &'a BackingStore<DS>) -> Self {
        FatAllocator { store }
    }

    /// Scan left to right for the first free block, mark it `END`, and
    /// return its index.
    pub fn allocate(&self) -> Result<usize> {
        for b in 0..CAPACITY {
            if self.store.read_fat(b)? == EMPTY {
                self.store.write_fat(b, END)?;
                return Ok(b);
            }
        }
        warn!("FAT exhausted: no free block among {CAPACITY} blocks");
        Err(Error::Fs(FsError::OutOfSpace))
    }

    /// `tail` must be the end of its chain (`FAT[tail] == END`). Allocate a
    /// new block, link `tail` to it, and return its index.
    pub fn extend(&self, tail: usize) -> Result<usize> {
        debug_assert_eq!(self.store.read_fat(tail)?, END);
        let next = self.allocate()?;
        self.store.write_fat(tail, next as i32)?;
        Ok(next)
    }

    /// Advance `k` blocks through the chain starting at `head`.
    pub fn walk(&self, head: usize, k: usize) -> Result<usize> {
        let mut cur = head;
        for _ in 0..k {
            let next = self.store.read_fat(cur)?;
            debug_assert!(next != EMPTY, "walked past end of chain");
            cur = next as usize;
        }
        Ok(cur)
    }

    /// Advance `k` blocks through the chain starting at `head`, allocating
    /// new blocks whenever the chain ends before `k` hops are reached.
    /// Used by `write`, which may seek past the file's current last block.
    pub fn walk_extending(&self, head: usize, k: usize) -> Result<usize> {
        let mut cur = head;
        for _ in 0..k {
            let next = self.store.read_fat(cur)?;
            cur = if next == END { self.extend(cur)? } else { next as usize };
        }
        Ok(cur)
    }

    /// Release every block strictly after `b` in the chain; `b` becomes
    /// the new (retained) tail.
    pub fn truncate_after(&self, b: usize) -> Result<()> {
        let mut cur = self.store.read_fat(b)?;
        while cur != EMPTY && cur != END {
            let next = self.store.read_fat(cur as usize)?;
            self.store.write_fat(cur as usize, EMPTY)?;
            cur = next;
        }
        self.store.write_fat(b, END)?;
        Ok(())
    }

    /// Release every block in the chain, including `head` itself. Not
    /// used by any operation in the current surface (there is no
    /// unlink/rmdir) but kept available for a future deletion path, per
    /// the allocator's listed responsibilities.
    pub fn free_chain(&self, head: usize) -> Result<()> {
        let mut cur = head as i32;
        while cur != EMPTY && cur != END {
            let next = self.store.read_fat(cur as usize)?;
            self.store.write_fat(cur as usize, EMPTY)?;
            cur = next;
        }
        Ok(())
    }
}
