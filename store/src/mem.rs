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

//! An in-memory [`DataStorage`] used by the unit tests across the
//! `colafs_*` crates. Grows on write, reads past the end as zero —
//! just enough of a fake to exercise COLA/FAT/file-engine logic without
//! a real backing file.

use std::sync::Mutex;

use colafs_err::Result;

use crate::DataStorage;

pub struct MemDataStorage {
    bytes: Mutex<Vec<u8>>,
}

impl MemDataStorage {
    pub fn new() -> Self {
        MemDataStorage {
            bytes: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MemDataStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStorage for MemDataStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        let bytes = self.bytes.lock().unwrap();
        let start = offset as usize;
        buffer.fill(0);
        if start >= bytes.len() {
            return Ok(());
        }
        let end = (start + buffer.len()).min(bytes.len());
        buffer[..end - start].copy_from_slice(&bytes[start..end]);
        Ok(())
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        let mut bytes = self.bytes.lock().unwrap();
        let start = offset as usize;
        let end = start + buffer.len();
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(buffer);
        Ok(())
    }
}
