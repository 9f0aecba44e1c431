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

//! File-backed [`DataStorage`], mirroring `hyrax_ds_std`: a single open
//! `File`, accessed with `pread`/`pwrite` (`FileExt`) instead of mapping
//! and unmapping a region per field access.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use colafs_err::Result;
use log::info;

use crate::{BackingStore, DataStorage};

pub struct StdDataStorage {
    file: File,
}

impl StdDataStorage {
    pub fn open(file: File) -> Self {
        StdDataStorage { file }
    }

    pub fn set_len(&self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }
}

impl DataStorage for StdDataStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(buffer, offset)?;
        Ok(())
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        self.file.write_all_at(buffer, offset)?;
        Ok(())
    }
}

/// Open the backing file at `path`, creating and initialising it (zeroed
/// COLA, zeroed FAT) if it does not yet exist, per spec §6.3.
pub fn open_or_create(path: &Path, block_size: u64) -> Result<BackingStore<StdDataStorage>> {
    let is_new = !path.exists();

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

    let storage = StdDataStorage::open(file);
    let store = BackingStore::new(storage, block_size);

    if is_new {
        info!("initialising new backing file at {}", path.display());
        let total_size = store.total_size();
        store.data_storage().set_len(total_size)?;
        store.init()?;
    }

    Ok(store)
}
