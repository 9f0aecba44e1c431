//! The COLA index (§4.3): a cache-oblivious lookup array used as the
//! filesystem's name→(size, head) directory.
//!
//! Runs are indexed `0..LEVELS`; run `i` occupies slots
//! `[2^i - 1, 2^{i+1} - 1)` and is either entirely empty or entirely
//! populated and sorted ascending by name. Lookup probes every populated
//! run; insert cascades a merge of runs `0..i` plus the new entry into
//! the first empty run `i`.

use colafs_err::{Error, FsError, Result};
use colafs_store::{BackingStore, DataStorage, Entry, LEVELS};
use log::warn;

pub struct Cola<'a, DS: DataStorage> {
    store: &'a BackingStore<DS>,
}

fn run_first(level: u32) -> usize {
    (1usize << level) - 1
}

fn run_capacity(level: u32) -> usize {
    1usize << level
}

impl<'a, DS: DataStorage> Cola<'a, DS> {
    pub fn new(store: &'a BackingStore<DS>) -> Self {
        Cola { store }
    }

    fn is_run_populated(&self, level: u32) -> Result<bool> {
        Ok(!self.store.read_entry(run_first(level))?.is_empty_slot())
    }

    /// Binary search within one populated, sorted run for `name`.
    fn binary_search_run(&self, level: u32, name: &str) -> Result<Option<usize>> {
        let first = run_first(level);
        let mut lo = 0i64;
        let mut hi = run_capacity(level) as i64 - 1;
        while lo <= hi {
            let mid = (lo + hi) / 2;
            let entry = self.store.read_entry(first + mid as usize)?;
            match entry.name().cmp(name) {
                std::cmp::Ordering::Equal => return Ok(Some(first + mid as usize)),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid - 1,
            }
        }
        Ok(None)
    }

    /// Look up `name`; returns the slot index of the matching entry, if any.
    pub fn find(&self, name: &str) -> Result<Option<usize>> {
        for level in 0..LEVELS {
            if self.is_run_populated(level)? {
                if let Some(idx) = self.binary_search_run(level, name)? {
                    return Ok(Some(idx));
                }
            }
        }
        Ok(None)
    }

    /// Insert `entry`. Callers must have already checked `find` for
    /// absence — like the source, this does not re-check for a duplicate
    /// name (see spec §4.3.3).
    pub fn insert(&self, entry: Entry) -> Result<()> {
        let mut level = 0;
        while level < LEVELS {
            if !self.is_run_populated(level)? {
                break;
            }
            level += 1;
        }
        if level == LEVELS {
            warn!("COLA exhausted: every one of {LEVELS} runs is populated");
            return Err(Error::Fs(FsError::OutOfSpace));
        }

        if level == 0 {
            self.store.write_entry(0, &entry)?;
            return Ok(());
        }

        self.merge(level, entry)
    }

    /// k-way merge of runs `0..target` plus the singleton `new_entry`
    /// into run `target`, then clear the source runs.
    fn merge(&self, target: u32, new_entry: Entry) -> Result<()> {
        let mut heads: Vec<Option<usize>> = (0..target).map(|j| Some(run_first(j))).collect();
        let run_ends: Vec<usize> = (0..target).map(|j| run_first(j) + run_capacity(j)).collect();
        let mut new_inserted = false;

        let dst_first = run_first(target);
        let dst_len = run_capacity(target);

        for done in 0..dst_len {
            let min = self.find_min(&mut heads, &run_ends, &new_entry, &mut new_inserted)?;
            self.store.write_entry(dst_first + done, &min)?;
        }

        for j in 0..target {
            let empty = Entry::empty();
            for idx in run_first(j)..run_first(j) + run_capacity(j) {
                self.store.write_entry(idx, &empty)?;
            }
        }

        Ok(())
    }

    fn find_min(
        &self,
        heads: &mut [Option<usize>],
        run_ends: &[usize],
        new_entry: &Entry,
        new_inserted: &mut bool,
    ) -> Result<Entry> {
        let mut best: Option<(usize, Entry)> = None;
        for (j, head) in heads.iter().enumerate() {
            if let Some(idx) = head {
                let candidate = self.store.read_entry(*idx)?;
                let better = match &best {
                    None => true,
                    Some((_, cur)) => candidate.name() < cur.name(),
                };
                if better {
                    best = Some((j, candidate));
                }
            }
        }

        let run_is_min = match &best {
            None => false,
            Some((_, run_entry)) => *new_inserted || new_entry.name() > run_entry.name(),
        };

        if !run_is_min {
            *new_inserted = true;
            return Ok(*new_entry);
        }

        let (j, entry) = best.expect("run_is_min implies a populated run exists");
        let next = heads[j].unwrap() + 1;
        heads[j] = if next == run_ends[j] { None } else { Some(next) };
        Ok(entry)
    }

    /// Every populated entry across all runs, in no particular order —
    /// used by directory listing.
    pub fn entries(&self) -> Result<Vec<Entry>> {
        let mut out = Vec::new();
        for level in 0..LEVELS {
            if self.is_run_populated(level)? {
                let first = run_first(level);
                for idx in first..first + run_capacity(level) {
                    out.push(self.store.read_entry(idx)?);
                }
            }
        }
        Ok(out)
    }
}
