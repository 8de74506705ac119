//! A consumable path -> file lookup for one build.
//!
//! Each installed path maps to at most one live file.  Looking a path up as
//! a match target consumes the entry, which is what guarantees that a file
//! ends up as the peer of at most one file from the other build.

// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::files::PackageFileSet;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Live(usize),
    Consumed(usize),
}

/// Index from `localpath` to a position in a [`PackageFileSet`].  Holds
/// positions only; the set keeps ownership of the records.
#[derive(Debug, Default)]
pub struct PathIndex {
    slots: HashMap<String, Slot>,
    duplicates: Vec<usize>,
}

impl PathIndex {
    /// Index every file of `files`.  A repeated localpath keeps its first
    /// occurrence; later ones are logged and left out of the index.
    pub fn build(files: &PackageFileSet) -> Self {
        let mut idx = PathIndex {
            slots: HashMap::with_capacity(files.len()),
            duplicates: Vec::new(),
        };
        for (i, f) in files.iter().enumerate() {
            match idx.slots.entry(f.localpath.clone()) {
                Entry::Vacant(e) => {
                    e.insert(Slot::Live(i));
                }
                Entry::Occupied(_) => {
                    tracing::warn!(
                        "duplicate file {} in {}, ignoring",
                        f.localpath,
                        f.header
                    );
                    idx.duplicates.push(i);
                }
            }
        }
        idx
    }

    /// Return the live file at `path`, marking it consumed.
    pub fn lookup_and_consume(&mut self, path: &str) -> Option<usize> {
        match self.slots.get_mut(path) {
            Some(slot) => match *slot {
                Slot::Live(i) => {
                    *slot = Slot::Consumed(i);
                    Some(i)
                }
                Slot::Consumed(_) => None,
            },
            None => None,
        }
    }

    /// Consume a specific entry found by scanning rather than by path.
    /// Returns false if `idx` is not the live entry for `path`.
    pub fn consume(&mut self, path: &str, idx: usize) -> bool {
        match self.slots.get_mut(path) {
            Some(slot) if *slot == Slot::Live(idx) => {
                *slot = Slot::Consumed(idx);
                true
            }
            _ => false,
        }
    }

    /// Whether some file of the indexed build has this localpath.
    pub fn contains(&self, path: &str) -> bool {
        self.slots.contains_key(path)
    }

    /// Whether `idx` is still available as a match target.
    pub fn is_live(&self, path: &str, idx: usize) -> bool {
        self.slots.get(path) == Some(&Slot::Live(idx))
    }

    /// Positions of files not yet consumed, in set order.
    pub fn remaining(&self) -> impl Iterator<Item = usize> {
        let mut r: Vec<usize> = self
            .slots
            .values()
            .filter_map(|s| match s {
                Slot::Live(i) => Some(*i),
                Slot::Consumed(_) => None,
            })
            .collect();
        r.sort_unstable();
        r.into_iter()
    }

    /// Positions of files skipped because their path was already indexed.
    pub fn duplicates(&self) -> &[usize] {
        &self.duplicates
    }

    /// Number of entries still live.
    pub fn live_count(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, Slot::Live(_)))
            .count()
    }

    pub fn is_exhausted(&self) -> bool {
        self.live_count() == 0
    }
}
