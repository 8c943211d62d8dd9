//! Modification ledger - per-file generation counters.
//!
//! The ledger is the single source of truth for cache validity: a cached
//! phase result is valid iff every file generation recorded in its stamp
//! still equals the ledger's current generation for that file.
//!
//! Counters are per file because edits are reported per file. Each counter
//! is an `AtomicU64`, so a reader racing a `bump` sees either the old or the
//! new value. The map itself is only write-locked to register a file for
//! the first time; bumps and reads take the read lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::stamp::DependencyStamp;
use crate::base::FileId;

/// Process-wide (per-session) generation counters keyed by file.
#[derive(Debug, Default)]
pub(crate) struct ModificationLedger {
    generations: RwLock<FxHashMap<FileId, Arc<AtomicU64>>>,
}

impl ModificationLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Increment the generation of `file` and return the new value.
    ///
    /// The first bump of an unknown file yields generation 1.
    pub(crate) fn bump(&self, file: FileId) -> u64 {
        if let Some(counter) = self.generations.read().get(&file) {
            return counter.fetch_add(1, Ordering::AcqRel) + 1;
        }
        let counter = {
            let mut generations = self.generations.write();
            Arc::clone(
                generations
                    .entry(file)
                    .or_insert_with(|| Arc::new(AtomicU64::new(0))),
            )
        };
        counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Current generation of `file`; 0 if the file has never been seen.
    pub(crate) fn generation_of(&self, file: FileId) -> u64 {
        self.generations
            .read()
            .get(&file)
            .map(|counter| counter.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Copy of every file's current generation.
    pub(crate) fn snapshot(&self) -> GenerationSnapshot {
        let generations = self.generations.read();
        GenerationSnapshot {
            generations: generations
                .iter()
                .map(|(&file, counter)| (file, counter.load(Ordering::Acquire)))
                .collect(),
        }
    }

    /// First file whose stamped generation no longer matches, if any.
    pub(crate) fn first_stale(&self, stamp: &DependencyStamp) -> Option<StaleFile> {
        stamp.files().find_map(|(file, stamped)| {
            let current = self.generation_of(file);
            (current != stamped).then_some(StaleFile {
                file,
                stamped,
                current,
            })
        })
    }

    /// Whether every generation in `stamp` is still current.
    pub(crate) fn is_current(&self, stamp: &DependencyStamp) -> bool {
        self.first_stale(stamp).is_none()
    }
}

/// A file whose generation moved past the one a result was computed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StaleFile {
    pub(crate) file: FileId,
    pub(crate) stamped: u64,
    pub(crate) current: u64,
}

/// Frozen view of the ledger taken at one instant.
///
/// Threaded explicitly through a diagnostics collection so the whole run is
/// checked against one set of generations instead of re-reading live ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct GenerationSnapshot {
    generations: FxHashMap<FileId, u64>,
}

impl GenerationSnapshot {
    /// Generation of `file` at snapshot time; 0 for files unknown then.
    pub(crate) fn generation_of(&self, file: FileId) -> u64 {
        self.generations.get(&file).copied().unwrap_or(0)
    }

    /// First file in `stamp` computed against a generation other than the snapshot's.
    pub(crate) fn first_mismatch(&self, stamp: &DependencyStamp) -> Option<StaleFile> {
        stamp.files().find_map(|(file, stamped)| {
            let pinned = self.generation_of(file);
            (pinned != stamped).then_some(StaleFile {
                file,
                stamped,
                current: pinned,
            })
        })
    }
}
