//! Dependency stamps.
//!
//! A stamp records what a phase result was computed from:
//!
//! - `files`: every file whose structure was read, directly or through a
//!   prerequisite, with the generation observed at read time. Validity is
//!   decided on these alone.
//! - `reads`: every (declaration, phase) prerequisite the computation used,
//!   transitively, with the generation of that declaration's file.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::ids::DeclId;
use super::phase::Phase;
use crate::base::FileId;

/// One prerequisite read by a phase computation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StampRead {
    pub decl: DeclId,
    pub phase: Phase,
    /// Generation of `decl.file` the prerequisite was computed against.
    pub generation: u64,
}

/// Immutable record of the inputs of one phase result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyStamp {
    /// Sorted by file.
    files: Box<[(FileId, u64)]>,
    reads: Box<[StampRead]>,
}

impl DependencyStamp {
    /// `(file, generation)` pairs in file order.
    pub fn files(&self) -> impl Iterator<Item = (FileId, u64)> + '_ {
        self.files.iter().copied()
    }

    pub fn generation_of(&self, file: FileId) -> Option<u64> {
        self.files
            .binary_search_by_key(&file, |&(f, _)| f)
            .ok()
            .map(|i| self.files[i].1)
    }

    /// Whether the stamp depends on `file` at any generation.
    pub fn references(&self, file: FileId) -> bool {
        self.generation_of(file).is_some()
    }

    pub fn reads(&self) -> &[StampRead] {
        &self.reads
    }

    pub fn read_of(&self, decl: &DeclId, phase: Phase) -> Option<&StampRead> {
        self.reads
            .iter()
            .find(|read| read.phase == phase && &read.decl == decl)
    }

    /// Whether `decl` at `phase` was read against `generation`.
    pub fn contains(&self, decl: &DeclId, phase: Phase, generation: u64) -> bool {
        self.read_of(decl, phase)
            .is_some_and(|read| read.generation == generation)
    }
}

/// Accumulates reads while a phase computes.
#[derive(Debug, Default)]
pub(crate) struct StampBuilder {
    files: FxHashMap<FileId, u64>,
    reads: IndexMap<(DeclId, Phase), u64>,
}

impl StampBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record that structure of `file` was read at `generation`.
    ///
    /// If the same file is observed at two generations during one
    /// computation (an edit landed mid-flight), the older one is kept so the
    /// result is recognised as stale.
    pub(crate) fn read_file(&mut self, file: FileId, generation: u64) {
        self.files
            .entry(file)
            .and_modify(|g| *g = (*g).min(generation))
            .or_insert(generation);
    }

    /// Record a prerequisite result and everything it was computed from.
    pub(crate) fn read_prerequisite(&mut self, decl: &DeclId, phase: Phase, stamp: &DependencyStamp) {
        let generation = stamp.generation_of(decl.file).unwrap_or(0);
        self.reads
            .entry((decl.clone(), phase))
            .or_insert(generation);
        for read in stamp.reads() {
            self.reads
                .entry((read.decl.clone(), read.phase))
                .or_insert(read.generation);
        }
        for (file, generation) in stamp.files() {
            self.read_file(file, generation);
        }
    }

    pub(crate) fn finish(self) -> DependencyStamp {
        let mut files: Vec<(FileId, u64)> = self.files.into_iter().collect();
        files.sort_unstable_by_key(|&(f, _)| f);
        let reads = self
            .reads
            .into_iter()
            .map(|((decl, phase), generation)| StampRead {
                decl,
                phase,
                generation,
            })
            .collect();
        DependencyStamp {
            files: files.into_boxed_slice(),
            reads,
        }
    }
}
