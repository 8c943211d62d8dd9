//! Structure-element diagnostics collection.
//!
//! A collection run walks one structural unit in structural order, demands
//! full resolution of every declaration in it (up to the phase its module
//! exposes), then runs the registered checkers.
//!
//! The run takes a [`GenerationSnapshot`] when it starts and checks every
//! result it uses against that snapshot, and checks the ledger once more
//! before reporting. A result computed against any other generation, or a
//! bump of any file the run read, ends the run as
//! [`CollectionState::Aborted`]: the caller should retry the whole unit.
//! The unit's own tree is read together with its generation, so a tree
//! newer than the snapshot aborts the run before any result is used.
//! Diagnostics from different generations are never mixed in one report.

use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use super::diagnostics::{Diagnostic, DiagnosticSink};
use super::error::ResolveError;
use super::ids::DeclId;
use super::ledger::{GenerationSnapshot, StaleFile};
use super::output::{PhaseOutput, PhaseResult};
use super::phase::Phase;
use super::session::Session;
use crate::base::FileId;
use crate::syntax::{DeclKind, StructuralDecl};

// ============================================================================
// UNITS AND STATES
// ============================================================================

/// What a collection walks.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StructuralUnit {
    /// Every declaration of a file.
    File(FileId),
    /// A declaration and all of its members (e.g. one class body).
    Decl(DeclId),
}

impl StructuralUnit {
    pub fn file(&self) -> FileId {
        match self {
            StructuralUnit::File(file) => *file,
            StructuralUnit::Decl(decl) => decl.file,
        }
    }
}

/// A file whose generation moved while a collection was running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaleCollection {
    pub file: FileId,
    /// Generation in the snapshot taken when the run started.
    pub observed: u64,
    /// Generation found later (in a result's stamp or in the ledger).
    pub current: u64,
}

impl StaleCollection {
    fn from_mismatch(stale: StaleFile) -> Self {
        // `first_mismatch` reports the snapshot value as `current`.
        Self {
            file: stale.file,
            observed: stale.current,
            current: stale.stamped,
        }
    }
}

/// Lifecycle of one collection run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionState {
    NotStarted,
    InProgress,
    Completed,
    /// Not an error: retry the whole collection.
    Aborted(StaleCollection),
}

/// What a finished run reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CollectOutcome {
    Completed(Vec<Diagnostic>),
    Stale(StaleCollection),
}

impl CollectOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CollectOutcome::Completed(_))
    }

    pub fn diagnostics(&self) -> Option<&[Diagnostic]> {
        match self {
            CollectOutcome::Completed(diagnostics) => Some(diagnostics),
            CollectOutcome::Stale(_) => None,
        }
    }
}

// ============================================================================
// RESOLVED VIEWS HANDED TO CHECKERS
// ============================================================================

/// A declaration with every reachable phase resolved.
#[derive(Debug)]
pub struct ResolvedDecl<'a> {
    id: DeclId,
    structure: &'a StructuralDecl,
    results: Vec<Arc<PhaseResult>>,
}

impl<'a> ResolvedDecl<'a> {
    pub fn id(&self) -> &DeclId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.structure.name
    }

    pub fn kind(&self) -> DeclKind {
        self.structure.kind
    }

    pub fn structure(&self) -> &'a StructuralDecl {
        self.structure
    }

    /// Results in phase order.
    pub fn results(&self) -> &[Arc<PhaseResult>] {
        &self.results
    }

    pub fn result(&self, phase: Phase) -> Option<&PhaseResult> {
        self.results
            .iter()
            .find(|r| r.phase == phase)
            .map(|r| r.as_ref())
    }

    pub fn output(&self, phase: Phase) -> Option<&PhaseOutput> {
        self.result(phase)?.output()
    }

    /// The last phase resolved for this declaration.
    pub fn full_phase(&self) -> Option<Phase> {
        self.results.last().map(|r| r.phase)
    }

    /// First phase that ended in a cycle, if any.
    pub fn cyclic_phase(&self) -> Option<Phase> {
        self.results.iter().find(|r| r.is_cyclic()).map(|r| r.phase)
    }
}

/// Every resolved declaration of a unit, in structural order.
#[derive(Debug)]
pub struct ResolvedUnit<'a> {
    unit: &'a StructuralUnit,
    decls: Vec<ResolvedDecl<'a>>,
}

impl<'a> ResolvedUnit<'a> {
    pub fn unit(&self) -> &StructuralUnit {
        self.unit
    }

    pub fn decls(&self) -> &[ResolvedDecl<'a>] {
        &self.decls
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

// ============================================================================
// COLLECTION RUN
// ============================================================================

/// One `collect` call over one unit.
pub struct CollectionRun<'s> {
    session: &'s Session,
    unit: StructuralUnit,
    state: CollectionState,
}

impl<'s> CollectionRun<'s> {
    pub(crate) fn new(session: &'s Session, unit: StructuralUnit) -> Self {
        Self {
            session,
            unit,
            state: CollectionState::NotStarted,
        }
    }

    pub fn unit(&self) -> &StructuralUnit {
        &self.unit
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    /// Run the collection. Each call starts from a fresh snapshot.
    pub fn run(&mut self) -> Result<CollectOutcome, ResolveError> {
        self.state = CollectionState::InProgress;
        let result = self.execute();
        match &result {
            Ok(CollectOutcome::Completed(diagnostics)) => {
                self.state = CollectionState::Completed;
                self.session.counters.record_collection(true);
                tracing::info!(
                    unit = ?self.unit,
                    diagnostics = diagnostics.len(),
                    "collection completed"
                );
            }
            Ok(CollectOutcome::Stale(stale)) => {
                self.state = CollectionState::Aborted(*stale);
                self.session.counters.record_collection(false);
                tracing::warn!(
                    unit = ?self.unit,
                    file = %stale.file,
                    observed = stale.observed,
                    current = stale.current,
                    "collection aborted: file changed mid-run"
                );
            }
            Err(_) => self.state = CollectionState::NotStarted,
        }
        result
    }

    fn execute(&self) -> Result<CollectOutcome, ResolveError> {
        let session = self.session;
        let snapshot = session.ledger.snapshot();

        let file = self.unit.file();
        let (generation, entry) = session.sources.read(file);
        let entry = entry.ok_or(ResolveError::UnknownFile(file))?;
        let observed = snapshot.generation_of(file);
        if generation != observed {
            return Ok(CollectOutcome::Stale(StaleCollection {
                file,
                observed,
                current: generation,
            }));
        }
        let tree = entry.tree();
        let indices = match &self.unit {
            StructuralUnit::File(_) => 0..tree.len(),
            StructuralUnit::Decl(decl) => {
                let index = (decl.module == entry.module())
                    .then(|| tree.index_of(&decl.path))
                    .flatten()
                    .ok_or_else(|| ResolveError::UnknownDeclaration(decl.clone()))?;
                tree.subtree(index)
            }
        };

        let graph = &session.graph;
        let targets: Vec<(usize, DeclId, Phase)> = indices
            .filter_map(|index| {
                let kind = tree.decl(index).kind;
                let cap = graph.reachable_cap(entry.module(), kind)?;
                Some((index, entry.decl_id(index), cap))
            })
            .collect();

        if session.config.parallel_collect {
            targets
                .par_iter()
                .map(|(_, decl, cap)| session.resolve(decl, *cap).map(drop))
                .collect::<Result<Vec<()>, ResolveError>>()?;
        }

        let mut decls = Vec::with_capacity(targets.len());
        for (index, decl, _) in targets {
            let structure = tree.decl(index);
            let phases = graph.phases_for(decl.module, structure.kind);
            let mut results = Vec::new();
            for phase in phases.iter() {
                let result = session.resolve(&decl, phase)?;
                if let Some(stale) = snapshot.first_mismatch(&result.stamp) {
                    return Ok(CollectOutcome::Stale(StaleCollection::from_mismatch(stale)));
                }
                results.push(result);
            }
            decls.push(ResolvedDecl {
                id: decl,
                structure,
                results,
            });
        }

        let resolved = ResolvedUnit {
            unit: &self.unit,
            decls,
        };
        let diagnostics = self.check(&resolved);

        if let Some(stale) = self.final_check(&resolved, &snapshot) {
            return Ok(CollectOutcome::Stale(stale));
        }
        Ok(CollectOutcome::Completed(diagnostics))
    }

    fn check(&self, unit: &ResolvedUnit<'_>) -> Vec<Diagnostic> {
        let registry = self.session.checkers.read().clone();
        let mut sink = DiagnosticSink::new();

        for decl in unit.decls() {
            for result in decl.results() {
                sink.extend(result.diagnostics.iter().cloned());
            }
            if let Some(phase) = decl.cyclic_phase() {
                sink.cyclic_dependency(
                    decl.id().file,
                    decl.structure().range,
                    decl.id(),
                    &format!(
                        "'{}' depends on itself while resolving {}",
                        decl.name(),
                        phase
                    ),
                );
            }
            for checker in registry.checkers_for(decl.kind()) {
                checker.check(decl, &mut sink);
            }
        }

        for checker in registry.unit_checkers() {
            checker.check_unit(unit, &mut sink);
        }
        sink.finish()
    }

    /// Every file any result read must still be at its snapshot generation.
    fn final_check(
        &self,
        unit: &ResolvedUnit<'_>,
        snapshot: &GenerationSnapshot,
    ) -> Option<StaleCollection> {
        let mut seen: FxHashSet<FileId> = FxHashSet::default();
        let files = unit
            .decls()
            .iter()
            .flat_map(|decl| decl.results())
            .flat_map(|result| result.stamp.files());
        for (file, _) in files {
            if !seen.insert(file) {
                continue;
            }
            let observed = snapshot.generation_of(file);
            let current = self.session.ledger.generation_of(file);
            if observed != current {
                return Some(StaleCollection {
                    file,
                    observed,
                    current,
                });
            }
        }
        None
    }
}

impl std::fmt::Debug for CollectionRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionRun")
            .field("unit", &self.unit)
            .field("state", &self.state)
            .finish()
    }
}
