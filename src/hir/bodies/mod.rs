//! Phase bodies - the per-phase computations the runner schedules.
//!
//! The runner treats a body as opaque. It asks the body for its
//! prerequisites first, resolves them, and only then runs the body with the
//! resolved results in hand. Bodies read structure and look names up through
//! [`PhaseContext`], which records every file read into the result's stamp.

mod structural;

pub use structural::StructuralBodies;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::diagnostics::Diagnostic;
use super::ids::DeclId;
use super::node::DeclNode;
use super::output::{PhaseOutput, PhaseResult};
use super::phase::{Phase, PhaseSchedule};
use super::scope::{Lookup, ScopeIndex};
use super::stamp::StampBuilder;
use crate::base::FileId;
use crate::syntax::{DeclKind, StructuralDecl};

/// A (declaration, phase) pair a body needs before it can run.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Prerequisite {
    pub decl: DeclId,
    pub phase: Phase,
}

impl Prerequisite {
    pub fn new(decl: DeclId, phase: Phase) -> Self {
        Self { decl, phase }
    }
}

/// Output of one body execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyOutput {
    pub output: PhaseOutput,
    pub diagnostics: Vec<Diagnostic>,
}

/// Pluggable phase computations.
///
/// Implementations must be deterministic in what they read through the
/// context: the same trees and the same prerequisite results must produce
/// the same output.
pub trait PhaseBodies: Send + Sync {
    /// Prerequisites of `phase` for the context's declaration, at the
    /// minimum phase each one is needed at.
    ///
    /// Earlier phases of the declaration itself are always available and
    /// need not be listed.
    fn prerequisites(&self, cx: &mut PhaseContext<'_>, phase: Phase) -> Vec<Prerequisite>;

    /// Compute `phase`. Every listed prerequisite is in `inputs`.
    fn run(&self, cx: &mut PhaseContext<'_>, phase: Phase, inputs: &PhaseInputs) -> BodyOutput;
}

// ============================================================================
// CONTEXT
// ============================================================================

/// What a phase body may read.
pub struct PhaseContext<'a> {
    scope: ScopeIndex<'a>,
    node: Arc<DeclNode>,
    phase: Phase,
    stamp: &'a mut StampBuilder,
}

impl<'a> PhaseContext<'a> {
    pub(crate) fn new(
        scope: ScopeIndex<'a>,
        node: Arc<DeclNode>,
        phase: Phase,
        stamp: &'a mut StampBuilder,
    ) -> Self {
        Self {
            scope,
            node,
            phase,
            stamp,
        }
    }

    pub fn decl(&self) -> &DeclId {
        self.node.id()
    }

    pub fn node(&self) -> &DeclNode {
        &self.node
    }

    /// The structural declaration being resolved.
    pub fn structure(&self) -> &StructuralDecl {
        self.node.structure()
    }

    pub fn kind(&self) -> DeclKind {
        self.node.kind()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn file(&self) -> FileId {
        self.node.id().file
    }

    pub fn schedule(&self) -> &'a PhaseSchedule {
        self.scope.graph().schedule()
    }

    /// Members of the declaration, from its own tree.
    pub fn members(&self) -> Vec<DeclId> {
        let tree = self.node.tree();
        tree.children(self.node.index())
            .iter()
            .map(|&i| {
                DeclId::new(
                    self.node.id().module,
                    self.node.id().file,
                    tree.path(i).clone(),
                )
            })
            .collect()
    }

    /// Look `name` up from this declaration's scope.
    pub fn lookup(&mut self, name: &str) -> Lookup {
        let stamp = &mut *self.stamp;
        self.scope
            .lookup(self.node.id(), name, &mut |file, generation| {
                stamp.read_file(file, generation)
            })
    }

    pub fn kind_of(&mut self, decl: &DeclId) -> Option<DeclKind> {
        let stamp = &mut *self.stamp;
        self.scope
            .kind_of(decl, &mut |file, generation| stamp.read_file(file, generation))
    }

    /// Read structural facts of another declaration.
    pub fn structure_of<R>(
        &mut self,
        decl: &DeclId,
        f: impl FnOnce(&StructuralDecl) -> R,
    ) -> Option<R> {
        let stamp = &mut *self.stamp;
        self.scope.structure(
            decl,
            &mut |file, generation| stamp.read_file(file, generation),
            f,
        )
    }

    /// Whether `phase` may be requested for `decl` as a prerequisite.
    pub fn can_require(&mut self, decl: &DeclId, phase: Phase) -> bool {
        let Some(kind) = self.kind_of(decl) else {
            return false;
        };
        self.scope
            .graph()
            .reachable_cap(decl.module, kind)
            .is_some_and(|cap| phase <= cap && self.schedule().declares(kind, phase))
    }
}

// ============================================================================
// INPUTS
// ============================================================================

/// Resolved prerequisites (and earlier phases of the declaration itself).
#[derive(Clone, Debug, Default)]
pub struct PhaseInputs {
    results: FxHashMap<(DeclId, Phase), Arc<PhaseResult>>,
}

impl PhaseInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, result: Arc<PhaseResult>) {
        self.results
            .insert((result.decl.clone(), result.phase), result);
    }

    pub fn get(&self, decl: &DeclId, phase: Phase) -> Option<&PhaseResult> {
        self.results
            .get(&(decl.clone(), phase))
            .map(|result| result.as_ref())
    }

    /// The output if the prerequisite resolved (not cyclic).
    pub fn output(&self, decl: &DeclId, phase: Phase) -> Option<&PhaseOutput> {
        self.get(decl, phase)?.output()
    }

    pub fn is_cyclic(&self, decl: &DeclId, phase: Phase) -> bool {
        self.get(decl, phase).is_some_and(PhaseResult::is_cyclic)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
