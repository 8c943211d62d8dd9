//! Phase bodies that count executions per (declaration, phase).

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use strata::hir::{
    BodyOutput, DeclId, Phase, PhaseBodies, PhaseContext, PhaseInputs, Prerequisite,
    StructuralBodies,
};

/// Wraps [`StructuralBodies`], recording every `run`.
#[derive(Clone, Default)]
pub struct CountingBodies {
    runs: Arc<Mutex<FxHashMap<(DeclId, Phase), usize>>>,
}

impl CountingBodies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self, decl: &DeclId, phase: Phase) -> usize {
        self.runs
            .lock()
            .get(&(decl.clone(), phase))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.runs.lock().values().sum()
    }

    /// Keys that ran more than once.
    pub fn repeated(&self) -> Vec<(DeclId, Phase)> {
        self.runs
            .lock()
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl PhaseBodies for CountingBodies {
    fn prerequisites(&self, cx: &mut PhaseContext<'_>, phase: Phase) -> Vec<Prerequisite> {
        StructuralBodies.prerequisites(cx, phase)
    }

    fn run(&self, cx: &mut PhaseContext<'_>, phase: Phase, inputs: &PhaseInputs) -> BodyOutput {
        *self
            .runs
            .lock()
            .entry((cx.decl().clone(), phase))
            .or_insert(0) += 1;
        StructuralBodies.run(cx, phase, inputs)
    }
}
