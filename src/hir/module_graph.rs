//! Module graph - compilation modules and their dependency edges.
//!
//! The graph is built once per session and never mutated afterwards. It
//! answers two questions for the phase runner:
//!
//! - which modules a declaration can see (itself, then its dependencies,
//!   nearest first), and
//! - which phases of a declaration are reachable. Library modules expose
//!   only signature-level phases; their bodies are never resolved.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use super::error::ModuleGraphError;
use super::phase::{Phase, PhaseSchedule, PhaseSet};
use crate::base::{ModuleId, Name};
use crate::syntax::DeclKind;

/// Where a module's declarations come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModuleOrigin {
    /// Edited source; every phase is reachable.
    Source,
    /// Read-only declarations from a compiled library; capped at the
    /// signature boundary of each kind.
    Library,
}

#[derive(Clone, Debug)]
struct ModuleData {
    name: Name,
    origin: ModuleOrigin,
    dependencies: Vec<ModuleId>,
    /// This module first, then transitive dependencies breadth-first.
    visible: Vec<ModuleId>,
}

// ============================================================================
// BUILDER
// ============================================================================

/// Collects modules and edges, then validates them into a [`ModuleGraph`].
#[derive(Clone, Debug, Default)]
pub struct ModuleGraphBuilder {
    modules: IndexMap<ModuleId, ModuleData>,
    schedule: PhaseSchedule,
}

impl ModuleGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module. Names must be unique.
    pub fn add_module(
        &mut self,
        name: impl Into<Name>,
        origin: ModuleOrigin,
    ) -> Result<ModuleId, ModuleGraphError> {
        let name = name.into();
        if self.modules.values().any(|m| m.name == name) {
            return Err(ModuleGraphError::DuplicateModule(name));
        }
        let id = ModuleId::new(self.modules.len() as u32);
        self.modules.insert(
            id,
            ModuleData {
                name,
                origin,
                dependencies: Vec::new(),
                visible: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Record that `from` depends on `to`.
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId) -> Result<(), ModuleGraphError> {
        if !self.modules.contains_key(&to) {
            return Err(ModuleGraphError::UnknownModule(to));
        }
        let module = self
            .modules
            .get_mut(&from)
            .ok_or(ModuleGraphError::UnknownModule(from))?;
        if !module.dependencies.contains(&to) {
            module.dependencies.push(to);
        }
        Ok(())
    }

    /// Use a custom phase schedule instead of [`PhaseSchedule::standard`].
    pub fn with_schedule(mut self, schedule: PhaseSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Validate the graph. Dependency cycles are rejected here.
    pub fn build(mut self) -> Result<ModuleGraph, ModuleGraphError> {
        if let Some(path) = self.find_cycle() {
            return Err(ModuleGraphError::Cycle { path });
        }

        let ids: Vec<ModuleId> = self.modules.keys().copied().collect();
        for id in ids {
            let visible = self.visible_from(id);
            if let Some(module) = self.modules.get_mut(&id) {
                module.visible = visible;
            }
        }

        Ok(ModuleGraph {
            modules: self.modules,
            schedule: self.schedule,
        })
    }

    fn visible_from(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut visible = vec![start];
        let mut seen: FxHashSet<ModuleId> = FxHashSet::default();
        seen.insert(start);
        let mut cursor = 0;
        while cursor < visible.len() {
            let current = visible[cursor];
            cursor += 1;
            if let Some(module) = self.modules.get(&current) {
                for &dep in &module.dependencies {
                    if seen.insert(dep) {
                        visible.push(dep);
                    }
                }
            }
        }
        visible
    }

    /// Depth-first search for a back edge; returns the cycle as module names.
    fn find_cycle(&self) -> Option<Vec<Name>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        fn visit(
            builder: &ModuleGraphBuilder,
            id: ModuleId,
            marks: &mut IndexMap<ModuleId, Mark>,
            stack: &mut Vec<ModuleId>,
        ) -> Option<Vec<ModuleId>> {
            marks.insert(id, Mark::OnStack);
            stack.push(id);
            let deps = builder
                .modules
                .get(&id)
                .map(|m| m.dependencies.as_slice())
                .unwrap_or_default();
            for &dep in deps {
                match marks.get(&dep).copied().unwrap_or(Mark::Unvisited) {
                    Mark::OnStack => {
                        let start = stack.iter().position(|&m| m == dep).unwrap_or(0);
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(dep);
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        if let Some(cycle) = visit(builder, dep, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Done => {}
                }
            }
            stack.pop();
            marks.insert(id, Mark::Done);
            None
        }

        let mut marks: IndexMap<ModuleId, Mark> = IndexMap::new();
        for &id in self.modules.keys() {
            if marks.get(&id).copied().unwrap_or(Mark::Unvisited) == Mark::Unvisited {
                let mut stack = Vec::new();
                if let Some(cycle) = visit(self, id, &mut marks, &mut stack) {
                    return Some(
                        cycle
                            .into_iter()
                            .filter_map(|m| self.modules.get(&m).map(|d| d.name.clone()))
                            .collect(),
                    );
                }
            }
        }
        None
    }
}

// ============================================================================
// GRAPH
// ============================================================================

/// The validated, immutable module graph of a session.
#[derive(Clone, Debug)]
pub struct ModuleGraph {
    modules: IndexMap<ModuleId, ModuleData>,
    schedule: PhaseSchedule,
}

impl ModuleGraph {
    pub fn builder() -> ModuleGraphBuilder {
        ModuleGraphBuilder::new()
    }

    /// A graph with a single source module named `name`.
    pub fn single(name: impl Into<Name>) -> (Self, ModuleId) {
        let id = ModuleId::new(0);
        let mut modules = IndexMap::new();
        modules.insert(
            id,
            ModuleData {
                name: name.into(),
                origin: ModuleOrigin::Source,
                dependencies: Vec::new(),
                visible: vec![id],
            },
        );
        let graph = Self {
            modules,
            schedule: PhaseSchedule::standard(),
        };
        (graph, id)
    }

    pub fn schedule(&self) -> &PhaseSchedule {
        &self.schedule
    }

    pub fn contains(&self, module: ModuleId) -> bool {
        self.modules.contains_key(&module)
    }

    pub fn modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn name(&self, module: ModuleId) -> Option<&Name> {
        self.modules.get(&module).map(|m| &m.name)
    }

    pub fn by_name(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .find(|(_, m)| m.name == name)
            .map(|(&id, _)| id)
    }

    pub fn origin(&self, module: ModuleId) -> Option<ModuleOrigin> {
        self.modules.get(&module).map(|m| m.origin)
    }

    /// Direct dependencies of `module`.
    pub fn dependencies(&self, module: ModuleId) -> &[ModuleId] {
        self.modules
            .get(&module)
            .map(|m| m.dependencies.as_slice())
            .unwrap_or_default()
    }

    /// Modules whose declarations `module` can see: itself first, then its
    /// transitive dependencies, nearest first.
    pub fn visible_from(&self, module: ModuleId) -> &[ModuleId] {
        self.modules
            .get(&module)
            .map(|m| m.visible.as_slice())
            .unwrap_or_default()
    }

    pub fn is_visible(&self, from: ModuleId, to: ModuleId) -> bool {
        self.visible_from(from).contains(&to)
    }

    /// Modules that can see `module` (including itself).
    pub fn observers_of(&self, module: ModuleId) -> Vec<ModuleId> {
        self.modules
            .iter()
            .filter(|(_, m)| m.visible.contains(&module))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Highest reachable phase for a declaration of `kind` in `module`.
    pub fn reachable_cap(&self, module: ModuleId, kind: DeclKind) -> Option<Phase> {
        match self.origin(module)? {
            ModuleOrigin::Source => self.schedule.full_phase(kind),
            ModuleOrigin::Library => self.schedule.signature_boundary(kind),
        }
    }

    /// The ordered phases a declaration of `kind` in `module` passes through.
    pub fn phases_for(&self, module: ModuleId, kind: DeclKind) -> PhaseSet {
        let Some(cap) = self.reachable_cap(module, kind) else {
            return PhaseSet::empty();
        };
        self.schedule
            .phases(kind)
            .iter()
            .filter(|&p| p <= cap)
            .collect()
    }
}
