//! Session - one independent analysis window.
//!
//! A [`Session`] owns the module graph, the modification ledger, the
//! resolution cache, the open files and the in-flight table. Nothing is
//! shared between sessions; dropping (or [`close`](Session::close)-ing) a
//! session tears all of it down together.
//!
//! `Session` is `Sync`: any number of threads may call
//! [`resolve`](Session::resolve) and [`collect`](Session::collect)
//! concurrently with each other and with edits. Edits are serialized
//! against each other.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::bodies::{PhaseBodies, StructuralBodies};
use super::cache::{CacheKey, ResolutionCache};
use super::collect::{CollectOutcome, CollectionRun, StructuralUnit};
use super::config::SessionConfig;
use super::diagnostics::{Checker, CheckerRegistry, UnitChecker};
use super::error::{ResolveError, SessionError};
use super::flight::InFlight;
use super::ids::DeclId;
use super::ledger::ModificationLedger;
use super::module_graph::ModuleGraph;
use super::output::PhaseResult;
use super::phase::{Phase, PhaseSet};
use super::runner::PhaseRunner;
use super::source::SourceStore;
use crate::base::{FileId, ModuleId};
use crate::syntax::{DeclKind, DeclPath, SyntaxTree};

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    body_executions: AtomicU64,
    cycles: AtomicU64,
    collections: AtomicU64,
    aborted_collections: AtomicU64,
}

impl SessionCounters {
    pub(crate) fn record_body_execution(&self) {
        self.body_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_collection(&self, completed: bool) {
        if completed {
            self.collections.fetch_add(1, Ordering::Relaxed);
        } else {
            self.aborted_collections.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Snapshot of a session's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Lookups that found an entry computed against an old generation.
    pub stale_hits: u64,
    pub evictions: u64,
    pub cached_entries: usize,
    pub body_executions: u64,
    /// Results stored as cyclic.
    pub cycles: u64,
    pub collections: u64,
    pub aborted_collections: u64,
    pub open_files: usize,
}

// ============================================================================
// BUILDER
// ============================================================================

/// Configures and creates a [`Session`].
pub struct SessionBuilder {
    graph: ModuleGraph,
    config: SessionConfig,
    bodies: Arc<dyn PhaseBodies>,
    checkers: CheckerRegistry,
}

impl SessionBuilder {
    pub fn new(graph: ModuleGraph) -> Self {
        Self {
            graph,
            config: SessionConfig::default(),
            bodies: Arc::new(StructuralBodies),
            checkers: CheckerRegistry::with_builtin_checks(),
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default [`StructuralBodies`].
    pub fn bodies(mut self, bodies: impl PhaseBodies + 'static) -> Self {
        self.bodies = Arc::new(bodies);
        self
    }

    /// Replace the checker registry (the default has the built-in checks).
    pub fn checkers(mut self, checkers: CheckerRegistry) -> Self {
        self.checkers = checkers;
        self
    }

    pub fn build(self) -> Session {
        let ledger = Arc::new(ModificationLedger::new());
        let session = Session {
            id: Uuid::new_v4(),
            graph: self.graph,
            cache: ResolutionCache::new(Arc::clone(&ledger)),
            sources: SourceStore::new(Arc::clone(&ledger)),
            ledger,
            flights: InFlight::new(),
            bodies: self.bodies,
            checkers: RwLock::new(self.checkers),
            config: self.config,
            counters: SessionCounters::default(),
            invocations: AtomicU64::new(0),
            edits: Mutex::new(()),
        };
        tracing::info!(
            session = %session.id,
            modules = session.graph.len(),
            "session created"
        );
        session
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session {
    id: Uuid,
    pub(crate) graph: ModuleGraph,
    pub(crate) ledger: Arc<ModificationLedger>,
    pub(crate) cache: ResolutionCache,
    pub(crate) sources: SourceStore,
    pub(crate) flights: InFlight,
    pub(crate) bodies: Arc<dyn PhaseBodies>,
    pub(crate) checkers: RwLock<CheckerRegistry>,
    pub(crate) config: SessionConfig,
    pub(crate) counters: SessionCounters,
    invocations: AtomicU64,
    edits: Mutex<()>,
}

impl Session {
    /// A session with default configuration, bodies and checks.
    pub fn new(graph: ModuleGraph) -> Self {
        SessionBuilder::new(graph).build()
    }

    pub fn builder(graph: ModuleGraph) -> SessionBuilder {
        SessionBuilder::new(graph)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn generation_of(&self, file: FileId) -> u64 {
        self.ledger.generation_of(file)
    }

    // ------------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------------

    /// Register `file` in `module`. Returns the file's new generation.
    ///
    /// A new file can shadow or collide with names other files look up, so
    /// every open file of every module that can see `module` is bumped too.
    pub fn open_file(
        &self,
        module: ModuleId,
        file: FileId,
        tree: SyntaxTree,
    ) -> Result<u64, SessionError> {
        if !self.graph.contains(module) {
            return Err(SessionError::UnknownModule(module));
        }
        let _edit = self.edits.lock();
        let generation = self.sources.insert(module, file, tree)?;
        self.bump_observers(module, file);
        tracing::debug!(%file, %module, generation, "file opened");
        Ok(generation)
    }

    /// The edit notification: replace the tree of `file` and bump it in one
    /// step, so no reader pairs the new tree with the old generation.
    pub fn file_changed(&self, file: FileId, tree: SyntaxTree) -> Result<u64, SessionError> {
        let _edit = self.edits.lock();
        let generation = self.sources.replace(file, tree)?;
        tracing::debug!(%file, generation, "file changed");
        Ok(generation)
    }

    /// Bump `file` without changing its tree.
    pub fn touch_file(&self, file: FileId) -> Result<u64, SessionError> {
        let _edit = self.edits.lock();
        if !self.sources.contains(file) {
            return Err(SessionError::UnknownFile(file));
        }
        Ok(self.cache.invalidate(file))
    }

    /// Drop `file` from the session.
    pub fn close_file(&self, file: FileId) -> Result<(), SessionError> {
        let _edit = self.edits.lock();
        let (entry, generation) = self.sources.remove(file)?;
        self.bump_observers(entry.module(), file);
        tracing::debug!(%file, generation, "file closed");
        Ok(())
    }

    fn bump_observers(&self, module: ModuleId, except: FileId) {
        for observer in self.graph.observers_of(module) {
            for other in self.sources.files_in(observer) {
                if other != except {
                    self.ledger.bump(other);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Addressing
    // ------------------------------------------------------------------------

    pub fn is_open(&self, file: FileId) -> bool {
        self.sources.contains(file)
    }

    pub fn module_of(&self, file: FileId) -> Option<ModuleId> {
        self.sources.file(file).map(|entry| entry.module())
    }

    /// Identity of the declaration at `path` in the current tree of `file`.
    pub fn decl_id(&self, file: FileId, path: DeclPath) -> Option<DeclId> {
        let entry = self.sources.file(file)?;
        entry.tree().index_of(&path)?;
        Some(DeclId::new(entry.module(), file, path))
    }

    /// Find a declaration by qualified name from the file root (`Outer::inner`).
    pub fn find_decl(&self, file: FileId, qualified: &str) -> Option<DeclId> {
        let entry = self.sources.file(file)?;
        let index = entry.tree().find(qualified)?;
        Some(entry.decl_id(index))
    }

    /// Every declaration of `file` in structural order.
    pub fn decls_in(&self, file: FileId) -> Vec<DeclId> {
        self.sources
            .file(file)
            .map(|entry| (0..entry.tree().len()).map(|i| entry.decl_id(i)).collect())
            .unwrap_or_default()
    }

    pub fn kind_of(&self, decl: &DeclId) -> Option<DeclKind> {
        self.sources.node(decl).map(|node| node.kind())
    }

    // ------------------------------------------------------------------------
    // Client entry points
    // ------------------------------------------------------------------------

    /// Resolve `decl` to `phase`, resolving every earlier phase first.
    pub fn resolve(&self, decl: &DeclId, phase: Phase) -> Result<Arc<PhaseResult>, ResolveError> {
        let invocation = self.invocations.fetch_add(1, Ordering::Relaxed) + 1;
        PhaseRunner::new(self).resolve(invocation, decl, phase)
    }

    /// Resolve `decl` to the last phase its module exposes.
    pub fn resolve_full(&self, decl: &DeclId) -> Result<Arc<PhaseResult>, ResolveError> {
        let kind = self
            .kind_of(decl)
            .ok_or_else(|| ResolveError::UnknownDeclaration(decl.clone()))?;
        let phase = self
            .graph
            .reachable_cap(decl.module, kind)
            .ok_or_else(|| ResolveError::UnknownDeclaration(decl.clone()))?;
        self.resolve(decl, phase)
    }

    /// Collect diagnostics for a unit against one generation snapshot.
    pub fn collect(&self, unit: StructuralUnit) -> Result<CollectOutcome, ResolveError> {
        self.begin_collect(unit).run()
    }

    /// A collection run whose state can be inspected after it finishes.
    pub fn begin_collect(&self, unit: StructuralUnit) -> CollectionRun<'_> {
        CollectionRun::new(self, unit)
    }

    // ------------------------------------------------------------------------
    // Checkers
    // ------------------------------------------------------------------------

    pub fn register_checker(&self, kind: DeclKind, checker: impl Checker + 'static) {
        self.checkers.write().register(kind, checker);
    }

    pub fn register_unit_checker(&self, checker: impl UnitChecker + 'static) {
        self.checkers.write().register_unit(checker);
    }

    // ------------------------------------------------------------------------
    // Introspection and memory pressure
    // ------------------------------------------------------------------------

    /// Highest phase completed for the current node of `decl`.
    pub fn phase_of(&self, decl: &DeclId) -> Option<Phase> {
        self.sources.existing_node(decl)?.phase()
    }

    /// Phases of `decl` with a valid cached result.
    pub fn cached_phases(&self, decl: &DeclId) -> PhaseSet {
        self.cache.valid_phases(decl)
    }

    /// Evict up to `count` least recently used results. Returns how many went.
    pub fn evict_lru(&self, count: usize) -> usize {
        let evicted = self.cache.evict_lru(count);
        self.reset_evicted(&evicted);
        evicted.len()
    }

    /// Keys currently being computed by some invocation.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    pub(crate) fn reset_evicted(&self, evicted: &[CacheKey]) {
        for (decl, phase) in evicted {
            if let Some(node) = self.sources.existing_node(decl) {
                node.reset_below(*phase);
            }
        }
    }

    pub fn stats(&self) -> SessionStats {
        let cache = self.cache.stats();
        SessionStats {
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            stale_hits: cache.stale,
            evictions: cache.evictions,
            cached_entries: cache.entries,
            body_executions: self.counters.body_executions.load(Ordering::Relaxed),
            cycles: self.counters.cycles.load(Ordering::Relaxed),
            collections: self.counters.collections.load(Ordering::Relaxed),
            aborted_collections: self.counters.aborted_collections.load(Ordering::Relaxed),
            open_files: self.sources.len(),
        }
    }

    /// Tear the session down.
    pub fn close(self) {
        tracing::info!(
            session = %self.id,
            cached = self.cache.len(),
            files = self.sources.len(),
            "session closed"
        );
        self.cache.clear();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("modules", &self.graph.len())
            .field("files", &self.sources.len())
            .field("cache", &self.cache)
            .finish()
    }
}
