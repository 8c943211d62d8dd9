//! AnalysisHost and Analysis - the editor-facing facade over a [`Session`].
//!
//! The `AnalysisHost` owns the session and the path ↔ [`FileId`] maps and
//! applies edits. `Analysis` is a cheap, copyable view for queries; any
//! number of them may be used from different threads while the host keeps
//! applying edits through [`AnalysisHost::session`].
//!
//! ## Usage
//!
//! ```ignore
//! let (graph, main) = ModuleGraph::single("main");
//! let mut host = AnalysisHost::new(graph);
//!
//! // Apply file changes
//! let file = host.set_file("src/car.kt", main, tree)?;
//!
//! // Query
//! let analysis = host.analysis();
//! let outcome = analysis.collect_file(file)?;
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::base::{FileId, ModuleId};
use crate::hir::{
    CollectOutcome, DeclId, ModuleGraph, Phase, PhaseResult, ResolveError, Session,
    SessionBuilder, SessionError, SessionStats, StructuralUnit,
};
use crate::syntax::SyntaxTree;

/// Owns the session and the file naming for the IDE layer.
///
/// Apply changes via `set_file()` and `remove_file()`, then query through
/// `analysis()`.
pub struct AnalysisHost {
    session: Arc<Session>,
    /// Map from file path to FileId
    file_id_map: FxHashMap<Arc<str>, FileId>,
    /// Reverse map from FileId to file path
    file_path_map: FxHashMap<FileId, Arc<str>>,
    next_file: u32,
}

impl AnalysisHost {
    /// Create a host with a default session over `graph`.
    pub fn new(graph: ModuleGraph) -> Self {
        Self::with_session(Session::new(graph))
    }

    pub fn from_builder(builder: SessionBuilder) -> Self {
        Self::with_session(builder.build())
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Arc::new(session),
            file_id_map: FxHashMap::default(),
            file_path_map: FxHashMap::default(),
            next_file: 0,
        }
    }

    /// The underlying session, shareable with worker threads.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Set the structure of a file.
    ///
    /// A new path is opened in `module`; a known path is reported as changed
    /// (its module stays the one it was opened in).
    pub fn set_file(
        &mut self,
        path: &str,
        module: ModuleId,
        tree: SyntaxTree,
    ) -> Result<FileId, SessionError> {
        if let Some(&file) = self.file_id_map.get(path) {
            self.session.file_changed(file, tree)?;
            return Ok(file);
        }

        let file = FileId::new(self.next_file);
        self.session.open_file(module, file, tree)?;
        self.next_file += 1;
        let path: Arc<str> = Arc::from(path);
        self.file_id_map.insert(Arc::clone(&path), file);
        self.file_path_map.insert(file, path);
        Ok(file)
    }

    /// Remove a file. Returns `false` if the path was never set.
    pub fn remove_file(&mut self, path: &str) -> bool {
        let Some(file) = self.file_id_map.remove(path) else {
            return false;
        };
        self.file_path_map.remove(&file);
        if let Err(err) = self.session.close_file(file) {
            tracing::warn!(path, error = %err, "file already closed");
        }
        true
    }

    /// Check if a file exists in storage.
    pub fn has_file(&self, path: &str) -> bool {
        self.file_id_map.contains_key(path)
    }

    /// Get the number of files loaded.
    pub fn file_count(&self) -> usize {
        self.file_id_map.len()
    }

    /// Get the FileId for a path, if it exists.
    pub fn get_file_id(&self, path: &str) -> Option<FileId> {
        self.file_id_map.get(path).copied()
    }

    /// Get a view for querying.
    pub fn analysis(&self) -> Analysis<'_> {
        Analysis {
            session: &self.session,
            file_id_map: &self.file_id_map,
            file_path_map: &self.file_path_map,
        }
    }
}

/// A read-only view over the session for queries.
#[derive(Clone, Copy)]
pub struct Analysis<'a> {
    session: &'a Session,
    file_id_map: &'a FxHashMap<Arc<str>, FileId>,
    file_path_map: &'a FxHashMap<FileId, Arc<str>>,
}

impl<'a> Analysis<'a> {
    pub fn session(&self) -> &'a Session {
        self.session
    }

    pub fn file_id(&self, path: &str) -> Option<FileId> {
        self.file_id_map.get(path).copied()
    }

    pub fn file_path(&self, file: FileId) -> Option<&'a str> {
        self.file_path_map.get(&file).map(|p| p.as_ref())
    }

    /// Find a declaration by path and qualified name (`Outer::inner`).
    pub fn decl(&self, path: &str, qualified: &str) -> Option<DeclId> {
        self.session.find_decl(self.file_id(path)?, qualified)
    }

    pub fn resolve(&self, decl: &DeclId, phase: Phase) -> Result<Arc<PhaseResult>, ResolveError> {
        self.session.resolve(decl, phase)
    }

    pub fn resolve_full(&self, decl: &DeclId) -> Result<Arc<PhaseResult>, ResolveError> {
        self.session.resolve_full(decl)
    }

    /// One collection attempt.
    pub fn collect(&self, unit: StructuralUnit) -> Result<CollectOutcome, ResolveError> {
        self.session.collect(unit)
    }

    /// Collect a unit, starting over while edits keep making it stale.
    ///
    /// Gives up after `max_collect_attempts` and returns the last
    /// [`CollectOutcome::Stale`].
    pub fn collect_with_retry(&self, unit: StructuralUnit) -> Result<CollectOutcome, ResolveError> {
        let attempts = self.session.config().max_collect_attempts.max(1);
        let mut run = self.session.begin_collect(unit);
        let mut outcome = run.run()?;
        for attempt in 1..attempts {
            let CollectOutcome::Stale(stale) = &outcome else {
                break;
            };
            tracing::debug!(attempt, file = %stale.file, "retrying stale collection");
            outcome = run.run()?;
        }
        Ok(outcome)
    }

    /// Collect every declaration of `file`, with retry.
    pub fn collect_file(&self, file: FileId) -> Result<CollectOutcome, ResolveError> {
        self.collect_with_retry(StructuralUnit::File(file))
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }
}

impl std::fmt::Debug for Analysis<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analysis")
            .field("session", &self.session.id())
            .field("files", &self.file_id_map.len())
            .finish()
    }
}
