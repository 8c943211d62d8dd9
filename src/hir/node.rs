//! Declaration nodes - the unit of resolution.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use super::ids::DeclId;
use super::phase::Phase;
use crate::base::Name;
use crate::syntax::{DeclKind, StructuralDecl, SyntaxTree};

/// A structural declaration addressed by the engine.
///
/// Nodes are created lazily the first time a declaration is addressed and
/// are discarded with their tree when the file is replaced. Phase outputs
/// live in the session's resolution cache; the node carries the marker of
/// the highest phase completed against its tree.
pub struct DeclNode {
    id: DeclId,
    tree: Arc<SyntaxTree>,
    index: usize,
    /// 0 = nothing completed, otherwise `phase.index() + 1`.
    marker: AtomicU8,
}

impl DeclNode {
    pub(crate) fn new(id: DeclId, tree: Arc<SyntaxTree>, index: usize) -> Self {
        Self {
            id,
            tree,
            index,
            marker: AtomicU8::new(0),
        }
    }

    pub fn id(&self) -> &DeclId {
        &self.id
    }

    /// The structural declaration this node wraps.
    pub fn structure(&self) -> &StructuralDecl {
        self.tree.decl(self.index)
    }

    pub fn kind(&self) -> DeclKind {
        self.structure().kind
    }

    pub fn name(&self) -> &Name {
        &self.structure().name
    }

    pub fn tree(&self) -> &Arc<SyntaxTree> {
        &self.tree
    }

    /// Preorder index in [`tree`](Self::tree).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Highest completed phase, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self.marker.load(Ordering::Acquire) {
            0 => None,
            n => Phase::from_index(n as usize - 1),
        }
    }

    /// Record that `phase` completed. Never moves the marker backwards.
    pub(crate) fn advance_to(&self, phase: Phase) {
        self.marker
            .fetch_max(phase.index() as u8 + 1, Ordering::AcqRel);
    }

    /// Invalidation: forget `phase` and everything after it.
    pub(crate) fn reset_below(&self, phase: Phase) {
        self.marker.fetch_min(phase.index() as u8, Ordering::AcqRel);
    }
}

impl fmt::Debug for DeclNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclNode")
            .field("id", &self.id)
            .field("name", self.name())
            .field("kind", &self.kind())
            .field("phase", &self.phase())
            .finish()
    }
}
