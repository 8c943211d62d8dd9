//! Structural tree storage and the declaration node lifecycle.
//!
//! Each open file has one immutable [`FileEntry`]: its module, its tree and
//! one lazily created [`DeclNode`] slot per declaration. Replacing a file's
//! tree swaps in a fresh entry, which discards every node of the old tree.
//!
//! The store bumps a file's generation while it still holds the write lock
//! for the tree change, and [`SourceStore::read`] reads the generation under
//! the read lock. A reader therefore always gets a generation and the tree
//! that generation describes, never a new tree with an old generation or
//! the reverse.

use std::sync::{Arc, OnceLock};

use indexmap::IndexSet;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::error::SessionError;
use super::ids::DeclId;
use super::ledger::ModificationLedger;
use super::node::DeclNode;
use crate::base::{FileId, ModuleId};
use crate::syntax::{DeclPath, SyntaxTree};

/// One open file.
#[derive(Debug)]
pub(crate) struct FileEntry {
    module: ModuleId,
    file: FileId,
    tree: Arc<SyntaxTree>,
    nodes: Box<[OnceLock<Arc<DeclNode>>]>,
}

impl FileEntry {
    fn new(module: ModuleId, file: FileId, tree: SyntaxTree) -> Self {
        let nodes = (0..tree.len()).map(|_| OnceLock::new()).collect();
        Self {
            module,
            file,
            tree: Arc::new(tree),
            nodes,
        }
    }

    pub(crate) fn module(&self) -> ModuleId {
        self.module
    }

    pub(crate) fn tree(&self) -> &Arc<SyntaxTree> {
        &self.tree
    }

    /// Identity of the declaration at a preorder index.
    pub(crate) fn decl_id(&self, index: usize) -> DeclId {
        DeclId::new(self.module, self.file, self.tree.path(index).clone())
    }

    /// Node for a preorder index, created on first use.
    pub(crate) fn node(&self, index: usize) -> Option<Arc<DeclNode>> {
        let slot = self.nodes.get(index)?;
        let node = slot.get_or_init(|| {
            Arc::new(DeclNode::new(
                self.decl_id(index),
                Arc::clone(&self.tree),
                index,
            ))
        });
        Some(Arc::clone(node))
    }

    /// Node for a path, if the path exists in this tree.
    pub(crate) fn node_at(&self, path: &DeclPath) -> Option<Arc<DeclNode>> {
        self.node(self.tree.index_of(path)?)
    }

    /// Node of `decl` if it belongs to this file's module and tree.
    pub(crate) fn node_of(&self, decl: &DeclId) -> Option<Arc<DeclNode>> {
        if self.module != decl.module {
            return None;
        }
        self.node_at(&decl.path)
    }

    /// Node for a path only if it was already created.
    pub(crate) fn existing_node(&self, path: &DeclPath) -> Option<Arc<DeclNode>> {
        let index = self.tree.index_of(path)?;
        self.nodes.get(index)?.get().cloned()
    }
}

#[derive(Debug, Default)]
struct Files {
    entries: FxHashMap<FileId, Arc<FileEntry>>,
    by_module: FxHashMap<ModuleId, IndexSet<FileId>>,
}

/// All open files of a session.
///
/// Lock order is always files, then ledger.
#[derive(Debug)]
pub(crate) struct SourceStore {
    files: RwLock<Files>,
    ledger: Arc<ModificationLedger>,
}

impl SourceStore {
    pub(crate) fn new(ledger: Arc<ModificationLedger>) -> Self {
        Self {
            files: RwLock::new(Files::default()),
            ledger,
        }
    }

    /// Register a new file. Returns its new generation.
    pub(crate) fn insert(
        &self,
        module: ModuleId,
        file: FileId,
        tree: SyntaxTree,
    ) -> Result<u64, SessionError> {
        let mut files = self.files.write();
        if files.entries.contains_key(&file) {
            return Err(SessionError::FileAlreadyOpen(file));
        }
        let entry = Arc::new(FileEntry::new(module, file, tree));
        files.entries.insert(file, entry);
        files.by_module.entry(module).or_default().insert(file);
        Ok(self.ledger.bump(file))
    }

    /// Swap in a new tree for an open file. Returns its new generation.
    pub(crate) fn replace(&self, file: FileId, tree: SyntaxTree) -> Result<u64, SessionError> {
        let mut files = self.files.write();
        let module = files
            .entries
            .get(&file)
            .map(|entry| entry.module)
            .ok_or(SessionError::UnknownFile(file))?;
        let entry = Arc::new(FileEntry::new(module, file, tree));
        files.entries.insert(file, entry);
        Ok(self.ledger.bump(file))
    }

    /// Drop a file. Returns its last entry and its new generation.
    pub(crate) fn remove(&self, file: FileId) -> Result<(Arc<FileEntry>, u64), SessionError> {
        let mut files = self.files.write();
        let entry = files
            .entries
            .remove(&file)
            .ok_or(SessionError::UnknownFile(file))?;
        if let Some(module_files) = files.by_module.get_mut(&entry.module) {
            module_files.shift_remove(&file);
        }
        Ok((entry, self.ledger.bump(file)))
    }

    /// Generation of `file` paired with the entry it describes.
    ///
    /// A closed file still has a generation, so only the entry is optional.
    pub(crate) fn read(&self, file: FileId) -> (u64, Option<Arc<FileEntry>>) {
        let files = self.files.read();
        let entry = files.entries.get(&file).cloned();
        (self.ledger.generation_of(file), entry)
    }

    pub(crate) fn file(&self, file: FileId) -> Option<Arc<FileEntry>> {
        self.files.read().entries.get(&file).cloned()
    }

    pub(crate) fn contains(&self, file: FileId) -> bool {
        self.files.read().entries.contains_key(&file)
    }

    /// Files of `module` in the order they were opened.
    pub(crate) fn files_in(&self, module: ModuleId) -> Vec<FileId> {
        self.files
            .read()
            .by_module
            .get(&module)
            .map(|files| files.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.files.read().entries.len()
    }

    /// Node of `decl` in the file's current tree.
    pub(crate) fn node(&self, decl: &DeclId) -> Option<Arc<DeclNode>> {
        self.file(decl.file)?.node_of(decl)
    }

    /// Node of `decl` only if one was already created.
    pub(crate) fn existing_node(&self, decl: &DeclId) -> Option<Arc<DeclNode>> {
        self.file(decl.file)?.existing_node(&decl.path)
    }
}
