//! Declaration identity.

use std::fmt;

use crate::base::{FileId, ModuleId};
use crate::syntax::DeclPath;

/// Stable identity of a declaration: module + file + structural path.
///
/// Derived purely from structure, so it can be assigned before any
/// resolution and survives reparses that leave the declaration's path intact.
/// Cloning is cheap (the path is shared).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclId {
    pub module: ModuleId,
    pub file: FileId,
    pub path: DeclPath,
}

impl DeclId {
    pub fn new(module: ModuleId, file: FileId, path: DeclPath) -> Self {
        Self { module, file, path }
    }

    /// The enclosing declaration, if this is a member.
    pub fn parent(&self) -> Option<DeclId> {
        self.path
            .parent()
            .map(|path| DeclId::new(self.module, self.file, path))
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.module.index(), self.file.index(), self.path)
    }
}

impl fmt::Debug for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeclId({})", self)
    }
}
