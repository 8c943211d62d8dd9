//! Error types for contract violations.
//!
//! Semantic problems in user code never show up here: those are diagnostics
//! stored inside phase results. These errors mean a caller (or a plugged-in
//! phase body) broke the engine's contract.

use thiserror::Error;

use super::ids::DeclId;
use super::phase::Phase;
use crate::base::{FileId, ModuleId, Name};
use crate::syntax::DeclKind;

/// Hard failure of a `resolve` or `collect` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The declaration does not exist in the current structural tree.
    #[error("unknown declaration {0}")]
    UnknownDeclaration(DeclId),

    /// The file is not open in this session.
    #[error("unknown file {0}")]
    UnknownFile(FileId),

    /// The phase is not part of the declaration kind's schedule.
    #[error("phase '{phase}' is not declared for {} {decl}", kind.display())]
    PhaseNotDeclared {
        decl: DeclId,
        kind: DeclKind,
        phase: Phase,
    },

    /// The declaration's module does not expose the phase to consumers.
    #[error("phase '{phase}' of {decl} is not reachable (module exposes up to '{cap}')")]
    PhaseNotReachable { decl: DeclId, phase: Phase, cap: Phase },

    /// A phase body asked for a prerequisite the engine cannot honour.
    #[error("invalid prerequisite {target}@{target_phase} requested by {decl}@{phase}: {reason}")]
    InvalidPrerequisite {
        decl: DeclId,
        phase: Phase,
        target: DeclId,
        target_phase: Phase,
        reason: &'static str,
    },
}

impl ResolveError {
    /// Create an invalid prerequisite error.
    pub fn invalid_prerequisite(
        decl: &DeclId,
        phase: Phase,
        target: &DeclId,
        target_phase: Phase,
        reason: &'static str,
    ) -> Self {
        Self::InvalidPrerequisite {
            decl: decl.clone(),
            phase,
            target: target.clone(),
            target_phase,
            reason,
        }
    }
}

/// Rejected module graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleGraphError {
    /// Dependency edges form a cycle. `path` starts and ends with the same module.
    #[error("module dependency cycle: {}", path.iter().map(|n| n.as_str()).collect::<Vec<_>>().join(" -> "))]
    Cycle { path: Vec<Name> },

    #[error("unknown module {0}")]
    UnknownModule(ModuleId),

    #[error("duplicate module name '{0}'")]
    DuplicateModule(Name),
}

/// Failure of a session-level operation (file registration, edits).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    ModuleGraph(#[from] ModuleGraphError),

    #[error("unknown module {0}")]
    UnknownModule(ModuleId),

    #[error("file {0} is already open")]
    FileAlreadyOpen(FileId),

    #[error("file {0} is not open")]
    UnknownFile(FileId),
}
