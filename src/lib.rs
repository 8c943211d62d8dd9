//! # strata-resolve
//!
//! Incremental, phase-based semantic resolution for editor-style clients.
//!
//! Declarations are resolved through an ordered list of phases. Results are
//! cached with the file generations they depend on, recomputed lazily after
//! edits, shared between concurrent requests, and collected into diagnostics
//! that never mix two generations of the same file.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide       → AnalysisHost: paths, edits, collect with retry
//!   ↓
//! hir       → Session, phase runner, cache, ledger, diagnostics
//!   ↓
//! syntax    → SyntaxTree / StructuralDecl (pre-semantic structure)
//!   ↓
//! base      → Primitives (FileId, ModuleId, Name, TextRange)
//! ```

// ============================================================================
// MODULES (dependency order: base → syntax → hir → ide)
// ============================================================================

/// Foundation types: FileId, ModuleId, Name, TextRange
pub mod base;

/// Syntax: structural trees handed to the engine
pub mod syntax;

/// High-level IR: sessions, phases, resolution cache
pub mod hir;

/// IDE features: the editor-facing host
pub mod ide;

// Re-export foundation types
pub use base::{FileId, ModuleId, Name, TextRange, TextSize};

// Re-export the main entry points
pub use hir::{
    CollectOutcome, DeclId, Diagnostic, ModuleGraph, Phase, PhaseResult, ResolveError, Session,
    SessionConfig, Severity, StructuralUnit,
};
pub use ide::{Analysis, AnalysisHost};
