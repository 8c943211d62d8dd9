//! High-level IR (HIR) - the incremental, phase-based resolution engine.
//!
//! Every declaration is resolved through an ordered list of phases. A phase
//! result is computed once, cached together with the file generations it
//! read, and recomputed only when one of those files is bumped in the
//! session's modification ledger.
//!
//! ## Key Types
//!
//! - [`Session`] - One analysis window: files, graph, ledger, cache
//! - [`ModuleGraph`] - Modules, dependency edges and the phase schedule
//! - [`DeclId`] / [`DeclNode`] - Stable declaration identity and its node
//! - [`Phase`] / [`PhaseSchedule`] - The ordered phases per declaration kind
//! - [`PhaseResult`] / [`DependencyStamp`] - A cached result and what it read
//! - [`PhaseBodies`] - The pluggable per-phase computations
//! - [`CollectionRun`] - Snapshot-consistent diagnostics for one unit
//!
//! ## Resolution Layers
//!
//! ```text
//! file_changed(file, tree)  ← INPUT: new structure, ledger bump
//!     │
//!     ▼
//! RawShape                  ← name, kind, members
//!     │
//!     ▼
//! Supertypes → Status       ← class hierarchy (types only)
//!     │
//!     ▼
//! Signature                 ← parameter and return types
//!     │
//!     ▼
//! AnnotationArguments       ← annotation uses
//!     │
//!     ▼
//! Body                      ← call targets (callables only)
//!     │
//!     ▼
//! collect(unit)             ← diagnostics against one snapshot
//! ```

mod bodies;
mod cache;
mod collect;
mod config;
mod diagnostics;
mod error;
mod flight;
mod ids;
mod ledger;
mod module_graph;
mod node;
mod output;
mod phase;
mod runner;
mod scope;
mod session;
mod source;
mod stamp;

pub use bodies::{
    BodyOutput, PhaseBodies, PhaseContext, PhaseInputs, Prerequisite, StructuralBodies,
};
pub use cache::CacheKey;
pub use collect::{
    CollectOutcome, CollectionRun, CollectionState, ResolvedDecl, ResolvedUnit, StaleCollection,
    StructuralUnit,
};
pub use config::SessionConfig;
pub use diagnostics::{
    Checker, CheckerRegistry, Diagnostic, DiagnosticSink, DuplicateDefinitionChecker,
    NamingConventionChecker, RelatedInfo, Severity, UnitChecker, codes,
};
pub use error::{ModuleGraphError, ResolveError, SessionError};
pub use ids::DeclId;
pub use module_graph::{ModuleGraph, ModuleGraphBuilder, ModuleOrigin};
pub use node::DeclNode;
pub use output::{
    AnnotationInfo, AnnotationUse, BUILTIN_TYPES, BodyInfo, CycleInfo, Outcome, ParamSig,
    PhaseOutput, PhaseResult, RawShape, ResolvedCall, SignatureInfo, StatusInfo, SupertypeSet,
    TypeRef,
};
pub use phase::{KindSchedule, Phase, PhaseSchedule, PhaseSet};
pub use scope::Lookup;
pub use session::{Session, SessionBuilder, SessionStats};
pub use stamp::{DependencyStamp, StampRead};
