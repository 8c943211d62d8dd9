//! Phase results.
//!
//! Every phase has its own output type; [`PhaseOutput`] is the tagged union
//! over all of them, so a consumer matching on the phase it asked for gets
//! a statically known shape. A [`PhaseResult`] is what the cache stores:
//! the outcome, the recoverable diagnostics the body reported, and the
//! dependency stamp it was computed against.

use std::fmt;

use super::diagnostics::Diagnostic;
use super::ids::DeclId;
use super::phase::Phase;
use super::stamp::DependencyStamp;
use crate::base::Name;
use crate::syntax::{DeclKind, Modality, Visibility};

// ============================================================================
// TYPE REFERENCES
// ============================================================================

/// Names that resolve to a built-in type when no declaration shadows them.
pub const BUILTIN_TYPES: &[&str] = &["Any", "Bool", "Float", "Int", "Long", "String", "Unit"];

/// A written type after lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A declaration in scope.
    Resolved(DeclId),
    /// One of [`BUILTIN_TYPES`].
    Builtin(Name),
    /// Lookup failed; a diagnostic was reported.
    Unresolved(Name),
    /// No type was written; left to inference.
    Inferred,
}

impl TypeRef {
    pub fn is_resolved(&self) -> bool {
        matches!(self, TypeRef::Resolved(_) | TypeRef::Builtin(_))
    }

    pub fn decl(&self) -> Option<&DeclId> {
        match self {
            TypeRef::Resolved(decl) => Some(decl),
            _ => None,
        }
    }
}

// ============================================================================
// PER-PHASE OUTPUTS
// ============================================================================

/// Output of [`Phase::RawShape`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawShape {
    pub name: Name,
    pub kind: DeclKind,
    pub members: Vec<DeclId>,
}

/// Output of [`Phase::Supertypes`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SupertypeSet {
    /// Resolved supertypes as written, in order.
    pub direct: Vec<DeclId>,
    /// `direct` followed by every inherited supertype, without repeats.
    pub all: Vec<DeclId>,
}

impl SupertypeSet {
    pub fn is_subtype_of(&self, decl: &DeclId) -> bool {
        self.all.contains(decl)
    }
}

/// Output of [`Phase::Status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusInfo {
    pub visibility: Visibility,
    pub modality: Modality,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSig {
    pub name: Name,
    pub ty: TypeRef,
}

/// Output of [`Phase::Signature`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureInfo {
    pub params: Vec<ParamSig>,
    /// Return type for callables, declared type for properties, target for aliases.
    pub return_type: TypeRef,
}

impl SignatureInfo {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationUse {
    pub name: Name,
    pub target: Option<DeclId>,
    pub args: usize,
}

/// Output of [`Phase::AnnotationArguments`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnnotationInfo {
    pub uses: Vec<AnnotationUse>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCall {
    pub callee: Name,
    pub target: Option<DeclId>,
    pub args: usize,
}

/// Output of [`Phase::Body`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BodyInfo {
    pub calls: Vec<ResolvedCall>,
}

/// Output of one phase, tagged by phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhaseOutput {
    RawShape(RawShape),
    Supertypes(SupertypeSet),
    Status(StatusInfo),
    Signature(SignatureInfo),
    AnnotationArguments(AnnotationInfo),
    Body(BodyInfo),
}

impl PhaseOutput {
    /// The phase this output belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            PhaseOutput::RawShape(_) => Phase::RawShape,
            PhaseOutput::Supertypes(_) => Phase::Supertypes,
            PhaseOutput::Status(_) => Phase::Status,
            PhaseOutput::Signature(_) => Phase::Signature,
            PhaseOutput::AnnotationArguments(_) => Phase::AnnotationArguments,
            PhaseOutput::Body(_) => Phase::Body,
        }
    }

    pub fn as_raw_shape(&self) -> Option<&RawShape> {
        match self {
            PhaseOutput::RawShape(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn as_supertypes(&self) -> Option<&SupertypeSet> {
        match self {
            PhaseOutput::Supertypes(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<&StatusInfo> {
        match self {
            PhaseOutput::Status(status) => Some(status),
            _ => None,
        }
    }

    pub fn as_signature(&self) -> Option<&SignatureInfo> {
        match self {
            PhaseOutput::Signature(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn as_annotations(&self) -> Option<&AnnotationInfo> {
        match self {
            PhaseOutput::AnnotationArguments(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_body(&self) -> Option<&BodyInfo> {
        match self {
            PhaseOutput::Body(body) => Some(body),
            _ => None,
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// The (declaration, phase) pairs that depend on each other in a cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleInfo {
    pub members: Vec<(DeclId, Phase)>,
}

impl CycleInfo {
    pub fn contains(&self, decl: &DeclId, phase: Phase) -> bool {
        self.members.iter().any(|(d, p)| *p == phase && d == decl)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Display for CycleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (decl, phase)) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}@{}", decl, phase)?;
        }
        Ok(())
    }
}

/// How a phase ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The body ran; recoverable problems are in [`PhaseResult::diagnostics`].
    Resolved(PhaseOutput),
    /// The phase transitively requires itself. Terminal and cached.
    Cyclic(CycleInfo),
}

/// A cached phase result. Never mutated after it is stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseResult {
    pub decl: DeclId,
    pub phase: Phase,
    pub outcome: Outcome,
    pub diagnostics: Vec<Diagnostic>,
    pub stamp: DependencyStamp,
}

impl PhaseResult {
    pub fn output(&self) -> Option<&PhaseOutput> {
        match &self.outcome {
            Outcome::Resolved(output) => Some(output),
            Outcome::Cyclic(_) => None,
        }
    }

    pub fn cycle(&self) -> Option<&CycleInfo> {
        match &self.outcome {
            Outcome::Cyclic(cycle) => Some(cycle),
            Outcome::Resolved(_) => None,
        }
    }

    pub fn is_cyclic(&self) -> bool {
        self.cycle().is_some()
    }

    /// Equal outcome and diagnostics, regardless of the generations read.
    pub fn same_semantics(&self, other: &PhaseResult) -> bool {
        self.decl == other.decl
            && self.phase == other.phase
            && self.outcome == other.outcome
            && self.diagnostics == other.diagnostics
    }
}
