//! Default phase bodies over structural declarations.
//!
//! Resolution here is name lookup plus a few structural checks. Each phase
//! requests its prerequisites at the lowest phase that carries the facts it
//! reads: type references need only raw shape, calls need the callee's
//! signature, never its body.

use super::{BodyOutput, PhaseBodies, PhaseContext, PhaseInputs, Prerequisite};
use crate::base::{Name, TextRange};
use crate::hir::diagnostics::{Diagnostic, DiagnosticSink, RelatedInfo, codes};
use crate::hir::ids::DeclId;
use crate::hir::output::{
    AnnotationInfo, AnnotationUse, BUILTIN_TYPES, BodyInfo, ParamSig, PhaseOutput, RawShape,
    ResolvedCall, SignatureInfo, StatusInfo, SupertypeSet, TypeRef,
};
use crate::hir::phase::Phase;
use crate::hir::scope::Lookup;
use crate::syntax::{DeclKind, Modality};

/// Built-in bodies used when a session is not given its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralBodies;

impl PhaseBodies for StructuralBodies {
    fn prerequisites(&self, cx: &mut PhaseContext<'_>, phase: Phase) -> Vec<Prerequisite> {
        let mut wanted = Vec::new();
        match phase {
            Phase::RawShape => {}
            Phase::Supertypes | Phase::Status => {
                for name in cx.structure().supertypes.clone() {
                    if let Lookup::Found(target) = cx.lookup(&name) {
                        push_if_allowed(cx, &mut wanted, target, phase);
                    }
                }
            }
            Phase::Signature => {
                for name in written_types(cx) {
                    if let Lookup::Found(target) = cx.lookup(&name) {
                        push_if_allowed(cx, &mut wanted, target, Phase::RawShape);
                    }
                }
            }
            Phase::AnnotationArguments => {
                let names: Vec<Name> = cx
                    .structure()
                    .annotations
                    .iter()
                    .map(|a| a.name.clone())
                    .collect();
                for name in names {
                    if let Lookup::Found(target) = cx.lookup(&name) {
                        push_if_allowed(cx, &mut wanted, target, Phase::Signature);
                    }
                }
            }
            Phase::Body => {
                let callees: Vec<Name> = cx
                    .structure()
                    .calls
                    .iter()
                    .map(|c| c.callee.clone())
                    .collect();
                for callee in callees {
                    if let Lookup::Found(target) = cx.lookup(&callee) {
                        push_if_allowed(cx, &mut wanted, target, Phase::Signature);
                    }
                }
            }
        }
        wanted
    }

    fn run(&self, cx: &mut PhaseContext<'_>, phase: Phase, inputs: &PhaseInputs) -> BodyOutput {
        let mut sink = DiagnosticSink::new();
        let output = match phase {
            Phase::RawShape => PhaseOutput::RawShape(RawShape {
                name: cx.structure().name.clone(),
                kind: cx.kind(),
                members: cx.members(),
            }),
            Phase::Supertypes => PhaseOutput::Supertypes(supertypes(cx, inputs, &mut sink)),
            Phase::Status => PhaseOutput::Status(status(cx, inputs, &mut sink)),
            Phase::Signature => PhaseOutput::Signature(signature(cx, &mut sink)),
            Phase::AnnotationArguments => {
                PhaseOutput::AnnotationArguments(annotations(cx, inputs, &mut sink))
            }
            Phase::Body => PhaseOutput::Body(body(cx, inputs, &mut sink)),
        };
        BodyOutput {
            output,
            diagnostics: sink.finish(),
        }
    }
}

fn push_if_allowed(
    cx: &mut PhaseContext<'_>,
    wanted: &mut Vec<Prerequisite>,
    target: DeclId,
    phase: Phase,
) {
    if cx.can_require(&target, phase) {
        let prerequisite = Prerequisite::new(target, phase);
        if !wanted.contains(&prerequisite) {
            wanted.push(prerequisite);
        }
    }
}

fn written_types(cx: &PhaseContext<'_>) -> Vec<Name> {
    let decl = cx.structure();
    decl.params
        .iter()
        .map(|p| p.ty.clone())
        .chain(decl.return_type.clone())
        .collect()
}

/// Report a failed lookup. Returns the target for `Found`.
fn resolve_name(
    cx: &mut PhaseContext<'_>,
    name: &str,
    range: TextRange,
    sink: &mut DiagnosticSink,
) -> Option<DeclId> {
    match cx.lookup(name) {
        Lookup::Found(target) => Some(target),
        Lookup::Ambiguous(candidates) => {
            let related = candidates
                .iter()
                .filter_map(|candidate| {
                    let range = cx.structure_of(candidate, |d| d.range)?;
                    Some(RelatedInfo::new(candidate.file, range, "candidate"))
                })
                .collect();
            sink.ambiguous_reference(cx.file(), range, cx.decl(), name, related);
            None
        }
        Lookup::NotFound => {
            sink.undefined_reference(cx.file(), range, cx.decl(), name);
            None
        }
    }
}

fn supertypes(
    cx: &mut PhaseContext<'_>,
    inputs: &PhaseInputs,
    sink: &mut DiagnosticSink,
) -> SupertypeSet {
    let range = cx.structure().range;
    let mut set = SupertypeSet::default();
    for name in cx.structure().supertypes.clone() {
        let Some(target) = resolve_name(cx, &name, range, sink) else {
            continue;
        };
        let kind = cx.kind_of(&target);
        if !kind.is_some_and(DeclKind::can_be_supertype) {
            sink.add(
                Diagnostic::error(
                    cx.file(),
                    range,
                    format!(
                        "cannot extend '{}': {} is not a class or interface",
                        name,
                        kind.map(|k| k.display()).unwrap_or("declaration")
                    ),
                )
                .for_decl(cx.decl())
                .with_code(codes::INVALID_SPECIALIZATION),
            );
            continue;
        }

        if !set.direct.contains(&target) {
            set.direct.push(target.clone());
        }
        if !set.all.contains(&target) {
            set.all.push(target.clone());
        }
        match inputs.get(&target, Phase::Supertypes) {
            Some(result) if result.is_cyclic() => {
                sink.cyclic_dependency(
                    cx.file(),
                    range,
                    cx.decl(),
                    &format!("supertype '{}' is part of an inheritance cycle", name),
                );
            }
            Some(result) => {
                let inherited = result
                    .output()
                    .and_then(PhaseOutput::as_supertypes)
                    .map(|s| s.all.as_slice())
                    .unwrap_or_default();
                for decl in inherited {
                    if !set.all.contains(decl) {
                        set.all.push(decl.clone());
                    }
                }
            }
            None => {}
        }
    }
    set
}

fn status(cx: &mut PhaseContext<'_>, inputs: &PhaseInputs, sink: &mut DiagnosticSink) -> StatusInfo {
    let decl = cx.structure();
    let info = StatusInfo {
        visibility: decl.visibility,
        modality: decl.modality,
    };
    let range = decl.range;

    let direct = inputs
        .output(cx.decl(), Phase::Supertypes)
        .and_then(PhaseOutput::as_supertypes)
        .map(|s| s.direct.clone())
        .unwrap_or_default();
    for target in direct {
        let Some(target_status) = inputs
            .output(&target, Phase::Status)
            .and_then(PhaseOutput::as_status)
        else {
            continue;
        };
        if target_status.modality == Modality::Final {
            let name = cx
                .structure_of(&target, |d| d.name.clone())
                .unwrap_or_default();
            sink.add(
                Diagnostic::error(
                    cx.file(),
                    range,
                    format!("cannot extend final type '{}'", name),
                )
                .for_decl(cx.decl())
                .with_code(codes::INVALID_SPECIALIZATION),
            );
        }
    }
    info
}

fn type_ref(
    cx: &mut PhaseContext<'_>,
    written: &Name,
    range: TextRange,
    sink: &mut DiagnosticSink,
) -> TypeRef {
    match cx.lookup(written) {
        Lookup::Found(target) => match cx.kind_of(&target) {
            Some(kind) if kind.is_type() => TypeRef::Resolved(target),
            Some(kind) => {
                sink.invalid_type(cx.file(), range, cx.decl(), written, kind);
                TypeRef::Unresolved(written.clone())
            }
            None => TypeRef::Unresolved(written.clone()),
        },
        Lookup::NotFound if BUILTIN_TYPES.contains(&written.as_str()) => {
            TypeRef::Builtin(written.clone())
        }
        _ => {
            resolve_name(cx, written, range, sink);
            TypeRef::Unresolved(written.clone())
        }
    }
}

fn signature(cx: &mut PhaseContext<'_>, sink: &mut DiagnosticSink) -> SignatureInfo {
    let decl = cx.structure().clone();
    let params = decl
        .params
        .iter()
        .map(|param| ParamSig {
            name: param.name.clone(),
            ty: type_ref(cx, &param.ty, decl.range, sink),
        })
        .collect();
    let return_type = match (&decl.return_type, decl.kind) {
        (Some(written), _) => type_ref(cx, written, decl.range, sink),
        (None, DeclKind::Class | DeclKind::Interface) => TypeRef::Resolved(cx.decl().clone()),
        (None, DeclKind::Annotation) => TypeRef::Builtin(Name::new("Unit")),
        (None, _) => TypeRef::Inferred,
    };
    SignatureInfo {
        params,
        return_type,
    }
}

/// Parameter count from a resolved signature prerequisite.
fn arity(inputs: &PhaseInputs, target: &DeclId) -> Option<usize> {
    inputs
        .output(target, Phase::Signature)
        .and_then(PhaseOutput::as_signature)
        .map(|sig| sig.arity())
}

fn annotations(
    cx: &mut PhaseContext<'_>,
    inputs: &PhaseInputs,
    sink: &mut DiagnosticSink,
) -> AnnotationInfo {
    let mut info = AnnotationInfo::default();
    for annotation in cx.structure().annotations.clone() {
        let mut target = resolve_name(cx, &annotation.name, annotation.range, sink);
        if let Some(decl) = target.clone() {
            match cx.kind_of(&decl) {
                Some(DeclKind::Annotation) => {
                    match arity(inputs, &decl) {
                        Some(expected) if expected != annotation.args => {
                            sink.argument_count_mismatch(
                                cx.file(),
                                annotation.range,
                                cx.decl(),
                                &annotation.name,
                                expected,
                                annotation.args,
                            );
                        }
                        _ => {}
                    }
                }
                Some(kind) => {
                    sink.add(
                        Diagnostic::error(
                            cx.file(),
                            annotation.range,
                            format!(
                                "'{}' is a {}, not an annotation",
                                annotation.name,
                                kind.display()
                            ),
                        )
                        .for_decl(cx.decl())
                        .with_code(codes::INVALID_TYPE),
                    );
                    target = None;
                }
                None => target = None,
            }
        }
        info.uses.push(AnnotationUse {
            name: annotation.name.clone(),
            target,
            args: annotation.args,
        });
    }
    info
}

fn body(cx: &mut PhaseContext<'_>, inputs: &PhaseInputs, sink: &mut DiagnosticSink) -> BodyInfo {
    let mut info = BodyInfo::default();
    for call in cx.structure().calls.clone() {
        let mut target = resolve_name(cx, &call.callee, call.range, sink);
        if let Some(decl) = target.clone() {
            match cx.kind_of(&decl) {
                Some(kind) if kind.is_callable() => {
                    match arity(inputs, &decl) {
                        Some(expected) if expected != call.args => {
                            sink.argument_count_mismatch(
                                cx.file(),
                                call.range,
                                cx.decl(),
                                &call.callee,
                                expected,
                                call.args,
                            );
                        }
                        _ => {}
                    }
                }
                Some(kind) => {
                    sink.add(
                        Diagnostic::error(
                            cx.file(),
                            call.range,
                            format!("'{}' is a {} and cannot be called", call.callee, kind.display()),
                        )
                        .for_decl(cx.decl())
                        .with_code(codes::NOT_CALLABLE),
                    );
                    target = None;
                }
                None => target = None,
            }
        }
        info.calls.push(ResolvedCall {
            callee: call.callee.clone(),
            target,
            args: call.args,
        });
    }
    info
}
