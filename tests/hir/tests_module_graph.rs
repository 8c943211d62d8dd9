//! Module graph tests: validation, visibility across modules, library caps.

use rstest::rstest;
use strata::hir::{
    ModuleGraph, ModuleGraphError, ModuleOrigin, Phase, PhaseOutput, PhaseSchedule, ResolveError,
    Session, SessionError, TypeRef,
};
use strata::syntax::{DeclKind, StructuralDecl, SyntaxTree, Visibility};

use crate::helpers::session_fixtures::*;

// =============================================================================
// VALIDATION
// =============================================================================

#[test]
fn test_dependency_cycle_is_rejected() {
    let mut builder = ModuleGraph::builder();
    let a = builder.add_module("a", ModuleOrigin::Source).unwrap();
    let b = builder.add_module("b", ModuleOrigin::Source).unwrap();
    builder.add_dependency(a, b).unwrap();
    builder.add_dependency(b, a).unwrap();

    let err = builder.build().unwrap_err();

    assert!(matches!(err, ModuleGraphError::Cycle { ref path } if path.len() == 3));
}

#[test]
fn test_duplicate_module_name_is_rejected() {
    let mut builder = ModuleGraph::builder();
    builder.add_module("core", ModuleOrigin::Source).unwrap();

    assert!(matches!(
        builder.add_module("core", ModuleOrigin::Library),
        Err(ModuleGraphError::DuplicateModule(_))
    ));
}

#[test]
fn test_file_in_unknown_module_is_rejected() {
    let (graph, app, _) = app_with_library();
    let session = Session::new(graph);
    let bogus = strata::base::ModuleId::new(app.index() + 10);

    assert_eq!(
        session.open_file(bogus, strata::base::FileId::new(0), SyntaxTree::default()),
        Err(SessionError::UnknownModule(bogus))
    );
}

// =============================================================================
// VISIBILITY
// =============================================================================

#[test]
fn test_dependency_is_visible_but_not_the_reverse() {
    let (graph, app, stdlib) = app_with_library();
    let session = Session::new(graph);
    let lib = open(
        &session,
        stdlib,
        0,
        vec![StructuralDecl::function("log").returns("Widget")],
    );
    let user = open(&session, app, 1, vec![StructuralDecl::class("Widget")]);
    let log = decl(&session, lib, "log");
    let widget = decl(&session, user, "Widget");

    let result = session.resolve(&log, Phase::Signature).unwrap();
    let signature = result.output().and_then(PhaseOutput::as_signature).unwrap();

    assert_eq!(signature.return_type, TypeRef::Unresolved("Widget".into()));
    assert!(!result.stamp.references(user));
    assert!(session.resolve(&widget, Phase::RawShape).is_ok());
}

#[rstest]
#[case::public(Visibility::Public, true)]
#[case::internal(Visibility::Internal, false)]
#[case::private(Visibility::Private, false)]
fn test_cross_module_visibility(#[case] visibility: Visibility, #[case] visible: bool) {
    let mut builder = ModuleGraph::builder();
    let core = builder.add_module("core", ModuleOrigin::Source).unwrap();
    let app = builder.add_module("app", ModuleOrigin::Source).unwrap();
    builder.add_dependency(app, core).unwrap();
    let session = Session::new(builder.build().unwrap());

    open(
        &session,
        core,
        0,
        vec![StructuralDecl::class("Engine").with_visibility(visibility)],
    );
    let user = open(
        &session,
        app,
        1,
        vec![StructuralDecl::property("engine", "Engine")],
    );
    let engine = decl(&session, user, "engine");

    let result = session.resolve(&engine, Phase::Signature).unwrap();

    assert_eq!(result.diagnostics.is_empty(), visible);
}

#[test]
fn test_private_declaration_visible_only_in_its_file() {
    let (session, main) = single_module();
    open(
        &session,
        main,
        0,
        vec![StructuralDecl::class("Secret").with_visibility(Visibility::Private)],
    );
    let other = open(&session, main, 1, vec![StructuralDecl::property("s", "Secret")]);
    let s = decl(&session, other, "s");

    let result = session.resolve(&s, Phase::Signature).unwrap();

    assert_eq!(result.diagnostics.len(), 1);
}

// =============================================================================
// LIBRARY CAP
// =============================================================================

#[rstest]
#[case::class_body(StructuralDecl::class("Buffer"), Phase::Body)]
#[case::class_annotations(StructuralDecl::class("Buffer"), Phase::AnnotationArguments)]
#[case::function_body(StructuralDecl::function("flush"), Phase::Body)]
fn test_library_phase_beyond_cap_is_not_reachable(
    #[case] structure: StructuralDecl,
    #[case] phase: Phase,
) {
    let (graph, _, stdlib) = app_with_library();
    let session = Session::new(graph);
    let name = structure.name.clone();
    let lib = open(&session, stdlib, 0, vec![structure]);
    let target = decl(&session, lib, &name);

    let err = session.resolve(&target, phase).unwrap_err();

    assert_eq!(
        err,
        ResolveError::PhaseNotReachable {
            decl: target.clone(),
            phase,
            cap: Phase::Signature,
        }
    );
    assert_eq!(session.resolve_full(&target).unwrap().phase, Phase::Signature);
}

#[test]
fn test_signature_boundary_is_configurable_per_kind() {
    let schedule = PhaseSchedule::standard()
        .with_signature_boundary(DeclKind::Function, Phase::Body);
    let mut builder = ModuleGraph::builder().with_schedule(schedule);
    let stdlib = builder.add_module("stdlib", ModuleOrigin::Library).unwrap();
    let session = Session::new(builder.build().unwrap());
    let lib = open(
        &session,
        stdlib,
        0,
        vec![
            StructuralDecl::function("flush"),
            StructuralDecl::class("Buffer"),
        ],
    );

    assert!(session.resolve(&decl(&session, lib, "flush"), Phase::Body).is_ok());
    assert!(
        session
            .resolve(&decl(&session, lib, "Buffer"), Phase::Body)
            .is_err()
    );
}
