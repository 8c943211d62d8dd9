//! Cycle tests: malformed inheritance ends in a cached cyclic result.

use std::sync::Arc;

use rstest::rstest;
use strata::hir::{Phase, codes};
use strata::syntax::StructuralDecl;

use crate::helpers::counting_bodies::CountingBodies;
use crate::helpers::diagnostic_helpers::*;
use crate::helpers::session_fixtures::*;

// =============================================================================
// SCENARIO C: A EXTENDS B EXTENDS A
// =============================================================================

#[test]
fn test_two_class_cycle_is_terminal_and_cached() {
    let bodies = CountingBodies::new();
    let (builder, main) = single_module_builder();
    let session = builder.bodies(bodies.clone()).build();
    let file = open(
        &session,
        main,
        0,
        vec![
            StructuralDecl::class("A").extends("B"),
            StructuralDecl::class("B").extends("A"),
        ],
    );
    let a = decl(&session, file, "A");
    let b = decl(&session, file, "B");

    let first = session.resolve(&a, Phase::Supertypes).unwrap();
    let cycle = first.cycle().expect("A is cyclic");
    assert!(cycle.contains(&a, Phase::Supertypes));
    assert!(cycle.contains(&b, Phase::Supertypes));
    assert_eq!(bodies.runs(&a, Phase::Supertypes), 0);

    let cycles = session.stats().cycles;
    let second = session.resolve(&a, Phase::Supertypes).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(session.stats().cycles, cycles);
    assert!(session.resolve(&b, Phase::Supertypes).unwrap().is_cyclic());
}

#[test]
fn test_cycle_does_not_block_later_phases() {
    let (session, main) = single_module();
    let file = open(
        &session,
        main,
        0,
        vec![
            StructuralDecl::class("A").extends("B"),
            StructuralDecl::class("B").extends("A"),
        ],
    );
    let a = decl(&session, file, "A");

    let body = session.resolve(&a, Phase::Body).unwrap();

    assert_eq!(body.phase, Phase::Body);
    assert!(!body.is_cyclic());
    assert!(session.resolve(&a, Phase::Supertypes).unwrap().is_cyclic());
}

#[rstest]
#[case::self_reference(vec![StructuralDecl::class("Loop").extends("Loop")], 1)]
#[case::three_classes(
    vec![
        StructuralDecl::class("First").extends("Third"),
        StructuralDecl::class("Second").extends("First"),
        StructuralDecl::class("Third").extends("Second"),
    ],
    3
)]
fn test_cycle_members_are_all_cyclic(#[case] decls: Vec<StructuralDecl>, #[case] size: usize) {
    let (session, main) = single_module();
    let file = open(&session, main, 0, decls);
    let members = session.decls_in(file);

    let result = session.resolve(&members[0], Phase::Supertypes).unwrap();

    assert_eq!(result.cycle().map(|c| c.len()), Some(size));
    for member in &members {
        assert!(
            session.resolve(member, Phase::Supertypes).unwrap().is_cyclic(),
            "{} should be cyclic",
            member
        );
    }
}

#[test]
fn test_class_outside_cycle_reports_inherited_cycle() {
    let (session, main) = single_module();
    let file = open(
        &session,
        main,
        0,
        vec![
            StructuralDecl::class("A").extends("B"),
            StructuralDecl::class("B").extends("A"),
            StructuralDecl::class("C").extends("A"),
        ],
    );
    let c = decl(&session, file, "C");

    let result = session.resolve(&c, Phase::Supertypes).unwrap();

    assert!(!result.is_cyclic());
    assert!(has_code(&result.diagnostics, codes::CIRCULAR_DEPENDENCY));
}

#[test]
fn test_collect_reports_cycle_once_per_member() {
    let (session, main) = single_module();
    let file = open(
        &session,
        main,
        0,
        vec![
            StructuralDecl::class("A").extends("B"),
            StructuralDecl::class("B").extends("A"),
        ],
    );

    let diagnostics = completed(session.collect(strata::hir::StructuralUnit::File(file)).unwrap());
    let cycles: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.code.as_deref() == Some(codes::CIRCULAR_DEPENDENCY))
        .collect();

    assert_eq!(cycles.len(), 2);
    assert_ne!(cycles[0].decl, cycles[1].decl);
}
