//! Invalidation tests: edits, stamp mismatches and precision.

use std::sync::Arc;

use strata::hir::{Phase, PhaseOutput, SessionConfig};
use strata::syntax::StructuralDecl;

use crate::helpers::counting_bodies::CountingBodies;
use crate::helpers::session_fixtures::*;

fn vehicle_and_car() -> Vec<StructuralDecl> {
    vec![
        StructuralDecl::class("Vehicle"),
        StructuralDecl::class("Car").extends("Vehicle"),
    ]
}

// =============================================================================
// SCENARIO B: EDIT FORCES RECOMPUTATION
// =============================================================================

#[test]
fn test_edit_recomputes_dependent_result() {
    let bodies = CountingBodies::new();
    let (builder, main) = single_module_builder();
    let session = builder.bodies(bodies.clone()).build();
    let file = open(&session, main, 0, vehicle_and_car());
    let car = decl(&session, file, "Car");
    let vehicle = decl(&session, file, "Vehicle");

    let before = session.resolve(&car, Phase::Body).unwrap();
    assert!(before.stamp.contains(&vehicle, Phase::Supertypes, 1));

    assert_eq!(edit(&session, file, vehicle_and_car()), 2);
    let stale_before = session.stats().stale_hits;

    let after = session.resolve(&car, Phase::Body).unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert!(session.stats().stale_hits > stale_before);
    assert!(after.stamp.contains(&vehicle, Phase::Supertypes, 2));
    assert_eq!(bodies.runs(&car, Phase::Body), 2);
    assert_eq!(bodies.runs(&vehicle, Phase::Supertypes), 2);
    assert!(before.same_semantics(&after));
}

#[test]
fn test_edit_changes_output() {
    let (session, main) = single_module();
    let file = open(&session, main, 0, vehicle_and_car());
    let car = decl(&session, file, "Car");

    let before = session.resolve(&car, Phase::Supertypes).unwrap();
    assert_eq!(
        before.output().and_then(PhaseOutput::as_supertypes).unwrap().direct.len(),
        1
    );

    edit(
        &session,
        file,
        vec![StructuralDecl::class("Vehicle"), StructuralDecl::class("Car")],
    );
    let after = session.resolve(&car, Phase::Supertypes).unwrap();

    assert!(after
        .output()
        .and_then(PhaseOutput::as_supertypes)
        .unwrap()
        .direct
        .is_empty());
}

#[test]
fn test_edit_discards_phase_marker() {
    let (session, main) = single_module();
    let file = open(&session, main, 0, vehicle_and_car());
    let car = decl(&session, file, "Car");

    session.resolve(&car, Phase::Body).unwrap();
    assert_eq!(session.phase_of(&car), Some(Phase::Body));

    edit(&session, file, vehicle_and_car());

    assert_eq!(session.phase_of(&car), None);
    assert!(session.cached_phases(&car).is_empty());
}

#[test]
fn test_dependent_marker_resets_on_access() {
    let (session, main) = single_module();
    let base_file = open(&session, main, 0, vec![StructuralDecl::class("Vehicle")]);
    let car_file = open(
        &session,
        main,
        1,
        vec![StructuralDecl::class("Car").extends("Vehicle")],
    );
    let car = decl(&session, car_file, "Car");

    session.resolve(&car, Phase::Body).unwrap();
    edit(&session, base_file, vec![StructuralDecl::class("Vehicle")]);

    // The node itself survives: only results that looked names up went stale.
    assert_eq!(session.phase_of(&car), Some(Phase::Body));
    let cached: Vec<Phase> = session.cached_phases(&car).iter().collect();
    assert_eq!(cached, vec![Phase::RawShape]);

    session.resolve(&car, Phase::Supertypes).unwrap();
    assert_eq!(session.phase_of(&car), Some(Phase::Supertypes));
}

// =============================================================================
// PRECISION
// =============================================================================

#[test]
fn test_bump_invalidates_exactly_the_entries_that_read_the_file() {
    let (session, main) = single_module();
    let shapes = open(
        &session,
        main,
        0,
        vec![
            StructuralDecl::class("Shape"),
            StructuralDecl::class("Square").extends("Shape"),
        ],
    );
    let tools = open(
        &session,
        main,
        1,
        vec![StructuralDecl::function("measure").calls("area", 0)],
    );
    let isolated = open(&session, main, 2, vec![StructuralDecl::class("Clock")]);

    let decls = [
        decl(&session, shapes, "Shape"),
        decl(&session, shapes, "Square"),
        decl(&session, tools, "measure"),
        decl(&session, isolated, "Clock"),
    ];
    let mut referenced = Vec::new();
    for target in &decls {
        session.resolve_full(target).unwrap();
        for phase in session.cached_phases(target).iter() {
            let result = session.resolve(target, phase).unwrap();
            referenced.push((target.clone(), phase, result.stamp.references(shapes)));
        }
    }

    session.touch_file(shapes).unwrap();

    for (target, phase, reads_shapes) in referenced {
        assert_eq!(
            session.cached_phases(&target).contains(phase),
            !reads_shapes,
            "{} at {}",
            target,
            phase
        );
    }
    // Clock never looked anything up.
    assert_eq!(
        session.cached_phases(&decls[3]).iter().count(),
        Phase::ALL.len()
    );
}

#[test]
fn test_new_file_invalidates_module_lookups() {
    let (session, main) = single_module();
    let file = open(
        &session,
        main,
        0,
        vec![StructuralDecl::class("Car").extends("Vehicle")],
    );
    let car = decl(&session, file, "Car");

    let before = session.resolve(&car, Phase::Supertypes).unwrap();
    assert!(!before.diagnostics.is_empty());

    let vehicles = open(&session, main, 1, vec![StructuralDecl::class("Vehicle")]);
    let after = session.resolve(&car, Phase::Supertypes).unwrap();

    assert!(after.diagnostics.is_empty());
    assert_eq!(
        after.output().and_then(PhaseOutput::as_supertypes).unwrap().direct,
        vec![decl(&session, vehicles, "Vehicle")]
    );
}

#[test]
fn test_shadowing_declaration_makes_lookup_ambiguous() {
    let (session, main) = single_module();
    let first = open(&session, main, 0, vec![StructuralDecl::class("Vehicle")]);
    let user = open(
        &session,
        main,
        1,
        vec![StructuralDecl::class("Car").extends("Vehicle")],
    );
    let second = open(&session, main, 2, Vec::new());
    let car = decl(&session, user, "Car");

    assert!(session.resolve(&car, Phase::Supertypes).unwrap().diagnostics.is_empty());

    edit(&session, second, vec![StructuralDecl::class("Vehicle")]);
    let result = session.resolve(&car, Phase::Supertypes).unwrap();

    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].related.len(), 2);
    assert!(result.stamp.references(first));
    assert!(result.stamp.references(second));
}

// =============================================================================
// EVICTION
// =============================================================================

#[test]
fn test_eviction_resets_marker_and_recomputes() {
    let (session, main) = single_module();
    let file = open(&session, main, 0, vec![StructuralDecl::class("Pump")]);
    let pump = decl(&session, file, "Pump");

    let before = session.resolve(&pump, Phase::Body).unwrap();
    let evicted = session.evict_lru(1);

    // The oldest entry is raw shape; everything after it goes too.
    assert_eq!(evicted, Phase::ALL.len());
    assert_eq!(session.phase_of(&pump), None);
    assert!(session.cached_phases(&pump).is_empty());

    let after = session.resolve(&pump, Phase::Body).unwrap();
    assert!(before.same_semantics(&after));
    assert_eq!(session.phase_of(&pump), Some(Phase::Body));
}

#[test]
fn test_cache_capacity_bounds_entries() {
    let (builder, main) = single_module_builder();
    let session = builder
        .config(SessionConfig::new().with_cache_capacity(8).with_eviction_batch(0))
        .build();
    let decls: Vec<StructuralDecl> = (0..6).map(|i| StructuralDecl::class(format!("Part{}", i))).collect();
    let file = open(&session, main, 0, decls);

    for target in session.decls_in(file) {
        session.resolve(&target, Phase::Body).unwrap();
        assert!(session.stats().cached_entries <= 8);
    }
    assert!(session.stats().evictions > 0);

    for target in session.decls_in(file) {
        let cached: Vec<Phase> = session.cached_phases(&target).iter().collect();
        let prefix: Vec<Phase> = Phase::ALL[..cached.len()].to_vec();
        assert_eq!(cached, prefix, "cached phases of {} have a gap", target);
        assert_eq!(session.phase_of(&target), cached.last().copied());
    }
}

#[test]
fn test_capacity_of_one_never_strands_a_later_phase() {
    let (builder, main) = single_module_builder();
    let session = builder
        .config(SessionConfig::new().with_cache_capacity(1).with_eviction_batch(0))
        .build();
    let file = open(&session, main, 0, vec![StructuralDecl::class("Engine")]);
    let engine = decl(&session, file, "Engine");

    for phase in [Phase::Status, Phase::Body, Phase::Supertypes] {
        let result = session.resolve(&engine, phase).unwrap();
        assert_eq!(result.phase, phase);
        assert!(session.stats().cached_entries <= 1);

        let cached: Vec<Phase> = session.cached_phases(&engine).iter().collect();
        let prefix: Vec<Phase> = Phase::ALL[..cached.len()].to_vec();
        assert_eq!(cached, prefix, "cached phases after {} have a gap", phase);
        assert_eq!(session.phase_of(&engine), cached.last().copied());
    }
}
