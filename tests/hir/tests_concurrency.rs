//! Concurrency tests: shared in-flight computations and edits under load.

use std::sync::{Arc, Barrier};
use std::thread;

use strata::hir::{Phase, PhaseOutput, Session, StructuralUnit};
use strata::syntax::StructuralDecl;

use crate::helpers::counting_bodies::CountingBodies;
use crate::helpers::session_fixtures::*;

fn hierarchy() -> Vec<StructuralDecl> {
    vec![
        StructuralDecl::interface("Drivable"),
        StructuralDecl::class("Vehicle").extends("Drivable"),
        StructuralDecl::class("Car")
            .extends("Vehicle")
            .member(StructuralDecl::function("honk").calls("beep", 2)),
        StructuralDecl::function("beep").param("pitch", "Int").param("length", "Int"),
    ]
}

// =============================================================================
// SCENARIO D: CONCURRENT FIRST REQUESTS
// =============================================================================

#[test]
fn test_concurrent_callers_share_one_execution() {
    const CALLERS: usize = 8;

    let bodies = CountingBodies::new();
    let (builder, main) = single_module_builder();
    let session = builder.bodies(bodies.clone()).build();
    let file = open(&session, main, 0, hierarchy());
    let car = decl(&session, file, "Car");

    let barrier = Barrier::new(CALLERS);
    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    session.resolve(&car, Phase::Body).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(bodies.runs(&car, Phase::Body), 1);
    assert!(bodies.repeated().is_empty(), "recomputed: {:?}", bodies.repeated());
    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
}

#[test]
fn test_concurrent_collections_agree() {
    let bodies = CountingBodies::new();
    let (builder, main) = single_module_builder();
    let session = builder.bodies(bodies.clone()).build();
    let file = open(&session, main, 0, hierarchy());

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| session.collect(StructuralUnit::File(file)).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for outcome in &outcomes {
        assert_eq!(outcome, &outcomes[0]);
        assert!(outcome.is_completed());
    }
    assert!(bodies.repeated().is_empty());
}

#[test]
fn test_cross_thread_cycle_terminates() {
    let (session, main) = single_module();
    let file = open(
        &session,
        main,
        0,
        vec![
            StructuralDecl::class("Left").extends("Right"),
            StructuralDecl::class("Right").extends("Left"),
        ],
    );
    let left = decl(&session, file, "Left");
    let right = decl(&session, file, "Right");

    let barrier = Barrier::new(2);
    let (l, r) = thread::scope(|scope| {
        let l = scope.spawn(|| {
            barrier.wait();
            session.resolve(&left, Phase::Supertypes).unwrap()
        });
        let r = scope.spawn(|| {
            barrier.wait();
            session.resolve(&right, Phase::Supertypes).unwrap()
        });
        (l.join().unwrap(), r.join().unwrap())
    });

    assert!(l.is_cyclic());
    assert!(r.is_cyclic());
    assert_eq!(session.in_flight(), 0);
}

// =============================================================================
// EDITS WHILE RESOLVING
// =============================================================================

#[test]
fn test_results_under_concurrent_edits_are_never_newer_than_their_stamps() {
    let (session, main) = single_module();
    let file = open(&session, main, 0, hierarchy());

    thread::scope(|scope| {
        let editor = scope.spawn(|| {
            for _ in 0..20 {
                edit(&session, file, hierarchy());
            }
        });
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let session: &Session = &session;
                scope.spawn(move || {
                    for _ in 0..20 {
                        let car = decl(session, file, "Car");
                        let result = session.resolve(&car, Phase::Body).unwrap();
                        let stamped = result.stamp.generation_of(file).unwrap();
                        assert!(stamped <= session.generation_of(file));
                    }
                })
            })
            .collect();
        editor.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    });

    let car = decl(&session, file, "Car");
    let settled = session.resolve(&car, Phase::Body).unwrap();
    assert_eq!(
        settled.stamp.generation_of(file),
        Some(session.generation_of(file))
    );
}

#[test]
fn test_renamed_tree_is_never_paired_with_an_older_generation() {
    const EDITS: u64 = 200;

    let (session, main) = single_module();
    let file = open(&session, main, 0, vec![StructuralDecl::class("V1")]);
    let target = decl(&session, file, "V1");

    thread::scope(|scope| {
        let editor = scope.spawn(|| {
            for _ in 0..EDITS {
                let next = session.generation_of(file) + 1;
                let renamed = StructuralDecl::class(format!("V{}", next));
                assert_eq!(edit(&session, file, vec![renamed]), next);
            }
        });
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let session: &Session = &session;
                let target = target.clone();
                scope.spawn(move || {
                    for _ in 0..EDITS {
                        let result = session.resolve(&target, Phase::RawShape).unwrap();
                        let stamped = result.stamp.generation_of(file).unwrap();
                        let shape = result.output().and_then(PhaseOutput::as_raw_shape).unwrap();
                        assert_eq!(shape.name, format!("V{}", stamped));
                    }
                })
            })
            .collect();
        editor.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    });
}
