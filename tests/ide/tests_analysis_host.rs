//! AnalysisHost tests: paths, edits and retrying collection.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use strata::hir::{
    Checker, CollectOutcome, DiagnosticSink, ModuleGraph, Phase, ResolvedDecl, Session,
    SessionConfig, StructuralUnit, codes,
};
use strata::ide::AnalysisHost;
use strata::syntax::{DeclKind, StructuralDecl, SyntaxTree};

use crate::helpers::diagnostic_helpers::*;

fn tree(decls: Vec<StructuralDecl>) -> SyntaxTree {
    SyntaxTree::new(decls)
}

#[test]
fn test_paths_map_to_stable_file_ids() {
    let (graph, main) = ModuleGraph::single("main");
    let mut host = AnalysisHost::new(graph);

    let car = host
        .set_file("car.kt", main, tree(vec![StructuralDecl::class("Car")]))
        .unwrap();
    let analysis = host.analysis();

    assert_eq!(analysis.file_id("car.kt"), Some(car));
    assert_eq!(analysis.file_path(car), Some("car.kt"));
    assert!(analysis.decl("car.kt", "Car").is_some());
    assert!(analysis.decl("car.kt", "Boat").is_none());
    assert!(analysis.decl("boat.kt", "Car").is_none());
}

#[test]
fn test_edit_through_host_is_seen_by_next_query() {
    let (graph, main) = ModuleGraph::single("main");
    let mut host = AnalysisHost::new(graph);
    host.set_file("base.kt", main, tree(Vec::new())).unwrap();
    let user = host
        .set_file(
            "user.kt",
            main,
            tree(vec![StructuralDecl::class("Car").extends("Vehicle")]),
        )
        .unwrap();

    let before = completed(host.analysis().collect_file(user).unwrap());
    assert!(has_code(&before, codes::UNDEFINED_REFERENCE));

    host.set_file("base.kt", main, tree(vec![StructuralDecl::class("Vehicle")]))
        .unwrap();
    let analysis = host.analysis();
    let after = completed(analysis.collect_file(user).unwrap());
    assert!(after.is_empty(), "unexpected: {:?}", after);

    let car = analysis.decl("user.kt", "Car").unwrap();
    assert!(analysis.resolve(&car, Phase::Supertypes).unwrap().diagnostics.is_empty());
}

#[test]
fn test_removed_file_leaves_dangling_references() {
    let (graph, main) = ModuleGraph::single("main");
    let mut host = AnalysisHost::new(graph);
    host.set_file("base.kt", main, tree(vec![StructuralDecl::class("Vehicle")]))
        .unwrap();
    let user = host
        .set_file(
            "user.kt",
            main,
            tree(vec![StructuralDecl::class("Car").extends("Vehicle")]),
        )
        .unwrap();
    assert_clean(host.analysis().collect_file(user).unwrap());

    assert!(host.remove_file("base.kt"));

    let diagnostics = completed(host.analysis().collect_file(user).unwrap());
    assert_eq!(codes(&diagnostics), vec![codes::UNDEFINED_REFERENCE]);
}

// =============================================================================
// RETRY
// =============================================================================

/// Touches the checked file during the first `budget` collections.
struct Flaky {
    session: Weak<Session>,
    budget: AtomicUsize,
}

impl Checker for Flaky {
    fn check(&self, decl: &ResolvedDecl<'_>, _sink: &mut DiagnosticSink) {
        if self
            .budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            if let Some(session) = self.session.upgrade() {
                session.touch_file(decl.id().file).unwrap();
            }
        }
    }
}

fn flaky_host(budget: usize, attempts: usize) -> (AnalysisHost, strata::base::FileId) {
    let (graph, main) = ModuleGraph::single("main");
    let session = Session::builder(graph)
        .config(SessionConfig::new().with_max_collect_attempts(attempts))
        .build();
    let mut host = AnalysisHost::with_session(session);
    let flaky = Flaky {
        session: Arc::downgrade(host.session()),
        budget: AtomicUsize::new(budget),
    };
    host.session().register_checker(DeclKind::Class, flaky);

    let file = host
        .set_file("gear.kt", main, tree(vec![StructuralDecl::class("Gear")]))
        .unwrap();
    (host, file)
}

#[test]
fn test_retry_recovers_from_stale_collection() {
    let (host, file) = flaky_host(2, 3);

    let outcome = host.analysis().collect_with_retry(StructuralUnit::File(file)).unwrap();

    assert!(outcome.is_completed());
    let stats = host.analysis().stats();
    assert_eq!(stats.aborted_collections, 2);
    assert_eq!(stats.collections, 1);
}

#[test]
fn test_retry_gives_up_after_budget() {
    let (host, file) = flaky_host(5, 2);

    let outcome = host.analysis().collect_with_retry(StructuralUnit::File(file)).unwrap();

    assert!(matches!(outcome, CollectOutcome::Stale(stale) if stale.file == file));
    assert_eq!(host.analysis().stats().aborted_collections, 2);
}

#[test]
fn test_host_session_is_shareable_across_threads() {
    let (graph, main) = ModuleGraph::single("main");
    let mut host = AnalysisHost::new(graph);
    let file = host
        .set_file("gear.kt", main, tree(vec![StructuralDecl::class("Gear")]))
        .unwrap();
    let session = Arc::clone(host.session());
    let gear = host.analysis().decl("gear.kt", "Gear").unwrap();

    let worker = std::thread::spawn(move || session.resolve(&gear, Phase::Body).map(|r| r.phase));

    assert_eq!(worker.join().unwrap(), Ok(Phase::Body));
    assert_eq!(host.session().stats().open_files, 1);
    assert!(host.has_file("gear.kt"));
    assert_eq!(host.get_file_id("gear.kt"), Some(file));
}
