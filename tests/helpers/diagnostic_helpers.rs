//! Diagnostic assertion helpers.

use strata::hir::{CollectOutcome, Diagnostic};

/// Codes of `diagnostics`, in order.
pub fn codes(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics
        .iter()
        .filter_map(|d| d.code.as_deref())
        .collect()
}

pub fn has_code(diagnostics: &[Diagnostic], code: &str) -> bool {
    diagnostics.iter().any(|d| d.code.as_deref() == Some(code))
}

/// Diagnostics of a completed collection, panicking on a stale one.
pub fn completed(outcome: CollectOutcome) -> Vec<Diagnostic> {
    match outcome {
        CollectOutcome::Completed(diagnostics) => diagnostics,
        CollectOutcome::Stale(stale) => panic!("collection went stale: {:?}", stale),
    }
}

/// Assert a completed collection reported nothing.
pub fn assert_clean(outcome: CollectOutcome) {
    let diagnostics = completed(outcome);
    assert!(
        diagnostics.is_empty(),
        "Expected no diagnostics, got {}:\n{}",
        diagnostics.len(),
        diagnostics
            .iter()
            .map(|d| format!("  {:?}: {}", d.code, d.message))
            .collect::<Vec<_>>()
            .join("\n")
    );
}
