//! HIR layer tests
//!
//! Tests for the resolution engine:
//! - Phase ordering and prerequisite resolution
//! - Cache invalidation after edits
//! - Cycle detection
//! - Concurrent resolution
//! - Diagnostics collection against one generation snapshot
//! - Module graph and library caps

pub mod tests_concurrency;
pub mod tests_cycles;
pub mod tests_invalidation;
pub mod tests_module_graph;
