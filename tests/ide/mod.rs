//! IDE layer tests
//!
//! Tests for the `AnalysisHost` facade:
//! - Path to file mapping
//! - Edits through the host
//! - Collection with retry

pub mod tests_analysis_host;
