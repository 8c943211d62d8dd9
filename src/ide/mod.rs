//! IDE layer - the editor-facing entry points.
//!
//! Editors talk to the engine through [`AnalysisHost`]: it names files by
//! path, forwards edits to the session, and hands out [`Analysis`] views for
//! `resolve` and `collect` requests.
//!
//! ## Usage
//!
//! ```ignore
//! use strata::ide::AnalysisHost;
//!
//! let mut host = AnalysisHost::new(graph);
//! let file = host.set_file("src/car.kt", main, tree)?;
//!
//! let analysis = host.analysis();
//! let outcome = analysis.collect_file(file)?;
//! ```

mod analysis;

pub use analysis::{Analysis, AnalysisHost};
