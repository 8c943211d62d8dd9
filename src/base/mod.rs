//! Foundation types for the resolution engine.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`FileId`], [`ModuleId`] - Opaque file and module identifiers
//! - [`Name`] - Cheap-to-clone identifier text
//! - [`TextRange`], [`TextSize`] - Source positions (byte offsets)
//!
//! This module has NO dependencies on other strata modules.

mod file_id;
mod name;

pub use file_id::{FileId, ModuleId};
pub use name::{Name, is_qualified, split_qualified};

// Re-export text-size types for convenience
pub use text_size;
pub use text_size::{TextRange, TextSize};
