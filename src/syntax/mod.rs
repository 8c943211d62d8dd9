//! Structural input: the pre-semantic shape of source files.
//!
//! Parsing is not part of this crate. Whatever produces structure hands the
//! engine one [`SyntaxTree`] per file and reports every completed edit by
//! replacing that tree.

mod tree;

pub use tree::{
    Annotation, CallRef, DeclKind, DeclPath, Modality, Param, StructuralDecl, SyntaxTree,
    Visibility,
};
