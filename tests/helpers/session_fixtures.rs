//! Session fixtures: graphs, files and declaration lookup.

use strata::base::{FileId, ModuleId};
use strata::hir::{DeclId, ModuleGraph, ModuleOrigin, Session, SessionBuilder};
use strata::syntax::{StructuralDecl, SyntaxTree};

/// A session over a single source module named `main`.
pub fn single_module() -> (Session, ModuleId) {
    let (graph, main) = ModuleGraph::single("main");
    (Session::new(graph), main)
}

/// A builder over a single source module, for custom bodies or config.
pub fn single_module_builder() -> (SessionBuilder, ModuleId) {
    let (graph, main) = ModuleGraph::single("main");
    (Session::builder(graph), main)
}

/// `app` (source) depending on `stdlib` (library).
pub fn app_with_library() -> (ModuleGraph, ModuleId, ModuleId) {
    let mut builder = ModuleGraph::builder();
    let stdlib = builder
        .add_module("stdlib", ModuleOrigin::Library)
        .expect("stdlib");
    let app = builder.add_module("app", ModuleOrigin::Source).expect("app");
    builder.add_dependency(app, stdlib).expect("edge");
    (builder.build().expect("valid graph"), app, stdlib)
}

/// Open `decls` as file number `index` in `module`.
pub fn open(session: &Session, module: ModuleId, index: u32, decls: Vec<StructuralDecl>) -> FileId {
    let file = FileId::new(index);
    session
        .open_file(module, file, SyntaxTree::new(decls))
        .expect("file opens");
    file
}

/// Replace the structure of `file`.
pub fn edit(session: &Session, file: FileId, decls: Vec<StructuralDecl>) -> u64 {
    session
        .file_changed(file, SyntaxTree::new(decls))
        .expect("file is open")
}

/// Look a declaration up by qualified name, panicking if it is missing.
pub fn decl(session: &Session, file: FileId, qualified: &str) -> DeclId {
    session
        .find_decl(file, qualified)
        .unwrap_or_else(|| panic!("no declaration '{}' in {}", qualified, file))
}
