//! Structural name lookup for phase bodies.
//!
//! Names are looked up against structural trees only; no phase has to run
//! for a name to be found. Lookup order for a simple name:
//!
//! 1. members of the requesting declaration and each enclosing declaration,
//!    innermost first;
//! 2. top-level declarations of every file in the requesting module;
//! 3. top-level public declarations of each visible dependency module,
//!    nearest first.
//!
//! The first step that yields any candidate decides the result. A qualified
//! name `a::b::c` looks up `a` as above and then walks members.
//!
//! Every file consulted is reported through the `observe` callback together
//! with the generation of the tree that was read. Recording
//! those pairs in a stamp is what makes adding a shadowing declaration in
//! another file invalidate the results that looked the name up.

use std::sync::Arc;

use super::ids::DeclId;
use super::module_graph::ModuleGraph;
use super::source::{FileEntry, SourceStore};
use crate::base::{FileId, ModuleId, split_qualified};
use crate::syntax::{DeclKind, StructuralDecl, Visibility};

/// Result of a name lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Exactly one declaration.
    Found(DeclId),
    /// Several declarations at the same level, in id order.
    Ambiguous(Vec<DeclId>),
    NotFound,
}

impl Lookup {
    /// The declaration if the lookup was unambiguous.
    pub fn decl(&self) -> Option<&DeclId> {
        match self {
            Lookup::Found(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Lookup::Ambiguous(_))
    }

    fn from_candidates(mut candidates: Vec<DeclId>) -> Option<Self> {
        match candidates.len() {
            0 => None,
            1 => candidates.pop().map(Lookup::Found),
            _ => {
                candidates.sort();
                Some(Lookup::Ambiguous(candidates))
            }
        }
    }
}

/// Receives `(file, generation)` for every file a lookup reads.
pub(crate) type Observe<'o> = dyn FnMut(FileId, u64) + 'o;

/// Read-only view over a session's trees for lookups.
#[derive(Clone, Copy)]
pub(crate) struct ScopeIndex<'a> {
    sources: &'a SourceStore,
    graph: &'a ModuleGraph,
}

impl<'a> ScopeIndex<'a> {
    pub(crate) fn new(sources: &'a SourceStore, graph: &'a ModuleGraph) -> Self {
        Self { sources, graph }
    }

    pub(crate) fn graph(&self) -> &'a ModuleGraph {
        self.graph
    }

    /// Fetch the current entry of `file` and observe its generation.
    fn read_file(&self, file: FileId, observe: &mut Observe<'_>) -> Option<Arc<FileEntry>> {
        let (generation, entry) = self.sources.read(file);
        observe(file, generation);
        entry
    }

    /// Look `name` up from the scope of `from`.
    pub(crate) fn lookup(&self, from: &DeclId, name: &str, observe: &mut Observe<'_>) -> Lookup {
        let mut segments = split_qualified(name);
        let Some(first) = segments.next() else {
            return Lookup::NotFound;
        };
        let rest: Vec<&str> = segments.collect();

        let head = self.lookup_simple(from, first, observe);
        match head {
            Lookup::Found(decl) if !rest.is_empty() => self.walk_members(decl, &rest, observe),
            other => other,
        }
    }

    fn lookup_simple(&self, from: &DeclId, name: &str, observe: &mut Observe<'_>) -> Lookup {
        if let Some(found) = self.lookup_enclosing(from, name, observe) {
            return found;
        }

        let visible = self.graph.visible_from(from.module);
        for (depth, &module) in visible.iter().enumerate() {
            let from_file = (depth == 0).then_some(from.file);
            if let Some(found) = self.lookup_top_level(module, name, from_file, observe) {
                tracing::trace!(lookup = name, from = %from, module = %module, "name found at module level");
                return found;
            }
        }
        Lookup::NotFound
    }

    /// Step 1: members of `from` and its ancestors.
    fn lookup_enclosing(
        &self,
        from: &DeclId,
        name: &str,
        observe: &mut Observe<'_>,
    ) -> Option<Lookup> {
        let entry = self.read_file(from.file, observe)?;
        if entry.module() != from.module {
            return None;
        }
        let tree = entry.tree();
        let mut scope = tree.index_of(&from.path);
        while let Some(index) = scope {
            let candidates = tree
                .named_in(Some(index), name)
                .map(|i| entry.decl_id(i))
                .collect();
            if let Some(found) = Lookup::from_candidates(candidates) {
                return Some(found);
            }
            scope = tree.parent(index);
        }
        None
    }

    /// Steps 2 and 3: top level of every file in `module`.
    ///
    /// `from_file` is set when looking inside the requesting module; it
    /// makes private declarations of that file and internal declarations of
    /// the module visible.
    fn lookup_top_level(
        &self,
        module: ModuleId,
        name: &str,
        from_file: Option<FileId>,
        observe: &mut Observe<'_>,
    ) -> Option<Lookup> {
        let mut candidates = Vec::new();
        for file in self.sources.files_in(module) {
            let Some(entry) = self.read_file(file, observe) else {
                continue;
            };
            let tree = entry.tree();
            for index in tree.named_in(None, name) {
                let visible = match tree.decl(index).visibility {
                    Visibility::Public => true,
                    Visibility::Internal => from_file.is_some(),
                    Visibility::Private => from_file == Some(file),
                };
                if visible {
                    candidates.push(entry.decl_id(index));
                }
            }
        }
        Lookup::from_candidates(candidates)
    }

    fn walk_members(&self, decl: DeclId, rest: &[&str], observe: &mut Observe<'_>) -> Lookup {
        let Some(entry) = self.read_file(decl.file, observe) else {
            return Lookup::NotFound;
        };
        let tree = entry.tree();
        let Some(mut index) = tree.index_of(&decl.path) else {
            return Lookup::NotFound;
        };
        for segment in rest {
            let matches: Vec<usize> = tree.named_in(Some(index), segment).collect();
            match matches.as_slice() {
                [] => return Lookup::NotFound,
                [single] => index = *single,
                _ => {
                    let candidates = matches.iter().map(|&i| entry.decl_id(i)).collect();
                    return Lookup::from_candidates(candidates).unwrap_or(Lookup::NotFound);
                }
            }
        }
        Lookup::Found(entry.decl_id(index))
    }

    /// Read structural facts of any declaration, observing its file.
    pub(crate) fn structure<R>(
        &self,
        decl: &DeclId,
        observe: &mut Observe<'_>,
        f: impl FnOnce(&StructuralDecl) -> R,
    ) -> Option<R> {
        let entry = self.read_file(decl.file, observe)?;
        if entry.module() != decl.module {
            return None;
        }
        let index = entry.tree().index_of(&decl.path)?;
        Some(f(entry.tree().decl(index)))
    }

    pub(crate) fn kind_of(&self, decl: &DeclId, observe: &mut Observe<'_>) -> Option<DeclKind> {
        self.structure(decl, observe, |d| d.kind)
    }
}
