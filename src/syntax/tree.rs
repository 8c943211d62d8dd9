//! Structural trees: the parsed, pre-semantic shape of one file.
//!
//! The resolution engine does not parse. Whatever produces source structure
//! hands it a [`SyntaxTree`] per file, built from nested [`StructuralDecl`]s.
//! Declarations are addressed by [`DeclPath`], the child-index path from the
//! file root, so every declaration has an identity before anything about it
//! has been resolved.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::base::{Name, TextRange, split_qualified};

// ============================================================================
// DECLARATION KINDS AND MODIFIERS
// ============================================================================

/// Kind of a declaration. Each kind has its own ordered list of phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeclKind {
    Class,
    Interface,
    Annotation,
    Function,
    Property,
    TypeAlias,
}

impl DeclKind {
    /// Every kind, in declaration order.
    pub const ALL: [DeclKind; 6] = [
        DeclKind::Class,
        DeclKind::Interface,
        DeclKind::Annotation,
        DeclKind::Function,
        DeclKind::Property,
        DeclKind::TypeAlias,
    ];

    /// Human-readable name used in diagnostics.
    pub fn display(&self) -> &'static str {
        match self {
            DeclKind::Class => "class",
            DeclKind::Interface => "interface",
            DeclKind::Annotation => "annotation",
            DeclKind::Function => "function",
            DeclKind::Property => "property",
            DeclKind::TypeAlias => "type alias",
        }
    }

    /// Whether declarations of this kind may appear in a supertype list.
    pub fn can_be_supertype(self) -> bool {
        matches!(self, DeclKind::Class | DeclKind::Interface)
    }

    /// Whether declarations of this kind name a type.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            DeclKind::Class | DeclKind::Interface | DeclKind::Annotation | DeclKind::TypeAlias
        )
    }

    /// Whether declarations of this kind can be the target of a call.
    pub fn is_callable(self) -> bool {
        matches!(
            self,
            DeclKind::Function | DeclKind::Class | DeclKind::Annotation
        )
    }
}

/// Declared visibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Public,
    Internal,
    Private,
}

/// Declared modality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Modality {
    #[default]
    Final,
    Open,
    Abstract,
}

/// A value parameter with its written type name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: Name,
    pub ty: Name,
}

/// An annotation use such as `@Deprecated("x")`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    pub name: Name,
    pub args: usize,
    pub range: TextRange,
}

/// A call written in a declaration body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRef {
    pub callee: Name,
    pub args: usize,
    pub range: TextRange,
}

// ============================================================================
// STRUCTURAL DECLARATION
// ============================================================================

/// One declaration as it appears in source, before any resolution.
///
/// Built with the chaining methods below and nested through [`member`].
/// Once a declaration is moved into a [`SyntaxTree`] its `children` are moved
/// out into the tree; use [`SyntaxTree::children`] to walk members.
///
/// [`member`]: StructuralDecl::member
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuralDecl {
    pub kind: DeclKind,
    pub name: Name,
    pub range: TextRange,
    pub visibility: Visibility,
    pub modality: Modality,
    /// Names written in the supertype list.
    pub supertypes: Vec<Name>,
    /// Value parameters (functions, primary constructors, annotations).
    pub params: Vec<Param>,
    /// Written return/property type. `None` means the type is inferred.
    pub return_type: Option<Name>,
    pub annotations: Vec<Annotation>,
    pub calls: Vec<CallRef>,
    pub children: Vec<StructuralDecl>,
}

impl StructuralDecl {
    pub fn new(kind: DeclKind, name: impl Into<Name>) -> Self {
        Self {
            kind,
            name: name.into(),
            range: TextRange::default(),
            visibility: Visibility::default(),
            modality: Modality::default(),
            supertypes: Vec::new(),
            params: Vec::new(),
            return_type: None,
            annotations: Vec::new(),
            calls: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn class(name: impl Into<Name>) -> Self {
        Self::new(DeclKind::Class, name)
    }

    pub fn interface(name: impl Into<Name>) -> Self {
        Self::new(DeclKind::Interface, name).with_modality(Modality::Abstract)
    }

    pub fn annotation(name: impl Into<Name>) -> Self {
        Self::new(DeclKind::Annotation, name)
    }

    pub fn function(name: impl Into<Name>) -> Self {
        Self::new(DeclKind::Function, name)
    }

    pub fn property(name: impl Into<Name>, ty: impl Into<Name>) -> Self {
        Self::new(DeclKind::Property, name).returns(ty)
    }

    pub fn type_alias(name: impl Into<Name>, target: impl Into<Name>) -> Self {
        Self::new(DeclKind::TypeAlias, name).returns(target)
    }

    /// Set the source range.
    pub fn at(mut self, range: TextRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }

    /// Add a supertype name.
    pub fn extends(mut self, name: impl Into<Name>) -> Self {
        self.supertypes.push(name.into());
        self
    }

    pub fn param(mut self, name: impl Into<Name>, ty: impl Into<Name>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    /// Set the written return type (or property type, or alias target).
    pub fn returns(mut self, ty: impl Into<Name>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    pub fn annotated(self, name: impl Into<Name>, args: usize) -> Self {
        self.annotated_at(name, args, TextRange::default())
    }

    pub fn annotated_at(mut self, name: impl Into<Name>, args: usize, range: TextRange) -> Self {
        self.annotations.push(Annotation {
            name: name.into(),
            args,
            range,
        });
        self
    }

    /// Record a call to `callee` with `args` arguments in the body.
    pub fn calls(self, callee: impl Into<Name>, args: usize) -> Self {
        self.calls_at(callee, args, TextRange::default())
    }

    pub fn calls_at(mut self, callee: impl Into<Name>, args: usize, range: TextRange) -> Self {
        self.calls.push(CallRef {
            callee: callee.into(),
            args,
            range,
        });
        self
    }

    /// Add a member declaration.
    pub fn member(mut self, child: StructuralDecl) -> Self {
        self.children.push(child);
        self
    }

    pub fn members(mut self, children: impl IntoIterator<Item = StructuralDecl>) -> Self {
        self.children.extend(children);
        self
    }
}

// ============================================================================
// DECLARATION PATH
// ============================================================================

/// Child-index path from the file root to a declaration.
///
/// `[1, 0]` is the first member of the second top-level declaration. Paths
/// of declarations outside an edited region survive a reparse unchanged.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclPath(Arc<[u32]>);

impl DeclPath {
    pub fn new(segments: &[u32]) -> Self {
        Self(Arc::from(segments))
    }

    /// Path of the `index`-th top-level declaration.
    pub fn root(index: u32) -> Self {
        Self::new(&[index])
    }

    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn child(&self, index: u32) -> Self {
        let mut segments = self.0.to_vec();
        segments.push(index);
        Self(Arc::from(segments))
    }

    pub fn parent(&self) -> Option<Self> {
        match self.0.len() {
            0 | 1 => None,
            n => Some(Self::new(&self.0[..n - 1])),
        }
    }
}

impl fmt::Display for DeclPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DeclPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeclPath({})", self)
    }
}

// ============================================================================
// SYNTAX TREE
// ============================================================================

#[derive(Clone, Debug)]
struct DeclLinks {
    path: DeclPath,
    parent: Option<usize>,
    children: Vec<usize>,
    /// One past the last preorder index of this declaration's subtree.
    subtree_end: usize,
}

/// The structural tree of one file, flattened in preorder.
///
/// Trees are immutable. An edit replaces the whole tree.
#[derive(Clone, Debug, Default)]
pub struct SyntaxTree {
    decls: Vec<StructuralDecl>,
    links: Vec<DeclLinks>,
    by_path: FxHashMap<DeclPath, usize>,
    roots: Vec<usize>,
}

impl SyntaxTree {
    /// Build a tree from top-level declarations.
    pub fn new(roots: Vec<StructuralDecl>) -> Self {
        let mut tree = Self::default();
        for (i, decl) in roots.into_iter().enumerate() {
            let index = tree.flatten(decl, DeclPath::root(i as u32), None);
            tree.roots.push(index);
        }
        tree
    }

    fn flatten(&mut self, mut decl: StructuralDecl, path: DeclPath, parent: Option<usize>) -> usize {
        let index = self.decls.len();
        let children = std::mem::take(&mut decl.children);
        self.decls.push(decl);
        self.links.push(DeclLinks {
            path: path.clone(),
            parent,
            children: Vec::with_capacity(children.len()),
            subtree_end: index + 1,
        });
        for (i, child) in children.into_iter().enumerate() {
            let child_index = self.flatten(child, path.child(i as u32), Some(index));
            self.links[index].children.push(child_index);
        }
        self.links[index].subtree_end = self.decls.len();
        self.by_path.insert(path, index);
        index
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// The declaration at a preorder index.
    ///
    /// Panics if `index` is out of bounds.
    pub fn decl(&self, index: usize) -> &StructuralDecl {
        &self.decls[index]
    }

    pub fn path(&self, index: usize) -> &DeclPath {
        &self.links[index].path
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.links[index].parent
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.links[index].children
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn index_of(&self, path: &DeclPath) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    /// Preorder indices of `index` and all of its descendants.
    pub fn subtree(&self, index: usize) -> Range<usize> {
        index..self.links[index].subtree_end
    }

    /// All declarations in preorder (structural order).
    pub fn iter(&self) -> impl Iterator<Item = (usize, &StructuralDecl)> {
        self.decls.iter().enumerate()
    }

    /// Direct members of `scope` (or top-level declarations for `None`) named `name`.
    pub fn named_in<'a>(
        &'a self,
        scope: Option<usize>,
        name: &'a str,
    ) -> impl Iterator<Item = usize> + 'a {
        let candidates = match scope {
            Some(index) => self.children(index),
            None => self.roots(),
        };
        candidates
            .iter()
            .copied()
            .filter(move |&index| self.decls[index].name == name)
    }

    /// Find a declaration by its qualified name from the file root (`Outer::inner`).
    ///
    /// Returns the first match when several members share a name.
    pub fn find(&self, qualified: &str) -> Option<usize> {
        let mut scope = None;
        for segment in split_qualified(qualified) {
            scope = Some(self.named_in(scope, segment).next()?);
        }
        scope
    }
}
