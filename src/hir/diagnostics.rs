//! Diagnostics - semantic error reporting and the checker registration point.
//!
//! Phase bodies report recoverable problems (unresolved references, arity
//! mismatches) as [`Diagnostic`] values stored in their results. Checkers
//! plugged into a [`CheckerRegistry`] run later, during collection, against
//! fully resolved declarations.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::collect::{ResolvedDecl, ResolvedUnit};
use super::ids::DeclId;
use crate::base::{FileId, TextRange};
use crate::syntax::DeclKind;

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

/// A diagnostic message with location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// The file containing this diagnostic.
    pub file: FileId,
    /// Byte range in the file.
    pub range: TextRange,
    /// The declaration being resolved or checked when this was reported.
    pub decl: Option<DeclId>,
    /// Severity level.
    pub severity: Severity,
    /// Error/warning code (e.g., "E0001").
    pub code: Option<Arc<str>>,
    /// The diagnostic message.
    pub message: Arc<str>,
    /// Optional related information.
    pub related: Vec<RelatedInfo>,
}

/// Related information for a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatedInfo {
    pub file: FileId,
    pub range: TextRange,
    pub message: Arc<str>,
}

impl RelatedInfo {
    pub fn new(file: FileId, range: TextRange, message: impl Into<Arc<str>>) -> Self {
        Self {
            file,
            range,
            message: message.into(),
        }
    }
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(file: FileId, range: TextRange, message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Error, file, range, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(file: FileId, range: TextRange, message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Warning, file, range, message)
    }

    fn new(
        severity: Severity,
        file: FileId,
        range: TextRange,
        message: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            file,
            range,
            decl: None,
            severity,
            code: None,
            message: message.into(),
            related: Vec::new(),
        }
    }

    /// Attach the declaration this diagnostic belongs to.
    pub fn for_decl(mut self, decl: &DeclId) -> Self {
        self.decl = Some(decl.clone());
        self
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Add related information.
    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

/// Standard diagnostic codes.
///
/// ## Error Code Ranges
///
/// - **E0001-E0099**: Semantic analysis errors (resolution, types, validation)
/// - **W0001-W0099**: Warnings (conventions)
pub mod codes {
    /// Undefined reference (name not found).
    pub const UNDEFINED_REFERENCE: &str = "E0001";
    /// Ambiguous reference (multiple candidates).
    pub const AMBIGUOUS_REFERENCE: &str = "E0002";
    /// Duplicate definition.
    pub const DUPLICATE_DEFINITION: &str = "E0004";
    /// Wrong number of arguments.
    pub const ARGUMENT_COUNT_MISMATCH: &str = "E0005";
    /// Invalid specialization relationship.
    pub const INVALID_SPECIALIZATION: &str = "E0006";
    /// Circular dependency detected.
    pub const CIRCULAR_DEPENDENCY: &str = "E0007";
    /// Invalid type.
    pub const INVALID_TYPE: &str = "E0008";
    /// Call target cannot be called.
    pub const NOT_CALLABLE: &str = "E0009";

    /// Naming convention violation.
    pub const NAMING_CONVENTION: &str = "W0003";
}

// ============================================================================
// DIAGNOSTIC SINK
// ============================================================================

/// Collects diagnostics during a phase body or a checker run.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    /// Create a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add an undefined reference error.
    pub fn undefined_reference(&mut self, file: FileId, range: TextRange, decl: &DeclId, name: &str) {
        self.add(
            Diagnostic::error(file, range, format!("undefined reference: '{}'", name))
                .for_decl(decl)
                .with_code(codes::UNDEFINED_REFERENCE),
        );
    }

    /// Add an ambiguous reference error with one related entry per candidate.
    pub fn ambiguous_reference(
        &mut self,
        file: FileId,
        range: TextRange,
        decl: &DeclId,
        name: &str,
        candidates: Vec<RelatedInfo>,
    ) {
        let mut diag = Diagnostic::error(
            file,
            range,
            format!(
                "ambiguous reference: '{}' matches {} declarations",
                name,
                candidates.len()
            ),
        )
        .for_decl(decl)
        .with_code(codes::AMBIGUOUS_REFERENCE);
        for candidate in candidates {
            diag = diag.with_related(candidate);
        }
        self.add(diag);
    }

    /// Add a duplicate definition error.
    pub fn duplicate_definition(
        &mut self,
        file: FileId,
        range: TextRange,
        decl: &DeclId,
        name: &str,
        existing: RelatedInfo,
    ) {
        self.add(
            Diagnostic::error(
                file,
                range,
                format!("duplicate definition: '{}' is already defined", name),
            )
            .for_decl(decl)
            .with_code(codes::DUPLICATE_DEFINITION)
            .with_related(existing),
        );
    }

    /// Add an argument count mismatch error.
    pub fn argument_count_mismatch(
        &mut self,
        file: FileId,
        range: TextRange,
        decl: &DeclId,
        callee: &str,
        expected: usize,
        found: usize,
    ) {
        self.add(
            Diagnostic::error(
                file,
                range,
                format!(
                    "'{}' expects {} argument(s), found {}",
                    callee, expected, found
                ),
            )
            .for_decl(decl)
            .with_code(codes::ARGUMENT_COUNT_MISMATCH),
        );
    }

    /// Add an invalid type error (`name` resolved, but not to a usable kind).
    pub fn invalid_type(
        &mut self,
        file: FileId,
        range: TextRange,
        decl: &DeclId,
        name: &str,
        found: DeclKind,
    ) {
        self.add(
            Diagnostic::error(
                file,
                range,
                format!("'{}' is a {}, not a type", name, found.display()),
            )
            .for_decl(decl)
            .with_code(codes::INVALID_TYPE),
        );
    }

    /// Add a cyclic dependency error.
    pub fn cyclic_dependency(&mut self, file: FileId, range: TextRange, decl: &DeclId, what: &str) {
        self.add(
            Diagnostic::error(file, range, format!("cyclic dependency: {}", what))
                .for_decl(decl)
                .with_code(codes::CIRCULAR_DEPENDENCY),
        );
    }

    /// Get all diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get diagnostics for a specific file.
    pub fn diagnostics_for_file(&self, file: FileId) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.file == file).collect()
    }

    /// Get the number of errors.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Get the number of warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Get the collected diagnostics, deduplicated.
    pub fn finish(self) -> Vec<Diagnostic> {
        let mut seen = FxHashSet::default();
        self.diagnostics
            .into_iter()
            .filter(|d| {
                // Deduplicate by (file, range, decl, code, message)
                let key = (
                    d.file,
                    d.range,
                    d.decl.clone(),
                    d.code.clone(),
                    d.message.clone(),
                );
                seen.insert(key)
            })
            .collect()
    }
}

impl Extend<Diagnostic> for DiagnosticSink {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.diagnostics.extend(iter);
    }
}

// ============================================================================
// CHECKERS
// ============================================================================

/// A rule run against one fully resolved declaration.
pub trait Checker: Send + Sync {
    fn check(&self, decl: &ResolvedDecl<'_>, sink: &mut DiagnosticSink);
}

/// A rule that needs every declaration of a structural unit resolved first.
pub trait UnitChecker: Send + Sync {
    fn check_unit(&self, unit: &ResolvedUnit<'_>, sink: &mut DiagnosticSink);
}

/// Registered checkers, keyed by declaration kind.
#[derive(Clone, Default)]
pub struct CheckerRegistry {
    by_kind: FxHashMap<DeclKind, Vec<Arc<dyn Checker>>>,
    unit: Vec<Arc<dyn UnitChecker>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in checks registered.
    pub fn with_builtin_checks() -> Self {
        let mut registry = Self::new();
        let naming: Arc<dyn Checker> = Arc::new(NamingConventionChecker);
        registry.register_shared(DeclKind::ALL, naming);
        registry.register_unit(DuplicateDefinitionChecker);
        registry
    }

    /// Register a checker for one kind.
    pub fn register(&mut self, kind: DeclKind, checker: impl Checker + 'static) {
        self.by_kind.entry(kind).or_default().push(Arc::new(checker));
    }

    /// Register one checker instance for several kinds.
    pub fn register_shared(
        &mut self,
        kinds: impl IntoIterator<Item = DeclKind>,
        checker: Arc<dyn Checker>,
    ) {
        for kind in kinds {
            self.by_kind
                .entry(kind)
                .or_default()
                .push(Arc::clone(&checker));
        }
    }

    /// Register a whole-unit checker.
    pub fn register_unit(&mut self, checker: impl UnitChecker + 'static) {
        self.unit.push(Arc::new(checker));
    }

    pub fn checkers_for(&self, kind: DeclKind) -> &[Arc<dyn Checker>] {
        self.by_kind
            .get(&kind)
            .map(|c| c.as_slice())
            .unwrap_or_default()
    }

    pub fn unit_checkers(&self) -> &[Arc<dyn UnitChecker>] {
        &self.unit
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum::<usize>() + self.unit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CheckerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckerRegistry")
            .field("kinds", &self.by_kind.len())
            .field("unit", &self.unit.len())
            .finish()
    }
}

// ============================================================================
// BUILT-IN CHECKERS
// ============================================================================

/// Reports members of the same scope that share a name.
///
/// Needs the whole unit: a duplicate can only be judged once every sibling
/// has been seen.
#[derive(Clone, Copy, Debug, Default)]
pub struct DuplicateDefinitionChecker;

impl UnitChecker for DuplicateDefinitionChecker {
    fn check_unit(&self, unit: &ResolvedUnit<'_>, sink: &mut DiagnosticSink) {
        let mut by_scope: FxHashMap<(Option<DeclId>, &str), Vec<&ResolvedDecl<'_>>> =
            FxHashMap::default();
        for decl in unit.decls() {
            by_scope
                .entry((decl.id().parent(), decl.name()))
                .or_default()
                .push(decl);
        }

        let mut groups: Vec<_> = by_scope.into_values().filter(|d| d.len() > 1).collect();
        groups.sort_by(|a, b| a[0].id().cmp(b[0].id()));

        for defs in groups {
            // Report on all but the first definition
            let first = defs[0];
            for dup in &defs[1..] {
                sink.duplicate_definition(
                    dup.id().file,
                    dup.structure().range,
                    dup.id(),
                    dup.name(),
                    RelatedInfo::new(
                        first.id().file,
                        first.structure().range,
                        format!("previous definition of '{}'", first.name()),
                    ),
                );
            }
        }
    }
}

/// Types are `UpperCamelCase`, everything else starts lowercase.
#[derive(Clone, Copy, Debug, Default)]
pub struct NamingConventionChecker;

impl Checker for NamingConventionChecker {
    fn check(&self, decl: &ResolvedDecl<'_>, sink: &mut DiagnosticSink) {
        let name = decl.name();
        let Some(first) = name.chars().next() else {
            return;
        };
        let (ok, expected) = if decl.kind().is_type() {
            (first.is_uppercase(), "start with an uppercase letter")
        } else {
            (!first.is_uppercase(), "start with a lowercase letter")
        };
        if !ok {
            sink.add(
                Diagnostic::warning(
                    decl.id().file,
                    decl.structure().range,
                    format!("{} name '{}' should {}", decl.kind().display(), name, expected),
                )
                .for_decl(decl.id())
                .with_code(codes::NAMING_CONVENTION),
            );
        }
    }
}
