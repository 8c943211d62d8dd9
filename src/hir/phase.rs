//! Resolution phases and per-kind phase schedules.
//!
//! [`Phase`] is one global total order. A [`PhaseSchedule`] declares, once,
//! which of those phases each [`DeclKind`] passes through and where its
//! signature/body boundary lies. The runner never executes a phase for a
//! declaration before every earlier phase in that declaration's schedule.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::syntax::DeclKind;

// ============================================================================
// PHASE
// ============================================================================

/// One ordered step of semantic resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Name, kind and member list.
    RawShape,
    /// Direct and transitive supertypes.
    Supertypes,
    /// Visibility and modality.
    Status,
    /// Parameter and return types.
    Signature,
    /// Resolved annotation uses.
    AnnotationArguments,
    /// Resolved body references.
    Body,
}

impl Phase {
    /// Every phase, in order.
    pub const ALL: [Phase; 6] = [
        Phase::RawShape,
        Phase::Supertypes,
        Phase::Status,
        Phase::Signature,
        Phase::AnnotationArguments,
        Phase::Body,
    ];

    /// Position in the global order.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Phase> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::RawShape => "raw-shape",
            Phase::Supertypes => "supertypes",
            Phase::Status => "status",
            Phase::Signature => "signature",
            Phase::AnnotationArguments => "annotation-arguments",
            Phase::Body => "body",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of phases stored as a bitmask; iterates in phase order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PhaseSet(u8);

impl PhaseSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, phase: Phase) -> bool {
        self.0 & (1 << phase.index()) != 0
    }

    pub fn insert(&mut self, phase: Phase) {
        self.0 |= 1 << phase.index();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Phase> {
        Phase::ALL.into_iter().filter(move |&p| self.contains(p))
    }

    pub fn first(self) -> Option<Phase> {
        self.iter().next()
    }

    pub fn last(self) -> Option<Phase> {
        self.iter().last()
    }
}

impl FromIterator<Phase> for PhaseSet {
    fn from_iter<I: IntoIterator<Item = Phase>>(iter: I) -> Self {
        let mut set = PhaseSet::empty();
        for phase in iter {
            set.insert(phase);
        }
        set
    }
}

impl fmt::Debug for PhaseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// ============================================================================
// SCHEDULE
// ============================================================================

/// Phases of one declaration kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindSchedule {
    phases: PhaseSet,
    /// Last phase that counts as "signature level" for this kind.
    signature_boundary: Phase,
}

impl KindSchedule {
    pub fn phases(&self) -> PhaseSet {
        self.phases
    }

    pub fn signature_boundary(&self) -> Phase {
        self.signature_boundary
    }
}

/// Ordered phases per declaration kind.
///
/// Where exactly "signature" ends and "body" begins is a per-kind
/// configuration point ([`with_signature_boundary`]) rather than a constant:
/// a schedule for a language with inferred return types can move a kind's
/// boundary past the phase that infers them.
///
/// [`with_signature_boundary`]: PhaseSchedule::with_signature_boundary
#[derive(Clone, Debug)]
pub struct PhaseSchedule {
    kinds: FxHashMap<DeclKind, KindSchedule>,
}

impl Default for PhaseSchedule {
    fn default() -> Self {
        Self::standard()
    }
}

impl PhaseSchedule {
    /// The default schedule.
    ///
    /// ```text
    /// class, interface   raw-shape → supertypes → status → signature → annotation-arguments → body
    /// function, property raw-shape → status → signature → annotation-arguments → body
    /// annotation         raw-shape → status → signature
    /// type alias         raw-shape → signature
    /// ```
    pub fn standard() -> Self {
        use Phase::*;

        let classifier = [
            RawShape,
            Supertypes,
            Status,
            Signature,
            AnnotationArguments,
            Body,
        ];
        let member = [RawShape, Status, Signature, AnnotationArguments, Body];
        Self {
            kinds: FxHashMap::default(),
        }
        .with_kind(DeclKind::Class, classifier)
        .with_kind(DeclKind::Interface, classifier)
        .with_kind(DeclKind::Function, member)
        .with_kind(DeclKind::Property, member)
        .with_kind(DeclKind::Annotation, [RawShape, Status, Signature])
        .with_kind(DeclKind::TypeAlias, [RawShape, Signature])
    }

    /// Declare the phases of `kind`. `RawShape` is always included.
    ///
    /// The signature boundary defaults to the last declared phase not after
    /// [`Phase::Signature`].
    pub fn with_kind(mut self, kind: DeclKind, phases: impl IntoIterator<Item = Phase>) -> Self {
        let mut set: PhaseSet = phases.into_iter().collect();
        set.insert(Phase::RawShape);
        let signature_boundary = set
            .iter()
            .filter(|&p| p <= Phase::Signature)
            .last()
            .unwrap_or(Phase::RawShape);
        self.kinds.insert(
            kind,
            KindSchedule {
                phases: set,
                signature_boundary,
            },
        );
        self
    }

    /// Move the signature boundary of `kind`.
    ///
    /// The boundary is clamped to the last declared phase at or before `phase`.
    pub fn with_signature_boundary(mut self, kind: DeclKind, phase: Phase) -> Self {
        if let Some(schedule) = self.kinds.get_mut(&kind) {
            schedule.signature_boundary = schedule
                .phases
                .iter()
                .filter(|&p| p <= phase)
                .last()
                .unwrap_or(Phase::RawShape);
        }
        self
    }

    pub fn kind(&self, kind: DeclKind) -> Option<&KindSchedule> {
        self.kinds.get(&kind)
    }

    /// Declared phases of `kind` in order (empty for unscheduled kinds).
    pub fn phases(&self, kind: DeclKind) -> PhaseSet {
        self.kinds
            .get(&kind)
            .map(|s| s.phases)
            .unwrap_or_default()
    }

    pub fn declares(&self, kind: DeclKind, phase: Phase) -> bool {
        self.phases(kind).contains(phase)
    }

    /// The declared phase immediately before `phase` for `kind`.
    pub fn previous(&self, kind: DeclKind, phase: Phase) -> Option<Phase> {
        self.phases(kind).iter().take_while(|&p| p < phase).last()
    }

    /// The last declared phase of `kind`.
    pub fn full_phase(&self, kind: DeclKind) -> Option<Phase> {
        self.phases(kind).last()
    }

    pub fn signature_boundary(&self, kind: DeclKind) -> Option<Phase> {
        self.kinds.get(&kind).map(|s| s.signature_boundary)
    }
}
