//! Phase runner - brings a declaration to a target phase.
//!
//! `ensure(decl, phase)`:
//!
//! 1. A valid cache entry is returned as is.
//! 2. Otherwise the previous phase of the declaration is ensured first.
//! 3. The key is claimed in the in-flight set; if another invocation owns
//!    it, the caller waits and then re-checks the cache.
//! 4. The body's prerequisites are ensured, pinned in the cache, and folded
//!    into the new result's stamp.
//! 5. The body runs, the result is cached and the node's marker advances.
//!
//! The previous phase stays pinned until the new result is cached, so
//! eviction can never leave a later phase without its earlier ones. Cache
//! capacity is enforced once the top-level request has finished.
//!
//! A key that is requested while it is already on the requesting
//! invocation's stack (or, across threads, while the wait chain leads back
//! to the requester) closes a cycle. Every frame from the repeated key to the
//! top of the stack then ends in a cached `Outcome::Cyclic` instead of
//! running its body.

use std::sync::Arc;
use std::time::Instant;

use super::bodies::{PhaseContext, PhaseInputs};
use super::cache::{CacheKey, CacheLookup, PinGuard, ResolutionCache};
use super::error::ResolveError;
use super::flight::{Claim, InvocationId};
use super::ids::DeclId;
use super::node::DeclNode;
use super::output::{CycleInfo, Outcome, PhaseResult};
use super::phase::Phase;
use super::scope::ScopeIndex;
use super::session::Session;
use super::stamp::StampBuilder;

/// Result of ensuring one key.
#[derive(Debug)]
pub(crate) enum Demand {
    Ready(Arc<PhaseResult>),
    /// The key closes a cycle; the listed keys are its members.
    Cycle(Vec<CacheKey>),
}

#[derive(Debug)]
struct Frame {
    key: CacheKey,
    cycle: Option<Vec<CacheKey>>,
}

/// Keys being computed by one invocation, outermost first.
#[derive(Debug)]
pub(crate) struct ResolveStack {
    invocation: InvocationId,
    frames: Vec<Frame>,
}

impl ResolveStack {
    pub(crate) fn new(invocation: InvocationId) -> Self {
        Self {
            invocation,
            frames: Vec::new(),
        }
    }

    fn position(&self, key: &CacheKey) -> Option<usize> {
        self.frames.iter().position(|frame| &frame.key == key)
    }

    /// Mark frames `from..` as members of a cycle made of `members`.
    fn mark_cyclic_from(&mut self, from: usize, members: &[CacheKey]) {
        for frame in &mut self.frames[from..] {
            let cycle = frame.cycle.get_or_insert_with(Vec::new);
            for key in members {
                if !cycle.contains(key) {
                    cycle.push(key.clone());
                }
            }
        }
    }

    fn top_is_cyclic(&self) -> bool {
        self.frames.last().is_some_and(|frame| frame.cycle.is_some())
    }

    fn keys_from(&self, from: usize) -> Vec<CacheKey> {
        self.frames[from..].iter().map(|f| f.key.clone()).collect()
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }
}

pub(crate) struct PhaseRunner<'s> {
    session: &'s Session,
}

impl<'s> PhaseRunner<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    fn node(&self, decl: &DeclId) -> Result<Arc<DeclNode>, ResolveError> {
        let sources = &self.session.sources;
        if !sources.contains(decl.file) {
            return Err(ResolveError::UnknownFile(decl.file));
        }
        sources
            .node(decl)
            .ok_or_else(|| ResolveError::UnknownDeclaration(decl.clone()))
    }

    /// Check that `phase` exists and is reachable for `node`.
    fn check_reachable(&self, node: &DeclNode, phase: Phase) -> Result<(), ResolveError> {
        let decl = node.id();
        let kind = node.kind();
        let graph = &self.session.graph;
        if !graph.schedule().declares(kind, phase) {
            return Err(ResolveError::PhaseNotDeclared {
                decl: decl.clone(),
                kind,
                phase,
            });
        }
        let cap = graph
            .reachable_cap(decl.module, kind)
            .unwrap_or(Phase::RawShape);
        if phase > cap {
            return Err(ResolveError::PhaseNotReachable {
                decl: decl.clone(),
                phase,
                cap,
            });
        }
        Ok(())
    }

    /// Top-level entry: resolve `decl` to `phase` with a fresh stack.
    pub(crate) fn resolve(
        &self,
        invocation: InvocationId,
        decl: &DeclId,
        phase: Phase,
    ) -> Result<Arc<PhaseResult>, ResolveError> {
        let mut stack = ResolveStack::new(invocation);
        let outcome = loop {
            match self.ensure(&mut stack, decl, phase) {
                Ok(Demand::Ready(result)) => break Ok(result),
                // An empty stack owns nothing, so no cycle can close on it.
                Ok(Demand::Cycle(_)) => continue,
                Err(err) => break Err(err),
            }
        };
        self.enforce_capacity();
        outcome
    }

    fn enforce_capacity(&self) {
        let session = self.session;
        if let Some(capacity) = session.config.cache_capacity {
            let evicted = session
                .cache
                .enforce_capacity(capacity, session.config.eviction_batch);
            session.reset_evicted(&evicted);
        }
    }

    pub(crate) fn ensure(
        &self,
        stack: &mut ResolveStack,
        decl: &DeclId,
        phase: Phase,
    ) -> Result<Demand, ResolveError> {
        let key = (decl.clone(), phase);
        if let Some(pos) = stack.position(&key) {
            let members = stack.keys_from(pos);
            tracing::warn!(decl = %decl, %phase, members = members.len(), "resolution cycle");
            stack.mark_cyclic_from(pos, &members);
            return Ok(Demand::Cycle(members));
        }

        let cache: &'s ResolutionCache = &self.session.cache;
        loop {
            match cache.get(decl, phase) {
                CacheLookup::Hit(result) => return Ok(Demand::Ready(result)),
                CacheLookup::Stale(_) => {
                    if let Some(node) = self.session.sources.existing_node(decl) {
                        node.reset_below(phase);
                    }
                }
                CacheLookup::Miss => {}
            }

            let node = self.node(decl)?;
            self.check_reachable(&node, phase)?;

            let schedule = self.session.graph.schedule();
            let previous = match schedule.previous(node.kind(), phase) {
                Some(prev) => match self.ensure(stack, decl, prev)? {
                    Demand::Ready(result) => {
                        let pin = cache.pin((decl.clone(), prev));
                        // Evicted or invalidated before the pin landed.
                        if !cache.holds(&result) {
                            continue;
                        }
                        Some((result, pin))
                    }
                    Demand::Cycle(members) => return Ok(Demand::Cycle(members)),
                },
                None => None,
            };

            match self.session.flights.claim(stack.invocation, &key) {
                Claim::Acquired(guard) => {
                    // Another invocation may have finished this key between
                    // our cache lookup and the claim.
                    if let CacheLookup::Hit(result) = cache.get(decl, phase) {
                        return Ok(Demand::Ready(result));
                    }
                    stack.frames.push(Frame {
                        key: key.clone(),
                        cycle: None,
                    });
                    let computed = self.compute(stack, decl, phase, previous);
                    let frame = stack.frames.pop();
                    let result = computed.map(|partial| {
                        self.store(partial, frame.and_then(|f| f.cycle))
                    });
                    drop(guard);
                    return result.map(Demand::Ready);
                }
                Claim::Released => continue,
                Claim::Cycle(chain) => {
                    let pos = chain
                        .last()
                        .and_then(|owned| stack.position(owned))
                        .unwrap_or(0);
                    let mut members = stack.keys_from(pos);
                    for key in chain {
                        if !members.contains(&key) {
                            members.push(key);
                        }
                    }
                    tracing::warn!(decl = %decl, %phase, members = members.len(), "cross-invocation resolution cycle");
                    stack.mark_cyclic_from(pos, &members);
                    return Ok(Demand::Cycle(members));
                }
            }
        }
    }

    /// Resolve prerequisites and run the body, leaving the result unstored.
    fn compute(
        &self,
        stack: &mut ResolveStack,
        decl: &DeclId,
        phase: Phase,
        previous: Option<(Arc<PhaseResult>, PinGuard<'s>)>,
    ) -> Result<Partial<'s>, ResolveError> {
        let session = self.session;
        let mut stamp = StampBuilder::new();

        let (generation, entry) = session.sources.read(decl.file);
        let node = entry
            .ok_or(ResolveError::UnknownFile(decl.file))?
            .node_of(decl)
            .ok_or_else(|| ResolveError::UnknownDeclaration(decl.clone()))?;
        stamp.read_file(decl.file, generation);

        let mut pins: Vec<PinGuard<'s>> = Vec::new();
        let mut inputs = PhaseInputs::new();
        if let Some((previous, pin)) = previous {
            stamp.read_prerequisite(decl, previous.phase, &previous.stamp);
            inputs.insert(previous);
            pins.push(pin);
        }

        let scope = ScopeIndex::new(&session.sources, &session.graph);
        let prerequisites = {
            let mut cx = PhaseContext::new(scope, Arc::clone(&node), phase, &mut stamp);
            session.bodies.prerequisites(&mut cx, phase)
        };

        pins.reserve(prerequisites.len());
        for prerequisite in prerequisites {
            let target = &prerequisite.decl;
            let target_phase = prerequisite.phase;

            if target == decl {
                if target_phase > phase {
                    return Err(ResolveError::invalid_prerequisite(
                        decl,
                        phase,
                        target,
                        target_phase,
                        "later phase of the same declaration",
                    ));
                }
            } else {
                let target_node = session.sources.node(target).ok_or_else(|| {
                    ResolveError::invalid_prerequisite(
                        decl,
                        phase,
                        target,
                        target_phase,
                        "target does not exist",
                    )
                })?;
                if let Err(err) = self.check_reachable(&target_node, target_phase) {
                    tracing::warn!(error = %err, "phase body requested an unreachable prerequisite");
                    return Err(ResolveError::invalid_prerequisite(
                        decl,
                        phase,
                        target,
                        target_phase,
                        "phase not reachable for target",
                    ));
                }
            }

            match self.ensure(stack, target, target_phase)? {
                Demand::Ready(result) => {
                    pins.push(session.cache.pin((target.clone(), target_phase)));
                    stamp.read_prerequisite(target, target_phase, &result.stamp);
                    if let Some(cycle) = result.cycle() {
                        // A cycle finished by another invocation may run
                        // through frames of this one.
                        let on_stack = cycle
                            .members
                            .iter()
                            .filter_map(|member| stack.position(member))
                            .min();
                        if let Some(pos) = on_stack {
                            stack.mark_cyclic_from(pos, &cycle.members);
                        }
                    }
                    inputs.insert(result);
                }
                Demand::Cycle(_) => break,
            }
            if stack.top_is_cyclic() {
                break;
            }
        }

        if stack.top_is_cyclic() {
            return Ok(Partial {
                decl: decl.clone(),
                phase,
                node,
                body: None,
                stamp,
                pins,
            });
        }

        let started = Instant::now();
        let body = {
            let mut cx = PhaseContext::new(scope, Arc::clone(&node), phase, &mut stamp);
            session.bodies.run(&mut cx, phase, &inputs)
        };
        tracing::debug!(
            decl = %decl,
            %phase,
            inputs = inputs.len(),
            diagnostics = body.diagnostics.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "phase body executed"
        );
        session.counters.record_body_execution();

        Ok(Partial {
            decl: decl.clone(),
            phase,
            node,
            body: Some(body),
            stamp,
            pins,
        })
    }

    /// Cache a computed result and advance the node.
    fn store(&self, partial: Partial<'s>, cycle: Option<Vec<CacheKey>>) -> Arc<PhaseResult> {
        let session = self.session;
        let Partial {
            decl,
            phase,
            node,
            body,
            stamp,
            pins,
        } = partial;

        let (outcome, diagnostics) = match (cycle, body) {
            (Some(members), _) => {
                session.counters.record_cycle();
                (Outcome::Cyclic(CycleInfo { members }), Vec::new())
            }
            (None, Some(body)) => (Outcome::Resolved(body.output), body.diagnostics),
            (None, None) => (
                Outcome::Cyclic(CycleInfo {
                    members: vec![(decl.clone(), phase)],
                }),
                Vec::new(),
            ),
        };

        let result = session.cache.put(PhaseResult {
            decl,
            phase,
            outcome,
            diagnostics,
            stamp: stamp.finish(),
        });
        node.advance_to(phase);
        drop(pins);
        result
    }
}

/// A computed phase waiting to be stored.
struct Partial<'s> {
    decl: DeclId,
    phase: Phase,
    node: Arc<DeclNode>,
    /// `None` when the frame turned out to be part of a cycle.
    body: Option<super::bodies::BodyOutput>,
    stamp: StampBuilder,
    /// Previous phase and prerequisites, held until the result is stored.
    pins: Vec<PinGuard<'s>>,
}
