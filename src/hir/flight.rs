//! In-flight set - which (declaration, phase) pairs are being computed, and
//! by whom.
//!
//! A resolution claims its key before running the phase body. A second
//! invocation asking for the same key blocks until the owner releases it
//! (first writer wins). Before blocking, the waiter follows the wait chain
//! `key → owner → key the owner waits on → ...`; if the chain leads back to
//! the waiter itself, blocking would deadlock, and the chain is returned as
//! a cycle instead.

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use super::cache::CacheKey;

/// One top-level `resolve` call and everything it recursively computes.
pub(crate) type InvocationId = u64;

#[derive(Debug, Default)]
struct FlightTable {
    owners: FxHashMap<CacheKey, InvocationId>,
    waiting: FxHashMap<InvocationId, CacheKey>,
}

/// Outcome of [`InFlight::claim`].
#[derive(Debug)]
pub(crate) enum Claim<'f> {
    /// The caller now owns the key.
    Acquired(FlightGuard<'f>),
    /// Another invocation held the key and has released it; check the cache again.
    Released,
    /// Waiting would close a cycle. The chain starts with the requested key
    /// and ends with a key owned by the caller.
    Cycle(Vec<CacheKey>),
}

/// Per-session in-flight table.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    table: Mutex<FlightTable>,
    released: Condvar,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for `invocation`, blocking while another invocation owns it.
    pub(crate) fn claim(&self, invocation: InvocationId, key: &CacheKey) -> Claim<'_> {
        let mut table = self.table.lock();
        let owner = match table.owners.get(key) {
            None => {
                table.owners.insert(key.clone(), invocation);
                return Claim::Acquired(FlightGuard {
                    flights: self,
                    key: key.clone(),
                });
            }
            Some(&owner) => owner,
        };

        if let Some(chain) = Self::wait_chain(&table, invocation, key, owner) {
            tracing::warn!(invocation, chain = chain.len(), "wait would close a resolution cycle");
            return Claim::Cycle(chain);
        }

        tracing::trace!(invocation, owner, decl = %key.0, phase = %key.1, "waiting for in-flight phase");
        table.waiting.insert(invocation, key.clone());
        while table.owners.get(key) == Some(&owner) {
            self.released.wait(&mut table);
        }
        table.waiting.remove(&invocation);
        Claim::Released
    }

    /// Follow owners and the keys they wait on; `Some` if it reaches `me`.
    fn wait_chain(
        table: &FlightTable,
        me: InvocationId,
        key: &CacheKey,
        owner: InvocationId,
    ) -> Option<Vec<CacheKey>> {
        let mut chain = vec![key.clone()];
        let mut current = owner;
        // Each invocation waits on at most one key, so the walk is bounded.
        for _ in 0..=table.waiting.len() {
            if current == me {
                return Some(chain);
            }
            let next = table.waiting.get(&current)?;
            chain.push(next.clone());
            current = *table.owners.get(next)?;
        }
        None
    }

    pub(crate) fn len(&self) -> usize {
        self.table.lock().owners.len()
    }

    fn release(&self, key: &CacheKey) {
        let mut table = self.table.lock();
        table.owners.remove(key);
        drop(table);
        self.released.notify_all();
    }
}

/// Ownership of an in-flight key; releases and wakes waiters on drop.
pub(crate) struct FlightGuard<'f> {
    flights: &'f InFlight,
    key: CacheKey,
}

impl std::fmt::Debug for FlightGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FlightGuard").field(&self.key).finish()
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flights.release(&self.key);
    }
}
