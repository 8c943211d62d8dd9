//! Session configuration.

/// Tunables of one [`Session`](super::Session).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Soft bound on cached phase results. `None` disables automatic eviction.
    pub cache_capacity: Option<usize>,
    /// Extra entries freed below the bound by each automatic sweep.
    pub eviction_batch: usize,
    /// Warm a unit's declarations on the rayon pool before checking them.
    pub parallel_collect: bool,
    /// Attempts made by `Analysis::collect_with_retry`.
    pub max_collect_attempts: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: None,
            eviction_batch: 16,
            parallel_collect: false,
            max_collect_attempts: 3,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    pub fn with_eviction_batch(mut self, batch: usize) -> Self {
        self.eviction_batch = batch;
        self
    }

    pub fn with_parallel_collect(mut self, parallel: bool) -> Self {
        self.parallel_collect = parallel;
        self
    }

    /// At least one attempt is always made.
    pub fn with_max_collect_attempts(mut self, attempts: usize) -> Self {
        self.max_collect_attempts = attempts.max(1);
        self
    }
}
