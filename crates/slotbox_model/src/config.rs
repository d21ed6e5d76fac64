//! Merge configuration.

/// How IDs of retired elements are treated when new elements are added.
///
/// UIDs are never reused under any policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdPolicy {
    /// New elements always get `last_id + 1`.
    #[default]
    Monotonic,
    /// New elements take the lowest ID not used by a live element in the
    /// same collection, falling back to `last_id + 1`.
    ///
    /// Only IDs retired by an earlier run are reused. Stored records are not
    /// touched, so data under a reused property slot must be cleared by the
    /// application before the run that reuses it.
    ReuseRetired,
}

/// Configuration for a generation run.
#[derive(Debug, Clone, Default)]
pub struct MergeConfig {
    /// ID assignment policy.
    pub id_policy: IdPolicy,

    /// Seed for UID minting. `None` seeds from the OS.
    pub uid_seed: Option<u64>,

    /// Application model version written to the snapshot's `version` field.
    /// `None` keeps the previous value.
    pub model_version: Option<u32>,
}

impl MergeConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ID policy.
    #[must_use]
    pub const fn id_policy(mut self, policy: IdPolicy) -> Self {
        self.id_policy = policy;
        self
    }

    /// Makes UID minting deterministic.
    #[must_use]
    pub const fn uid_seed(mut self, seed: u64) -> Self {
        self.uid_seed = Some(seed);
        self
    }

    /// Sets the application model version.
    #[must_use]
    pub const fn model_version(mut self, version: u32) -> Self {
        self.model_version = Some(version);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MergeConfig::new();
        assert_eq!(config.id_policy, IdPolicy::Monotonic);
        assert!(config.uid_seed.is_none());
        assert!(config.model_version.is_none());
    }

    #[test]
    fn builder() {
        let config = MergeConfig::new()
            .id_policy(IdPolicy::ReuseRetired)
            .uid_seed(9)
            .model_version(3);
        assert_eq!(config.id_policy, IdPolicy::ReuseRetired);
        assert_eq!(config.uid_seed, Some(9));
        assert_eq!(config.model_version, Some(3));
    }
}
