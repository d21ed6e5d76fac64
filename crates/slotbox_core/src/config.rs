//! Store configuration.

use std::ops::BitOr;

/// Debug logging switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags(u32);

impl DebugFlags {
    /// Nothing is logged.
    pub const NONE: Self = Self(0);
    /// Log each query when it is built and run.
    pub const LOG_QUERIES: Self = Self(1);
    /// Log condition parameters along with queries.
    pub const LOG_QUERY_PARAMETERS: Self = Self(2);

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DebugFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Configuration for opening a store.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Debug logging switches.
    pub debug_flags: DebugFlags,

    /// Reject queries without conditions.
    pub require_conditions: bool,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the debug flags.
    #[must_use]
    pub const fn debug_flags(mut self, flags: DebugFlags) -> Self {
        self.debug_flags = flags;
        self
    }

    /// Sets whether queries need at least one condition.
    #[must_use]
    pub const fn require_conditions(mut self, value: bool) -> Self {
        self.require_conditions = value;
        self
    }

    /// Returns true if queries are logged.
    #[must_use]
    pub const fn logs_queries(&self) -> bool {
        self.debug_flags.contains(DebugFlags::LOG_QUERIES)
    }

    /// Returns true if query parameters are logged.
    #[must_use]
    pub const fn logs_query_parameters(&self) -> bool {
        self.debug_flags.contains(DebugFlags::LOG_QUERY_PARAMETERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.debug_flags, DebugFlags::NONE);
        assert!(!config.require_conditions);
        assert!(!config.logs_queries());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .debug_flags(DebugFlags::LOG_QUERIES | DebugFlags::LOG_QUERY_PARAMETERS)
            .require_conditions(true);
        assert!(config.logs_queries());
        assert!(config.logs_query_parameters());
        assert!(config.require_conditions);
        assert_eq!(config.debug_flags.bits(), 3);
    }
}
