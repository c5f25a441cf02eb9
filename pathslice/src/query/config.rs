//! PathQuery tuning.

/// Default maximum number of search steps per granted slice.
pub const DEFAULT_ITERATIONS_PER_SLICE: u32 = 64;

/// Default number of steps between two clock reads within a slice.
pub const DEFAULT_TIME_CHECK_INTERVAL: u32 = 8;

/// Default number of automatic restarts after the graph changed under a search.
pub const DEFAULT_MAX_STALE_RESTARTS: u32 = 1;

/// How a [`PathQuery`](super::PathQuery) spends a granted slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// Upper bound on steps per slice, whatever time remains.
    pub iterations_per_slice: u32,
    /// Steps between clock reads within a slice.
    pub time_check_interval: u32,
    /// Restarts allowed after a stale search before reporting failure.
    pub max_stale_restarts: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            iterations_per_slice: DEFAULT_ITERATIONS_PER_SLICE,
            time_check_interval: DEFAULT_TIME_CHECK_INTERVAL,
            max_stale_restarts: DEFAULT_MAX_STALE_RESTARTS,
        }
    }
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iterations_per_slice(mut self, iterations: u32) -> Self {
        self.iterations_per_slice = iterations;
        self
    }

    pub fn with_time_check_interval(mut self, interval: u32) -> Self {
        self.time_check_interval = interval;
        self
    }

    pub fn with_max_stale_restarts(mut self, restarts: u32) -> Self {
        self.max_stale_restarts = restarts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.iterations_per_slice, DEFAULT_ITERATIONS_PER_SLICE);
        assert_eq!(config.time_check_interval, DEFAULT_TIME_CHECK_INTERVAL);
        assert_eq!(config.max_stale_restarts, 1);
    }

    #[test]
    fn test_builder() {
        let config = QueryConfig::new()
            .with_iterations_per_slice(10)
            .with_time_check_interval(2)
            .with_max_stale_restarts(0);
        assert_eq!(config.iterations_per_slice, 10);
        assert_eq!(config.time_check_interval, 2);
        assert_eq!(config.max_stale_restarts, 0);
    }
}
