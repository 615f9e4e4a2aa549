/// Default capacity of every bounded row stream.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Configuration for streaming execution
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Rows a producer may buffer ahead of a slow consumer
    pub channel_capacity: usize,
    /// Log rows dropped because the predicate failed to evaluate
    pub log_row_errors: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_row_errors: true,
        }
    }
}

impl StreamConfig {
    /// Create a new stream configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row stream capacity (at least 1)
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Enable or disable warnings for rows dropped on evaluation errors
    pub fn with_log_row_errors(mut self, enabled: bool) -> Self {
        self.log_row_errors = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let config = StreamConfig::default();
        assert_eq!(config.channel_capacity, 10);
        assert!(config.log_row_errors);

        let config = StreamConfig::new()
            .with_channel_capacity(0)
            .with_log_row_errors(false);
        assert_eq!(config.channel_capacity, 1);
        assert!(!config.log_row_errors);
    }
}
