use serde::{Deserialize, Serialize};

/// Runner tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Upper bound on concurrently executing tasks (the `-j` budget).
    pub max_parallel: usize,
    /// Capacity of each task's handler channels.
    pub handler_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_parallel: num_cpus::get(),
            handler_capacity: 4,
        }
    }
}

impl RunnerConfig {
    /// Create a new builder for RunnerConfig
    pub fn builder() -> RunnerConfigBuilder {
        RunnerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_parallel == 0 {
            return Err("max_parallel must be greater than 0".to_string());
        }
        if self.handler_capacity == 0 {
            return Err("handler_capacity must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Capacity of the scheduler's message channel: enough headroom for
    /// every running task to have a few messages in flight.
    pub(crate) fn message_capacity(&self) -> usize {
        4 * self.max_parallel
    }

    /// Capacity of the resolution queue.
    pub(crate) fn resolution_capacity(&self) -> usize {
        self.max_parallel
    }

    /// Capacity of the error stream handed to the caller.
    pub(crate) fn error_capacity(&self) -> usize {
        self.max_parallel
    }
}

/// Builder for RunnerConfig
pub struct RunnerConfigBuilder {
    config: RunnerConfig,
}

impl RunnerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RunnerConfig::default(),
        }
    }

    /// Set the parallelism budget
    pub fn max_parallel(mut self, max_parallel: usize) -> Self {
        self.config.max_parallel = max_parallel;
        self
    }

    /// Set the handler channel capacity
    pub fn handler_capacity(mut self, handler_capacity: usize) -> Self {
        self.config.handler_capacity = handler_capacity;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<RunnerConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RunnerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.max_parallel >= 1);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = RunnerConfig::default();

        config.max_parallel = 0;
        assert!(config.validate().is_err());
        config.max_parallel = 4;

        config.handler_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = RunnerConfig::builder()
            .max_parallel(8)
            .handler_capacity(16)
            .build()
            .unwrap();

        assert_eq!(config.max_parallel, 8);
        assert_eq!(config.handler_capacity, 16);
        assert_eq!(config.message_capacity(), 32);
        assert_eq!(config.resolution_capacity(), 8);
    }

    #[test]
    fn test_builder_rejects_zero_parallelism() {
        assert!(RunnerConfig::builder().max_parallel(0).build().is_err());
    }
}
