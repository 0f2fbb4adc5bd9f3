//! Registry configuration

/// Configuration for the stream registry and the buffers it creates
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Buffer capacity used when a first-touch request does not specify one
    pub default_capacity: usize,

    /// Retry cap for the circular drop-oldest loop
    ///
    /// Bounds recovery cost when blocked writers keep reclaiming the freed
    /// slot.
    pub max_circular_iterations: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_capacity: 100,
            max_circular_iterations: 100,
        }
    }
}

impl RegistryConfig {
    /// Set the default buffer capacity
    pub fn default_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = capacity;
        self
    }

    /// Set the circular overwrite iteration cap
    pub fn max_circular_iterations(mut self, iterations: usize) -> Self {
        self.max_circular_iterations = iterations;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.default_capacity, 100);
        assert_eq!(config.max_circular_iterations, 100);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .default_capacity(1000)
            .max_circular_iterations(10);

        assert_eq!(config.default_capacity, 1000);
        assert_eq!(config.max_circular_iterations, 10);
    }
}
