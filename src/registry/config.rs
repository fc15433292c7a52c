//! Registry configuration

/// Default capacity of each subscriber's wake channel
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 10;

/// Configuration for the subscription registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Wake tokens a subscriber can hold before further wakes are dropped
    pub subscriber_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Set the wake channel capacity (minimum 1)
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.subscriber_capacity, DEFAULT_SUBSCRIBER_CAPACITY);
    }

    #[test]
    fn test_subscriber_capacity_floor() {
        let config = RegistryConfig::default().subscriber_capacity(0);
        assert_eq!(config.subscriber_capacity, 1);
    }
}
