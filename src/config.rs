//! Knobs for a pipeline run.

use crate::error::{PipelineError, Result};
use std::time::Duration;

pub const DEFAULT_MAPPERS: usize = 2;
pub const DEFAULT_REDUCERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub mappers: usize,
    pub reducers: usize,

    /// Capacity of the line, token-list and count channels. 0 makes every
    /// send a rendezvous with a receiver.
    pub capacity: usize,

    // Slows every worker down per item; only useful for shaking out races.
    pub worker_delay: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            mappers: DEFAULT_MAPPERS,
            reducers: DEFAULT_REDUCERS,
            capacity: 0,
            worker_delay: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> PipelineConfig {
        PipelineConfig::default()
    }

    /// Number of mapper replicas pulling from the line channel.
    ///
    /// Default 2
    pub fn with_mappers(mut self, n: usize) -> PipelineConfig {
        self.mappers = n;
        self
    }

    /// Number of reducer replicas pulling from the token-list channel.
    ///
    /// Default 2
    pub fn with_reducers(mut self, n: usize) -> PipelineConfig {
        self.reducers = n;
        self
    }

    /// Buffer size of every channel, from the source onwards. Larger buffers
    /// loosen the backpressure between stages.
    ///
    /// Default 0 (rendezvous)
    pub fn with_capacity(mut self, capacity: usize) -> PipelineConfig {
        self.capacity = capacity;
        self
    }

    pub fn with_worker_delay(mut self, delay: Duration) -> PipelineConfig {
        self.worker_delay = Some(delay);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.mappers == 0 {
            return Err(PipelineError::InvalidConfig(
                "at least one mapper is required".to_string(),
            ));
        }
        if self.reducers == 0 {
            return Err(PipelineError::InvalidConfig(
                "at least one reducer is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_two_by_two_rendezvous() {
        let config = PipelineConfig::new();
        assert_eq!(config.mappers, 2);
        assert_eq!(config.reducers, 2);
        assert_eq!(config.capacity, 0);
        assert_eq!(config.worker_delay, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn setters_chain() {
        let config = PipelineConfig::new()
            .with_mappers(8)
            .with_reducers(3)
            .with_capacity(16)
            .with_worker_delay(Duration::from_millis(1));
        assert_eq!(config.mappers, 8);
        assert_eq!(config.reducers, 3);
        assert_eq!(config.capacity, 16);
        assert_eq!(config.worker_delay, Some(Duration::from_millis(1)));
    }

    #[test]
    fn zero_replicas_are_rejected() {
        let err = PipelineConfig::new().with_mappers(0).validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));

        let err = PipelineConfig::new().with_reducers(0).validate().unwrap_err();
        assert!(err.to_string().contains("reducer"));
    }
}
