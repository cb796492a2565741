use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::marker::Severity;

/// Tunables for one worker. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub warning_level: Severity,
    /// Waits before giving up on a completion whose line the worker has not caught up with.
    pub completion_retry_delays_ms: Vec<u64>,
    /// Part size limit for handlers that do not declare their own.
    pub max_file_size: usize,
    pub predict_completions: bool,
    pub disabled_features: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 200,
            max_delay_ms: 15_000,
            warning_level: Severity::Info,
            completion_retry_delays_ms: vec![5, 20],
            max_file_size: 1024 * 1024,
            predict_completions: true,
            disabled_features: Vec::new(),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_delay_ms == 0 {
            return Err(ConfigError::ZeroMinDelay);
        }
        if self.max_delay_ms < self.min_delay_ms {
            return Err(ConfigError::DelayBounds {
                min: self.min_delay_ms,
                max: self.max_delay_ms,
            });
        }
        Ok(())
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn completion_retry_delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.completion_retry_delays_ms.iter().map(|ms| Duration::from_millis(*ms))
    }
}
