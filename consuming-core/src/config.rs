use std::time::Duration;

use crate::error::ConfigError;

/// Header names that drive the record parser in publication-data mode
/// (spec 4.1, spec 6 configuration table).
#[derive(Debug, Clone)]
pub struct PublicationDataModeConfig {
    pub channels_header: String,
    pub idempotency_key_header: Option<String>,
    pub delta_header: Option<String>,
    pub tags_header_prefix: Option<String>,
}

/// Which record-parser mode the consumer runs in.
#[derive(Debug, Clone)]
pub enum ConsumerMode {
    Command,
    PublicationData(PublicationDataModeConfig),
}

/// Bounded exponential backoff parameters (spec 4.2).
#[derive(Debug, Clone)]
pub struct RetryPolicyConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(20),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Per-partition worker sizing (spec 3, 4.3, 5).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// `PartitionBufferSize` from spec 6: buffered-batch count beyond the
    /// one batch actively being processed.
    pub partition_buffer_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            partition_buffer_size: 0,
        }
    }
}

impl WorkerConfig {
    /// Inbox capacity is `partition_buffer_size + 1`, with a floor of 1
    /// (spec 3: "minimum capacity 1").
    pub fn inbox_capacity(&self) -> usize {
        self.partition_buffer_size.saturating_add(1).max(1)
    }
}

/// Top-level configuration for the consuming core. Validated once at
/// construction (spec 7: `ConfigError` is terminal and prevents any task
/// from starting).
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub mode: ConsumerMode,
    pub retry: RetryPolicyConfig,
    pub worker: WorkerConfig,
}

impl CoreConfig {
    pub fn new(
        mode: ConsumerMode,
        retry: RetryPolicyConfig,
        worker: WorkerConfig,
    ) -> Result<Self, ConfigError> {
        if let ConsumerMode::PublicationData(ref pub_cfg) = mode {
            if pub_cfg.channels_header.trim().is_empty() {
                return Err(ConfigError::MissingChannelsHeaderConfig);
            }
        }
        if retry.min_delay.is_zero() {
            return Err(ConfigError::InvalidRetryPolicy(
                "min_delay must be greater than zero".to_string(),
            ));
        }
        if retry.max_delay < retry.min_delay {
            return Err(ConfigError::InvalidRetryPolicy(
                "max_delay must be >= min_delay".to_string(),
            ));
        }
        Ok(Self {
            mode,
            retry,
            worker,
        })
    }
}
