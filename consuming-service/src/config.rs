use std::time::Duration;

use consuming_core::error::ConfigError;
use consuming_core::{
    ConsumerMode, CoreConfig, PublicationDataModeConfig, RetryPolicyConfig, WorkerConfig,
};
use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(nested = true)]
    pub kafka: consuming_kafka::KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: consuming_kafka::ConsumerConfig,

    /// `command` or `publication_data` (spec 4.1, GLOSSARY "Consumer mode").
    #[envconfig(from = "CONSUMER_MODE", default = "command")]
    pub consumer_mode: String,

    #[envconfig(from = "PUBLICATION_CHANNELS_HEADER", default = "channels")]
    pub publication_channels_header: String,

    #[envconfig(from = "PUBLICATION_IDEMPOTENCY_KEY_HEADER")]
    pub publication_idempotency_key_header: Option<String>,

    #[envconfig(from = "PUBLICATION_DELTA_HEADER")]
    pub publication_delta_header: Option<String>,

    #[envconfig(from = "PUBLICATION_TAGS_HEADER_PREFIX")]
    pub publication_tags_header_prefix: Option<String>,

    #[envconfig(from = "RETRY_MIN_DELAY_MS", default = "20")]
    pub retry_min_delay_ms: u64,

    #[envconfig(from = "RETRY_MAX_DELAY_MS", default = "2000")]
    pub retry_max_delay_ms: u64,

    #[envconfig(from = "PARTITION_BUFFER_SIZE", default = "0")]
    pub partition_buffer_size: usize,

    #[envconfig(from = "BIND_HOST", default = "::")]
    pub bind_host: String,

    #[envconfig(from = "BIND_PORT", default = "3311")]
    pub bind_port: u16,
}

impl Config {
    pub fn core_config(&self) -> Result<CoreConfig, ConfigError> {
        let mode = match self.consumer_mode.as_str() {
            "publication_data" => ConsumerMode::PublicationData(PublicationDataModeConfig {
                channels_header: self.publication_channels_header.clone(),
                idempotency_key_header: self.publication_idempotency_key_header.clone(),
                delta_header: self.publication_delta_header.clone(),
                tags_header_prefix: self.publication_tags_header_prefix.clone(),
            }),
            _ => ConsumerMode::Command,
        };

        let retry = RetryPolicyConfig {
            min_delay: Duration::from_millis(self.retry_min_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        };

        let worker = WorkerConfig {
            partition_buffer_size: self.partition_buffer_size,
        };

        CoreConfig::new(mode, retry, worker)
    }
}
