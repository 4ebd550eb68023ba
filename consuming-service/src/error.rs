use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid configuration: {0}")]
    Config(#[from] consuming_core::error::ConfigError),

    #[error("kafka broker error: {0}")]
    Broker(#[from] consuming_kafka::KafkaBrokerError),
}
