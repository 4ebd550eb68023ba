use thiserror::Error;

/// Errors surfaced while building or driving the rdkafka-backed broker
/// client. Converted into `consuming_core::error::BrokerError` at the trait
/// boundary.
#[derive(Error, Debug)]
pub enum KafkaBrokerError {
    #[error("rdkafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}
