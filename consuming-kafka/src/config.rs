use envconfig::Envconfig;

/// Connection-level Kafka settings, mirroring `common-kafka::KafkaConfig`.
#[derive(Envconfig, Clone, Debug)]
pub struct KafkaConfig {
    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "10000")]
    pub kafka_statistics_interval_ms: u32,
}

/// Consumer-group settings, mirroring `common-kafka::ConsumerConfig` but
/// specialized to cooperative-sticky group membership (spec §4.4, GLOSSARY
/// "Cooperative rebalance") since `RdKafkaBrokerClient` assumes incremental
/// assign/revoke events rather than a stop-the-world rebalance.
#[derive(Envconfig, Clone, Debug)]
pub struct ConsumerConfig {
    pub kafka_consumer_group: String,
    pub kafka_consumer_topics: String,

    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String,

    #[envconfig(default = "5000")]
    pub kafka_consumer_auto_commit_interval_ms: i32,
}

impl ConsumerConfig {
    pub fn topics(&self) -> Vec<&str> {
        self.kafka_consumer_topics
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}
