use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::TopicPartitionList;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use consuming_core::error::BrokerError;
use consuming_core::{BrokerClient, Fetches, Record, TopicPartition};

use crate::config::{ConsumerConfig, KafkaConfig};
use crate::context::{ListenerSlot, RebalanceContext};
use crate::error::KafkaBrokerError;

/// `BrokerClient` backed by `rdkafka`'s `StreamConsumer`, using
/// cooperative-sticky group membership so assignment changes arrive as
/// incremental assign/revoke events (spec 4.4, GLOSSARY "Cooperative
/// rebalance") rather than a stop-the-world rebalance.
pub struct RdKafkaBrokerClient {
    consumer: StreamConsumer<RebalanceContext>,
    max_batch: usize,
    poll_window: Duration,
}

impl RdKafkaBrokerClient {
    /// `listener` is filled in by the caller once the `RebalanceListener`
    /// (the `PartitionRegistry`) has been constructed from this same broker
    /// client — see [`ListenerSlot`].
    pub fn new(
        kafka: &KafkaConfig,
        consumer_cfg: &ConsumerConfig,
        listener: ListenerSlot,
    ) -> Result<Self, KafkaBrokerError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &kafka.kafka_hosts)
            .set("group.id", &consumer_cfg.kafka_consumer_group)
            .set(
                "statistics.interval.ms",
                kafka.kafka_statistics_interval_ms.to_string(),
            )
            .set("enable.auto.offset.store", "false")
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                consumer_cfg.kafka_consumer_auto_commit_interval_ms.to_string(),
            )
            .set(
                "auto.offset.reset",
                &consumer_cfg.kafka_consumer_offset_reset,
            )
            .set("partition.assignment.strategy", "cooperative-sticky");

        if kafka.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        }

        let context = RebalanceContext::new(listener, tokio::runtime::Handle::current());
        let consumer: StreamConsumer<RebalanceContext> =
            client_config.create_with_context(context)?;

        let topics = consumer_cfg.topics();
        consumer.subscribe(&topics)?;

        Ok(Self {
            consumer,
            max_batch: 500,
            poll_window: Duration::from_millis(50),
        })
    }
}

#[async_trait]
impl BrokerClient for RdKafkaBrokerClient {
    async fn poll_fetches(&self, cancel: &CancellationToken) -> Result<Fetches, BrokerError> {
        let mut fetches: Fetches = HashMap::new();

        let first = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(fetches),
            result = self.consumer.recv() => result,
        };
        match first {
            Ok(message) => push_message(&mut fetches, &message),
            Err(err) => return Err(fetch_error(err)),
        }

        // Opportunistically drain whatever else is already buffered, within
        // a short window, so a burst of records becomes one fetch batch per
        // partition instead of many single-record round trips through the
        // coordinator.
        let deadline = tokio::time::Instant::now() + self.poll_window;
        let mut count = 1usize;
        while count < self.max_batch {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(remaining) => break,
                result = self.consumer.recv() => match result {
                    Ok(message) => {
                        push_message(&mut fetches, &message);
                        count += 1;
                    }
                    Err(err) => return Err(fetch_error(err)),
                },
            }
        }

        Ok(fetches)
    }

    fn pause_partitions(&self, partitions: &HashSet<TopicPartition>) {
        let tpl = to_tpl(partitions);
        if let Err(err) = self.consumer.pause(&tpl) {
            warn!(error = %err, "failed to pause partitions");
        }
    }

    fn resume_partitions(&self, partitions: &HashSet<TopicPartition>) {
        let tpl = to_tpl(partitions);
        if let Err(err) = self.consumer.resume(&tpl) {
            warn!(error = %err, "failed to resume partitions");
        }
    }

    fn mark_commit(&self, tp: &TopicPartition, offset: i64) -> Result<(), BrokerError> {
        self.consumer
            .store_offset(&tp.topic, tp.partition, offset)
            .map_err(|err| BrokerError::MarkCommit(KafkaBrokerError::from(err).into()))
    }

    async fn close(&self) {
        debug!("closing kafka consumer");
        self.consumer.unsubscribe();
    }
}

fn fetch_error(err: rdkafka::error::KafkaError) -> BrokerError {
    BrokerError::Fetch(KafkaBrokerError::from(err).into())
}

fn push_message(fetches: &mut Fetches, message: &BorrowedMessage<'_>) {
    let headers = message
        .headers()
        .map(|hs| {
            (0..hs.count())
                .map(|i| {
                    let header = hs.get(i);
                    (
                        header.key.to_string(),
                        header.value.map(<[u8]>::to_vec).unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let record = Record {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        value: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        headers,
        timestamp_millis: message.timestamp().to_millis().unwrap_or_default(),
    };

    fetches
        .entry(record.topic_partition())
        .or_default()
        .push(record);
}

fn to_tpl(partitions: &HashSet<TopicPartition>) -> TopicPartitionList {
    let mut tpl = TopicPartitionList::new();
    for tp in partitions {
        tpl.add_partition(&tp.topic, tp.partition);
    }
    tpl
}
