use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BrokerError;
use crate::record::{Record, TopicPartition};

/// Records fetched by one `poll_fetches` call, grouped by partition (spec 6,
/// GLOSSARY "Fetch batch").
pub type Fetches = HashMap<TopicPartition, Vec<Record>>;

/// The narrow interface the core depends on (spec 1, 6). Implemented by
/// `consuming-kafka` for a real broker, and by an in-memory fake in tests.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Suspends until records are available or `cancel` is cancelled.
    async fn poll_fetches(&self, cancel: &CancellationToken) -> Result<Fetches, BrokerError>;

    /// Idempotent: pausing an already-paused partition is a no-op.
    fn pause_partitions(&self, partitions: &HashSet<TopicPartition>);

    /// Idempotent: resuming an already-running partition is a no-op.
    fn resume_partitions(&self, partitions: &HashSet<TopicPartition>);

    /// Marks `offset` as the next-to-consume for `tp`; the client commits
    /// asynchronously.
    fn mark_commit(&self, tp: &TopicPartition, offset: i64) -> Result<(), BrokerError>;

    /// Blocks until the final commit attempt completes.
    async fn close(&self);
}

/// Callbacks registered with the broker client for cooperative rebalancing
/// (spec 4.4, GLOSSARY "Cooperative rebalance"). Implemented by the
/// `PartitionRegistry`.
#[async_trait]
pub trait RebalanceListener: Send + Sync {
    async fn on_assigned(&self, partitions: &[TopicPartition]);
    async fn on_revoked(&self, partitions: &[TopicPartition]);
    async fn on_lost(&self, partitions: &[TopicPartition]);
}
