use std::sync::{Arc, OnceLock};
use std::time::Duration;

use consuming_core::{RebalanceListener, TopicPartition};
use rdkafka::client::ClientContext;
use rdkafka::consumer::{BaseConsumer, ConsumerContext, Rebalance};
use rdkafka::TopicPartitionList;
use tokio::runtime::Handle;
use tracing::{error, warn};

/// A listener slot filled in after the consumer is constructed. The
/// `RebalanceContext` has to exist before `StreamConsumer::create_with_context`
/// returns, but the `PartitionRegistry` that implements `RebalanceListener`
/// needs the broker client (built from that same consumer) to construct —
/// this slot breaks the cycle, mirroring the deferred-handle pattern in
/// `common-lifecycle`'s component manager.
#[derive(Clone, Default)]
pub struct ListenerSlot(Arc<OnceLock<Arc<dyn RebalanceListener>>>);

impl ListenerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panics if called more than once; the slot is filled exactly once
    /// during startup before any rebalance can occur.
    pub fn set(&self, listener: Arc<dyn RebalanceListener>) {
        self.0
            .set(listener)
            .unwrap_or_else(|_| panic!("listener slot already filled"));
    }

    fn get(&self) -> Option<&Arc<dyn RebalanceListener>> {
        self.0.get()
    }
}

/// Bridges librdkafka's synchronous rebalance callbacks to the core's async
/// `RebalanceListener` (spec 4.4). Runs on librdkafka's background poll
/// thread, not the tokio runtime, so blocking on `Handle::block_on` here is
/// safe — it's exactly what `on_revoked`'s "drain before releasing" contract
/// requires.
pub struct RebalanceContext {
    listener: ListenerSlot,
    runtime: Handle,
    revoke_drain_timeout: Duration,
}

impl RebalanceContext {
    pub fn new(listener: ListenerSlot, runtime: Handle) -> Self {
        Self {
            listener,
            runtime,
            revoke_drain_timeout: Duration::from_secs(30),
        }
    }

    fn partitions(tpl: &TopicPartitionList) -> Vec<TopicPartition> {
        tpl.elements()
            .iter()
            .map(|el| TopicPartition::new(el.topic(), el.partition()))
            .collect()
    }
}

impl ClientContext for RebalanceContext {}

impl ConsumerContext for RebalanceContext {
    fn pre_rebalance(&self, _base: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        let Some(listener) = self.listener.get() else {
            warn!("rebalance fired before the listener slot was filled; ignoring");
            return;
        };
        if let Rebalance::Revoke(tpl) = rebalance {
            let partitions = Self::partitions(tpl);
            let listener = listener.clone();
            // Cooperative-sticky revokes are expected to complete quickly;
            // librdkafka itself assumes the callback returns before the next
            // poll, so we bound the drain rather than risk wedging the
            // consumer group forever on a stuck dispatch.
            let outcome = self.runtime.block_on(async {
                tokio::time::timeout(self.revoke_drain_timeout, listener.on_revoked(&partitions))
                    .await
            });
            if outcome.is_err() {
                error!(
                    partitions = ?partitions,
                    "partition revoke drain exceeded its deadline; partitions may be redelivered"
                );
            }
        }
    }

    fn post_rebalance(&self, _base: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        let Some(listener) = self.listener.get() else {
            warn!("rebalance fired before the listener slot was filled; ignoring");
            return;
        };
        if let Rebalance::Assign(tpl) = rebalance {
            let partitions = Self::partitions(tpl);
            self.runtime.block_on(listener.on_assigned(&partitions));
        }
    }
}
