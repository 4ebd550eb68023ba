use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::broker::{BrokerClient, RebalanceListener};
use crate::config::{ConsumerMode, WorkerConfig};
use crate::dispatcher::Dispatcher;
use crate::hooks::{self, TestHooks};
use crate::record::TopicPartition;
use crate::retry::RetryPolicy;
use crate::worker::PartitionWorker;

/// Map from `TopicPartition` to its live `PartitionWorker`; the single owner
/// of workers (spec 4.4). Guarded by one mutex, accessed at partition
/// granularity.
pub struct PartitionRegistry {
    workers: Mutex<HashMap<TopicPartition, Arc<PartitionWorker>>>,
    mode: ConsumerMode,
    worker_cfg: WorkerConfig,
    retry_policy: RetryPolicy,
    dispatcher: Arc<dyn Dispatcher>,
    broker: Arc<dyn BrokerClient>,
    resume_requests: Arc<Mutex<HashSet<TopicPartition>>>,
    hooks: Arc<dyn TestHooks>,
}

impl PartitionRegistry {
    pub fn new(
        mode: ConsumerMode,
        worker_cfg: WorkerConfig,
        retry_policy: RetryPolicy,
        dispatcher: Arc<dyn Dispatcher>,
        broker: Arc<dyn BrokerClient>,
        resume_requests: Arc<Mutex<HashSet<TopicPartition>>>,
    ) -> Self {
        Self::with_hooks(
            mode,
            worker_cfg,
            retry_policy,
            dispatcher,
            broker,
            resume_requests,
            hooks::noop_hooks(),
        )
    }

    pub fn with_hooks(
        mode: ConsumerMode,
        worker_cfg: WorkerConfig,
        retry_policy: RetryPolicy,
        dispatcher: Arc<dyn Dispatcher>,
        broker: Arc<dyn BrokerClient>,
        resume_requests: Arc<Mutex<HashSet<TopicPartition>>>,
        hooks: Arc<dyn TestHooks>,
    ) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            mode,
            worker_cfg,
            retry_policy,
            dispatcher,
            broker,
            resume_requests,
            hooks,
        }
    }

    /// Read-through lookup used by the coordinator at fetch granularity. May
    /// return `None` if the partition was revoked mid-poll.
    pub fn get(&self, tp: &TopicPartition) -> Option<Arc<PartitionWorker>> {
        self.workers.lock().unwrap().get(tp).cloned()
    }

    /// Cancels and awaits every worker, then clears the map. Used on
    /// consumer shutdown (spec 4.5).
    pub async fn shutdown(&self) {
        let workers: Vec<Arc<PartitionWorker>> = {
            let mut map = self.workers.lock().unwrap();
            map.drain().map(|(_, worker)| worker).collect()
        };
        for worker in workers {
            worker.stop().await;
        }
    }

    fn spawn_worker(&self, tp: TopicPartition) -> Arc<PartitionWorker> {
        PartitionWorker::spawn(
            tp,
            &self.worker_cfg,
            self.mode.clone(),
            self.retry_policy.clone(),
            self.dispatcher.clone(),
            self.broker.clone(),
            self.resume_requests.clone(),
            self.hooks.clone(),
        )
    }
}

#[async_trait]
impl RebalanceListener for PartitionRegistry {
    async fn on_assigned(&self, partitions: &[TopicPartition]) {
        for tp in partitions {
            info!(topic = %tp.topic, partition = tp.partition, "partition assigned");
            let worker = self.spawn_worker(tp.clone());
            self.workers.lock().unwrap().insert(tp.clone(), worker);
        }
    }

    async fn on_revoked(&self, partitions: &[TopicPartition]) {
        for tp in partitions {
            let worker = self.workers.lock().unwrap().get(tp).cloned();
            if let Some(worker) = worker {
                info!(topic = %tp.topic, partition = tp.partition, "partition revoked, draining worker");
                worker.stop().await;
                self.workers.lock().unwrap().remove(tp);
            }
            self.resume_requests.lock().unwrap().remove(tp);
        }
    }

    async fn on_lost(&self, partitions: &[TopicPartition]) {
        for tp in partitions {
            let worker = self.workers.lock().unwrap().remove(tp);
            self.resume_requests.lock().unwrap().remove(tp);
            if let Some(worker) = worker {
                info!(topic = %tp.topic, partition = tp.partition, "partition lost, dropping worker without awaiting commit");
                // Fire-and-forget: unlike a clean revoke, we don't block the
                // rebalance callback waiting for this partition to drain.
                tokio::spawn(async move { worker.stop().await });
            }
        }
    }
}
