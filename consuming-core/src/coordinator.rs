use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::broker::BrokerClient;
use crate::hooks::{self, TestHooks};
use crate::metrics_names;
use crate::record::TopicPartition;
use crate::registry::PartitionRegistry;
use crate::worker::{Batch, SubmitResult};

/// Distinguished, non-error return of `ConsumerCoordinator::run` (spec 3, 7):
/// cancellation is a signal, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Cancelled,
}

/// Drives the fetch loop: routes fetched records to workers, applies
/// pause/resume to the broker client, and coordinates shutdown (spec 4.5).
pub struct ConsumerCoordinator {
    broker: Arc<dyn BrokerClient>,
    registry: Arc<PartitionRegistry>,
    cancel: CancellationToken,
    resume_requests: Arc<Mutex<HashSet<TopicPartition>>>,
    hooks: Arc<dyn TestHooks>,
}

impl ConsumerCoordinator {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        registry: Arc<PartitionRegistry>,
        cancel: CancellationToken,
        resume_requests: Arc<Mutex<HashSet<TopicPartition>>>,
    ) -> Self {
        Self::with_hooks(
            broker,
            registry,
            cancel,
            resume_requests,
            hooks::noop_hooks(),
        )
    }

    pub fn with_hooks(
        broker: Arc<dyn BrokerClient>,
        registry: Arc<PartitionRegistry>,
        cancel: CancellationToken,
        resume_requests: Arc<Mutex<HashSet<TopicPartition>>>,
        hooks: Arc<dyn TestHooks>,
    ) -> Self {
        Self {
            broker,
            registry,
            cancel,
            resume_requests,
            hooks,
        }
    }

    pub async fn run(&self) -> RunOutcome {
        while !self.cancel.is_cancelled() {
            match self.broker.poll_fetches(&self.cancel).await {
                Ok(fetches) => {
                    let paused_this_iteration = self.route_fetches(fetches);
                    self.drain_resume_requests(&paused_this_iteration);
                }
                Err(err) => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    debug!(error = %err, "transient fetch error, retrying");
                }
            }
        }

        self.registry.shutdown().await;
        self.broker.close().await;
        RunOutcome::Cancelled
    }

    /// Routes each partition's batch to its worker, pausing any partition
    /// whose worker rejects the batch (spec 4.5, invariant I3, I5). Returns
    /// the set of partitions paused this iteration, so resume decisions can
    /// give pause the win (spec 4.5 "Pause-after-resume race").
    fn route_fetches(
        &self,
        fetches: std::collections::HashMap<TopicPartition, Vec<crate::record::Record>>,
    ) -> HashSet<TopicPartition> {
        let mut paused_this_iteration = HashSet::new();

        for (tp, records) in fetches {
            let Some(worker) = self.registry.get(&tp) else {
                continue;
            };

            self.hooks.on_batch_submitted(&tp);
            match worker.submit(Batch { records }) {
                SubmitResult::Accepted => {}
                SubmitResult::Full => {
                    let mut set = HashSet::with_capacity(1);
                    set.insert(tp.clone());

                    self.hooks.on_partition_pausing(&tp);
                    // Pause before marking the worker paused, so no new
                    // fetch for this partition can arrive between the two.
                    self.broker.pause_partitions(&set);
                    worker.mark_paused();

                    let labels = [("topic".to_string(), tp.topic.clone())];
                    metrics::counter!(metrics_names::PARTITIONS_PAUSED, &labels).increment(1);

                    paused_this_iteration.insert(tp);
                }
            }
        }

        paused_this_iteration
    }

    /// Collects pending resume requests from workers into one set and issues
    /// a single `resume_partitions` call, excluding anything paused this same
    /// iteration (spec 4.5 "Resume handling", "Pause-after-resume race").
    fn drain_resume_requests(&self, paused_this_iteration: &HashSet<TopicPartition>) {
        let mut to_resume: HashSet<TopicPartition> =
            std::mem::take(&mut *self.resume_requests.lock().unwrap());

        to_resume.retain(|tp| !paused_this_iteration.contains(tp));
        if to_resume.is_empty() {
            return;
        }

        for tp in &to_resume {
            if let Some(worker) = self.registry.get(tp) {
                worker.mark_resumed();
            } else {
                warn!(topic = %tp.topic, partition = tp.partition, "resume requested for revoked partition, ignoring");
            }
        }

        self.broker.resume_partitions(&to_resume);
    }
}
