use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ConsumerMode, WorkerConfig};
use crate::dispatcher::Dispatcher;
use crate::hooks::TestHooks;
use crate::metrics_names;
use crate::record::{self, DispatchIntent, Record, TopicPartition};
use crate::broker::BrokerClient;
use crate::retry::RetryPolicy;

/// One fetch batch for a single partition (spec 3, GLOSSARY "Fetch batch").
#[derive(Debug, Clone)]
pub struct Batch {
    pub records: Vec<Record>,
}

/// Result of `PartitionWorker::submit` (spec 4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitResult {
    Accepted,
    Full,
}

/// Owns one `(topic, partition)`: drains its inbox serially, dispatching
/// through the `Dispatcher` with retries, and marking offsets (spec 3, 4.3).
///
/// Created on partition assignment, destroyed on revocation or shutdown.
/// Owned exclusively by the `PartitionRegistry`.
pub struct PartitionWorker {
    tp: TopicPartition,
    inbox_capacity: usize,
    inbox_tx: mpsc::Sender<Batch>,
    /// Count of batches accepted but not yet fully processed, including the
    /// one currently being drained. Gates `submit` so that capacity is
    /// `PartitionBufferSize + 1` with the `+1` covering the batch actively
    /// being processed (spec 4.3), not an extra slot on top of it.
    in_flight: Arc<AtomicUsize>,
    cancel: CancellationToken,
    paused: AtomicBool,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl PartitionWorker {
    /// Spawns the worker's processing task and returns the handle the
    /// registry keeps.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        tp: TopicPartition,
        worker_cfg: &WorkerConfig,
        mode: ConsumerMode,
        retry_policy: RetryPolicy,
        dispatcher: Arc<dyn Dispatcher>,
        broker: Arc<dyn BrokerClient>,
        resume_requests: Arc<Mutex<std::collections::HashSet<TopicPartition>>>,
        hooks: Arc<dyn TestHooks>,
    ) -> Arc<Self> {
        let inbox_capacity = worker_cfg.inbox_capacity();
        let (inbox_tx, inbox_rx) = mpsc::channel(inbox_capacity);
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let worker = Arc::new(Self {
            tp: tp.clone(),
            inbox_capacity,
            inbox_tx,
            in_flight: in_flight.clone(),
            cancel: cancel.clone(),
            paused: AtomicBool::new(false),
            join_handle: Mutex::new(None),
        });

        let task_tp = tp;
        let task_cancel = cancel;
        let handle = tokio::spawn(Self::run(
            task_tp,
            inbox_capacity,
            inbox_rx,
            task_cancel,
            mode,
            retry_policy,
            dispatcher,
            broker,
            resume_requests,
            hooks,
            in_flight,
        ));
        *worker.join_handle.lock().unwrap() = Some(handle);
        worker
    }

    pub fn topic_partition(&self) -> &TopicPartition {
        &self.tp
    }

    /// Non-blocking (spec 4.3). Returns `Full` when accepting would exceed
    /// `PartitionBufferSize + 1` — the Coordinator's trigger to pause. The
    /// `+1` counts the batch currently being drained, so `in_flight` is
    /// incremented here and only decremented once that batch is fully
    /// processed, not when it's pulled off the channel.
    pub fn submit(&self, batch: Batch) -> SubmitResult {
        loop {
            let current = self.in_flight.load(Ordering::SeqCst);
            if current >= self.inbox_capacity {
                return SubmitResult::Full;
            }
            if self
                .in_flight
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }

        match self.inbox_tx.try_send(batch) {
            Ok(()) => SubmitResult::Accepted,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                SubmitResult::Full
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Worker is mid-revocation: treat like full so the coordinator
                // pauses it instead of looping; the registry will drop the
                // fetch entirely once `Get` returns `None`.
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                SubmitResult::Full
            }
        }
    }

    pub fn mark_paused(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn mark_resumed(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Cancels the worker's context and blocks until its task terminates
    /// (spec 4.3 Revocation). Any in-flight retry exits without marking;
    /// queued batches are dropped.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.join_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            drop(handle.await);
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        tp: TopicPartition,
        inbox_capacity: usize,
        mut inbox_rx: mpsc::Receiver<Batch>,
        cancel: CancellationToken,
        mode: ConsumerMode,
        retry_policy: RetryPolicy,
        dispatcher: Arc<dyn Dispatcher>,
        broker: Arc<dyn BrokerClient>,
        resume_requests: Arc<Mutex<std::collections::HashSet<TopicPartition>>>,
        hooks: Arc<dyn TestHooks>,
        in_flight: Arc<AtomicUsize>,
    ) {
        loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(topic = %tp.topic, partition = tp.partition, "worker cancelled, stopping");
                    return;
                }
                maybe_batch = inbox_rx.recv() => {
                    match maybe_batch {
                        Some(batch) => batch,
                        None => return,
                    }
                }
            };

            // `in_flight` still counts this batch (not yet decremented below),
            // so a reading of `inbox_capacity` here means the inbox was at
            // capacity — including the batch now being drained — immediately
            // before this recv.
            let was_full = in_flight.load(Ordering::SeqCst) >= inbox_capacity;

            let labels = [("topic".to_string(), tp.topic.clone())];
            metrics::counter!(metrics_names::RECORDS_RECEIVED, &labels)
                .increment(batch.records.len() as u64);

            let depth_labels = [
                ("topic".to_string(), tp.topic.clone()),
                ("partition".to_string(), tp.partition.to_string()),
            ];
            metrics::gauge!(metrics_names::PARTITION_INBOX_DEPTH, &depth_labels)
                .set(inbox_rx.len() as f64);

            let mut last_dispatched_offset: Option<i64> = None;

            for rec in batch.records {
                let intent = match record::parse(&rec, &mode) {
                    Ok(intent) => intent,
                    Err(err) => {
                        warn!(
                            topic = %tp.topic, partition = tp.partition, offset = rec.offset,
                            error = %err, "dropping unparseable record"
                        );
                        last_dispatched_offset = Some(rec.offset);
                        continue;
                    }
                };

                if Self::dispatch_with_retry(&tp, &cancel, &dispatcher, &retry_policy, &intent)
                    .await
                    .is_none()
                {
                    // Cancelled mid-record: stop without marking anything for
                    // this record or any record still queued in this batch.
                    return;
                }
                last_dispatched_offset = Some(rec.offset);
            }

            if let Some(offset) = last_dispatched_offset {
                if let Err(err) = broker.mark_commit(&tp, offset + 1) {
                    warn!(topic = %tp.topic, partition = tp.partition, error = %err, "failed to mark commit");
                }
            }

            in_flight.fetch_sub(1, Ordering::SeqCst);

            if was_full {
                resume_requests.lock().unwrap().insert(tp.clone());
                hooks.on_partition_resuming(&tp);
            }
        }
    }

    /// Dispatches `intent`, retrying with backoff until success or
    /// cancellation. Returns `None` on cancellation (caller must not mark
    /// any offset), `Some(())` on success.
    async fn dispatch_with_retry(
        tp: &TopicPartition,
        cancel: &CancellationToken,
        dispatcher: &Arc<dyn Dispatcher>,
        retry_policy: &RetryPolicy,
        intent: &DispatchIntent,
    ) -> Option<()> {
        let mut attempt: u32 = 0;
        loop {
            let dispatch = async {
                match intent {
                    DispatchIntent::Command { method, data } => {
                        dispatcher.dispatch_command(cancel, method, data).await
                    }
                    DispatchIntent::Publication(publication) => {
                        dispatcher
                            .dispatch_publication(cancel, &publication.channels, publication)
                            .await
                    }
                }
            };

            let started_at = std::time::Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                result = dispatch => result,
            };
            let duration_labels = [("topic".to_string(), tp.topic.clone())];
            metrics::histogram!(metrics_names::DISPATCH_DURATION_SECONDS, &duration_labels)
                .record(started_at.elapsed().as_secs_f64());

            match result {
                Ok(()) => return Some(()),
                Err(err) => {
                    let labels = [("topic".to_string(), tp.topic.clone())];
                    metrics::counter!(metrics_names::DISPATCH_ERRORS, &labels).increment(1);
                    warn!(
                        topic = %tp.topic, partition = tp.partition, attempt, error = %err,
                        "dispatch failed, retrying"
                    );
                    let delay = retry_policy.next_delay(attempt);
                    attempt = attempt.saturating_add(1);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
