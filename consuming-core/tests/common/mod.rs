use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use consuming_core::{BrokerClient, Fetches, Publication, Record, TopicPartition};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// An in-memory `BrokerClient` for tests: records are pushed onto a queue via
/// `produce`, `poll_fetches` drains whatever is pending (grouped by
/// partition), and pause/resume/mark_commit are recorded for assertions.
pub struct FakeBroker {
    pending: Mutex<Vec<Record>>,
    notify: Notify,
    pub paused: Mutex<HashSet<TopicPartition>>,
    pub pause_calls: Mutex<Vec<HashSet<TopicPartition>>>,
    pub resume_calls: Mutex<Vec<HashSet<TopicPartition>>>,
    pub committed: Mutex<HashMap<TopicPartition, i64>>,
    pub closed: AtomicI64,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(Vec::new()),
            notify: Notify::new(),
            paused: Mutex::new(HashSet::new()),
            pause_calls: Mutex::new(Vec::new()),
            resume_calls: Mutex::new(Vec::new()),
            committed: Mutex::new(HashMap::new()),
            closed: AtomicI64::new(0),
        })
    }

    /// Produces one record and wakes up a waiting `poll_fetches`.
    pub fn produce(&self, record: Record) {
        self.pending.lock().unwrap().push(record);
        self.notify.notify_one();
    }

    pub fn committed_offset(&self, tp: &TopicPartition) -> Option<i64> {
        self.committed.lock().unwrap().get(tp).copied()
    }

    pub fn is_paused(&self, tp: &TopicPartition) -> bool {
        self.paused.lock().unwrap().contains(tp)
    }
}

#[async_trait]
impl BrokerClient for FakeBroker {
    async fn poll_fetches(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Fetches, consuming_core::error::BrokerError> {
        {
            let mut pending = self.pending.lock().unwrap();
            if !pending.is_empty() {
                let mut by_partition: Fetches = HashMap::new();
                for record in pending.drain(..) {
                    by_partition
                        .entry(record.topic_partition())
                        .or_default()
                        .push(record);
                }
                return Ok(by_partition);
            }
        }
        // A real broker's poll has a bounded timeout and returns an empty
        // result rather than blocking forever, so the coordinator's loop
        // keeps turning over (draining resume requests, checking
        // cancellation) even when no new records are waiting.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = self.notify.notified() => {}
            _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
        }
        let mut pending = self.pending.lock().unwrap();
        let mut by_partition: Fetches = HashMap::new();
        for record in pending.drain(..) {
            by_partition
                .entry(record.topic_partition())
                .or_default()
                .push(record);
        }
        Ok(by_partition)
    }

    fn pause_partitions(&self, partitions: &HashSet<TopicPartition>) {
        self.paused.lock().unwrap().extend(partitions.iter().cloned());
        self.pause_calls.lock().unwrap().push(partitions.clone());
    }

    fn resume_partitions(&self, partitions: &HashSet<TopicPartition>) {
        let mut paused = self.paused.lock().unwrap();
        for tp in partitions {
            paused.remove(tp);
        }
        self.resume_calls.lock().unwrap().push(partitions.clone());
    }

    fn mark_commit(
        &self,
        tp: &TopicPartition,
        offset: i64,
    ) -> Result<(), consuming_core::error::BrokerError> {
        self.committed.lock().unwrap().insert(tp.clone(), offset);
        Ok(())
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedDispatch {
    Command { method: String, data: Vec<u8> },
    Publication(Publication),
}

/// Records every dispatch call it receives; fails the first
/// `default_behavior_fail_times` command calls, then always succeeds.
pub struct RecordingDispatcher {
    pub calls: Mutex<Vec<RecordedDispatch>>,
    attempts: AtomicI64,
    default_behavior_fail_times: AtomicI64,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            attempts: AtomicI64::new(0),
            default_behavior_fail_times: AtomicI64::new(0),
        })
    }

    pub fn set_fail_times(&self, n: usize) {
        self.default_behavior_fail_times.store(n as i64, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl consuming_core::Dispatcher for RecordingDispatcher {
    async fn dispatch_command(
        &self,
        _cancel: &CancellationToken,
        method: &str,
        data: &[u8],
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(RecordedDispatch::Command {
            method: method.to_string(),
            data: data.to_vec(),
        });
        let attempt: i64 = self.attempts.fetch_add(1, Ordering::SeqCst);
        let fail_times = self.default_behavior_fail_times.load(Ordering::SeqCst);
        if attempt < fail_times {
            anyhow::bail!("simulated failure {attempt}");
        }
        Ok(())
    }

    async fn dispatch_publication(
        &self,
        _cancel: &CancellationToken,
        _channels: &[String],
        publication: &Publication,
    ) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(RecordedDispatch::Publication(publication.clone()));
        Ok(())
    }
}

/// A dispatcher that blocks the first call for a given topic forever (until
/// cancelled), and otherwise succeeds immediately. Used for the
/// head-of-line-blocking tests (spec P2, seed scenarios 3 and 4).
pub struct BlockingDispatcher {
    #[allow(dead_code)]
    pub blocked_topic: String,
    #[allow(dead_code)]
    pub blocked_partition: i32,
    pub block_hit: Arc<tokio::sync::Notify>,
    already_blocked: std::sync::atomic::AtomicBool,
    pub unblocked_calls: Mutex<Vec<RecordedDispatch>>,
}

impl BlockingDispatcher {
    pub fn new(blocked_topic: &str, blocked_partition: i32) -> Arc<Self> {
        Arc::new(Self {
            blocked_topic: blocked_topic.to_string(),
            blocked_partition,
            block_hit: Arc::new(tokio::sync::Notify::new()),
            already_blocked: std::sync::atomic::AtomicBool::new(false),
            unblocked_calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl consuming_core::Dispatcher for BlockingDispatcher {
    async fn dispatch_command(
        &self,
        cancel: &CancellationToken,
        method: &str,
        data: &[u8],
    ) -> anyhow::Result<()> {
        if !self.already_blocked.swap(true, Ordering::SeqCst) {
            self.block_hit.notify_one();
            // Block until the test cancels us; never returns normally.
            cancel.cancelled().await;
            anyhow::bail!("cancelled while blocked");
        }
        self.unblocked_calls
            .lock()
            .unwrap()
            .push(RecordedDispatch::Command {
                method: method.to_string(),
                data: data.to_vec(),
            });
        Ok(())
    }

    async fn dispatch_publication(
        &self,
        _cancel: &CancellationToken,
        _channels: &[String],
        publication: &Publication,
    ) -> anyhow::Result<()> {
        self.unblocked_calls
            .lock()
            .unwrap()
            .push(RecordedDispatch::Publication(publication.clone()));
        Ok(())
    }
}

/// A dispatcher whose first call blocks until the test explicitly
/// `release()`s it, then succeeds immediately for every call (including the
/// one that was blocked). Used for pause/resume tests, where a worker needs
/// to unstick without being cancelled.
pub struct ReleasableBlockingDispatcher {
    pub block_hit: Arc<Notify>,
    release: Arc<Notify>,
    already_blocked: std::sync::atomic::AtomicBool,
}

impl ReleasableBlockingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            block_hit: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            already_blocked: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl consuming_core::Dispatcher for ReleasableBlockingDispatcher {
    async fn dispatch_command(
        &self,
        _cancel: &CancellationToken,
        _method: &str,
        _data: &[u8],
    ) -> anyhow::Result<()> {
        if !self.already_blocked.swap(true, Ordering::SeqCst) {
            self.block_hit.notify_one();
            self.release.notified().await;
        }
        Ok(())
    }

    async fn dispatch_publication(
        &self,
        _cancel: &CancellationToken,
        _channels: &[String],
        _publication: &Publication,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn command_record(topic: &str, partition: i32, offset: i64, value: &[u8]) -> Record {
    Record {
        topic: topic.to_string(),
        partition,
        offset,
        value: value.to_vec(),
        headers: Vec::new(),
        timestamp_millis: 0,
    }
}

pub fn publication_record(
    topic: &str,
    partition: i32,
    offset: i64,
    value: &[u8],
    headers: &[(&str, &str)],
) -> Record {
    Record {
        topic: topic.to_string(),
        partition,
        offset,
        value: value.to_vec(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect(),
        timestamp_millis: 0,
    }
}
