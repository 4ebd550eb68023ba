use std::sync::Arc;

use crate::record::TopicPartition;

/// Test-only hooks the coordinator and workers fire at race-prone points
/// (spec 9 Design Notes). No-ops when unset; production callers use
/// `NoopHooks`.
pub trait TestHooks: Send + Sync {
    /// A fetched batch is about to be submitted to `tp`'s worker.
    fn on_batch_submitted(&self, _tp: &TopicPartition) {}
    /// `tp` is about to be paused because its worker's inbox is full.
    fn on_partition_pausing(&self, _tp: &TopicPartition) {}
    /// `tp` is about to be resumed because its worker drained.
    fn on_partition_resuming(&self, _tp: &TopicPartition) {}
}

#[derive(Default)]
pub struct NoopHooks;

impl TestHooks for NoopHooks {}

pub fn noop_hooks() -> Arc<dyn TestHooks> {
    Arc::new(NoopHooks)
}
