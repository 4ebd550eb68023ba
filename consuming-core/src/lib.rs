//! The Kafka consuming core of a realtime messaging server: ingests records
//! from Kafka topics, dispatches them to an application-defined handler, and
//! advances committed offsets safely.
//!
//! This crate has no dependency on any particular broker client library —
//! see [`broker::BrokerClient`] — so it is fully unit-testable against an
//! in-memory fake. `consuming-kafka` provides the real `rdkafka`-backed
//! implementation.

pub mod broker;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod metrics_names;
pub mod record;
pub mod registry;
pub mod retry;
pub mod worker;

pub use broker::{BrokerClient, Fetches, RebalanceListener};
pub use config::{ConsumerMode, CoreConfig, PublicationDataModeConfig, RetryPolicyConfig, WorkerConfig};
pub use coordinator::{ConsumerCoordinator, RunOutcome};
pub use dispatcher::Dispatcher;
pub use record::{DispatchIntent, Publication, Record, TopicPartition};
pub use registry::PartitionRegistry;
pub use retry::RetryPolicy;
pub use worker::{Batch, PartitionWorker, SubmitResult};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// Wires a `PartitionRegistry` and `ConsumerCoordinator` together from a
/// validated `CoreConfig`. This is the one constructor most callers need;
/// `consuming-service` uses it directly.
pub fn build(
    config: CoreConfig,
    dispatcher: Arc<dyn Dispatcher>,
    broker: Arc<dyn BrokerClient>,
    cancel: CancellationToken,
) -> (Arc<PartitionRegistry>, ConsumerCoordinator) {
    build_with_hooks(config, dispatcher, broker, cancel, hooks::noop_hooks())
}

pub fn build_with_hooks(
    config: CoreConfig,
    dispatcher: Arc<dyn Dispatcher>,
    broker: Arc<dyn BrokerClient>,
    cancel: CancellationToken,
    hooks: Arc<dyn hooks::TestHooks>,
) -> (Arc<PartitionRegistry>, ConsumerCoordinator) {
    let resume_requests = Arc::new(Mutex::new(HashSet::new()));
    let retry_policy = RetryPolicy::new(config.retry);

    let registry = Arc::new(PartitionRegistry::with_hooks(
        config.mode,
        config.worker,
        retry_policy,
        dispatcher,
        broker.clone(),
        resume_requests.clone(),
        hooks.clone(),
    ));

    let coordinator = ConsumerCoordinator::with_hooks(
        broker,
        registry.clone(),
        cancel,
        resume_requests,
        hooks,
    );

    (registry, coordinator)
}
