//! Names of the counters the core emits (spec 6). Exposing them on a
//! Prometheus registry is the collaborator's concern — `consuming-service`
//! wires these into `common-metrics`.

pub const RECORDS_RECEIVED: &str = "records_received";
pub const DISPATCH_ERRORS: &str = "dispatch_errors";
pub const PARTITIONS_PAUSED: &str = "partitions_paused";

/// Supplemental to the spec's three counters (SPEC_FULL.md ambient stack):
/// current depth of a partition's inbox, and how long dispatch calls take.
pub const PARTITION_INBOX_DEPTH: &str = "partition_inbox_depth";
pub const DISPATCH_DURATION_SECONDS: &str = "dispatch_duration_seconds";
