use thiserror::Error;

/// Errors detected at construction time (spec 7: `ConfigError`). Construction
/// fails without starting any task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PublicationDataMode.ChannelsHeader must be set when publication-data mode is enabled")]
    MissingChannelsHeaderConfig,
    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),
}

/// A record could not be turned into a `DispatchIntent` (spec 4.1). Logged,
/// offset marked, record dropped — retrying would not help.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing or empty {0} header")]
    MissingChannelsHeader(String),
}

/// Errors surfaced by the `BrokerClient` (spec 6, 7).
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] anyhow::Error),
    #[error("mark commit failed: {0}")]
    MarkCommit(#[source] anyhow::Error),
}
