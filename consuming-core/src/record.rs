use std::collections::HashMap;
use std::fmt;

use crate::config::ConsumerMode;
use crate::error::ParseError;

/// A (topic, partition) pair. Hashable and compared by value, as required by
/// the registry's map key and the coordinator's pause/resume sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// An immutable record as fetched from the broker client. `headers` preserves
/// broker order; duplicate header keys are legal and both are kept.
#[derive(Debug, Clone)]
pub struct Record {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub value: Vec<u8>,
    pub headers: Vec<(String, Vec<u8>)>,
    pub timestamp_millis: i64,
}

impl Record {
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_slice())
    }

    fn header_str(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(|v| std::str::from_utf8(v).ok())
    }
}

/// A publication destined for fan-out to named channels, as opposed to a
/// server command (see `DispatchIntent::Command`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub channels: Vec<String>,
    pub data: Vec<u8>,
    pub idempotency_key: String,
    pub delta: bool,
    pub tags: Option<HashMap<String, String>>,
}

/// What the record parser turns a `Record` into, and what the `Dispatcher`
/// is asked to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchIntent {
    Command { method: String, data: Vec<u8> },
    Publication(Publication),
}

/// Turn a raw record into a `DispatchIntent` per the consumer's mode
/// configuration (spec 4.1).
pub fn parse(record: &Record, mode: &ConsumerMode) -> Result<DispatchIntent, ParseError> {
    match mode {
        ConsumerMode::Command => Ok(DispatchIntent::Command {
            method: String::new(),
            data: record.value.clone(),
        }),
        ConsumerMode::PublicationData(cfg) => {
            let raw_channels = record
                .header_str(&cfg.channels_header)
                .unwrap_or("")
                .trim();
            if raw_channels.is_empty() {
                return Err(ParseError::MissingChannelsHeader(cfg.channels_header.clone()));
            }
            let channels: Vec<String> = raw_channels
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if channels.is_empty() {
                return Err(ParseError::MissingChannelsHeader(cfg.channels_header.clone()));
            }

            let idempotency_key = cfg
                .idempotency_key_header
                .as_deref()
                .and_then(|h| record.header_str(h))
                .unwrap_or("")
                .to_string();

            let delta = cfg
                .delta_header
                .as_deref()
                .and_then(|h| record.header_str(h))
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);

            let tags = cfg.tags_header_prefix.as_deref().map(|prefix| {
                record
                    .headers
                    .iter()
                    .filter_map(|(key, value)| {
                        key.strip_prefix(prefix).map(|stripped| {
                            (
                                stripped.to_string(),
                                String::from_utf8_lossy(value).into_owned(),
                            )
                        })
                    })
                    .collect::<HashMap<_, _>>()
            });

            Ok(DispatchIntent::Publication(Publication {
                channels,
                data: record.value.clone(),
                idempotency_key,
                delta,
                tags,
            }))
        }
    }
}
