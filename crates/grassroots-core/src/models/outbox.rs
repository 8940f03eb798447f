//! Outbox entry model

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::event::EventRecord;
use crate::error::Error;

/// Locally unique, monotonically assigned outbox id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxEntryId(i64);

impl OutboxEntryId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OutboxEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OutboxEntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Delivery state. Only ever moves Pending -> Delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Delivered,
}

impl DeliveryState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
        }
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            other => Err(Error::StorageUnavailable(format!(
                "unknown delivery state '{other}' in outbox"
            ))),
        }
    }
}

/// A persisted event awaiting (or past) delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: OutboxEntryId,
    pub payload: EventRecord,
    pub delivery_state: DeliveryState,
    /// Enqueue time (Unix ms)
    pub created_at: i64,
    /// Acknowledgment time (Unix ms)
    pub delivered_at: Option<i64>,
    /// Failed submission attempts so far
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl OutboxEntry {
    pub fn is_pending(&self) -> bool {
        self.delivery_state == DeliveryState::Pending
    }

    pub fn is_delivered(&self) -> bool {
        self.delivery_state == DeliveryState::Delivered
    }
}

/// Result of a `mark_delivered` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Delivered,
    AlreadyDelivered,
    /// The id was purged or never existed. Benign.
    NotFound,
}

/// Which delivered entries to keep when pruning. Pending entries are never pruned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetentionPolicy {
    #[default]
    KeepAll,
    /// Keep the newest `count` delivered entries
    KeepLatest { count: usize },
    /// Drop delivered entries acknowledged more than `max_age_secs` ago
    OlderThan { max_age_secs: u64 },
}

impl RetentionPolicy {
    pub const fn keeps_everything(self) -> bool {
        matches!(self, Self::KeepAll)
    }

    pub const fn max_age(self) -> Option<Duration> {
        match self {
            Self::OlderThan { max_age_secs } => Some(Duration::from_secs(max_age_secs)),
            _ => None,
        }
    }
}
