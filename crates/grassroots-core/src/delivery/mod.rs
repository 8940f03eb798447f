//! Delivery of outbox entries to the remote ingestion endpoint.
//!
//! Delivery is at-least-once: an entry is only marked Delivered after the
//! sink acknowledged it, and a crash in between means it is sent again. The
//! endpoint deduplicates on the record's natural key.

mod connectivity;
mod http;
mod worker;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::models::EventRecord;

pub use connectivity::{spawn_probe, Connectivity};
pub use http::{HttpEventSink, IDEMPOTENCY_KEY_HEADER};
pub use worker::{DeliveryHandle, DeliveryWorker, PassReport};

/// Why a single submission failed. Never surfaced to the capture path.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Invalid delivery endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Delivery HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Endpoint rejected event: {message}")]
    Rejected { status: u16, message: String },
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),
}

/// Destination for captured events.
pub trait EventSink: Send + Sync {
    /// Submit one record. `Ok` means the endpoint acknowledged it.
    fn submit(
        &self,
        record: &EventRecord,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Whether the endpoint currently looks reachable.
    fn probe(&self) -> impl Future<Output = bool> + Send {
        async { true }
    }
}

impl<S: EventSink> EventSink for Arc<S> {
    fn submit(
        &self,
        record: &EventRecord,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        (**self).submit(record)
    }

    fn probe(&self) -> impl Future<Output = bool> + Send {
        (**self).probe()
    }
}
