// Copyright 2026 Shelfscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for crawl telemetry.
//!
//! The orchestrator emits `ProgressEvent`s as seeds start, products are
//! discovered and records are written. They flow through a
//! `tokio::sync::broadcast` channel to any subscriber (the CLI progress bar,
//! tests). When no subscriber exists, events are silently dropped.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A progress event emitted during a crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: CrawlEvent,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CrawlEvent {
    /// The run has started.
    RunStarted { seeds: usize, concurrency: usize },
    /// A worker picked up a seed URL.
    SeedStarted { url: String },
    /// Product pages found for a seed. `from_listing` is false when the seed
    /// itself is treated as the only product page.
    ProductsDiscovered {
        url: String,
        count: usize,
        from_listing: bool,
    },
    /// A record was written.
    RecordEmitted {
        source_url: String,
        notes: String,
        error: bool,
    },
    /// A seed failed before any product could be processed.
    SeedFailed { url: String, message: String },
    /// A worker finished a seed (successfully or not).
    SeedFinished {
        url: String,
        records: usize,
        elapsed_ms: u64,
    },
    /// Every seed has been processed.
    RunComplete {
        seeds: usize,
        records: usize,
        errors: usize,
        elapsed_ms: u64,
    },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(1024)
}

/// Shared emitter: stamps events with the run id and a sequence number.
#[derive(Debug)]
pub struct Progress {
    tx: Option<ProgressSender>,
    run_id: String,
    seq: AtomicU64,
}

impl Progress {
    pub fn new(tx: Option<ProgressSender>) -> Self {
        Self {
            tx,
            run_id: uuid::Uuid::new_v4().to_string(),
            seq: AtomicU64::new(0),
        }
    }

    /// An emitter with nobody listening.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Emit an event, ignoring send errors (no receivers).
    pub fn emit(&self, event: CrawlEvent) {
        if let Some(sender) = &self.tx {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = sender.send(ProgressEvent {
                run_id: self.run_id.clone(),
                seq,
                event,
            });
        }
    }
}
