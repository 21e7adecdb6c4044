//! Where records go once they are built: the NDJSON file, then optionally a
//! webhook, either per record or as one batch at the end of the run.

pub mod delivery;
pub mod sink;

pub use delivery::{BatchCollector, Delivery, DeliveryError, WebhookMode, WebhookSettings};
pub use sink::RecordSink;

use crate::error::Result;
use crate::record::ProductRecord;
use std::path::Path;
use tracing::{debug, warn};

/// Sink plus delivery, shared by every crawl worker.
pub struct Output {
    sink: RecordSink,
    delivery: Option<Delivery>,
    batch: Option<BatchCollector>,
}

/// What happened when the run's output was closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputReport {
    pub lines_written: u64,
    /// Records carried by the final batch POST, if one was attempted.
    pub batch_size: Option<usize>,
    pub batch_delivered: bool,
}

impl Output {
    /// Open the output file and set up delivery.
    pub async fn open(path: &Path, webhook: &WebhookSettings) -> Result<Self> {
        let sink = RecordSink::create(path).await?;
        Ok(Self::new(sink, Delivery::new(webhook)))
    }

    pub fn new(sink: RecordSink, delivery: Option<Delivery>) -> Self {
        let batch = delivery
            .as_ref()
            .filter(|d| d.mode() == WebhookMode::Batch)
            .map(|_| BatchCollector::new());
        Self {
            sink,
            delivery,
            batch,
        }
    }

    /// Write a record, forward it in line mode, and keep it for batch mode.
    pub async fn emit(&self, record: ProductRecord) {
        if let Err(e) = self.sink.append(&record).await {
            warn!(path = %self.sink.path().display(), "failed to write record: {e}");
        }

        if let Some(delivery) = &self.delivery {
            if let Err(e) = delivery.deliver_line(&record).await {
                debug!("line delivery dropped: {e}");
            }
        }

        if let Some(batch) = &self.batch {
            batch.push(record);
        }
    }

    /// Flush the file, then attempt the batch POST once.
    pub async fn finish(self) -> OutputReport {
        if let Err(e) = self.sink.close().await {
            warn!(path = %self.sink.path().display(), "failed to flush output: {e}");
        }

        let mut report = OutputReport {
            lines_written: self.sink.lines(),
            ..Default::default()
        };

        if let (Some(delivery), Some(batch)) = (&self.delivery, &self.batch) {
            let items = batch.take();
            report.batch_size = Some(items.len());
            match delivery.deliver_batch(&items).await {
                Ok(()) => report.batch_delivered = true,
                Err(e) => warn!(items = items.len(), "batch delivery failed: {e}"),
            }
        }

        report
    }
}
