//! Terminal progress for `shelfscan run`, driven by crawl events.

use crate::progress::{CrawlEvent, ProgressReceiver};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Seed-level bar. The position counts finished seeds.
pub fn create(seeds: usize) -> ProgressBar {
    let pb = ProgressBar::new(seeds as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} seeds {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Follow `rx` until the run completes or the channel closes.
pub fn spawn(pb: ProgressBar, mut rx: ProgressReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut records = 0usize;
        let mut errors = 0usize;
        loop {
            let event = match rx.recv().await {
                Ok(ev) => ev.event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            match event {
                CrawlEvent::RecordEmitted { error, .. } => {
                    records += 1;
                    if error {
                        errors += 1;
                    }
                    pb.set_message(format!("{records} records, {errors} errors"));
                }
                CrawlEvent::SeedFinished { .. } => pb.inc(1),
                CrawlEvent::RunComplete { .. } => break,
                _ => {}
            }
        }
        pb.finish_and_clear();
    })
}
