// Copyright 2026 Shelfscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shelfscan runtime library: product records from e-commerce pages.
//!
//! Seed URLs are crawled with a bounded pool of browser pages. Each product
//! page yields schema.org JSON-LD records, or a selector-extracted record when
//! the page carries none. Records are appended to an NDJSON file and
//! optionally forwarded to a webhook.

pub mod cli;
pub mod config;
pub mod crawl;
pub mod error;
pub mod extraction;
pub mod normalize;
pub mod output;
pub mod progress;
pub mod record;
pub mod renderer;
pub mod selectors;

pub use config::{CrawlConfig, Engine};
pub use crawl::{CrawlOptions, Crawler, Pacing, RunSummary};
pub use error::{Result, ShelfscanError};
pub use output::{Output, OutputReport, WebhookMode, WebhookSettings};
pub use record::{ExtractedProduct, FailedProduct, ProductRecord, StructuredProduct};
pub use selectors::SelectorConfig;
