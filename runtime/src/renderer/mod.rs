//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits the crawl needs from a
//! browser engine: open isolated pages, block resource types, navigate, wait
//! for the network to settle, read markup and query the DOM. Two engines
//! implement it: Chromium via chromiumoxide, and a static HTTP fetcher that
//! answers queries from the raw markup. A third pairs the two, rendering only
//! pages whose static markup looks incomplete.

pub mod auto;
pub mod chromium;
pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Desktop Chrome user agent sent by both engines.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/118 Safari/537.36";

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// HTTP status code, when the engine can see it.
    pub status: Option<u16>,
    /// Time taken to reach DOM-ready in milliseconds.
    pub load_time_ms: u64,
}

/// Request categories a page can refuse to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Media,
    Font,
}

/// Resource types aborted on every crawl page.
pub const BLOCKED_RESOURCES: &[ResourceKind] =
    &[ResourceKind::Image, ResourceKind::Media, ResourceKind::Font];

/// Launch-time options shared by every page of a run.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub user_agent: String,
    pub viewport: (u32, u32),
    /// Default timeout for page operations, in milliseconds.
    pub default_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport: (1366, 768),
            default_timeout_ms: 45_000,
        }
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new isolated page.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser page.
///
/// Query methods return `Err` for an invalid selector and `Ok(None)` /
/// `Ok(vec![])` when nothing matches.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Abort any request whose resource type is in `kinds`; allow the rest.
    async fn block_resources(&mut self, kinds: &[ResourceKind]) -> Result<()>;
    /// Navigate and wait for DOM-ready, failing after `timeout_ms`.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Wait until no requests have started for a short window. Callers treat
    /// an `Err` (usually a timeout) as non-fatal.
    async fn wait_for_network_idle(&self, timeout_ms: u64) -> Result<()>;
    /// Full rendered markup.
    async fn get_html(&self) -> Result<String>;
    /// Trimmed text of the first element matching `selector`.
    async fn query_text(&self, selector: &str) -> Result<Option<String>>;
    /// Attribute `attr` of the first element matching `selector`.
    async fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>>;
    /// Attribute `attr` of every matching element that has it, in document order.
    async fn query_all_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>>;
    /// Close this page.
    async fn close(self: Box<Self>) -> Result<()>;
}
