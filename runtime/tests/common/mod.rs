//! In-memory renderer for orchestrator tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use shelfscan::crawl::{CrawlOptions, Pacing};
use shelfscan::renderer::http::StaticContext;
use shelfscan::renderer::{NavigationResult, RenderContext, Renderer, ResourceKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
pub struct Counters {
    pub open: AtomicUsize,
    pub peak: AtomicUsize,
    pub opened: AtomicUsize,
    /// Resource kinds each page was asked to block.
    pub blocked: Mutex<Vec<Vec<ResourceKind>>>,
    /// `"open"` per page opened and the URL per navigation, stamped when the
    /// call starts.
    pub events: Mutex<Vec<(String, Instant)>>,
}

impl Counters {
    fn record(&self, what: &str) {
        self.events
            .lock()
            .unwrap()
            .push((what.to_string(), Instant::now()));
    }
}

/// Serves fixed markup per URL. Unknown URLs fail navigation.
pub struct FakeRenderer {
    pages: Arc<HashMap<String, String>>,
    latency: Duration,
    pub counters: Arc<Counters>,
}

impl FakeRenderer {
    pub fn new(pages: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            pages: Arc::new(pages.into_iter().collect()),
            latency: Duration::from_millis(5),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<(String, Instant)> {
        self.counters.events.lock().unwrap().clone()
    }

    pub fn blocked(&self) -> Vec<Vec<ResourceKind>> {
        self.counters.blocked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.counters.record("open");
        let now = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            pages: Arc::clone(&self.pages),
            latency: self.latency,
            counters: Arc::clone(&self.counters),
            current: StaticContext::from_html(""),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }
}

struct FakeContext {
    pages: Arc<HashMap<String, String>>,
    latency: Duration,
    counters: Arc<Counters>,
    current: StaticContext,
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn block_resources(&mut self, kinds: &[ResourceKind]) -> Result<()> {
        self.counters.blocked.lock().unwrap().push(kinds.to_vec());
        Ok(())
    }

    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        self.counters.record(url);
        tokio::time::sleep(self.latency).await;
        let Some(html) = self.pages.get(url) else {
            bail!("net::ERR_NAME_NOT_RESOLVED at {url}");
        };
        self.current = StaticContext::from_html(html);
        Ok(NavigationResult {
            final_url: url.to_string(),
            status: Some(200),
            load_time_ms: self.latency.as_millis() as u64,
        })
    }

    async fn wait_for_network_idle(&self, _timeout_ms: u64) -> Result<()> {
        bail!("network idle timed out")
    }

    async fn get_html(&self) -> Result<String> {
        self.current.get_html().await
    }

    async fn query_text(&self, selector: &str) -> Result<Option<String>> {
        self.current.query_text(selector).await
    }

    async fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        self.current.query_attr(selector, attr).await
    }

    async fn query_all_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>> {
        self.current.query_all_attr(selector, attr).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn options(concurrency: usize, max_products: usize) -> CrawlOptions {
    CrawlOptions {
        concurrency,
        max_products,
        nav_timeout_ms: 5_000,
        pacing: Pacing::none(),
        fallback_currency: Some("EGP".to_string()),
    }
}

pub fn product_page(name: &str, price: &str, currency: &str) -> String {
    format!(
        r#"<html><head><script type="application/ld+json">
        {{"@context":"https://schema.org","@type":"Product","name":"{name}",
          "offers":{{"@type":"Offer","price":"{price}","priceCurrency":"{currency}",
                     "availability":"https://schema.org/InStock"}}}}
        </script></head><body><h1>{name}</h1><span class="price">{price}</span></body></html>"#
    )
}

/// Every line of an NDJSON file, parsed.
pub fn read_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}
