//! Auto renderer: static fetch first, the browser only when the markup
//! looks thin.
//!
//! Each page fetches over plain HTTP. When that fails, or the document is
//! short or shows no price, the same URL is loaded in a browser page and
//! whichever document is longer is kept. The browser page is opened on first
//! need and reused for the rest of the page's life, so a worker never holds
//! more than one browser page.

use super::{NavigationResult, RenderContext, Renderer, ResourceKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Static documents at least this long are trusted if they show a price.
pub const COMPLETE_PAGE_BYTES: usize = 30_000;

fn price_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:EGP|ج\.م|LE|جنيه)\s*[\d,.]+|[\d,.]+\s*(?:EGP|ج\.م|LE|جنيه)")
            .expect("price marker regex is valid")
    })
}

/// Whether static markup can be used without rendering.
pub fn looks_complete(html: &str) -> bool {
    html.len() >= COMPLETE_PAGE_BYTES && price_marker_re().is_match(html)
}

/// Pairs a cheap engine with a rendering one.
pub struct AutoRenderer {
    fast: Arc<dyn Renderer>,
    full: Arc<dyn Renderer>,
    active_count: Arc<AtomicUsize>,
}

impl AutoRenderer {
    pub fn new(fast: Arc<dyn Renderer>, full: Arc<dyn Renderer>) -> Self {
        Self {
            fast,
            full,
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Renderer for AutoRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let fast = self.fast.new_context().await?;
        self.active_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(AutoContext {
            fast,
            full: None,
            full_renderer: Arc::clone(&self.full),
            blocked: Vec::new(),
            rendered: false,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let full = self.full.shutdown().await;
        self.fast.shutdown().await?;
        full
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }
}

struct AutoContext {
    fast: Box<dyn RenderContext>,
    full: Option<Box<dyn RenderContext>>,
    full_renderer: Arc<dyn Renderer>,
    blocked: Vec<ResourceKind>,
    /// The last navigation kept the browser's document.
    rendered: bool,
    active_count: Arc<AtomicUsize>,
}

impl AutoContext {
    async fn navigate_full(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let page = match self.full.take() {
            Some(page) => page,
            None => {
                let mut page = self.full_renderer.new_context().await?;
                if let Err(e) = page.block_resources(&self.blocked).await {
                    let _ = page.close().await;
                    return Err(e);
                }
                page
            }
        };
        let full = self.full.insert(page);
        full.navigate(url, timeout_ms).await
    }

    /// The browser's markup for the current URL, or `None` when the browser
    /// failed or produced nothing longer than `static_len`.
    async fn try_rendered(
        &mut self,
        url: &str,
        timeout_ms: u64,
        static_len: usize,
    ) -> Option<NavigationResult> {
        let nav = match self.navigate_full(url, timeout_ms).await {
            Ok(nav) => nav,
            Err(e) => {
                debug!(url, "render failed, keeping static markup: {e:#}");
                return None;
            }
        };
        let html = self.full.as_ref()?.get_html().await.ok()?;
        (html.len() > static_len).then_some(nav)
    }

    fn active(&self) -> &dyn RenderContext {
        match &self.full {
            Some(full) if self.rendered => &**full,
            _ => &*self.fast,
        }
    }
}

#[async_trait]
impl RenderContext for AutoContext {
    async fn block_resources(&mut self, kinds: &[ResourceKind]) -> Result<()> {
        self.blocked = kinds.to_vec();
        self.fast.block_resources(kinds).await?;
        if let Some(full) = &mut self.full {
            full.block_resources(kinds).await?;
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let nav = match self.fast.navigate(url, timeout_ms).await {
            Ok(nav) => nav,
            Err(e) => {
                debug!(url, "static fetch failed, rendering: {e:#}");
                self.rendered = false;
                let nav = self
                    .navigate_full(url, timeout_ms)
                    .await
                    .with_context(|| format!("static fetch failed: {e:#}"))?;
                self.rendered = true;
                return Ok(nav);
            }
        };

        let html = self.fast.get_html().await?;
        if looks_complete(&html) {
            self.rendered = false;
            return Ok(nav);
        }

        match self.try_rendered(url, timeout_ms, html.len()).await {
            Some(rendered) => {
                debug!(url, "using rendered markup");
                self.rendered = true;
                Ok(rendered)
            }
            None => {
                self.rendered = false;
                Ok(nav)
            }
        }
    }

    async fn wait_for_network_idle(&self, timeout_ms: u64) -> Result<()> {
        match &self.full {
            Some(full) if self.rendered => full.wait_for_network_idle(timeout_ms).await,
            _ => Ok(()),
        }
    }

    async fn get_html(&self) -> Result<String> {
        self.active().get_html().await
    }

    async fn query_text(&self, selector: &str) -> Result<Option<String>> {
        self.active().query_text(selector).await
    }

    async fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        self.active().query_attr(selector, attr).await
    }

    async fn query_all_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>> {
        self.active().query_all_attr(selector, attr).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        let fast = self.fast.close().await;
        if let Some(full) = self.full {
            full.close().await?;
        }
        fast
    }
}
