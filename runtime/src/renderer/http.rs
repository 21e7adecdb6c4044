//! Static renderer: plain HTTP fetch, DOM queries answered from raw markup.
//!
//! Not a browser: no JavaScript runs, so client-rendered listings come back
//! empty. Useful for server-rendered shops and for running without Chromium.
//! Request blocking and network-idle waits are no-ops here.

use super::{BrowserSettings, NavigationResult, RenderContext, Renderer, ResourceKind};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// HTTP-only renderer backed by reqwest.
pub struct HttpRenderer {
    client: reqwest::Client,
    active_count: Arc<AtomicUsize>,
}

impl HttpRenderer {
    /// Create a renderer sending the configured user agent.
    pub fn new(settings: &BrowserSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.default_timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(settings.user_agent.as_str())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticContext {
            client: Some(self.client.clone()),
            html: String::new(),
            active_count: Some(Arc::clone(&self.active_count)),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// A page holding the last fetched document.
pub struct StaticContext {
    client: Option<reqwest::Client>,
    html: String,
    active_count: Option<Arc<AtomicUsize>>,
}

impl StaticContext {
    /// A detached page over fixed markup. Navigation fails on it.
    pub fn from_html(html: &str) -> Self {
        Self {
            client: None,
            html: html.to_string(),
            active_count: None,
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector `{selector}`: {e:?}"))
}

/// Text content with whitespace runs collapsed, like rendered text.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn select_text(html: &str, selector: &str) -> Result<Option<String>> {
    let sel = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let text = document.select(&sel).next().map(|el| element_text(&el));
    Ok(text)
}

fn select_attr(html: &str, selector: &str, attr: &str) -> Result<Option<String>> {
    let sel = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let value = document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr(attr).map(str::to_string));
    Ok(value)
}

fn select_all_attr(html: &str, selector: &str, attr: &str) -> Result<Vec<String>> {
    let sel = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let values = document
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::to_string)
        .collect();
    Ok(values)
}

#[async_trait]
impl RenderContext for StaticContext {
    async fn block_resources(&mut self, _kinds: &[ResourceKind]) -> Result<()> {
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let Some(client) = &self.client else {
            bail!("static page cannot navigate");
        };
        let start = Instant::now();

        let resp = client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .with_context(|| format!("navigation to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("navigation to {url} returned HTTP {}", status.as_u16());
        }
        let final_url = resp.url().to_string();
        let html = resp.text().await.context("failed to read response body")?;

        self.html = html;

        Ok(NavigationResult {
            final_url,
            status: Some(status.as_u16()),
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn wait_for_network_idle(&self, _timeout_ms: u64) -> Result<()> {
        Ok(())
    }

    async fn get_html(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn query_text(&self, selector: &str) -> Result<Option<String>> {
        select_text(&self.html, selector)
    }

    async fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        select_attr(&self.html, selector, attr)
    }

    async fn query_all_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>> {
        select_all_attr(&self.html, selector, attr)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Some(count) = &self.active_count {
            count.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
