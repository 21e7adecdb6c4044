//! Chromium-based renderer using chromiumoxide.

use super::{BrowserSettings, NavigationResult, RenderContext, Renderer, ResourceKind};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::trace;

/// How long the resource count must stay flat to count as network idle.
const IDLE_WINDOW: Duration = Duration::from_millis(500);
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. SHELFSCAN_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("SHELFSCAN_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.shelfscan/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".shelfscan/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".shelfscan/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".shelfscan/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".shelfscan/chromium/chrome-linux64/chrome"),
                home.join(".shelfscan/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

fn cdp_resource_type(kind: ResourceKind) -> ResourceType {
    match kind {
        ResourceKind::Image => ResourceType::Image,
        ResourceKind::Media => ResourceType::Media,
        ResourceKind::Font => ResourceType::Font,
    }
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_agent: String,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance with the given settings.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let (width, height) = settings.viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Viewport::default()
            })
            .request_timeout(Duration::from_millis(settings.default_timeout_ms))
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = find_chromium() {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            handler_task,
            user_agent: settings.user_agent.clone(),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        if let Err(e) = page
            .execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
        {
            // Never counted as open, so the target must not outlive this call.
            let _ = page.close().await;
            return Err(anyhow!(e).context("failed to set user agent"));
        }

        self.active_count.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ChromiumContext {
            page,
            interceptor: None,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // The browser process exits when `browser` is dropped.
        self.handler_task.abort();
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    interceptor: Option<JoinHandle<()>>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    /// Evaluate an expression and decode its JSON-serialised result.
    async fn eval_json<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let script = format!("JSON.stringify((() => {{ {expression} }})() ?? null)");
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;
        let raw: String = result
            .into_value()
            .map_err(|e| anyhow!("failed to convert JS result: {e:?}"))?;
        serde_json::from_str(&raw).context("unexpected JS result")
    }
}

/// JS string literal for `s`.
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn block_resources(&mut self, kinds: &[ResourceKind]) -> Result<()> {
        let blocked: Vec<ResourceType> = kinds.iter().copied().map(cdp_resource_type).collect();

        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .context("failed to subscribe to paused requests")?;
        self.page
            .execute(
                EnableParams::builder()
                    .pattern(RequestPattern::builder().url_pattern("*").build())
                    .build(),
            )
            .await
            .context("failed to enable request interception")?;

        let page = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let request_id = event.request_id.clone();
                let outcome = if blocked.contains(&event.resource_type) {
                    page.execute(FailRequestParams::new(request_id, ErrorReason::BlockedByClient))
                        .await
                        .map(|_| ())
                } else {
                    page.execute(ContinueRequestParams::new(request_id))
                        .await
                        .map(|_| ())
                };
                if let Err(e) = outcome {
                    trace!("intercepted request not resolved: {e}");
                }
            }
        });
        if let Some(previous) = self.interceptor.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    status: None,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn wait_for_network_idle(&self, timeout_ms: u64) -> Result<()> {
        let poll = async {
            let mut last: i64 = -1;
            let mut stable_since = Instant::now();
            loop {
                let count: i64 = self
                    .eval_json("return performance.getEntriesByType('resource').length;")
                    .await?;
                if count != last {
                    last = count;
                    stable_since = Instant::now();
                } else if stable_since.elapsed() >= IDLE_WINDOW {
                    return Ok::<(), anyhow::Error>(());
                }
                tokio::time::sleep(IDLE_POLL).await;
            }
        };
        tokio::time::timeout(Duration::from_millis(timeout_ms), poll)
            .await
            .map_err(|_| anyhow!("network idle not reached within {timeout_ms}ms"))?
    }

    async fn get_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        let html: String = result
            .into_value()
            .map_err(|e| anyhow!("failed to convert HTML result: {e:?}"))?;

        Ok(html)
    }

    async fn query_text(&self, selector: &str) -> Result<Option<String>> {
        self.eval_json(&format!(
            "const el = document.querySelector({}); \
             return el ? (el.innerText || el.textContent || '').trim() : null;",
            js_str(selector)
        ))
        .await
    }

    async fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        self.eval_json(&format!(
            "const el = document.querySelector({}); \
             return el ? el.getAttribute({}) : null;",
            js_str(selector),
            js_str(attr)
        ))
        .await
    }

    async fn query_all_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>> {
        self.eval_json(&format!(
            "return Array.from(document.querySelectorAll({})) \
               .map(n => n.getAttribute({})) \
               .filter(Boolean);",
            js_str(selector),
            js_str(attr)
        ))
        .await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Some(task) = &self.interceptor {
            task.abort();
        }
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        let _ = self.page.close().await;
        Ok(())
    }
}
