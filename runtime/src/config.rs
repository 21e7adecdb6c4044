//! Run configuration and the seed URL reader.

use crate::crawl::{CrawlOptions, Pacing};
use crate::error::{Result, ShelfscanError};
use crate::output::WebhookSettings;
use crate::renderer::{BrowserSettings, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_OUTPUT: &str = "out/results.ndjson";
pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_MAX_PRODUCTS: usize = 50;
pub const DEFAULT_TIMEOUT_MS: u64 = 45_000;
pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_DELAY_MS: u64 = 750;
pub const DEFAULT_FALLBACK_CURRENCY: &str = "EGP";

/// Which page engine drives the crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Headless Chromium; runs page JavaScript.
    #[default]
    Chromium,
    /// Plain HTTP fetch; no JavaScript.
    Http,
    /// Plain HTTP fetch, rendered in Chromium when the markup looks thin.
    Auto,
}

/// Everything a run needs, already parsed.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub concurrency: usize,
    pub max_products: usize,
    pub timeout_ms: u64,
    pub headless: bool,
    pub delay_ms: u64,
    pub webhook: WebhookSettings,
    pub engine: Engine,
    /// Selector table on disk; the compiled-in table when `None`.
    pub selectors: Option<PathBuf>,
    pub fallback_currency: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            concurrency: DEFAULT_CONCURRENCY,
            max_products: DEFAULT_MAX_PRODUCTS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            headless: true,
            delay_ms: DEFAULT_DELAY_MS,
            webhook: WebhookSettings::default(),
            engine: Engine::default(),
            selectors: None,
            fallback_currency: Some(DEFAULT_FALLBACK_CURRENCY.to_string()),
        }
    }
}

impl CrawlConfig {
    /// Raise numeric settings to their minimums.
    pub fn clamped(mut self) -> Self {
        self.concurrency = self.concurrency.max(1);
        self.max_products = self.max_products.max(1);
        self.timeout_ms = self.timeout_ms.max(MIN_TIMEOUT_MS);
        self
    }

    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            concurrency: self.concurrency.max(1),
            max_products: self.max_products.max(1),
            nav_timeout_ms: self.timeout_ms.max(MIN_TIMEOUT_MS),
            pacing: Pacing {
                between_seeds: Duration::from_millis(self.delay_ms),
                ..Pacing::default()
            },
            fallback_currency: self.fallback_currency.clone(),
        }
    }

    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            headless: self.headless,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport: (1366, 768),
            default_timeout_ms: self.timeout_ms.max(MIN_TIMEOUT_MS),
        }
    }
}

/// Seed URLs from file text: one per line, trimmed; blank and `#` lines skipped.
pub fn parse_seed_urls(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read the seed URL file. Failure here is fatal.
pub async fn read_seed_urls(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ShelfscanError::Input {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parse_seed_urls(&text))
}

/// Parse `--webhook-headers` JSON. Anything but a JSON object yields no
/// headers; non-string values are used in their JSON form.
pub fn parse_webhook_headers(json: &str) -> Vec<(String, String)> {
    let json = json.trim();
    if json.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(json) {
        Ok(map) => map
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, value)
            })
            .collect(),
        Err(e) => {
            warn!("ignoring invalid webhook headers: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_urls() {
        let text = "https://a.example/\n\n  https://b.example/list  \r\n# comment\n\t\n";
        assert_eq!(
            parse_seed_urls(text),
            vec!["https://a.example/", "https://b.example/list"]
        );
    }

    #[tokio::test]
    async fn test_read_seed_urls_missing_file_is_fatal() {
        let err = read_seed_urls(Path::new("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShelfscanError::Input { .. }));
    }

    #[test]
    fn test_parse_webhook_headers() {
        let headers = parse_webhook_headers(r#"{"Authorization":"Bearer t","X-Retry":3}"#);
        assert_eq!(
            headers,
            vec![
                ("Authorization".to_string(), "Bearer t".to_string()),
                ("X-Retry".to_string(), "3".to_string())
            ]
        );
        assert!(parse_webhook_headers("{not json").is_empty());
        assert!(parse_webhook_headers("[]").is_empty());
        assert!(parse_webhook_headers("").is_empty());
    }

    #[test]
    fn test_clamped_minimums() {
        let cfg = CrawlConfig {
            concurrency: 0,
            max_products: 0,
            timeout_ms: 10,
            ..CrawlConfig::default()
        }
        .clamped();
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.max_products, 1);
        assert_eq!(cfg.timeout_ms, MIN_TIMEOUT_MS);
    }

    #[test]
    fn test_crawl_options_carry_delay() {
        let cfg = CrawlConfig {
            delay_ms: 10,
            ..CrawlConfig::default()
        };
        let opts = cfg.crawl_options();
        assert_eq!(opts.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(opts.pacing.between_seeds, Duration::from_millis(10));
        assert_eq!(opts.fallback_currency.as_deref(), Some("EGP"));
    }
}
