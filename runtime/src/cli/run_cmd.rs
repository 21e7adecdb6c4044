//! `shelfscan run`: crawl every seed URL in the input file.

use crate::cli::progress_bar;
use crate::config::{self, CrawlConfig, Engine};
use crate::crawl::{Crawler, RunSummary};
use crate::error::ShelfscanError;
use crate::output::{Output, OutputReport, WebhookMode, WebhookSettings};
use crate::progress::{self, Progress};
use crate::renderer::auto::AutoRenderer;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::http::HttpRenderer;
use crate::renderer::Renderer;
use crate::selectors::SelectorConfig;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// File with one seed URL per line
    #[arg(long = "in", value_name = "FILE")]
    pub input: PathBuf,

    /// NDJSON output file (truncated at start)
    #[arg(long = "out", value_name = "FILE", default_value = config::DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Seeds processed at once; also the maximum number of open pages
    #[arg(long, default_value_t = config::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Product pages visited per seed
    #[arg(long = "max", default_value_t = config::DEFAULT_MAX_PRODUCTS)]
    pub max_products: usize,

    /// Navigation timeout in milliseconds (minimum 1000)
    #[arg(long = "timeout", default_value_t = config::DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Pause in milliseconds before a worker takes its next seed
    #[arg(long = "delay", default_value_t = config::DEFAULT_DELAY_MS)]
    pub delay_ms: u64,

    /// Webhook URL for record delivery
    #[arg(long, env = "SHELFSCAN_WEBHOOK_URL")]
    pub webhook: Option<String>,

    /// When records are POSTed to the webhook
    #[arg(long, value_enum, default_value = "none")]
    pub webhook_mode: WebhookMode,

    /// Extra webhook headers as a JSON object, e.g. '{"Authorization":"Bearer t"}'
    #[arg(long, value_name = "JSON")]
    pub webhook_headers: Option<String>,

    /// Page engine
    #[arg(long, value_enum, default_value = "chromium")]
    pub engine: Engine,

    /// Selector table (JSON); the built-in table when omitted
    #[arg(long, value_name = "FILE")]
    pub selectors: Option<PathBuf>,

    /// Currency for selector records whose price names none
    #[arg(long, default_value = config::DEFAULT_FALLBACK_CURRENCY)]
    pub fallback_currency: String,
}

impl RunArgs {
    pub fn into_config(self) -> CrawlConfig {
        let headers = self
            .webhook_headers
            .as_deref()
            .map(config::parse_webhook_headers)
            .unwrap_or_default();
        let fallback = self.fallback_currency.trim().to_ascii_uppercase();

        CrawlConfig {
            input: self.input,
            output: self.output,
            concurrency: self.concurrency,
            max_products: self.max_products,
            timeout_ms: self.timeout_ms,
            headless: !self.headful,
            delay_ms: self.delay_ms,
            webhook: WebhookSettings {
                url: self.webhook,
                mode: self.webhook_mode,
                headers,
            },
            engine: self.engine,
            selectors: self.selectors,
            fallback_currency: (!fallback.is_empty()).then_some(fallback),
        }
        .clamped()
    }
}

pub async fn run(args: RunArgs, quiet: bool) -> Result<()> {
    let cfg = args.into_config();

    let seeds = config::read_seed_urls(&cfg.input).await?;
    let selectors = match &cfg.selectors {
        Some(path) => SelectorConfig::load(path)?,
        None => SelectorConfig::builtin()?,
    };
    let output = Output::open(&cfg.output, &cfg.webhook).await?;
    let renderer = launch_renderer(&cfg).await?;

    info!(
        seeds = seeds.len(),
        engine = ?cfg.engine,
        output = %cfg.output.display(),
        "run configured"
    );

    let (tx, rx) = progress::channel();
    let bar = (!quiet).then(|| progress_bar::spawn(progress_bar::create(seeds.len()), rx));

    let crawler = Crawler::new(Arc::clone(&renderer), Arc::new(selectors), cfg.crawl_options())
        .with_progress(Progress::new(Some(tx)));
    let summary = crawler.run(&seeds, &output).await;
    drop(crawler);

    if let Some(handle) = bar {
        let _ = handle.await;
    }
    if let Err(e) = renderer.shutdown().await {
        warn!("browser shutdown failed: {e:#}");
    }
    let report = output.finish().await;

    report_summary(&summary, &report);
    if !quiet {
        eprintln!(
            "{} seeds, {} records ({} errors) -> {}",
            summary.seeds,
            summary.records,
            summary.errors,
            cfg.output.display()
        );
    }
    Ok(())
}

async fn launch_renderer(cfg: &CrawlConfig) -> Result<Arc<dyn Renderer>> {
    let settings = cfg.browser_settings();
    let renderer: Arc<dyn Renderer> = match cfg.engine {
        Engine::Chromium => Arc::new(launch_chromium(cfg).await?),
        Engine::Http => Arc::new(HttpRenderer::new(&settings)?),
        Engine::Auto => Arc::new(AutoRenderer::new(
            Arc::new(HttpRenderer::new(&settings)?),
            Arc::new(launch_chromium(cfg).await?),
        )),
    };
    Ok(renderer)
}

async fn launch_chromium(cfg: &CrawlConfig) -> Result<ChromiumRenderer> {
    let renderer = ChromiumRenderer::launch(&cfg.browser_settings())
        .await
        .map_err(|e| ShelfscanError::BrowserLaunch(format!("{e:#}")))?;
    Ok(renderer)
}

fn report_summary(summary: &RunSummary, report: &OutputReport) {
    info!(
        seeds = summary.seeds,
        records = summary.records,
        errors = summary.errors,
        ok = summary.successes(),
        jsonld = summary.structured,
        selectors = summary.extracted,
        in_stock = summary.in_stock,
        out_of_stock = summary.out_of_stock,
        elapsed_ms = summary.elapsed_ms,
        lines = report.lines_written,
        "run complete"
    );
    if let Some(items) = report.batch_size {
        if report.batch_delivered {
            info!(items, "batch delivered");
        } else {
            warn!(items, "batch not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn test_defaults() {
        let cfg = Harness::parse_from(["shelfscan", "--in", "urls.txt"])
            .args
            .into_config();
        assert_eq!(cfg.output, PathBuf::from("out/results.ndjson"));
        assert_eq!(cfg.concurrency, 3);
        assert_eq!(cfg.max_products, 50);
        assert_eq!(cfg.timeout_ms, 45_000);
        assert!(cfg.headless);
        assert_eq!(cfg.engine, Engine::Chromium);
        assert_eq!(cfg.webhook.mode, WebhookMode::None);
        assert_eq!(cfg.fallback_currency.as_deref(), Some("EGP"));
    }

    #[test]
    fn test_flags_and_clamping() {
        let cfg = Harness::parse_from([
            "shelfscan",
            "--in",
            "urls.txt",
            "--concurrency",
            "0",
            "--timeout",
            "5",
            "--headful",
            "--webhook",
            "https://hook.example/in",
            "--webhook-mode",
            "batch",
            "--webhook-headers",
            r#"{"X-Key":"k"}"#,
            "--engine",
            "http",
            "--fallback-currency",
            "usd",
        ])
        .args
        .into_config();
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.timeout_ms, 1_000);
        assert!(!cfg.headless);
        assert_eq!(cfg.webhook.mode, WebhookMode::Batch);
        assert_eq!(cfg.webhook.headers, vec![("X-Key".to_string(), "k".to_string())]);
        assert_eq!(cfg.engine, Engine::Http);
        assert_eq!(cfg.fallback_currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_auto_engine_flag() {
        let cfg = Harness::parse_from(["shelfscan", "--in", "urls.txt", "--engine", "auto"])
            .args
            .into_config();
        assert_eq!(cfg.engine, Engine::Auto);
    }
}
