//! Crawl orchestrator.
//!
//! Seed URLs are processed by a fixed number of workers, one page per
//! worker, so no more than `concurrency` pages are ever open. For each seed a
//! worker opens a page, loads the seed, discovers product links through the
//! site's `product_list` chain (or treats the seed as the only product), then
//! visits each product in discovery order. JSON-LD wins when present;
//! otherwise selector chains fill one record.
//!
//! Failures never leave a worker: a product that fails becomes one error
//! record and the loop moves on; a seed that fails before product discovery
//! becomes one error record for the seed.

use crate::extraction::{extract_structured, extract_with_selectors};
use crate::normalize::{classify_availability, Availability};
use crate::output::Output;
use crate::progress::{CrawlEvent, Progress};
use crate::record::{FailedProduct, FailureScope, ProductRecord};
use crate::renderer::{RenderContext, Renderer, BLOCKED_RESOURCES};
use crate::selectors::{SelectorConfig, SelectorRuleSet};
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fixed pauses around page loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// After a seed page reaches DOM-ready and network idle.
    pub listing_settle: Duration,
    /// After a product page reaches DOM-ready.
    pub product_settle: Duration,
    /// After every product, success or failure.
    pub product_pacing: Duration,
    /// After a worker releases its page, before it takes the next seed.
    pub between_seeds: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            listing_settle: Duration::from_millis(1_000),
            product_settle: Duration::from_millis(1_200),
            product_pacing: Duration::from_millis(200),
            between_seeds: Duration::from_millis(750),
        }
    }
}

impl Pacing {
    /// No pauses at all.
    pub fn none() -> Self {
        Self {
            listing_settle: Duration::ZERO,
            product_settle: Duration::ZERO,
            product_pacing: Duration::ZERO,
            between_seeds: Duration::ZERO,
        }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Worker count; also the maximum number of open pages.
    pub concurrency: usize,
    /// Product pages visited per seed, and the cap on its successful records.
    pub max_products: usize,
    pub nav_timeout_ms: u64,
    pub pacing: Pacing,
    /// Currency for selector records whose price text names none.
    pub fallback_currency: Option<String>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_products: 50,
            nav_timeout_ms: 45_000,
            pacing: Pacing::default(),
            fallback_currency: Some("EGP".to_string()),
        }
    }
}

/// Counts for one seed or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub seeds: usize,
    pub records: usize,
    pub errors: usize,
    pub structured: usize,
    pub extracted: usize,
    pub in_stock: usize,
    pub out_of_stock: usize,
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn absorb(&mut self, other: &RunSummary) {
        self.seeds += other.seeds;
        self.records += other.records;
        self.errors += other.errors;
        self.structured += other.structured;
        self.extracted += other.extracted;
        self.in_stock += other.in_stock;
        self.out_of_stock += other.out_of_stock;
    }

    fn count(&mut self, record: &ProductRecord) {
        self.records += 1;
        match record {
            ProductRecord::Structured(_) => self.structured += 1,
            ProductRecord::Extracted(_) => self.extracted += 1,
            ProductRecord::Failed(_) => self.errors += 1,
        }
        match classify_availability(record.availability()) {
            Availability::InStock => self.in_stock += 1,
            Availability::OutOfStock => self.out_of_stock += 1,
            Availability::Unknown => {}
        }
    }

    /// Records that are not errors.
    pub fn successes(&self) -> usize {
        self.records - self.errors
    }
}

/// Drives a batch of seed URLs through a renderer into an [`Output`].
pub struct Crawler {
    renderer: Arc<dyn Renderer>,
    selectors: Arc<SelectorConfig>,
    options: CrawlOptions,
    progress: Progress,
}

impl Crawler {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        selectors: Arc<SelectorConfig>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            renderer,
            selectors,
            options,
            progress: Progress::disabled(),
        }
    }

    /// Report progress through `progress`.
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Crawl every seed. Always completes; per-seed and per-product failures
    /// are written as error records. Output order across seeds follows
    /// completion order.
    pub async fn run(&self, seeds: &[String], output: &Output) -> RunSummary {
        let start = Instant::now();
        let workers = self.options.concurrency.max(1);
        info!(seeds = seeds.len(), workers, "starting crawl");
        self.progress.emit(CrawlEvent::RunStarted {
            seeds: seeds.len(),
            concurrency: workers,
        });

        let per_seed: Vec<RunSummary> = stream::iter(seeds)
            .map(|seed| self.crawl_seed(seed, output))
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for s in &per_seed {
            summary.absorb(s);
        }
        summary.elapsed_ms = start.elapsed().as_millis() as u64;

        self.progress.emit(CrawlEvent::RunComplete {
            seeds: summary.seeds,
            records: summary.records,
            errors: summary.errors,
            elapsed_ms: summary.elapsed_ms,
        });
        summary
    }

    /// One worker iteration: page open → seed → products → page close → delay.
    async fn crawl_seed(&self, seed: &str, output: &Output) -> RunSummary {
        let start = Instant::now();
        let mut stats = RunSummary {
            seeds: 1,
            ..Default::default()
        };
        info!(seed, "crawling seed");
        self.progress.emit(CrawlEvent::SeedStarted {
            url: seed.to_string(),
        });

        match self.renderer.new_context().await {
            Ok(mut ctx) => {
                if let Err(e) = self.process_seed(ctx.as_mut(), seed, output, &mut stats).await {
                    self.fail_seed(seed, &e, output, &mut stats).await;
                }
                if let Err(e) = ctx.close().await {
                    debug!(seed, "page close failed: {e:#}");
                }
            }
            Err(e) => self.fail_seed(seed, &e, output, &mut stats).await,
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            seed,
            records = stats.records,
            errors = stats.errors,
            elapsed_ms = stats.elapsed_ms,
            "seed finished"
        );
        self.progress.emit(CrawlEvent::SeedFinished {
            url: seed.to_string(),
            records: stats.records,
            elapsed_ms: stats.elapsed_ms,
        });

        tokio::time::sleep(self.options.pacing.between_seeds).await;
        stats
    }

    /// Seed-level steps. An `Err` here means nothing past it ran.
    async fn process_seed(
        &self,
        ctx: &mut dyn RenderContext,
        seed: &str,
        output: &Output,
        stats: &mut RunSummary,
    ) -> Result<()> {
        let timeout = self.options.nav_timeout_ms;
        let pacing = &self.options.pacing;

        ctx.block_resources(BLOCKED_RESOURCES).await?;
        let nav = ctx.navigate(seed, timeout).await?;
        debug!(
            seed,
            final_url = %nav.final_url,
            status = ?nav.status,
            load_time_ms = nav.load_time_ms,
            "seed loaded"
        );
        if let Err(e) = ctx.wait_for_network_idle(timeout).await {
            debug!(seed, "network idle wait abandoned: {e:#}");
        }
        tokio::time::sleep(pacing.listing_settle).await;

        let rules = self.selectors.resolve(seed);
        let cap = self.options.max_products.max(1);
        let products = discover_products(&*ctx, seed, rules, cap).await;
        let from_listing = !(products.len() == 1 && products[0] == seed);
        debug!(seed, count = products.len(), from_listing, "products discovered");
        self.progress.emit(CrawlEvent::ProductsDiscovered {
            url: seed.to_string(),
            count: products.len(),
            from_listing,
        });

        let mut budget = cap;
        for product_url in &products {
            if budget == 0 {
                break;
            }
            match self.extract_product(ctx, product_url, seed, rules).await {
                Ok(records) => {
                    for record in records.into_iter().take(budget) {
                        budget -= 1;
                        self.emit(output, record, stats).await;
                    }
                }
                Err(e) => {
                    debug!(product_url = %product_url, "product failed: {e:#}");
                    let failed = FailedProduct::new(
                        product_url,
                        seed,
                        FailureScope::Product,
                        format!("{e:#}"),
                    );
                    self.emit(output, ProductRecord::Failed(failed), stats).await;
                }
            }
            tokio::time::sleep(pacing.product_pacing).await;
        }
        Ok(())
    }

    /// Records for one product page: every JSON-LD Product, or one selector
    /// record when there are none.
    async fn extract_product(
        &self,
        ctx: &mut dyn RenderContext,
        product_url: &str,
        seed: &str,
        rules: &SelectorRuleSet,
    ) -> Result<Vec<ProductRecord>> {
        ctx.navigate(product_url, self.options.nav_timeout_ms).await?;
        tokio::time::sleep(self.options.pacing.product_settle).await;

        let html = ctx.get_html().await?;
        let structured = extract_structured(&html);
        if !structured.is_empty() {
            return Ok(structured
                .into_iter()
                .map(|p| ProductRecord::Structured(p.with_source(product_url)))
                .collect());
        }

        let record = extract_with_selectors(
            &*ctx,
            rules,
            product_url,
            seed,
            self.options.fallback_currency.as_deref(),
        )
        .await;
        Ok(vec![ProductRecord::Extracted(record)])
    }

    async fn fail_seed(
        &self,
        seed: &str,
        error: &anyhow::Error,
        output: &Output,
        stats: &mut RunSummary,
    ) {
        let message = format!("{error:#}");
        warn!(seed, "seed failed: {message}");
        self.progress.emit(CrawlEvent::SeedFailed {
            url: seed.to_string(),
            message: message.clone(),
        });
        let failed = FailedProduct::new(seed, seed, FailureScope::Seed, message);
        self.emit(output, ProductRecord::Failed(failed), stats).await;
    }

    async fn emit(&self, output: &Output, record: ProductRecord, stats: &mut RunSummary) {
        stats.count(&record);
        self.progress.emit(CrawlEvent::RecordEmitted {
            source_url: record.source_url().unwrap_or_default().to_string(),
            notes: record.notes(),
            error: record.is_error(),
        });
        output.emit(record).await;
    }
}

/// Product page URLs linked from the loaded seed page.
///
/// Each `product_list` selector is queried in order; `href`s are resolved
/// against the seed, non-HTTP links are dropped, duplicates are skipped, and
/// collection stops at `cap`. A selector that errors is skipped. When nothing
/// is found the seed itself is the only product page.
pub async fn discover_products(
    ctx: &dyn RenderContext,
    seed: &str,
    rules: &SelectorRuleSet,
    cap: usize,
) -> Vec<String> {
    let mut products = Vec::new();
    if let Ok(base) = url::Url::parse(seed) {
        let mut seen = HashSet::new();
        'chain: for selector in &rules.product_list {
            let hrefs = match ctx.query_all_attr(selector, "href").await {
                Ok(hrefs) => hrefs,
                Err(e) => {
                    debug!(selector = %selector, "listing selector miss: {e:#}");
                    continue;
                }
            };
            for href in hrefs {
                let Ok(resolved) = base.join(href.trim()) else {
                    continue;
                };
                if !matches!(resolved.scheme(), "http" | "https") {
                    continue;
                }
                let resolved = resolved.to_string();
                if seen.insert(resolved.clone()) {
                    products.push(resolved);
                }
                if products.len() >= cap {
                    break 'chain;
                }
            }
        }
    }

    if products.is_empty() {
        products.push(seed.to_string());
    }
    products
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::http::StaticContext;

    const LISTING: &str = r##"<html><body>
        <div class="grid">
          <a class="card" href="/p/1">1</a>
          <a class="card" href="/p/2#reviews">2</a>
          <a class="card" href="/p/1">1 again</a>
          <a class="card" href="javascript:void(0)">js</a>
          <a class="card" href="https://shop.example/p/3">3</a>
        </div>
        <a class="promo" href="/p/4">4</a>
    </body></html>"##;

    fn rules(list: &[&str]) -> SelectorRuleSet {
        SelectorRuleSet {
            product_list: list.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_discover_dedupes_and_resolves() {
        let ctx = StaticContext::from_html(LISTING);
        let found = discover_products(
            &ctx,
            "https://shop.example/list",
            &rules(&["[[broken", "a.card", "a.promo"]),
            10,
        )
        .await;
        assert_eq!(
            found,
            vec![
                "https://shop.example/p/1",
                "https://shop.example/p/2#reviews",
                "https://shop.example/p/3",
                "https://shop.example/p/4",
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_stops_at_cap() {
        let ctx = StaticContext::from_html(LISTING);
        let found =
            discover_products(&ctx, "https://shop.example/list", &rules(&["a.card", "a.promo"]), 2)
                .await;
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_discover_falls_back_to_seed() {
        let ctx = StaticContext::from_html("<h1>Item</h1>");
        let found =
            discover_products(&ctx, "https://shop.example/p/9", &rules(&["a.card"]), 5).await;
        assert_eq!(found, vec!["https://shop.example/p/9"]);
    }

    #[test]
    fn test_summary_counts() {
        let mut s = RunSummary::default();
        s.count(&ProductRecord::Failed(FailedProduct::new(
            "https://a.example/",
            "https://a.example/",
            FailureScope::Seed,
            "x".into(),
        )));
        s.count(&ProductRecord::Structured(crate::record::StructuredProduct {
            availability: Some("https://schema.org/InStock".into()),
            ..Default::default()
        }));
        assert_eq!((s.records, s.errors, s.structured, s.in_stock), (2, 1, 1, 1));
        assert_eq!(s.successes(), 1);
    }

    #[test]
    fn test_pacing_defaults() {
        let p = Pacing::default();
        assert_eq!(p.listing_settle, Duration::from_millis(1_000));
        assert_eq!(p.product_settle, Duration::from_millis(1_200));
        assert_eq!(p.product_pacing, Duration::from_millis(200));
        assert_eq!(Pacing::none().between_seeds, Duration::ZERO);
    }
}
