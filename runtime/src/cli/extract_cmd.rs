//! `shelfscan extract`: run the extractors over a saved HTML file.

use crate::config::DEFAULT_FALLBACK_CURRENCY;
use crate::error::ShelfscanError;
use crate::extraction::{extract_structured, extract_with_selectors};
use crate::record::{ProductRecord, StructuredProduct};
use crate::renderer::http::StaticContext;
use crate::selectors::SelectorConfig;
use anyhow::Result;
use std::path::Path;
use tracing::debug;

/// Records for one saved page, as the crawl would build them.
///
/// JSON-LD products come first; without any, and with a page URL to pick
/// the selector rule set, one selector record is built from the markup.
pub async fn extract_file(
    file: &Path,
    url: Option<&str>,
    selectors: &SelectorConfig,
) -> Result<Vec<ProductRecord>> {
    let html = tokio::fs::read_to_string(file)
        .await
        .map_err(|source| ShelfscanError::Input {
            path: file.to_path_buf(),
            source,
        })?;

    let structured = extract_structured(&html);
    if !structured.is_empty() {
        return Ok(structured
            .into_iter()
            .map(|p| match url {
                Some(u) => ProductRecord::Structured(p.with_source(u)),
                // Relative URLs cannot be resolved without the page URL.
                None => ProductRecord::Structured(StructuredProduct {
                    product_url: p.product_url.filter(|u| url::Url::parse(u).is_ok()),
                    ..p
                }),
            })
            .collect());
    }

    let Some(url) = url else {
        debug!(file = %file.display(), "no JSON-LD products and no --url for selectors");
        return Ok(Vec::new());
    };
    let ctx = StaticContext::from_html(&html);
    let rules = selectors.resolve(url);
    let record =
        extract_with_selectors(&ctx, rules, url, url, Some(DEFAULT_FALLBACK_CURRENCY)).await;
    Ok(vec![ProductRecord::Extracted(record)])
}

pub async fn run(file: &Path, url: Option<&str>) -> Result<()> {
    let selectors = SelectorConfig::builtin()?;
    for record in extract_file(file, url, &selectors).await? {
        println!("{}", record.to_json_line()?);
    }
    Ok(())
}
