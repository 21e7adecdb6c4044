//! Selector-chain extraction against a rendered page.

use crate::normalize::{canonical_host, extract_number, normalize_currency, now_iso};
use crate::record::ExtractedProduct;
use crate::renderer::RenderContext;
use crate::selectors::{FieldSelector, SelectorRuleSet};
use tracing::debug;

/// First non-blank value produced by a selector chain, tried in order.
///
/// A selector that errors (invalid CSS, detached page) or matches nothing or
/// only whitespace is a miss; the next one is tried. `None` when all miss.
pub async fn first_text(ctx: &dyn RenderContext, chain: &[String]) -> Option<String> {
    for raw in chain {
        let result = match FieldSelector::parse(raw) {
            FieldSelector::Text(css) => ctx.query_text(css).await,
            FieldSelector::Attr { css, attr } => ctx.query_attr(css, attr).await,
        };
        match result {
            Ok(Some(value)) if !value.trim().is_empty() => return Some(value.trim().to_string()),
            Ok(_) => {}
            Err(e) => debug!(selector = %raw, "selector miss: {e:#}"),
        }
    }
    None
}

/// Build one record for the current page from the rule-set's field chains.
///
/// `fallback_currency` is used when the price text names no currency.
pub async fn extract_with_selectors(
    ctx: &dyn RenderContext,
    rules: &SelectorRuleSet,
    product_url: &str,
    source_url: &str,
    fallback_currency: Option<&str>,
) -> ExtractedProduct {
    let name = first_text(ctx, &rules.name).await;
    let price_text = first_text(ctx, &rules.price).await;
    let availability = first_text(ctx, &rules.availability).await;

    let currency = normalize_currency(price_text.as_deref())
        .or_else(|| fallback_currency.map(str::to_string));

    ExtractedProduct {
        timestamp_iso: now_iso(),
        site_name: canonical_host(product_url),
        product_name: name,
        sku: None,
        product_url: product_url.to_string(),
        status: availability,
        price_value: extract_number(price_text.as_deref()),
        currency,
        raw_price_text: price_text,
        source_url: source_url.to_string(),
    }
}
