//! Product extraction from embedded JSON-LD.
//!
//! Blocks are located by a text scan for `<script type="application/ld+json">`
//! rather than a DOM parse, so this works on any markup string. Each block is
//! parsed independently; a block that is not valid JSON is skipped. Every
//! object node in every document is visited depth-first, and each node typed
//! `Product` yields one record, wherever it sits in the tree.

use crate::normalize::iso_currency;
use crate::record::StructuredProduct;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Nodes nested deeper than this are not visited.
pub const MAX_DEPTH: usize = 64;

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script\s*>"#,
        )
        .expect("JSON-LD block regex is valid")
    })
}

/// Raw text of every JSON-LD block in document order.
pub fn find_blocks(markup: &str) -> Vec<&str> {
    block_re()
        .captures_iter(markup)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse one block. Failure is an expected outcome on real pages.
pub fn parse_block(block: &str) -> Result<Value, serde_json::Error> {
    // Some CMSes wrap the payload in an HTML comment or CDATA section.
    let trimmed = block
        .trim()
        .trim_start_matches("<!--")
        .trim_end_matches("-->")
        .trim()
        .trim_start_matches("//<![CDATA[")
        .trim_end_matches("//]]>")
        .trim();
    serde_json::from_str(trimmed)
}

/// Extract every Product node from the markup's JSON-LD blocks.
///
/// Records come back in block order, then depth-first order within a block.
/// `source_url` is left unset for the caller; duplicates are kept.
pub fn extract_structured(markup: &str) -> Vec<StructuredProduct> {
    let mut out = Vec::new();
    for block in find_blocks(markup) {
        let Ok(doc) = parse_block(block) else {
            continue;
        };
        visit(&doc, 0, &mut out);
    }
    out
}

fn visit(node: &Value, depth: usize, out: &mut Vec<StructuredProduct>) {
    if depth > MAX_DEPTH {
        return;
    }
    match node {
        Value::Array(items) => {
            for item in items {
                visit(item, depth + 1, out);
            }
        }
        Value::Object(obj) => {
            if is_product(obj) {
                out.push(product_from(obj));
            }
            for child in obj.values() {
                if child.is_object() || child.is_array() {
                    visit(child, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

/// `@type` (or plain `type`) is `"Product"` or an array containing it.
fn is_product(obj: &Map<String, Value>) -> bool {
    let declared = obj.get("@type").or_else(|| obj.get("type"));
    match declared {
        Some(Value::String(t)) => t == "Product",
        Some(Value::Array(ts)) => ts.iter().any(|t| t.as_str() == Some("Product")),
        _ => false,
    }
}

fn product_from(obj: &Map<String, Value>) -> StructuredProduct {
    let offer = obj.get("offers").and_then(|o| match o {
        Value::Array(list) => list.first(),
        other => Some(other),
    });

    let price = offer.and_then(|o| o.get("price"));
    StructuredProduct {
        product_name: obj.get("name").and_then(text),
        price_value: price.and_then(number),
        currency: offer
            .and_then(|o| o.get("priceCurrency"))
            .and_then(Value::as_str)
            .and_then(iso_currency),
        availability: offer.and_then(|o| o.get("availability")).and_then(availability),
        product_url: obj.get("url").and_then(text),
        raw_price_text: price.and_then(text),
        source_url: None,
    }
}

/// Non-empty string, or a number rendered as text.
fn text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// JSON number, or a string that parses as one. Non-finite results are dropped.
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// `availability` as a string, or an object's `@id`, then its `url`.
fn availability(v: &Value) -> Option<String> {
    match v {
        Value::Object(o) => o
            .get("@id")
            .and_then(text)
            .or_else(|| o.get("url").and_then(text)),
        other => text(other),
    }
}
