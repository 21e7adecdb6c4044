//! The emitted product record.
//!
//! A record is one of three variants, chosen by the path that produced it.
//! All three serialise to a flat JSON object; the variant shows up only as the
//! `notes` provenance tag and in which keys are present. Structured-metadata
//! records carry no `timestamp_iso`, `site_name`, `sku` or `status` keys.

use crate::normalize::{canonical_host, now_iso};
use serde::{Serialize, Serializer};

/// Provenance tag for records built from JSON-LD.
pub const NOTES_JSONLD: &str = "jsonld";
/// Provenance tag for records built from selector chains.
pub const NOTES_SELECTORS: &str = "selectors";

/// A product found in an embedded JSON-LD block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredProduct {
    pub product_name: Option<String>,
    pub price_value: Option<f64>,
    pub currency: Option<String>,
    pub availability: Option<String>,
    pub product_url: Option<String>,
    pub raw_price_text: Option<String>,
    pub source_url: Option<String>,
}

impl StructuredProduct {
    /// Attach the page the block was found on and make `product_url` absolute
    /// against it. A `url` that cannot be resolved is dropped.
    pub fn with_source(mut self, page_url: &str) -> Self {
        self.product_url = self.product_url.as_deref().and_then(|raw| {
            url::Url::parse(page_url)
                .and_then(|base| base.join(raw.trim()))
                .ok()
                .map(String::from)
        });
        self.source_url = Some(page_url.to_string());
        self
    }
}

/// A product assembled from selector chains on a rendered page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedProduct {
    pub timestamp_iso: String,
    pub site_name: String,
    pub product_name: Option<String>,
    pub sku: Option<String>,
    pub product_url: String,
    pub status: Option<String>,
    pub price_value: Option<f64>,
    pub currency: Option<String>,
    pub raw_price_text: Option<String>,
    pub source_url: String,
}

/// Where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// Extracting one product page.
    Product,
    /// Anything at seed level: opening a page, the first navigation.
    Seed,
}

/// A failed extraction standing in for the records that could not be built.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedProduct {
    pub timestamp_iso: String,
    pub site_name: String,
    pub product_url: String,
    pub source_url: String,
    pub scope: FailureScope,
    pub message: String,
}

impl FailedProduct {
    pub fn new(product_url: &str, source_url: &str, scope: FailureScope, message: String) -> Self {
        Self {
            timestamp_iso: now_iso(),
            site_name: canonical_host(product_url),
            product_url: product_url.to_string(),
            source_url: source_url.to_string(),
            scope,
            message,
        }
    }

    /// The `notes` text written for this failure.
    pub fn notes(&self) -> String {
        match self.scope {
            FailureScope::Product => format!("error: {}", self.message),
            FailureScope::Seed => format!("top-level error: {}", self.message),
        }
    }
}

/// One line of output.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductRecord {
    Structured(StructuredProduct),
    Extracted(ExtractedProduct),
    Failed(FailedProduct),
}

impl ProductRecord {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn product_url(&self) -> Option<&str> {
        match self {
            Self::Structured(p) => p.product_url.as_deref(),
            Self::Extracted(p) => Some(&p.product_url),
            Self::Failed(p) => Some(&p.product_url),
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        match self {
            Self::Structured(p) => p.source_url.as_deref(),
            Self::Extracted(p) => Some(&p.source_url),
            Self::Failed(p) => Some(&p.source_url),
        }
    }

    pub fn price_value(&self) -> Option<f64> {
        match self {
            Self::Structured(p) => finite(p.price_value),
            Self::Extracted(p) => finite(p.price_value),
            Self::Failed(_) => None,
        }
    }

    /// Availability text, whichever key it is written under.
    pub fn availability(&self) -> Option<&str> {
        match self {
            Self::Structured(p) => p.availability.as_deref(),
            Self::Extracted(p) => p.status.as_deref(),
            Self::Failed(_) => None,
        }
    }

    /// The `notes` provenance tag.
    pub fn notes(&self) -> String {
        match self {
            Self::Structured(_) => NOTES_JSONLD.to_string(),
            Self::Extracted(_) => NOTES_SELECTORS.to_string(),
            Self::Failed(f) => f.notes(),
        }
    }

    /// Serialise to a single NDJSON line (without the trailing newline).
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Non-finite numbers become null, never zero.
fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|n| n.is_finite())
}

#[derive(Serialize)]
struct StructuredWire<'a> {
    product_name: Option<&'a str>,
    price_value: Option<f64>,
    currency: Option<&'a str>,
    availability: Option<&'a str>,
    product_url: Option<&'a str>,
    raw_price_text: Option<&'a str>,
    source_url: Option<&'a str>,
    notes: &'a str,
}

#[derive(Serialize)]
struct FlatWire<'a> {
    timestamp_iso: &'a str,
    site_name: &'a str,
    product_name: Option<&'a str>,
    sku: Option<&'a str>,
    product_url: &'a str,
    status: Option<&'a str>,
    price_value: Option<f64>,
    currency: Option<&'a str>,
    raw_price_text: Option<&'a str>,
    source_url: &'a str,
    notes: &'a str,
}

impl Serialize for ProductRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Structured(p) => StructuredWire {
                product_name: p.product_name.as_deref(),
                price_value: finite(p.price_value),
                currency: p.currency.as_deref(),
                availability: p.availability.as_deref(),
                product_url: p.product_url.as_deref(),
                raw_price_text: p.raw_price_text.as_deref(),
                source_url: p.source_url.as_deref(),
                notes: NOTES_JSONLD,
            }
            .serialize(serializer),
            Self::Extracted(p) => FlatWire {
                timestamp_iso: &p.timestamp_iso,
                site_name: &p.site_name,
                product_name: p.product_name.as_deref(),
                sku: p.sku.as_deref(),
                product_url: &p.product_url,
                status: p.status.as_deref(),
                price_value: finite(p.price_value),
                currency: p.currency.as_deref(),
                raw_price_text: p.raw_price_text.as_deref(),
                source_url: &p.source_url,
                notes: NOTES_SELECTORS,
            }
            .serialize(serializer),
            Self::Failed(f) => {
                let notes = f.notes();
                FlatWire {
                    timestamp_iso: &f.timestamp_iso,
                    site_name: &f.site_name,
                    product_name: None,
                    sku: None,
                    product_url: &f.product_url,
                    status: Some("error"),
                    price_value: None,
                    currency: None,
                    raw_price_text: None,
                    source_url: &f.source_url,
                    notes: &notes,
                }
                .serialize(serializer)
            }
        }
    }
}
