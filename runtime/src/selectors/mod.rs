//! Per-site selector rule-sets and the host → rule-set resolver.
//!
//! The table is a JSON object keyed by canonical hostname with a mandatory
//! `"default"` entry. A compiled-in table ships with the binary; a file on
//! disk replaces it wholesale when `--selectors` is given.

use crate::error::{Result, ShelfscanError};
use crate::normalize::canonical_host;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Compiled-in selector table.
const DEFAULT_SELECTORS_JSON: &str = include_str!("selectors.json");

/// Key of the fallback rule-set.
pub const DEFAULT_KEY: &str = "default";

/// Suffix that switches a selector from text content to an attribute read.
const ATTR_MARKER: &str = "::attr(";

/// Ordered selector chains for one site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorRuleSet {
    /// Anchors linking a listing page to product pages.
    pub product_list: Vec<String>,
    /// Product name.
    pub name: Vec<String>,
    /// Raw price text.
    pub price: Vec<String>,
    /// Availability text.
    pub availability: Vec<String>,
}

static EMPTY_RULES: SelectorRuleSet = SelectorRuleSet {
    product_list: Vec::new(),
    name: Vec::new(),
    price: Vec::new(),
    availability: Vec::new(),
};

/// Host → rule-set table, loaded once and read concurrently by every worker.
#[derive(Debug, Clone, Default)]
pub struct SelectorConfig {
    sites: HashMap<String, SelectorRuleSet>,
}

impl SelectorConfig {
    /// The table compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_SELECTORS_JSON)
    }

    /// Parse a JSON selector table. Keys are canonicalised like hostnames.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, SelectorRuleSet> = serde_json::from_str(json)?;
        let sites = raw
            .into_iter()
            .map(|(host, rules)| {
                let host = host.trim().to_lowercase();
                let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
                (host, rules)
            })
            .collect();
        Ok(Self { sites })
    }

    /// Load a selector table from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|source| ShelfscanError::SelectorConfigIo {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&json)
    }

    /// Pick the rule-set for `url`: the site entry for its canonical host, or
    /// the `"default"` entry. Never fails; a table without a default resolves
    /// unknown hosts to empty chains.
    pub fn resolve(&self, url: &str) -> &SelectorRuleSet {
        let host = canonical_host(url);
        self.sites
            .get(&host)
            .or_else(|| self.sites.get(DEFAULT_KEY))
            .unwrap_or(&EMPTY_RULES)
    }

    /// Whether a dedicated entry exists for `url`'s host.
    pub fn has_site(&self, url: &str) -> bool {
        self.sites.contains_key(&canonical_host(url))
    }

    /// Whether the table has a `"default"` entry.
    pub fn has_default(&self) -> bool {
        self.sites.contains_key(DEFAULT_KEY)
    }

    /// Number of entries, `"default"` included.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// One entry of a field selector chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSelector<'a> {
    /// Read the element's rendered text.
    Text(&'a str),
    /// Read a named attribute, written as `css::attr(name)`.
    Attr { css: &'a str, attr: &'a str },
}

impl<'a> FieldSelector<'a> {
    /// Split off an `::attr(name)` suffix if present.
    pub fn parse(raw: &'a str) -> Self {
        let raw = raw.trim();
        if let Some(idx) = raw.rfind(ATTR_MARKER) {
            if let Some(attr) = raw[idx + ATTR_MARKER.len()..].strip_suffix(')') {
                let attr = attr.trim();
                if !attr.is_empty() {
                    return Self::Attr {
                        css: raw[..idx].trim(),
                        attr,
                    };
                }
            }
        }
        Self::Text(raw)
    }
}
