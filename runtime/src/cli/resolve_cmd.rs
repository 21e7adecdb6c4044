//! `shelfscan resolve`: show which selector rules apply to a URL.

use crate::normalize::canonical_host;
use crate::selectors::{SelectorConfig, DEFAULT_KEY};
use anyhow::Result;
use serde_json::{json, Value};
use std::path::Path;

/// The rule set chosen for `url`, with the table key that supplied it.
pub fn describe(selectors: &SelectorConfig, url: &str) -> Result<Value> {
    let host = canonical_host(url);
    let matched = if selectors.has_site(url) {
        Value::String(host.clone())
    } else if selectors.has_default() {
        Value::String(DEFAULT_KEY.to_string())
    } else {
        Value::Null
    };
    Ok(json!({
        "host": host,
        "matched": matched,
        "rules": serde_json::to_value(selectors.resolve(url))?,
    }))
}

pub async fn run(url: &str, selectors_path: Option<&Path>) -> Result<()> {
    let selectors = match selectors_path {
        Some(path) => SelectorConfig::load(path)?,
        None => SelectorConfig::builtin()?,
    };
    println!("{}", serde_json::to_string_pretty(&describe(&selectors, url)?)?);
    Ok(())
}
