//! Pure text → value conversions shared by both extractors.

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// ISO 4217 codes accepted when they appear verbatim in price text.
pub const KNOWN_CURRENCIES: &[&str] = &["EGP", "USD", "EUR", "GBP", "SAR", "AED"];

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex is valid"))
}

fn egp_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ج\.?\s?م|جنيه|E£").expect("EGP marker regex is valid"))
}

/// Upper-case `LE` / `L.E.` written against the amount, e.g. `350 LE`, `LE350`.
fn egp_letters_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[\d\s])L\.?E\.?(?:$|[\s\d])").expect("LE regex is valid")
    })
}

/// Current UTC time as an ISO-8601 string with millisecond precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Lowercase hostname with a leading `www.` removed.
///
/// Returns an empty string for anything that does not parse as an absolute URL.
pub fn canonical_host(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return String::new();
    };
    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// First decimal number in a price string.
///
/// Everything except digits, `,` and `.` is dropped, commas are treated as
/// thousands separators, and the first `\d+(\.\d+)?` run is parsed.
pub fn extract_number(text: Option<&str>) -> Option<f64> {
    let text = text?;
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    number_re()
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Resolve a currency code from free-form price text.
///
/// A recognised three-letter code anywhere in the text wins; otherwise symbol
/// and keyword heuristics apply in order: Egyptian pound markers, `£`/`₤`,
/// `$`, then a bare `LE` next to the amount.
pub fn normalize_currency(text: Option<&str>) -> Option<String> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }

    let code = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| word.len() == 3)
        .map(str::to_ascii_uppercase)
        .find(|word| KNOWN_CURRENCIES.contains(&word.as_str()));
    if code.is_some() {
        return code;
    }

    // E£ must be matched before the bare pound sign.
    if egp_marker_re().is_match(text) {
        return Some("EGP".to_string());
    }
    if text.contains('£') || text.contains('₤') {
        return Some("GBP".to_string());
    }
    if text.contains('$') {
        return Some("USD".to_string());
    }
    if egp_letters_re().is_match(text) {
        return Some("EGP".to_string());
    }
    None
}

/// Accept a declared currency (e.g. JSON-LD `priceCurrency`) if it looks like
/// an ISO 4217 code.
pub fn iso_currency(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (raw.len() == 3 && raw.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| raw.to_ascii_uppercase())
}

/// Coarse stock classification of availability text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    OutOfStock,
    Unknown,
}

/// Classify availability text in English or Arabic, including schema.org
/// `https://schema.org/InStock` style values.
pub fn classify_availability(text: Option<&str>) -> Availability {
    let Some(text) = text else {
        return Availability::Unknown;
    };
    let lower = text.to_lowercase();

    const OUT: &[&str] = &[
        "outofstock",
        "out of stock",
        "out_of_stock",
        "sold out",
        "soldout",
        "unavailable",
        "discontinued",
        "غير متاح",
        "غير متوفر",
        "نفدت الكمية",
    ];
    const IN: &[&str] = &[
        "instock",
        "in stock",
        "in_stock",
        "available",
        "limitedavailability",
        "متاح",
        "متوفر",
        "متوفّر",
    ];

    // Negative markers contain positive ones ("unavailable", "غير متاح").
    if OUT.iter().any(|m| lower.contains(m)) {
        Availability::OutOfStock
    } else if IN.iter().any(|m| lower.contains(m)) {
        Availability::InStock
    } else {
        Availability::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_host_strips_www_and_lowercases() {
        assert_eq!(canonical_host("https://WWW.Example.com/p/1"), "example.com");
        assert_eq!(canonical_host("https://shop.example.com"), "shop.example.com");
        assert_eq!(canonical_host("not a url"), "");
    }

    #[test]
    fn test_extract_number() {
        assert_eq!(extract_number(Some("499.00 EGP")), Some(499.0));
        assert_eq!(extract_number(Some("$19.99")), Some(19.99));
        assert_eq!(extract_number(Some("£12")), Some(12.0));
        assert_eq!(extract_number(Some("EGP 1,299.50")), Some(1299.5));
        assert_eq!(extract_number(Some("Call for price")), None);
        assert_eq!(extract_number(None), None);
    }

    #[test]
    fn test_normalize_currency_from_code() {
        assert_eq!(normalize_currency(Some("499.00 EGP")).as_deref(), Some("EGP"));
        assert_eq!(normalize_currency(Some("usd 10")).as_deref(), Some("USD"));
        assert_eq!(normalize_currency(Some("120SAR")).as_deref(), Some("SAR"));
    }

    #[test]
    fn test_normalize_currency_from_symbols() {
        assert_eq!(normalize_currency(Some("$19.99")).as_deref(), Some("USD"));
        assert_eq!(normalize_currency(Some("£12")).as_deref(), Some("GBP"));
        assert_eq!(normalize_currency(Some("₤7")).as_deref(), Some("GBP"));
        assert_eq!(normalize_currency(Some("E£ 250")).as_deref(), Some("EGP"));
        assert_eq!(normalize_currency(Some("350 ج.م")).as_deref(), Some("EGP"));
        assert_eq!(normalize_currency(Some("350 جنيه")).as_deref(), Some("EGP"));
        assert_eq!(normalize_currency(Some("350 LE")).as_deref(), Some("EGP"));
        assert_eq!(normalize_currency(Some("L.E. 99")).as_deref(), Some("EGP"));
        assert_eq!(normalize_currency(Some("LE1,200")).as_deref(), Some("EGP"));
    }

    #[test]
    fn test_dollar_wins_over_stray_le_words() {
        assert_eq!(normalize_currency(Some("$19.99 le lot")).as_deref(), Some("USD"));
        assert_eq!(normalize_currency(Some("Le Creuset $199")).as_deref(), Some("USD"));
        assert_eq!(normalize_currency(Some("350 LE $")).as_deref(), Some("USD"));
        assert_eq!(normalize_currency(Some("Le Creuset 199")), None);
        assert_eq!(normalize_currency(Some("TABLE 20")), None);
    }

    #[test]
    fn test_normalize_currency_unrecognized() {
        assert_eq!(normalize_currency(Some("19.99 XYZ")), None);
        assert_eq!(normalize_currency(Some("   ")), None);
        assert_eq!(normalize_currency(None), None);
        // Price still comes through independently.
        assert_eq!(extract_number(Some("19.99 XYZ")), Some(19.99));
    }

    #[test]
    fn test_iso_currency() {
        assert_eq!(iso_currency("usd").as_deref(), Some("USD"));
        assert_eq!(iso_currency(" CAD ").as_deref(), Some("CAD"));
        assert_eq!(iso_currency("$"), None);
        assert_eq!(iso_currency("EURO"), None);
    }

    #[test]
    fn test_classify_availability() {
        assert_eq!(
            classify_availability(Some("https://schema.org/InStock")),
            Availability::InStock
        );
        assert_eq!(classify_availability(Some("Sold out")), Availability::OutOfStock);
        assert_eq!(classify_availability(Some("Unavailable")), Availability::OutOfStock);
        assert_eq!(classify_availability(Some("غير متاح")), Availability::OutOfStock);
        assert_eq!(classify_availability(Some("متاح")), Availability::InStock);
        assert_eq!(classify_availability(Some("Ships soon")), Availability::Unknown);
        assert_eq!(classify_availability(None), Availability::Unknown);
    }

    #[test]
    fn test_now_iso_is_rfc3339_utc() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
