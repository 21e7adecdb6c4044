//! Webhook delivery.
//!
//! `line` mode POSTs every record as it is written; `batch` mode POSTs
//! `{"items": [...]}` once at the end of the run. Each POST is attempted
//! exactly once. Failures are returned to the caller, which logs and drops
//! them: a webhook outage never stalls the crawl or touches the local file.

use crate::record::ProductRecord;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Per-POST timeout.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// When records are forwarded to the webhook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WebhookMode {
    /// No delivery.
    #[default]
    None,
    /// One POST per record.
    Line,
    /// One POST with every record at the end.
    Batch,
}

impl std::str::FromStr for WebhookMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "line" => Ok(Self::Line),
            "batch" => Ok(Self::Batch),
            other => Err(format!("unknown webhook mode `{other}` (expected none, line or batch)")),
        }
    }
}

/// Already-parsed webhook options.
#[derive(Debug, Clone, Default)]
pub struct WebhookSettings {
    pub url: Option<String>,
    pub mode: WebhookMode,
    pub headers: Vec<(String, String)>,
}

/// Why a POST did not land.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook returned HTTP {0}")]
    Status(u16),
    #[error("failed to encode webhook body: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct BatchBody<'a> {
    items: &'a [ProductRecord],
}

/// Configured webhook endpoint.
pub struct Delivery {
    client: reqwest::Client,
    url: String,
    mode: WebhookMode,
    headers: HeaderMap,
}

impl Delivery {
    /// Build a delivery target, or `None` when the mode is `none` or no URL
    /// is configured. Custom headers override the JSON content type; headers
    /// with invalid names or values are skipped.
    pub fn new(settings: &WebhookSettings) -> Option<Self> {
        let url = settings.url.as_ref().filter(|u| !u.trim().is_empty())?;
        if settings.mode == WebhookMode::None {
            return None;
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &settings.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(n), Ok(v)) => {
                    headers.insert(n, v);
                }
                _ => warn!(header = %name, "skipping invalid webhook header"),
            }
        }

        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .unwrap_or_default();

        Some(Self {
            client,
            url: url.trim().to_string(),
            mode: settings.mode,
            headers,
        })
    }

    pub fn mode(&self) -> WebhookMode {
        self.mode
    }

    /// POST a JSON body once.
    pub async fn post_json<T: Serialize + ?Sized>(&self, body: &T) -> Result<(), DeliveryError> {
        let bytes = serde_json::to_vec(body)?;
        let resp = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(bytes)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }

    /// Forward one record in `line` mode; a no-op otherwise.
    pub async fn deliver_line(&self, record: &ProductRecord) -> Result<(), DeliveryError> {
        if self.mode != WebhookMode::Line {
            return Ok(());
        }
        self.post_json(record).await
    }

    /// POST the collected batch in `batch` mode; a no-op otherwise.
    pub async fn deliver_batch(&self, items: &[ProductRecord]) -> Result<(), DeliveryError> {
        if self.mode != WebhookMode::Batch {
            return Ok(());
        }
        self.post_json(&BatchBody { items }).await
    }
}

/// In-memory accumulator for batch delivery, appended to by every worker.
#[derive(Debug, Default)]
pub struct BatchCollector {
    items: Mutex<Vec<ProductRecord>>,
}

impl BatchCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: ProductRecord) {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take everything collected so far.
    pub fn take(&self) -> Vec<ProductRecord> {
        std::mem::take(
            &mut *self
                .items
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StructuredProduct;

    fn settings(mode: WebhookMode) -> WebhookSettings {
        WebhookSettings {
            url: Some("http://127.0.0.1:9/hook".into()),
            mode,
            headers: vec![("X-Token".into(), "abc".into()), ("bad header".into(), "x".into())],
        }
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("LINE".parse::<WebhookMode>().unwrap(), WebhookMode::Line);
        assert_eq!("batch".parse::<WebhookMode>().unwrap(), WebhookMode::Batch);
        assert_eq!("".parse::<WebhookMode>().unwrap(), WebhookMode::None);
        assert!("stream".parse::<WebhookMode>().is_err());
    }

    #[test]
    fn test_disabled_delivery() {
        assert!(Delivery::new(&settings(WebhookMode::None)).is_none());
        let mut no_url = settings(WebhookMode::Line);
        no_url.url = None;
        assert!(Delivery::new(&no_url).is_none());
    }

    #[test]
    fn test_headers_merge_and_skip_invalid() {
        let d = Delivery::new(&settings(WebhookMode::Line)).unwrap();
        assert_eq!(d.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(d.headers.get("x-token").unwrap(), "abc");
        assert_eq!(d.headers.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error_not_a_panic() {
        let d = Delivery::new(&settings(WebhookMode::Line)).unwrap();
        let rec = ProductRecord::Structured(StructuredProduct::default());
        assert!(d.deliver_line(&rec).await.is_err());
        // Wrong mode: nothing is sent.
        assert!(d.deliver_batch(&[rec]).await.is_ok());
    }

    #[test]
    fn test_batch_collector() {
        let c = BatchCollector::new();
        assert!(c.is_empty());
        c.push(ProductRecord::Structured(StructuredProduct::default()));
        c.push(ProductRecord::Structured(StructuredProduct::default()));
        assert_eq!(c.len(), 2);
        assert_eq!(c.take().len(), 2);
        assert!(c.is_empty());
    }
}
