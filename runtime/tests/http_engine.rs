//! End-to-end crawl with the static HTTP engine against a mock shop.

mod common;

use assert_json_diff::assert_json_include;
use common::{options, product_page, read_lines};
use serde_json::json;
use shelfscan::crawl::Crawler;
use shelfscan::output::{Output, WebhookSettings};
use shelfscan::renderer::http::HttpRenderer;
use shelfscan::renderer::BrowserSettings;
use shelfscan::selectors::SelectorConfig;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn page(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_mock_shop_over_http() {
    let server = MockServer::start().await;
    let listing = r#"<html><body><div class="grid">
        <div class="product-card"><a href="/p/lamp">Lamp</a></div>
        <div class="product-card"><a href="/p/kettle">Kettle</a></div>
        <div class="product-card"><a href="/p/gone">Gone</a></div>
        <div class="product-card"><a href="/p/extra">Extra</a></div>
    </div></body></html>"#;
    page(&server, "/list", 200, listing).await;
    page(&server, "/p/lamp", 200, &product_page("Desk Lamp", "1250.50", "EGP")).await;
    page(
        &server,
        "/p/kettle",
        200,
        r#"<html><head><meta property="og:title" content="Steel Kettle"></head>
           <body><h1>ignored</h1><span class="price">$19.99</span>
           <div class="stock">Out of stock</div></body></html>"#,
    )
    .await;
    page(&server, "/p/gone", 404, "").await;
    page(&server, "/p/extra", 200, &product_page("Extra", "1", "USD")).await;
    page(&server, "/single", 200, &product_page("Solo", "7", "GBP")).await;

    let seeds = vec![
        format!("{}/list", server.uri()),
        format!("{}/single", server.uri()),
        format!("{}/down", server.uri()),
    ];

    let dir = TempDir::new().unwrap();
    let out_path = dir.path().join("results.ndjson");
    std::fs::write(&out_path, "stale line\n").unwrap();
    let output = Output::open(&out_path, &WebhookSettings::default()).await.unwrap();

    let renderer = Arc::new(HttpRenderer::new(&BrowserSettings::default()).unwrap());
    let crawler = Crawler::new(
        renderer,
        Arc::new(SelectorConfig::builtin().unwrap()),
        options(2, 3),
    );
    let summary = crawler.run(&seeds, &output).await;
    let report = output.finish().await;

    assert_eq!(summary.seeds, 3);
    assert_eq!(summary.records, 5);
    assert_eq!(summary.errors, 2);
    assert_eq!(report.lines_written, 5);

    let lines = read_lines(&out_path);
    assert_eq!(lines.len(), 5);
    let by_url = |suffix: &str| {
        lines
            .iter()
            .find(|l| {
                l["product_url"]
                    .as_str()
                    .is_some_and(|u| u.ends_with(suffix))
            })
            .cloned()
            .unwrap_or_else(|| panic!("no record for {suffix}"))
    };

    assert_json_include!(
        actual: by_url("/p/kettle"),
        expected: json!({
            "product_name": "Steel Kettle",
            "price_value": 19.99,
            "currency": "USD",
            "raw_price_text": "$19.99",
            "status": "Out of stock",
            "site_name": "127.0.0.1",
            "source_url": format!("{}/list", server.uri()),
            "notes": "selectors",
        })
    );

    let gone = by_url("/p/gone");
    assert_eq!(gone["status"], "error");
    assert!(gone["notes"].as_str().unwrap().contains("404"));

    let down = by_url("/down");
    assert_eq!(down["status"], "error");
    assert!(down["notes"].as_str().unwrap().starts_with("top-level error:"));

    let jsonld: Vec<_> = lines.iter().filter(|l| l["notes"] == "jsonld").collect();
    assert_eq!(jsonld.len(), 2);
    let lamp = jsonld
        .iter()
        .find(|l| l["product_name"] == "Desk Lamp")
        .expect("lamp record");
    assert_json_include!(
        actual: (*lamp).clone(),
        expected: json!({
            "product_name": "Desk Lamp",
            "price_value": 1250.5,
            "currency": "EGP",
            "availability": "https://schema.org/InStock",
            "source_url": format!("{}/p/lamp", server.uri()),
        })
    );
    let solo = jsonld
        .iter()
        .find(|l| l["product_name"] == "Solo")
        .expect("solo record");
    assert_eq!(solo["currency"], "GBP");
    assert_eq!(solo["source_url"], format!("{}/single", server.uri()));

    // The cap stopped discovery before /p/extra.
    assert!(!lines
        .iter()
        .any(|l| l["product_url"].as_str().is_some_and(|u| u.ends_with("/p/extra"))));
}
