//! Environment readiness check.

use crate::config::DEFAULT_OUTPUT;
use crate::renderer::chromium::find_chromium;
use crate::selectors::SelectorConfig;
use anyhow::Result;
use std::path::Path;

/// Report Chromium, the selector table, and the output location.
pub async fn run() -> Result<()> {
    println!("Shelfscan Doctor");
    println!("================");
    println!();

    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let chromium = find_chromium();
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Set SHELFSCAN_CHROMIUM_PATH or use `--engine http`."
        ),
    }

    match SelectorConfig::builtin() {
        Ok(table) if table.has_default() => {
            println!("[OK] Built-in selector table: {} entries", table.len())
        }
        Ok(_) => println!("[!!] Built-in selector table has no \"default\" entry"),
        Err(e) => println!("[!!] Built-in selector table is invalid: {e}"),
    }

    let out_dir = Path::new(DEFAULT_OUTPUT).parent().unwrap_or(Path::new("."));
    if out_dir.exists() {
        println!("[OK] Output directory {} exists", out_dir.display());
    } else {
        println!("[..] Output directory {} will be created", out_dir.display());
    }

    match std::env::var("SHELFSCAN_WEBHOOK_URL") {
        Ok(url) if !url.trim().is_empty() => println!("[OK] SHELFSCAN_WEBHOOK_URL is set"),
        _ => println!("[..] SHELFSCAN_WEBHOOK_URL not set (webhook delivery off by default)"),
    }

    println!();
    if chromium.is_some() {
        println!("Status: READY");
    } else {
        println!("Status: HTTP ENGINE ONLY");
    }

    Ok(())
}
