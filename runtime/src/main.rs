// Copyright 2026 Shelfscan Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use shelfscan::cli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "shelfscan",
    about = "Shelfscan: product records from e-commerce pages",
    version,
    after_help = "Run 'shelfscan <command> --help' for details on each command."
)]
struct Cli {
    /// Suppress the progress bar and run summary
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl seed URLs and write product records as NDJSON
    Run(cli::run_cmd::RunArgs),
    /// Extract product records from a saved HTML page
    Extract {
        /// HTML file to read
        file: PathBuf,
        /// URL the page was saved from; enables selector fallback
        #[arg(long)]
        url: Option<String>,
    },
    /// Show which selector rules apply to a URL
    Resolve {
        /// Page URL
        url: String,
        /// Selector table (JSON); the built-in table when omitted
        #[arg(long, value_name = "FILE")]
        selectors: Option<PathBuf>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::logging::init(cli.verbose, cli.quiet, cli.log_json);

    let result = match cli.command {
        Commands::Run(args) => cli::run_cmd::run(args, cli.quiet).await,
        Commands::Extract { file, url } => cli::extract_cmd::run(&file, url.as_deref()).await,
        Commands::Resolve { url, selectors } => {
            cli::resolve_cmd::run(&url, selectors.as_deref()).await
        }
        Commands::Doctor => cli::doctor::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "shelfscan", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
