//! Fatal errors that stop a run before any worker starts.
//!
//! Everything that can go wrong *during* a crawl is recorded as a
//! [`ProductRecord::Failed`](crate::record::ProductRecord::Failed) instead.

use std::path::PathBuf;

/// Errors that abort the whole run.
#[derive(Debug, thiserror::Error)]
pub enum ShelfscanError {
    /// The seed URL list could not be read.
    #[error("failed to read input file {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The NDJSON output stream could not be opened or written.
    #[error("failed to open output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The selector configuration file is missing or unreadable.
    #[error("failed to read selector config {path}: {source}")]
    SelectorConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The selector configuration is not a valid host → rule-set table.
    #[error("invalid selector config: {0}")]
    SelectorConfigParse(#[from] serde_json::Error),

    /// The browser engine could not be started.
    #[error("failed to launch browser: {0}")]
    BrowserLaunch(String),
}

/// Result alias for fatal operations.
pub type Result<T> = std::result::Result<T, ShelfscanError>;
