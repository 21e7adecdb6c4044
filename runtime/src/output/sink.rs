//! NDJSON record sink.
//!
//! The file is truncated on open. Each record becomes one line, written and
//! flushed under a lock so concurrent workers never interleave partial lines
//! and a crash loses at most the line being written.

use crate::error::{Result, ShelfscanError};
use crate::record::ProductRecord;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

/// Append-only NDJSON writer shared by all workers.
pub struct RecordSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    lines: AtomicU64,
}

impl RecordSink {
    /// Create (or truncate) the output file, creating parent directories.
    pub async fn create(path: &Path) -> Result<Self> {
        let output_err = |source| ShelfscanError::Output {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(output_err)?;
        }
        let file = File::create(path).await.map_err(output_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
            lines: AtomicU64::new(0),
        })
    }

    /// Append one record as a single line and flush it.
    pub async fn append(&self, record: &ProductRecord) -> std::io::Result<()> {
        let mut line = record.to_json_line().map_err(std::io::Error::other)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        self.lines.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flush buffered data and sync the file to disk.
    pub async fn close(&self) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        writer.get_mut().sync_all().await
    }

    /// Lines written so far.
    pub fn lines(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
