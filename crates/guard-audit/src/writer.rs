use std::path::{Path, PathBuf};

use tokio::io::{AsyncWriteExt, BufWriter};

use crate::entry::AuditEntry;

#[derive(Debug, thiserror::Error)]
pub enum AuditWriteError {
    #[error("failed to create audit directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open audit log {path}: {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize audit entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write audit log: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to flush audit log: {0}")]
    Flush(#[source] std::io::Error),
}

/// Buffered append-only JSON-lines writer.
pub struct AuditWriter {
    out: BufWriter<tokio::fs::File>,
    written: u64,
}

impl AuditWriter {
    /// Open `path` for appending, creating it and its parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditWriteError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| AuditWriteError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| AuditWriteError::OpenFile {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            out: BufWriter::new(file),
            written: 0,
        })
    }

    /// Append one entry as a newline-terminated JSON object. Data may sit in
    /// the buffer until [`flush`](Self::flush).
    pub async fn append(&mut self, entry: &AuditEntry) -> Result<(), AuditWriteError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.out
            .write_all(&line)
            .await
            .map_err(AuditWriteError::Write)?;
        self.written += 1;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), AuditWriteError> {
        self.out.flush().await.map_err(AuditWriteError::Flush)
    }

    /// Entries appended since the writer was opened.
    pub fn written(&self) -> u64 {
        self.written
    }
}
