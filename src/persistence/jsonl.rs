// =============================================================================
// JSON-lines sink
// =============================================================================
//
// One `EngineEvent` per line, in the same `{"type", "data"}` shape subscribers
// receive. The file is opened lazily in append mode and kept open; writes are
// serialised through an async mutex so concurrent appends never interleave.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use super::PersistenceSink;
use crate::types::EngineEvent;

pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        info!(path = %self.path.display(), "persistence file opened");
        Ok(file)
    }
}

#[async_trait]
impl PersistenceSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn append(&self, record: &EngineEvent) -> Result<()> {
        let mut line = serde_json::to_string(record).context("failed to serialise record")?;
        line.push('\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        let file = guard.as_mut().context("persistence file unavailable")?;

        if let Err(e) = file.write_all(line.as_bytes()).await {
            // Drop the handle so the next append reopens the file.
            *guard = None;
            return Err(e).with_context(|| format!("failed to append to {}", self.path.display()));
        }
        file.flush()
            .await
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}
