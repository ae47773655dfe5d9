//! Destinations for evaluation outcomes.

use crate::driver::EvalOutcome;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Receives one outcome per evaluated record
#[async_trait]
pub trait ScoreSink: Send + Sync {
    async fn emit(&self, outcome: &EvalOutcome) -> Result<()>;

    /// Flush buffered outcomes; called once after the batch
    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}

/// Keeps outcomes in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    outcomes: Mutex<Vec<EvalOutcome>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes received so far, in emission order
    pub fn outcomes(&self) -> Vec<EvalOutcome> {
        self.outcomes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.outcomes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.lock().is_empty()
    }
}

#[async_trait]
impl ScoreSink for MemorySink {
    async fn emit(&self, outcome: &EvalOutcome) -> Result<()> {
        self.outcomes.lock().push(outcome.clone());
        Ok(())
    }
}

/// Appends one JSON object per outcome to a file
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
}

impl JsonlSink {
    /// Create (or truncate) the output file
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| EvalError::io(&path, e))?;
        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ScoreSink for JsonlSink {
    async fn emit(&self, outcome: &EvalOutcome) -> Result<()> {
        let mut line = serde_json::to_vec(outcome)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .map_err(|e| EvalError::io(&self.path, e))
    }

    async fn finish(&self) -> Result<()> {
        self.file
            .lock()
            .await
            .flush()
            .await
            .map_err(|e| EvalError::io(&self.path, e))
    }
}
