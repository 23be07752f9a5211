use async_trait::async_trait;
use serde_json::json;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::devices::MonitorSample;
use crate::error::EngineResult;

/// Persists monitor samples
#[async_trait]
pub trait MonitorFileWriter: Send + Sync {
    /// Create a new, uniquely named file for `monitor` and return its path
    async fn create_file(&self, monitor: &str) -> EngineResult<PathBuf>;

    /// Write one sample and return the dataset path it was written to
    async fn write_sample(
        &self,
        file: &Path,
        monitor: &str,
        sample: &MonitorSample,
    ) -> EngineResult<String>;
}

/// Dataset path a monitor sample is recorded under
pub fn monitor_dataset(monitor: &str) -> String {
    format!("/entry1/instrument/{monitor}")
}

/// Writes samples as JSON documents laid out like a data file:
/// `{"entry1": {"instrument": {"<monitor>": [sample]}}}`, where an array
/// sample is nested as a single entry
#[derive(Debug, Clone)]
pub struct JsonMonitorWriter {
    directory: PathBuf,
}

impl JsonMonitorWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl MonitorFileWriter for JsonMonitorWriter {
    async fn create_file(&self, monitor: &str) -> EngineResult<PathBuf> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let mut index = 1u32;
        loop {
            let path = self.directory.join(format!("{monitor}-{index}.json"));
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(_) => {
                    debug!(path = %path.display(), "Created monitor file");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => index += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn write_sample(
        &self,
        file: &Path,
        monitor: &str,
        sample: &MonitorSample,
    ) -> EngineResult<String> {
        let document = json!({ "entry1": { "instrument": { monitor: [sample] } } });
        let mut handle = OpenOptions::new().write(true).truncate(true).open(file).await?;
        handle.write_all(&serde_json::to_vec_pretty(&document)?).await?;
        handle.flush().await?;
        Ok(monitor_dataset(monitor))
    }
}
