use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ScanningConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::Subscription;
use crate::models::{ScanAtom, ScanBean};
use crate::state_machine::ControlRequest;

/// Where a scan is submitted and where its status is published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEndpoint {
    pub broker_uri: String,
    pub status_topic: String,
    pub submit_queue: String,
}

impl ScanEndpoint {
    /// Endpoint for an atom: values set on the atom win over configured
    /// defaults. The broker URI must look like `scheme://host...`.
    pub fn resolve(atom: &ScanAtom, defaults: &ScanningConfig) -> EngineResult<Self> {
        let broker_uri = atom
            .scan_broker_uri
            .clone()
            .unwrap_or_else(|| defaults.broker_uri.clone());
        validate_broker_uri(&broker_uri)?;

        Ok(Self {
            broker_uri,
            status_topic: atom
                .scan_status_topic
                .clone()
                .unwrap_or_else(|| defaults.status_topic.clone()),
            submit_queue: atom
                .scan_submit_queue
                .clone()
                .unwrap_or_else(|| defaults.submit_queue.clone()),
        })
    }
}

fn validate_broker_uri(uri: &str) -> EngineResult<()> {
    match uri.split_once("://") {
        Some((scheme, rest))
            if !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && !rest.is_empty() =>
        {
            Ok(())
        }
        _ => Err(EngineError::Scanning(format!(
            "invalid scan broker URI '{uri}'"
        ))),
    }
}

/// A connection to the scanning service on one endpoint
#[async_trait]
pub trait ScanService: Send + Sync {
    /// Subscription to the scan status topic
    fn subscribe(&self) -> EngineResult<Arc<dyn Subscription<ScanBean>>>;

    /// Submit a scan for execution
    async fn submit(&self, bean: ScanBean) -> EngineResult<()>;

    /// Ask the scanning service to pause, resume or abort a scan
    async fn request(&self, bean_id: &str, request: ControlRequest) -> EngineResult<()>;
}

/// Opens connections to the scanning service
#[async_trait]
pub trait ScanConnector: Send + Sync {
    async fn connect(&self, endpoint: &ScanEndpoint) -> EngineResult<Arc<dyn ScanService>>;
}
