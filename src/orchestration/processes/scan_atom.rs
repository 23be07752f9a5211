use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ScanningConfig;
use crate::constants::{messages, progress};
use crate::error::EngineResult;
use crate::events::Subscription;
use crate::models::{Queueable, ScanAtom, ScanBean, ScanRequest};
use crate::orchestration::process::{ProcessCore, QueueProcess};
use crate::orchestration::queue_listener::QueueListener;
use crate::services::{ScanConnector, ScanEndpoint, ScanService};
use crate::state_machine::{ControlRequest, Status};

struct ScanConnection {
    service: Arc<dyn ScanService>,
    subscription: Arc<dyn Subscription<ScanBean>>,
    scan_id: String,
}

/// Submits a scan for a [`ScanAtom`] and follows it on the scan status topic.
/// The scan is the atom's only child: its progress, pauses, failure and
/// termination are folded into the atom by a [`QueueListener`].
pub struct ScanAtomProcess {
    core: Arc<ProcessCore<ScanAtom>>,
    connector: Arc<dyn ScanConnector>,
    defaults: ScanningConfig,
    connection: Mutex<Option<ScanConnection>>,
}

impl ScanAtomProcess {
    pub fn new(
        core: Arc<ProcessCore<ScanAtom>>,
        connector: Arc<dyn ScanConnector>,
        defaults: ScanningConfig,
    ) -> Self {
        Self {
            core,
            connector,
            defaults,
            connection: Mutex::new(None),
        }
    }

    /// Unique id of the submitted scan bean
    pub fn scan_id(&self) -> Option<String> {
        self.connection.lock().as_ref().map(|c| c.scan_id.clone())
    }

    async fn send_request(&self, request: ControlRequest) -> EngineResult<()> {
        let target = self
            .connection
            .lock()
            .as_ref()
            .map(|c| (c.service.clone(), c.scan_id.clone()));
        match target {
            Some((service, scan_id)) => service.request(&scan_id, request).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QueueProcess for ScanAtomProcess {
    type Bean = ScanAtom;
    const PROCESS_TYPE: &'static str = "scan";

    fn core(&self) -> &Arc<ProcessCore<ScanAtom>> {
        &self.core
    }

    async fn run(&self) -> EngineResult<()> {
        self.core.broadcast_progress(
            Some(Status::Running),
            Some(progress::SCAN_CONFIGURING),
            Some(messages::SCAN_CONFIGURING),
        )?;
        let atom = self.core.bean();

        let endpoint = ScanEndpoint::resolve(&atom, &self.defaults)?;
        self.core
            .broadcast_progress(None, Some(progress::SCAN_ENDPOINT_RESOLVED), None)?;

        let request = ScanRequest::from_atom(&atom);
        self.core
            .broadcast_progress(None, Some(progress::SCAN_REQUEST_BUILT), None)?;

        let mut scan = ScanBean::for_atom(&atom, request);
        scan.set_status(Status::Submitted);
        scan.core.submission_time = Some(Utc::now());
        self.core
            .broadcast_progress(None, Some(progress::SCAN_BEAN_CREATED), None)?;

        let service = self.connector.connect(&endpoint).await?;
        let listener = Arc::new(QueueListener::new(
            self.core.clone(),
            std::slice::from_ref(&scan),
        ));
        let subscription = service.subscribe()?;
        subscription.add_listener(listener)?;
        *self.connection.lock() = Some(ScanConnection {
            service: service.clone(),
            subscription,
            scan_id: scan.unique_id().to_string(),
        });

        self.core
            .broadcast_progress(None, Some(progress::SCAN_SUBMITTED), None)?;
        info!(
            scan_id = %scan.unique_id(),
            broker = %endpoint.broker_uri,
            submit_queue = %endpoint.submit_queue,
            "📡 SCAN: Submitting scan"
        );
        service.submit(scan).await?;
        self.core
            .broadcast_progress(None, None, Some(messages::SCAN_SUBMITTED))
    }

    async fn do_terminate(&self) -> EngineResult<()> {
        self.send_request(ControlRequest::Terminate).await
    }

    async fn do_pause(&self) -> EngineResult<()> {
        self.send_request(ControlRequest::Pause).await
    }

    async fn do_resume(&self) -> EngineResult<()> {
        self.send_request(ControlRequest::Resume).await
    }

    async fn tidy(&self) -> EngineResult<()> {
        let subscription = self
            .connection
            .lock()
            .as_ref()
            .map(|c| c.subscription.clone());
        match subscription.map(|subscription| subscription.disconnect()) {
            Some(Err(e)) if e.is_stopped() => {
                warn!("Scan service stopped before its status topic was disconnected");
                Ok(())
            }
            Some(Err(e)) => {
                warn!(error = %e, "Failed to disconnect from scan status topic");
                Err(e)
            }
            _ => Ok(()),
        }
    }

    fn aborted_message(&self) -> String {
        if self.core.is_child_command() {
            messages::SCAN_ABORTED_BY_SERVICE.to_string()
        } else {
            messages::SCAN_ABORTED.to_string()
        }
    }

    fn completed_message(&self) -> String {
        messages::SCAN_COMPLETED.to_string()
    }

    fn failed_message(&self) -> Option<String> {
        Some(messages::SCAN_FAILED.to_string())
    }
}
