use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::constants::{messages, progress};
use crate::error::EngineResult;
use crate::models::{MonitorAtom, Queueable};
use crate::orchestration::process::{work_done, ProcessCore, QueueProcess};
use crate::services::{MonitorFileWriter, ScannableDeviceService};
use crate::state_machine::Status;

/// Reads one value from a monitor and records it to a new data file
pub struct MonitorAtomProcess {
    core: Arc<ProcessCore<MonitorAtom>>,
    scannables: Arc<dyn ScannableDeviceService>,
    writer: Arc<dyn MonitorFileWriter>,
}

impl MonitorAtomProcess {
    pub fn new(
        core: Arc<ProcessCore<MonitorAtom>>,
        scannables: Arc<dyn ScannableDeviceService>,
        writer: Arc<dyn MonitorFileWriter>,
    ) -> Self {
        Self {
            core,
            scannables,
            writer,
        }
    }

    fn stopped_early(&self) -> bool {
        let terminated = self.core.is_terminated();
        if terminated {
            debug!("Monitor read terminated, skipping remaining steps");
        }
        terminated
    }
}

#[async_trait]
impl QueueProcess for MonitorAtomProcess {
    type Bean = MonitorAtom;
    const PROCESS_TYPE: &'static str = "monitor";

    fn core(&self) -> &Arc<ProcessCore<MonitorAtom>> {
        &self.core
    }

    async fn run(&self) -> EngineResult<()> {
        self.core.broadcast_progress(
            Some(Status::Running),
            Some(progress::MONITOR_STARTED),
            Some(messages::MONITOR_STARTING),
        )?;
        let monitor = self.core.with_bean(|bean| bean.monitor.clone());

        let scannable = self.scannables.get_scannable(&monitor).await?;
        if self.stopped_early() {
            return Ok(());
        }
        self.core
            .broadcast_progress(None, Some(progress::MONITOR_DEVICE_READY), None)?;

        let file = self.writer.create_file(&monitor).await?;
        if self.stopped_early() {
            return Ok(());
        }
        self.core.update_and_broadcast(|bean| {
            bean.file_path = Some(file.display().to_string());
            bean.core.run_directory = file.parent().map(|dir| dir.display().to_string());
            bean.set_percent_complete(progress::MONITOR_FILE_CREATED);
        })?;

        let sample = scannable.value().await?;
        let dataset = self.writer.write_sample(&file, &monitor, &sample).await?;
        if self.stopped_early() {
            return Ok(());
        }
        debug!(monitor = %monitor, sample = ?sample, dataset = %dataset, "Monitor sample written");
        self.core.update_and_broadcast(|bean| {
            bean.dataset = Some(dataset);
            bean.set_percent_complete(progress::MONITOR_SAMPLE_WRITTEN);
        })?;

        work_done(&self.core)?;
        self.core.open_gate();
        Ok(())
    }

    fn aborted_message(&self) -> String {
        messages::MONITOR_ABORTED.to_string()
    }

    fn completed_message(&self) -> String {
        messages::MONITOR_COMPLETED.to_string()
    }
}
