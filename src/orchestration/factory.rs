//! # Process Factory
//!
//! Maps each bean variant to the process that handles it. Queue consumers
//! hold a [`ProcessFactory`] and ask it for a process whenever they take a
//! bean; the process publishes on the consumer's status topic.

use std::sync::Arc;

use super::process::{ConsumerProcess, ProcessCore};
use super::processes::{
    MonitorAtomProcess, MoveAtomProcess, ScanAtomProcess, SubTaskAtomProcess, TaskBeanProcess,
};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::events::{MappedPublisher, Publisher};
use crate::models::{QueueAtom, TaskBean};
use crate::services::{
    DeviceService, MonitorFileWriter, QueueController, QueueService, ScanConnector,
    ScannableDeviceService,
};

/// Collaborators handed to every process the factory creates
#[derive(Clone)]
pub struct ProcessContext {
    pub queue_service: Arc<dyn QueueService>,
    pub controller: Arc<dyn QueueController>,
    pub devices: Arc<dyn DeviceService>,
    pub scannables: Arc<dyn ScannableDeviceService>,
    pub scan_connector: Arc<dyn ScanConnector>,
    pub monitor_writer: Arc<dyn MonitorFileWriter>,
    pub config: Arc<EngineConfig>,
}

pub trait ProcessFactory: Send + Sync {
    /// Process for an atom taken from an active queue
    fn create_atom_process(
        &self,
        atom: QueueAtom,
        publisher: Arc<dyn Publisher<QueueAtom>>,
    ) -> EngineResult<Arc<dyn ConsumerProcess>>;

    /// Process for a task taken from the job queue
    fn create_task_process(
        &self,
        task: TaskBean,
        publisher: Arc<dyn Publisher<TaskBean>>,
    ) -> EngineResult<Arc<dyn ConsumerProcess>>;
}

pub struct QueueProcessFactory {
    context: ProcessContext,
}

impl QueueProcessFactory {
    pub fn new(context: ProcessContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ProcessContext {
        &self.context
    }
}

impl ProcessFactory for QueueProcessFactory {
    fn create_atom_process(
        &self,
        atom: QueueAtom,
        publisher: Arc<dyn Publisher<QueueAtom>>,
    ) -> EngineResult<Arc<dyn ConsumerProcess>> {
        let context = &self.context;
        let process: Arc<dyn ConsumerProcess> = match atom {
            QueueAtom::Move(atom) => {
                let publisher = Arc::new(MappedPublisher::new(publisher, QueueAtom::Move));
                Arc::new(MoveAtomProcess::new(
                    Arc::new(ProcessCore::new(atom, publisher)),
                    context.devices.clone(),
                ))
            }
            QueueAtom::Monitor(atom) => {
                let publisher = Arc::new(MappedPublisher::new(publisher, QueueAtom::Monitor));
                Arc::new(MonitorAtomProcess::new(
                    Arc::new(ProcessCore::new(atom, publisher)),
                    context.scannables.clone(),
                    context.monitor_writer.clone(),
                ))
            }
            QueueAtom::Scan(atom) => {
                let publisher = Arc::new(MappedPublisher::new(publisher, QueueAtom::Scan));
                Arc::new(ScanAtomProcess::new(
                    Arc::new(ProcessCore::new(atom, publisher)),
                    context.scan_connector.clone(),
                    context.config.scanning.clone(),
                ))
            }
            QueueAtom::SubTask(atom) => {
                let publisher = Arc::new(MappedPublisher::new(publisher, QueueAtom::SubTask));
                Arc::new(SubTaskAtomProcess::new(
                    Arc::new(ProcessCore::new(atom, publisher)),
                    context.queue_service.clone(),
                    context.controller.clone(),
                ))
            }
        };
        Ok(process)
    }

    fn create_task_process(
        &self,
        task: TaskBean,
        publisher: Arc<dyn Publisher<TaskBean>>,
    ) -> EngineResult<Arc<dyn ConsumerProcess>> {
        Ok(Arc::new(TaskBeanProcess::new(
            Arc::new(ProcessCore::new(task, publisher)),
            self.context.queue_service.clone(),
            self.context.controller.clone(),
        )))
    }
}
