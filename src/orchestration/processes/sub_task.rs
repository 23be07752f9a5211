use async_trait::async_trait;
use std::sync::Arc;

use crate::constants::messages;
use crate::error::EngineResult;
use crate::models::SubTaskAtom;
use crate::orchestration::atom_queue_processor::AtomQueueProcessor;
use crate::orchestration::process::{ProcessCore, QueueProcess};
use crate::services::{QueueController, QueueService};

/// Runs the children of a [`SubTaskAtom`] in a nested active queue
pub struct SubTaskAtomProcess {
    core: Arc<ProcessCore<SubTaskAtom>>,
    processor: AtomQueueProcessor<SubTaskAtom>,
}

impl SubTaskAtomProcess {
    pub fn new(
        core: Arc<ProcessCore<SubTaskAtom>>,
        queue_service: Arc<dyn QueueService>,
        controller: Arc<dyn QueueController>,
    ) -> Self {
        let processor = AtomQueueProcessor::new(core.clone(), queue_service, controller);
        Self { core, processor }
    }

    pub fn processor(&self) -> &AtomQueueProcessor<SubTaskAtom> {
        &self.processor
    }
}

#[async_trait]
impl QueueProcess for SubTaskAtomProcess {
    type Bean = SubTaskAtom;
    const PROCESS_TYPE: &'static str = "sub_task";

    fn core(&self) -> &Arc<ProcessCore<SubTaskAtom>> {
        &self.core
    }

    async fn run(&self) -> EngineResult<()> {
        self.processor.run().await
    }

    async fn do_terminate(&self) -> EngineResult<()> {
        self.processor.terminate().await
    }

    async fn do_pause(&self) -> EngineResult<()> {
        self.processor.pause().await
    }

    async fn do_resume(&self) -> EngineResult<()> {
        self.processor.resume().await
    }

    async fn tidy(&self) -> EngineResult<()> {
        self.processor.tidy_queue().await
    }

    fn aborted_message(&self) -> String {
        messages::SUBTASK_ABORTED.to_string()
    }

    fn completed_message(&self) -> String {
        messages::SUBTASK_COMPLETED.to_string()
    }

    fn failed_message(&self) -> Option<String> {
        Some(messages::SUBTASK_FAILED.to_string())
    }
}
