use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::constants::messages;
use crate::error::EngineResult;
use crate::models::TaskBean;
use crate::orchestration::atom_queue_processor::AtomQueueProcessor;
use crate::orchestration::process::{ProcessCore, QueueProcess};
use crate::services::{QueueController, QueueService};

/// Runs the sub-tasks of a [`TaskBean`] taken from the job queue. A failed
/// task pauses the job queue so later tasks wait for an operator.
pub struct TaskBeanProcess {
    core: Arc<ProcessCore<TaskBean>>,
    processor: AtomQueueProcessor<TaskBean>,
    queue_service: Arc<dyn QueueService>,
    controller: Arc<dyn QueueController>,
}

impl TaskBeanProcess {
    pub fn new(
        core: Arc<ProcessCore<TaskBean>>,
        queue_service: Arc<dyn QueueService>,
        controller: Arc<dyn QueueController>,
    ) -> Self {
        let processor =
            AtomQueueProcessor::new(core.clone(), queue_service.clone(), controller.clone());
        Self {
            core,
            processor,
            queue_service,
            controller,
        }
    }

    pub fn processor(&self) -> &AtomQueueProcessor<TaskBean> {
        &self.processor
    }
}

#[async_trait]
impl QueueProcess for TaskBeanProcess {
    type Bean = TaskBean;
    const PROCESS_TYPE: &'static str = "task";

    fn core(&self) -> &Arc<ProcessCore<TaskBean>> {
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

    async fn on_failed(&self) -> EngineResult<()> {
        let job_queue = self.queue_service.job_queue_id();
        warn!(job_queue = %job_queue, "⏸️ TASK: Pausing job queue after task failure");
        self.controller.pause_queue(&job_queue).await
    }

    async fn tidy(&self) -> EngineResult<()> {
        self.processor.tidy_queue().await
    }

    fn aborted_message(&self) -> String {
        messages::TASK_ABORTED.to_string()
    }

    fn completed_message(&self) -> String {
        messages::TASK_COMPLETED.to_string()
    }

    fn failed_message(&self) -> Option<String> {
        Some(messages::TASK_FAILED.to_string())
    }
}
