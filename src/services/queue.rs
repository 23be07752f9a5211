use async_trait::async_trait;
use std::sync::Arc;

use crate::error::EngineResult;
use crate::events::Subscription;
use crate::models::{QueueAtom, TaskBean};
use crate::state_machine::{ControlRequest, QueueStatus};

/// Manages the lifecycle of the job queue and of dynamically created active
/// queues. Errors carry a reason string; a reason of `"stopped"` means the
/// service itself has shut down.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Create a new active queue and return its identifier
    async fn register_new_active_queue(&self) -> EngineResult<String>;

    /// Begin consuming atoms submitted to the queue
    async fn start_active_queue(&self, queue_id: &str) -> EngineResult<()>;

    /// Stop consuming. Any running atom is terminated. With `purge` the atoms
    /// still waiting in the queue are discarded.
    async fn stop_active_queue(&self, queue_id: &str, purge: bool) -> EngineResult<()>;

    async fn deregister_active_queue(&self, queue_id: &str) -> EngineResult<()>;

    async fn get_queue_status(&self, queue_id: &str) -> EngineResult<QueueStatus>;

    /// Identifier of the job queue holding top-level tasks
    fn job_queue_id(&self) -> String;
}

/// Client-facing operations on queues: submission, status subscription and
/// control requests
#[async_trait]
pub trait QueueController: Send + Sync {
    /// Submit an atom to an active queue
    async fn submit(&self, atom: QueueAtom, queue_id: &str) -> EngineResult<()>;

    /// Submit a task to the job queue
    async fn submit_task(&self, task: TaskBean) -> EngineResult<()>;

    /// Subscription to the status topic of an active queue
    fn create_subscriber(&self, queue_id: &str) -> EngineResult<Arc<dyn Subscription<QueueAtom>>>;

    /// Subscription to the status topic of the job queue
    fn create_task_subscriber(&self) -> EngineResult<Arc<dyn Subscription<TaskBean>>>;

    /// Stop the queue picking up further beans and pause the bean it is
    /// running, if any
    async fn pause_queue(&self, queue_id: &str) -> EngineResult<()>;

    async fn resume_queue(&self, queue_id: &str) -> EngineResult<()>;

    /// Ask the process handling bean `bean_id` on queue `queue_id` to pause,
    /// resume or terminate
    async fn request(
        &self,
        queue_id: &str,
        bean_id: &str,
        request: ControlRequest,
    ) -> EngineResult<()>;
}
