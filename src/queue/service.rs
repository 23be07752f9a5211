use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::memory_queue::{MemoryQueue, ProcessSpawner};
use crate::config::EngineConfig;
use crate::constants::events;
use crate::error::{EngineError, EngineResult};
use crate::events::{Publisher, Subscription};
use crate::models::{QueueAtom, Queueable, TaskBean};
use crate::orchestration::{ConsumerProcess, ProcessFactory};
use crate::services::{QueueController, QueueService};
use crate::state_machine::{ControlRequest, QueueStatus};

/// What the service remembers about every queue it has registered,
/// including queues that have since been deregistered
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRecord {
    pub queue_id: String,
    pub status: QueueStatus,
    /// Purge flag of every stop that actually stopped the queue
    pub stops: Vec<bool>,
    pub deregistered: bool,
}

impl QueueRecord {
    fn new(queue_id: &str) -> Self {
        Self {
            queue_id: queue_id.to_string(),
            status: QueueStatus::Initialised,
            stops: Vec::new(),
            deregistered: false,
        }
    }
}

/// Holds the process factory. Set after construction because the factory's
/// processes need the service itself.
#[derive(Default)]
struct FactorySlot {
    factory: RwLock<Option<Arc<dyn ProcessFactory>>>,
}

impl FactorySlot {
    fn get(&self) -> EngineResult<Arc<dyn ProcessFactory>> {
        self.factory
            .read()
            .clone()
            .ok_or_else(|| EngineError::queue_service("no process factory configured"))
    }
}

impl ProcessSpawner<QueueAtom> for FactorySlot {
    fn spawn_process(
        &self,
        bean: QueueAtom,
        publisher: Arc<dyn Publisher<QueueAtom>>,
    ) -> EngineResult<Arc<dyn ConsumerProcess>> {
        self.get()?.create_atom_process(bean, publisher)
    }
}

impl ProcessSpawner<TaskBean> for FactorySlot {
    fn spawn_process(
        &self,
        bean: TaskBean,
        publisher: Arc<dyn Publisher<TaskBean>>,
    ) -> EngineResult<Arc<dyn ConsumerProcess>> {
        self.get()?.create_task_process(bean, publisher)
    }
}

/// In-process queue service: one job queue of tasks plus any number of
/// dynamically registered active queues of atoms. Each queue runs its beans
/// one at a time on its own consumer task.
pub struct InMemoryQueueService {
    config: Arc<EngineConfig>,
    job_queue: Arc<MemoryQueue<TaskBean>>,
    active_queues: DashMap<String, Arc<MemoryQueue<QueueAtom>>>,
    next_queue: AtomicU64,
    factory: Arc<FactorySlot>,
    task_archive: Arc<DashMap<String, TaskBean>>,
    atom_archive: Arc<DashMap<String, QueueAtom>>,
    records: Mutex<Vec<QueueRecord>>,
    stopped: AtomicBool,
}

impl InMemoryQueueService {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        let task_archive = Arc::new(DashMap::new());
        let job_queue_id = config.queues.job_queue_name.clone();
        let job_queue = Arc::new(MemoryQueue::new(
            job_queue_id.as_str(),
            config.status_topic_for(&job_queue_id),
            config.events.channel_capacity,
            task_archive.clone(),
        ));
        Self {
            config,
            job_queue,
            active_queues: DashMap::new(),
            next_queue: AtomicU64::new(1),
            factory: Arc::new(FactorySlot::default()),
            task_archive,
            atom_archive: Arc::new(DashMap::new()),
            records: Mutex::new(vec![QueueRecord::new(&job_queue_id)]),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_process_factory(&self, factory: Arc<dyn ProcessFactory>) {
        *self.factory.factory.write() = Some(factory);
    }

    /// Begin consuming tasks from the job queue
    pub fn start_job_queue(&self) -> EngineResult<()> {
        self.ensure_running()?;
        self.job_queue.start(self.factory.clone())?;
        self.sync_record(self.job_queue.id(), self.job_queue.status());
        info!(queue_id = %self.job_queue.id(), "🚀 QUEUE: Job queue started");
        Ok(())
    }

    /// Latest state broadcast for a task
    pub fn latest_task(&self, unique_id: &str) -> Option<TaskBean> {
        self.task_archive.get(unique_id).map(|e| e.value().clone())
    }

    /// Latest state broadcast for an atom on any active queue
    pub fn latest_atom(&self, unique_id: &str) -> Option<QueueAtom> {
        self.atom_archive.get(unique_id).map(|e| e.value().clone())
    }

    pub fn queue_records(&self) -> Vec<QueueRecord> {
        self.records.lock().clone()
    }

    pub fn active_queue_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active_queues.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of tasks waiting in the job queue
    pub fn pending_tasks(&self) -> usize {
        self.job_queue.pending_count()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Shut the service down: every queue stops and its running bean is
    /// terminated. Later operations fail with a stopped error.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("🛑 QUEUE: Stopping queue service");
        let active: Vec<Arc<MemoryQueue<QueueAtom>>> =
            self.active_queues.iter().map(|e| e.value().clone()).collect();
        let (job_stopped, active_stopped) = futures::join!(
            self.job_queue.halt(false),
            join_all(active.iter().map(|queue| queue.halt(false)))
        );
        if job_stopped {
            self.record_stop(self.job_queue.id(), false);
        }
        for (queue, stopped) in active.iter().zip(active_stopped) {
            if stopped {
                self.record_stop(queue.id(), false);
            }
        }
    }

    /// Drop the process factory. Breaks the reference cycle between the
    /// service and the processes it creates.
    pub fn dispose(&self) {
        *self.factory.factory.write() = None;
        debug!("Process factory released");
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.is_stopped() {
            Err(EngineError::stopped())
        } else {
            Ok(())
        }
    }

    fn active(&self, queue_id: &str) -> EngineResult<Arc<MemoryQueue<QueueAtom>>> {
        self.ensure_running()?;
        self.active_queues
            .get(queue_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::queue_service(format!("no active queue '{queue_id}'")))
    }

    fn is_job_queue(&self, queue_id: &str) -> bool {
        queue_id == self.job_queue.id()
    }

    fn update_record(&self, queue_id: &str, update: impl FnOnce(&mut QueueRecord)) {
        if let Some(record) = self
            .records
            .lock()
            .iter_mut()
            .find(|r| r.queue_id == queue_id)
        {
            update(record);
        }
    }

    fn sync_record(&self, queue_id: &str, status: QueueStatus) {
        self.update_record(queue_id, |record| record.status = status);
    }

    fn record_stop(&self, queue_id: &str, purge: bool) {
        self.update_record(queue_id, |record| {
            record.status = QueueStatus::Stopped;
            record.stops.push(purge);
        });
        info!(event = events::QUEUE_STOPPED, queue_id = %queue_id, purge = purge, "⏹️ QUEUE: Queue stopped");
    }

    /// Pause or resume the running bean without blocking the caller, which
    /// may itself be that bean's process
    fn spawn_request(queue_id: &str, process: Arc<dyn ConsumerProcess>, request: ControlRequest) {
        let queue_id = queue_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = process.handle_request(request).await {
                warn!(
                    queue_id = %queue_id,
                    bean_id = %process.bean_id(),
                    request = request.request_type(),
                    error = %e,
                    "Running bean did not accept queue request"
                );
            }
        });
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn register_new_active_queue(&self) -> EngineResult<String> {
        self.ensure_running()?;
        let queue_id = format!(
            "{}-{}",
            self.config.queues.active_queue_prefix,
            self.next_queue.fetch_add(1, Ordering::SeqCst)
        );
        let queue = Arc::new(MemoryQueue::new(
            queue_id.as_str(),
            self.config.status_topic_for(&queue_id),
            self.config.events.channel_capacity,
            self.atom_archive.clone(),
        ));
        self.active_queues.insert(queue_id.clone(), queue);
        self.records.lock().push(QueueRecord::new(&queue_id));
        debug!(event = events::QUEUE_REGISTERED, queue_id = %queue_id, "Active queue registered");
        Ok(queue_id)
    }

    async fn start_active_queue(&self, queue_id: &str) -> EngineResult<()> {
        let queue = self.active(queue_id)?;
        queue.start(self.factory.clone())?;
        self.sync_record(queue_id, queue.status());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop_active_queue(&self, queue_id: &str, purge: bool) -> EngineResult<()> {
        let queue = self.active(queue_id)?;
        if queue.halt(purge).await {
            self.record_stop(queue_id, purge);
        }
        Ok(())
    }

    async fn deregister_active_queue(&self, queue_id: &str) -> EngineResult<()> {
        let queue = self.active(queue_id)?;
        let status = queue.status();
        if status.is_active() {
            return Err(EngineError::queue_service(format!(
                "active queue '{queue_id}' is {status} and must be stopped before deregistration"
            )));
        }
        self.active_queues.remove(queue_id);
        queue.dispose();
        self.update_record(queue_id, |record| {
            record.status = QueueStatus::Disposed;
            record.deregistered = true;
        });
        debug!(event = events::QUEUE_DEREGISTERED, queue_id = %queue_id, "Active queue deregistered");
        Ok(())
    }

    async fn get_queue_status(&self, queue_id: &str) -> EngineResult<QueueStatus> {
        self.ensure_running()?;
        if self.is_job_queue(queue_id) {
            return Ok(self.job_queue.status());
        }
        Ok(self.active(queue_id)?.status())
    }

    fn job_queue_id(&self) -> String {
        self.job_queue.id().to_string()
    }
}

#[async_trait]
impl QueueController for InMemoryQueueService {
    async fn submit(&self, atom: QueueAtom, queue_id: &str) -> EngineResult<()> {
        self.active(queue_id)?.submit(atom)
    }

    async fn submit_task(&self, task: TaskBean) -> EngineResult<()> {
        self.ensure_running()?;
        info!(task_id = %task.unique_id(), name = %task.name(), "📥 QUEUE: Task submitted");
        self.job_queue.submit(task)
    }

    fn create_subscriber(&self, queue_id: &str) -> EngineResult<Arc<dyn Subscription<QueueAtom>>> {
        Ok(Arc::new(self.active(queue_id)?.subscription()))
    }

    fn create_task_subscriber(&self) -> EngineResult<Arc<dyn Subscription<TaskBean>>> {
        self.ensure_running()?;
        Ok(Arc::new(self.job_queue.subscription()))
    }

    async fn pause_queue(&self, queue_id: &str) -> EngineResult<()> {
        let running = if self.is_job_queue(queue_id) {
            self.ensure_running()?;
            self.job_queue.pause()
        } else {
            self.active(queue_id)?.pause()
        };
        info!(queue_id = %queue_id, "⏸️ QUEUE: Queue paused");
        self.sync_record(queue_id, self.get_queue_status(queue_id).await?);
        if let Some(process) = running {
            Self::spawn_request(queue_id, process, ControlRequest::Pause);
        }
        Ok(())
    }

    async fn resume_queue(&self, queue_id: &str) -> EngineResult<()> {
        let running = if self.is_job_queue(queue_id) {
            self.ensure_running()?;
            self.job_queue.resume()
        } else {
            self.active(queue_id)?.resume()
        };
        info!(queue_id = %queue_id, "▶️ QUEUE: Queue resumed");
        self.sync_record(queue_id, self.get_queue_status(queue_id).await?);
        if let Some(process) = running {
            Self::spawn_request(queue_id, process, ControlRequest::Resume);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn request(
        &self,
        queue_id: &str,
        bean_id: &str,
        request: ControlRequest,
    ) -> EngineResult<()> {
        if self.is_job_queue(queue_id) {
            self.ensure_running()?;
            self.job_queue.request(bean_id, request).await
        } else {
            self.active(queue_id)?.request(bean_id, request).await
        }
    }
}
