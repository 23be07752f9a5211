use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::events::{Publisher, TopicPublisher, TopicSubscription};
use crate::models::Queueable;
use crate::orchestration::ConsumerProcess;
use crate::state_machine::{ControlRequest, QueueStatus, Status};

/// Creates the process that handles a bean taken from a queue
pub(crate) trait ProcessSpawner<B>: Send + Sync {
    fn spawn_process(
        &self,
        bean: B,
        publisher: Arc<dyn Publisher<B>>,
    ) -> EngineResult<Arc<dyn ConsumerProcess>>;
}

/// Status topic publisher that also keeps the latest state of every bean
/// broadcast on it
pub(crate) struct ArchivingPublisher<B> {
    topic: TopicPublisher<B>,
    archive: Arc<DashMap<String, B>>,
}

impl<B: Queueable> Publisher<B> for ArchivingPublisher<B> {
    fn broadcast(&self, bean: &B) -> EngineResult<()> {
        self.archive
            .insert(bean.unique_id().to_string(), bean.clone());
        self.topic.broadcast(bean)
    }
}

struct RunningBean {
    bean_id: String,
    process: Arc<dyn ConsumerProcess>,
}

/// One in-memory queue: pending beans, a single consumer task and the status
/// topic its processes publish on
pub(crate) struct MemoryQueue<B> {
    id: String,
    publisher: Arc<ArchivingPublisher<B>>,
    pending: Mutex<VecDeque<B>>,
    available: Notify,
    paused: watch::Sender<bool>,
    shutdown: watch::Sender<bool>,
    running: Mutex<Option<RunningBean>>,
    status: Mutex<QueueStatus>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl<B: Queueable> MemoryQueue<B> {
    pub(crate) fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        capacity: usize,
        archive: Arc<DashMap<String, B>>,
    ) -> Self {
        let (paused, _) = watch::channel(false);
        let (shutdown, _) = watch::channel(false);
        Self {
            id: id.into(),
            publisher: Arc::new(ArchivingPublisher {
                topic: TopicPublisher::new(topic, capacity),
                archive,
            }),
            pending: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            paused,
            shutdown,
            running: Mutex::new(None),
            status: Mutex::new(QueueStatus::Initialised),
            consumer: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn status(&self) -> QueueStatus {
        *self.status.lock()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub(crate) fn subscription(&self) -> TopicSubscription<B> {
        self.publisher.topic.subscription()
    }

    pub(crate) fn running_process(&self) -> Option<Arc<dyn ConsumerProcess>> {
        self.running.lock().as_ref().map(|r| r.process.clone())
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stamp the bean as submitted, publish it and queue it for the consumer
    pub(crate) fn submit(&self, mut bean: B) -> EngineResult<()> {
        let status = self.status();
        if !status.is_active() {
            return Err(EngineError::queue_service(format!(
                "queue '{}' is {status} and accepts no submissions",
                self.id
            )));
        }
        bean.transition_to(Status::Submitted);
        bean.core_mut().submission_time = Some(Utc::now());
        self.publisher.broadcast(&bean)?;
        debug!(queue_id = %self.id, bean_id = %bean.unique_id(), "Bean queued");
        self.pending.lock().push_back(bean);
        self.available.notify_one();
        Ok(())
    }

    /// Begin consuming. Starting a queue that is already consuming is a no-op.
    pub(crate) fn start(self: &Arc<Self>, spawner: Arc<dyn ProcessSpawner<B>>) -> EngineResult<()> {
        {
            let mut status = self.status.lock();
            match *status {
                QueueStatus::Initialised if *self.paused.borrow() => *status = QueueStatus::Paused,
                QueueStatus::Initialised => *status = QueueStatus::Started,
                QueueStatus::Started | QueueStatus::Paused => return Ok(()),
                other => {
                    return Err(EngineError::queue_service(format!(
                        "queue '{}' cannot be started once {other}",
                        self.id
                    )))
                }
            }
        }
        let queue = self.clone();
        let handle = tokio::spawn(async move { queue.consume(spawner).await });
        *self.consumer.lock() = Some(handle);
        Ok(())
    }

    /// Stop taking new beans. Returns the running process, if any, so the
    /// caller can pause it too.
    pub(crate) fn pause(&self) -> Option<Arc<dyn ConsumerProcess>> {
        self.paused.send_replace(true);
        let mut status = self.status.lock();
        if *status == QueueStatus::Started {
            *status = QueueStatus::Paused;
        }
        drop(status);
        self.running_process()
    }

    pub(crate) fn resume(&self) -> Option<Arc<dyn ConsumerProcess>> {
        self.paused.send_replace(false);
        let mut status = self.status.lock();
        if *status == QueueStatus::Paused {
            *status = QueueStatus::Started;
        }
        drop(status);
        self.running_process()
    }

    /// Stop consuming and terminate the running bean, waiting for its final
    /// state. With `purge` the pending beans are dropped. Returns `false` if
    /// the queue had already stopped.
    pub(crate) async fn halt(&self, purge: bool) -> bool {
        {
            let mut status = self.status.lock();
            if !status.is_active() {
                return false;
            }
            *status = QueueStatus::Stopping;
        }
        self.shutdown.send_replace(true);

        if purge {
            let purged = self.pending.lock().drain(..).count();
            if purged > 0 {
                info!(queue_id = %self.id, purged = purged, "Purged pending beans");
            }
        }

        if let Some(process) = self.running_process() {
            if let Err(e) = process.terminate().await {
                warn!(queue_id = %self.id, bean_id = %process.bean_id(), error = %e, "Failed to terminate running bean");
            }
        }
        *self.status.lock() = QueueStatus::Stopped;
        true
    }

    /// Release the consumer task of a stopped queue
    pub(crate) fn dispose(&self) {
        if let Some(handle) = self.consumer.lock().take() {
            handle.abort();
        }
        *self.status.lock() = QueueStatus::Disposed;
    }

    /// Route a control request to the running process, or apply a
    /// termination to a bean still waiting in the queue
    pub(crate) async fn request(&self, bean_id: &str, request: ControlRequest) -> EngineResult<()> {
        let running = self
            .running
            .lock()
            .as_ref()
            .filter(|r| r.bean_id == bean_id)
            .map(|r| r.process.clone());
        if let Some(process) = running {
            return process.handle_request(request).await;
        }

        if request != ControlRequest::Terminate {
            return Err(EngineError::queue_service(format!(
                "cannot {} bean '{bean_id}' on '{}': it is not running",
                request.request_type(),
                self.id
            )));
        }
        let removed = {
            let mut pending = self.pending.lock();
            pending
                .iter()
                .position(|bean| bean.unique_id() == bean_id)
                .and_then(|index| pending.remove(index))
        };
        match removed {
            Some(mut bean) => {
                bean.transition_to(Status::Terminated);
                bean.set_message("Terminated before processing started.");
                info!(queue_id = %self.id, bean_id = %bean_id, "Removed pending bean");
                self.publisher.broadcast(&bean)
            }
            None => Err(EngineError::queue_service(format!(
                "no bean '{bean_id}' on queue '{}'",
                self.id
            ))),
        }
    }

    async fn consume(self: Arc<Self>, spawner: Arc<dyn ProcessSpawner<B>>) {
        let mut shutdown = self.shutdown.subscribe();
        let mut paused = self.paused.subscribe();
        debug!(queue_id = %self.id, "Consumer started");

        loop {
            if self.is_shutting_down() {
                break;
            }
            if *paused.borrow_and_update() {
                tokio::select! {
                    _ = paused.changed() => continue,
                    _ = shutdown.wait_for(|stop| *stop) => break,
                }
            }

            let next = self.pending.lock().pop_front();
            match next {
                Some(bean) => self.process(bean, spawner.as_ref()).await,
                None => tokio::select! {
                    _ = self.available.notified() => {}
                    _ = paused.changed() => {}
                    _ = shutdown.wait_for(|stop| *stop) => break,
                },
            }
        }
        debug!(queue_id = %self.id, "Consumer stopped");
    }

    async fn process(&self, mut bean: B, spawner: &dyn ProcessSpawner<B>) {
        let bean_id = bean.unique_id().to_string();
        let process = {
            let mut running = self.running.lock();
            // Checked under the running lock so a concurrent halt either sees
            // this process or stops it being created
            if self.is_shutting_down() {
                self.pending.lock().push_front(bean);
                return;
            }
            bean.transition_to(Status::Running);
            match spawner.spawn_process(bean.clone(), self.publisher.clone()) {
                Ok(process) => {
                    *running = Some(RunningBean {
                        bean_id: bean_id.clone(),
                        process: process.clone(),
                    });
                    process
                }
                Err(e) => {
                    error!(queue_id = %self.id, bean_id = %bean_id, error = %e, "Could not create process for bean");
                    bean.transition_to(Status::Failed);
                    bean.set_message(e.to_string());
                    if let Err(e) = self.publisher.broadcast(&bean) {
                        warn!(error = %e, "Failed to broadcast bean failure");
                    }
                    return;
                }
            }
        };

        if let Err(e) = self.publisher.broadcast(&bean) {
            warn!(queue_id = %self.id, error = %e, "Failed to broadcast running bean");
        }
        if let Err(e) = process.execute().await {
            warn!(queue_id = %self.id, bean_id = %bean_id, error = %e, "Process finished with error");
        }
        *self.running.lock() = None;
    }
}
