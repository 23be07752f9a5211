//! # Atom Queue Processor
//!
//! Spools a composite bean's children into a freshly registered active
//! queue and tracks them through a [`QueueListener`] until they conclude.
//! Owned by exactly one composite process; only that process starts, stops
//! and deregisters the queue it registers.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::process::ProcessCore;
use super::queue_listener::QueueListener;
use crate::constants::{events, messages, progress, QUEUE_COMPLETE_PERCENT};
use crate::error::EngineResult;
use crate::events::Subscription;
use crate::models::{HasAtomQueue, QueueAtom, Queueable};
use crate::services::{QueueController, QueueService};
use crate::state_machine::Status;

/// Held from registration until tidy-up. The subscription is absent until
/// the listener side has been set up.
struct ActiveQueue {
    queue_id: String,
    subscription: Option<Arc<dyn Subscription<QueueAtom>>>,
}

pub struct AtomQueueProcessor<B: HasAtomQueue> {
    core: Arc<ProcessCore<B>>,
    queue_service: Arc<dyn QueueService>,
    controller: Arc<dyn QueueController>,
    active: Mutex<Option<ActiveQueue>>,
    listener: Mutex<Option<Arc<QueueListener<B, QueueAtom>>>>,
}

impl<B> AtomQueueProcessor<B>
where
    B: HasAtomQueue,
    B::Atom: Into<QueueAtom>,
{
    pub fn new(
        core: Arc<ProcessCore<B>>,
        queue_service: Arc<dyn QueueService>,
        controller: Arc<dyn QueueController>,
    ) -> Self {
        Self {
            core,
            queue_service,
            controller,
            active: Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    /// Identifier of the active queue this processor registered, while it is
    /// still held
    pub fn active_queue_id(&self) -> Option<String> {
        self.active.lock().as_ref().map(|queue| queue.queue_id.clone())
    }

    pub fn listener(&self) -> Option<Arc<QueueListener<B, QueueAtom>>> {
        self.listener.lock().clone()
    }

    /// Register an active queue, attach a listener, drain the parent's
    /// sub-queue into it, start it and wait for the children to conclude
    #[instrument(skip(self), fields(bean_id = %self.core.bean_id()))]
    pub async fn run(&self) -> EngineResult<()> {
        self.core.broadcast_progress(
            Some(Status::Running),
            Some(progress::REGISTERING_QUEUE),
            Some(messages::REGISTERING_QUEUE),
        )?;
        let queue_id = self.queue_service.register_new_active_queue().await?;
        info!(event = events::QUEUE_REGISTERED, queue_id = %queue_id, "📥 QUEUE: Registered active queue for children");
        *self.active.lock() = Some(ActiveQueue {
            queue_id: queue_id.clone(),
            subscription: None,
        });

        let atoms: Vec<QueueAtom> = self.core.update_bean(|bean| {
            let parent = bean.core().clone();
            bean.drain_atoms()
                .into_iter()
                .map(|atom| {
                    let mut atom: QueueAtom = atom.into();
                    atom.core_mut().inherit_provenance(&parent);
                    atom
                })
                .collect()
        });

        // The listener must be attached before the first submission so no
        // child event can be missed
        let listener = Arc::new(QueueListener::new(self.core.clone(), &atoms));
        let subscription = self.controller.create_subscriber(&queue_id)?;
        if let Some(active) = self.active.lock().as_mut() {
            active.subscription = Some(subscription.clone());
        }
        subscription.add_listener(listener.clone())?;
        *self.listener.lock() = Some(listener.clone());

        self.core.broadcast_progress(
            None,
            Some(progress::SUBMITTING_ATOMS),
            Some(messages::SUBMITTING_ATOMS),
        )?;
        let child_count = atoms.len();
        for atom in atoms {
            debug!(queue_id = %queue_id, atom_id = %atom.unique_id(), atom_type = atom.atom_type(), "Submitting atom");
            self.controller.submit(atom, &queue_id).await?;
        }

        self.core.broadcast_progress(
            None,
            Some(progress::QUEUE_STARTED),
            Some(messages::STARTING_QUEUE),
        )?;
        self.queue_service.start_active_queue(&queue_id).await?;

        if child_count == 0 {
            listener.release();
            self.core.update_and_broadcast(|bean| {
                bean.set_percent_complete(QUEUE_COMPLETE_PERCENT);
                bean.set_message(messages::NO_CHILDREN);
                bean.set_queue_message(messages::ALL_CHILDREN_COMPLETE.to_string());
            })?;
            self.core.open_gate();
        }

        self.core.wait_for_gate().await;
        Ok(())
    }

    /// Stop the active queue without purging it. The running child is
    /// terminated by the queue service.
    pub async fn terminate(&self) -> EngineResult<()> {
        let Some(queue_id) = self.active_queue_id() else {
            debug!("No active queue to stop");
            return Ok(());
        };
        self.queue_service.stop_active_queue(&queue_id, false).await
    }

    /// Stop the active queue consuming further children
    pub async fn pause(&self) -> EngineResult<()> {
        match self.active_queue_id() {
            Some(queue_id) => self.controller.pause_queue(&queue_id).await,
            None => Ok(()),
        }
    }

    pub async fn resume(&self) -> EngineResult<()> {
        match self.active_queue_id() {
            Some(queue_id) => self.controller.resume_queue(&queue_id).await,
            None => Ok(()),
        }
    }

    /// Disconnect the listener, stop the queue if it is still active and
    /// deregister it. Runs at most once, and every step runs even when an
    /// earlier one fails. A queue service that has already stopped is not an
    /// error here; any other failure is returned.
    pub async fn tidy_queue(&self) -> EngineResult<()> {
        let Some(active) = self.active.lock().take() else {
            return Ok(());
        };

        let disconnected = match &active.subscription {
            Some(subscription) => subscription.disconnect(),
            None => Ok(()),
        };
        let deregistered = self.stop_and_deregister(&active.queue_id).await;

        tolerate_stopped(&active.queue_id, deregistered)?;
        tolerate_stopped(&active.queue_id, disconnected)
    }

    async fn stop_and_deregister(&self, queue_id: &str) -> EngineResult<()> {
        if self.queue_service.get_queue_status(queue_id).await?.is_active() {
            self.queue_service.stop_active_queue(queue_id, false).await?;
        }
        self.queue_service.deregister_active_queue(queue_id).await?;
        info!(event = events::QUEUE_DEREGISTERED, queue_id = %queue_id, "📤 QUEUE: Active queue tidied");
        Ok(())
    }
}

fn tolerate_stopped(queue_id: &str, result: EngineResult<()>) -> EngineResult<()> {
    match result {
        Err(e) if e.is_stopped() => {
            warn!(queue_id = %queue_id, "Queue service stopped before active queue was tidied");
            Ok(())
        }
        Err(e) => {
            warn!(queue_id = %queue_id, error = %e, "Failed to tidy active queue");
            Err(e)
        }
        ok => ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::EngineError;
    use crate::events::{BeanListener, Publisher, TopicPublisher};
    use crate::models::{MoveAtom, SubTaskAtom, TaskBean};
    use crate::queue::InMemoryQueueService;
    use crate::state_machine::ControlRequest;
    use async_trait::async_trait;

    /// Subscription that connects normally but cannot be disconnected
    struct StuckSubscription(Arc<dyn Subscription<QueueAtom>>);

    impl Subscription<QueueAtom> for StuckSubscription {
        fn add_listener(&self, listener: Arc<dyn BeanListener<QueueAtom>>) -> EngineResult<()> {
            self.0.add_listener(listener)
        }

        fn disconnect(&self) -> EngineResult<()> {
            self.0.disconnect()?;
            Err(EngineError::Transport("broker connection lost".to_string()))
        }

        fn is_connected(&self) -> bool {
            self.0.is_connected()
        }
    }

    #[derive(Clone, Copy)]
    enum Fault {
        Healthy,
        NoSubscriber,
        StuckDisconnect,
    }

    /// Delegates to the in-memory service except for status subscriptions
    struct FaultyController {
        service: Arc<InMemoryQueueService>,
        fault: Fault,
    }

    #[async_trait]
    impl QueueController for FaultyController {
        async fn submit(&self, atom: QueueAtom, queue_id: &str) -> EngineResult<()> {
            self.service.submit(atom, queue_id).await
        }

        async fn submit_task(&self, task: TaskBean) -> EngineResult<()> {
            self.service.submit_task(task).await
        }

        fn create_subscriber(
            &self,
            queue_id: &str,
        ) -> EngineResult<Arc<dyn Subscription<QueueAtom>>> {
            match self.fault {
                Fault::Healthy => self.service.create_subscriber(queue_id),
                Fault::NoSubscriber => Err(EngineError::Transport(format!(
                    "cannot subscribe to '{queue_id}'"
                ))),
                Fault::StuckDisconnect => Ok(Arc::new(StuckSubscription(
                    self.service.create_subscriber(queue_id)?,
                ))),
            }
        }

        fn create_task_subscriber(&self) -> EngineResult<Arc<dyn Subscription<TaskBean>>> {
            self.service.create_task_subscriber()
        }

        async fn pause_queue(&self, queue_id: &str) -> EngineResult<()> {
            self.service.pause_queue(queue_id).await
        }

        async fn resume_queue(&self, queue_id: &str) -> EngineResult<()> {
            self.service.resume_queue(queue_id).await
        }

        async fn request(
            &self,
            queue_id: &str,
            bean_id: &str,
            request: ControlRequest,
        ) -> EngineResult<()> {
            self.service.request(queue_id, bean_id, request).await
        }
    }

    fn processor(
        bean: SubTaskAtom,
        fault: Fault,
    ) -> (AtomQueueProcessor<SubTaskAtom>, Arc<InMemoryQueueService>) {
        let service = Arc::new(InMemoryQueueService::new(Arc::new(EngineConfig::default())));
        let publisher: Arc<dyn Publisher<SubTaskAtom>> =
            Arc::new(TopicPublisher::new("parent", 16));
        let processor = AtomQueueProcessor::new(
            Arc::new(ProcessCore::new(bean, publisher)),
            service.clone(),
            Arc::new(FaultyController {
                service: service.clone(),
                fault,
            }),
        );
        (processor, service)
    }

    fn assert_single_queue_tidied(service: &InMemoryQueueService) {
        assert!(service.active_queue_ids().is_empty());
        let records: Vec<_> = service
            .queue_records()
            .into_iter()
            .filter(|record| record.queue_id != service.job_queue_id())
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stops, vec![false]);
        assert!(records[0].deregistered);
    }

    #[tokio::test]
    async fn test_failed_subscription_still_deregisters_queue() {
        let mut bean = SubTaskAtom::new("moves");
        bean.add_atom(MoveAtom::single("x to 1", "x", 1.0).into())
            .unwrap();
        let (processor, service) = processor(bean, Fault::NoSubscriber);

        let err = processor.run().await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
        assert!(processor.active_queue_id().is_some());

        processor.tidy_queue().await.unwrap();
        assert!(processor.active_queue_id().is_none());
        assert_single_queue_tidied(&service);
    }

    #[tokio::test]
    async fn test_disconnect_failure_is_returned_after_queue_is_tidied() {
        let (processor, service) = processor(SubTaskAtom::new("empty"), Fault::StuckDisconnect);
        processor.run().await.unwrap();

        let err = processor.tidy_queue().await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
        assert_single_queue_tidied(&service);

        // Runs once
        processor.tidy_queue().await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_service_is_tolerated_during_tidy() {
        let (processor, service) = processor(SubTaskAtom::new("empty"), Fault::Healthy);
        processor.run().await.unwrap();
        service.stop().await;

        processor.tidy_queue().await.unwrap();
        assert!(processor.active_queue_id().is_none());
    }
}
