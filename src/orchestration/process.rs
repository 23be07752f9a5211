//! # Queue Process Lifecycle
//!
//! Shared execution lifecycle for everything a queue consumer runs.
//!
//! ## Overview
//!
//! A process is `run()`, then waits on a one-shot completion gate, then
//! performs post-match analysis, which is the only place a bean receives its
//! final status. Termination requests and post-match analysis serialize on
//! an async analysis lock, so a terminate racing natural completion always
//! resolves to exactly one final state, and `terminate()` never returns
//! before that state has been committed.
//!
//! ## Key Types
//!
//! - [`ProcessCore`]: bean, publisher, gate and coordination flags for one
//!   process. Listeners share it through an `Arc`.
//! - [`QueueProcess`]: the process-specific hooks (`run`, `do_terminate`,
//!   `do_pause`, ...).
//! - [`ConsumerProcess`]: the object-safe lifecycle queue consumers drive.
//!   Implemented for every [`QueueProcess`].

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::gate::CompletionGate;
use crate::constants::{
    events, COMPLETION_TOLERANCE_PERCENT, FINISHED_PERCENT, QUEUE_COMPLETE_PERCENT,
};
use crate::error::{EngineError, EngineResult};
use crate::events::Publisher;
use crate::models::Queueable;
use crate::state_machine::{ControlRequest, Status};

/// Exclusive access to a process's bean, able to publish the bean while the
/// lock is held so broadcasts reach subscribers in mutation order
pub struct BeanGuard<'a, B: Queueable> {
    bean: MutexGuard<'a, B>,
    publisher: &'a dyn Publisher<B>,
}

impl<B: Queueable> BeanGuard<'_, B> {
    pub fn publish(&self) -> EngineResult<()> {
        self.publisher.broadcast(&self.bean)
    }
}

impl<B: Queueable> Deref for BeanGuard<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.bean
    }
}

impl<B: Queueable> DerefMut for BeanGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.bean
    }
}

/// State and coordination primitives shared by a process and the listeners
/// that update its bean
pub struct ProcessCore<B: Queueable> {
    bean: Mutex<B>,
    publisher: Arc<dyn Publisher<B>>,
    completion: CompletionGate,
    analysis_lock: tokio::sync::Mutex<()>,
    analysis_done: CompletionGate,
    terminated: AtomicBool,
    child_command: AtomicBool,
}

impl<B: Queueable> ProcessCore<B> {
    pub fn new(bean: B, publisher: Arc<dyn Publisher<B>>) -> Self {
        Self {
            bean: Mutex::new(bean),
            publisher,
            completion: CompletionGate::new(),
            analysis_lock: tokio::sync::Mutex::new(()),
            analysis_done: CompletionGate::new(),
            terminated: AtomicBool::new(false),
            child_command: AtomicBool::new(false),
        }
    }

    /// Snapshot of the bean
    pub fn bean(&self) -> B {
        self.bean.lock().clone()
    }

    pub fn bean_id(&self) -> String {
        self.bean.lock().unique_id().to_string()
    }

    pub fn status(&self) -> Status {
        self.bean.lock().status()
    }

    pub fn percent_complete(&self) -> f64 {
        self.bean.lock().percent_complete()
    }

    pub fn with_bean<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        f(&self.bean.lock())
    }

    /// Mutate the bean without broadcasting
    pub fn update_bean<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.bean.lock())
    }

    /// Lock the bean for a sequence of mutations and broadcasts. Must not be
    /// held across an await point.
    pub fn lock_bean(&self) -> BeanGuard<'_, B> {
        BeanGuard {
            bean: self.bean.lock(),
            publisher: self.publisher.as_ref(),
        }
    }

    /// Mutate the bean and broadcast the result
    pub fn update_and_broadcast(&self, f: impl FnOnce(&mut B)) -> EngineResult<()> {
        let mut bean = self.lock_bean();
        f(&mut bean);
        bean.publish()
    }

    /// Broadcast the bean as it currently is
    pub fn broadcast(&self) -> EngineResult<()> {
        self.lock_bean().publish()
    }

    /// Update any of status, percent-complete and message, then broadcast.
    /// Percent-complete never moves backwards while the bean is being
    /// processed.
    pub fn broadcast_progress(
        &self,
        status: Option<Status>,
        percent: Option<f64>,
        message: Option<&str>,
    ) -> EngineResult<()> {
        self.update_and_broadcast(|bean| {
            if let Some(status) = status {
                if bean.status() != status {
                    bean.transition_to(status);
                }
            }
            if let Some(percent) = percent {
                if percent > bean.percent_complete() {
                    bean.set_percent_complete(percent);
                }
            }
            if let Some(message) = message {
                bean.set_message(message);
            }
        })
    }

    /// Record a failure of the process's own work. The bean stays RUNNING with
    /// the failure message and the gate opens; post-match analysis assigns
    /// FAILED.
    pub fn report_fail(&self, failure: &EngineError) {
        let message = failure.to_string();
        let result = self.update_and_broadcast(|bean| {
            if !bean.status().is_concluded() && bean.status() != Status::Running {
                bean.transition_to(Status::Running);
            }
            bean.set_message(message.as_str());
        });
        if let Err(e) = result {
            warn!(error = %e, "Failed to broadcast failure report");
        }
        self.open_gate();
    }

    pub fn open_gate(&self) -> bool {
        self.completion.open()
    }

    pub fn is_gate_open(&self) -> bool {
        self.completion.is_open()
    }

    pub async fn wait_for_gate(&self) {
        self.completion.wait().await
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Returns `true` if this call set the flag
    pub(crate) fn mark_terminated(&self) -> bool {
        !self.terminated.swap(true, Ordering::SeqCst)
    }

    /// True when the last control request reached this process from one of
    /// its children rather than from a client
    pub fn is_child_command(&self) -> bool {
        self.child_command.load(Ordering::SeqCst)
    }

    pub(crate) fn set_child_command(&self, child_command: bool) {
        self.child_command.store(child_command, Ordering::SeqCst);
    }

    /// Termination reported by a child. The caller must hold the bean lock
    /// and have checked that the bean has not concluded, so post-match
    /// analysis sees the flag.
    pub(crate) fn terminate_from_child(&self) {
        self.set_child_command(true);
        self.mark_terminated();
        self.open_gate();
    }

    pub fn has_ended(&self) -> bool {
        self.analysis_done.is_open()
    }

    pub async fn wait_until_ended(&self) {
        self.analysis_done.wait().await
    }
}

/// Process-specific behaviour plugged into the shared lifecycle
#[async_trait]
pub trait QueueProcess: Send + Sync + 'static {
    type Bean: Queueable;

    /// Short name of the process type, for logging
    const PROCESS_TYPE: &'static str;

    fn core(&self) -> &Arc<ProcessCore<Self::Bean>>;

    /// Start the work. Must eventually cause the completion gate to open,
    /// either directly or through a listener.
    async fn run(&self) -> EngineResult<()>;

    /// Stop any work in progress. Called under the analysis lock.
    async fn do_terminate(&self) -> EngineResult<()> {
        Ok(())
    }

    async fn do_pause(&self) -> EngineResult<()> {
        Ok(())
    }

    async fn do_resume(&self) -> EngineResult<()> {
        Ok(())
    }

    /// Called by post-match analysis after the bean is marked FAILED
    async fn on_failed(&self) -> EngineResult<()> {
        Ok(())
    }

    /// Release nested infrastructure (subscriptions, active queues)
    async fn tidy(&self) -> EngineResult<()> {
        Ok(())
    }

    fn aborted_message(&self) -> String;

    fn completed_message(&self) -> String;

    /// Message for a failed bean. `None` keeps the message already on the
    /// bean, which normally describes the failure.
    fn failed_message(&self) -> Option<String> {
        None
    }
}

/// Object-safe lifecycle a queue consumer drives. Requests arriving through
/// these methods come from clients; child-originated requests are applied by
/// the parent's queue listener.
#[async_trait]
pub trait ConsumerProcess: Send + Sync {
    fn bean_id(&self) -> String;

    fn status(&self) -> Status;

    fn is_terminated(&self) -> bool;

    /// Run the process to its final state
    async fn execute(&self) -> EngineResult<()>;

    /// Request termination and wait until the final state is committed
    async fn terminate(&self) -> EngineResult<()>;

    async fn pause(&self) -> EngineResult<()>;

    async fn resume(&self) -> EngineResult<()>;

    async fn handle_request(&self, request: ControlRequest) -> EngineResult<()> {
        match request {
            ControlRequest::Pause => self.pause().await,
            ControlRequest::Resume => self.resume().await,
            ControlRequest::Terminate => self.terminate().await,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Terminated,
    Completed,
    Failed,
}

/// Assign the final status. Runs once per process, under the analysis lock;
/// the final broadcast happens after the lock is released.
async fn post_match_analysis<P: QueueProcess>(process: &P) -> EngineResult<()> {
    let core = process.core();
    let guard = core.analysis_lock.lock().await;
    if core.has_ended() {
        return Ok(());
    }

    let outcome = core.update_bean(|bean| {
        if core.is_terminated() {
            bean.transition_to(Status::Terminated);
            bean.set_message(process.aborted_message());
            Outcome::Terminated
        } else if bean.percent_complete() >= COMPLETION_TOLERANCE_PERCENT {
            bean.transition_to(Status::Complete);
            bean.set_percent_complete(FINISHED_PERCENT);
            bean.set_message(process.completed_message());
            Outcome::Completed
        } else {
            bean.transition_to(Status::Failed);
            if let Some(message) = process.failed_message() {
                bean.set_message(message);
            }
            Outcome::Failed
        }
    });

    if outcome == Outcome::Failed {
        if let Err(e) = process.on_failed().await {
            warn!(bean_id = %core.bean_id(), error = %e, "Failure follow-up did not complete");
        }
    }
    let tidied = process.tidy().await;

    core.analysis_done.open();
    drop(guard);

    let bean = core.bean();
    match outcome {
        Outcome::Completed => info!(
            event = events::PROCESS_COMPLETED,
            process = P::PROCESS_TYPE,
            bean_id = %bean.unique_id(),
            name = %bean.name(),
            "✅ PROCESS: Completed"
        ),
        Outcome::Failed => warn!(
            event = events::PROCESS_FAILED,
            process = P::PROCESS_TYPE,
            bean_id = %bean.unique_id(),
            name = %bean.name(),
            percent_complete = bean.percent_complete(),
            message = bean.message().unwrap_or_default(),
            "❌ PROCESS: Failed"
        ),
        Outcome::Terminated => info!(
            event = events::PROCESS_TERMINATED,
            process = P::PROCESS_TYPE,
            bean_id = %bean.unique_id(),
            name = %bean.name(),
            child_command = core.is_child_command(),
            "🛑 PROCESS: Terminated"
        ),
    }

    core.broadcast()?;
    tidied
}

#[async_trait]
impl<P: QueueProcess> ConsumerProcess for P {
    fn bean_id(&self) -> String {
        self.core().bean_id()
    }

    fn status(&self) -> Status {
        self.core().status()
    }

    fn is_terminated(&self) -> bool {
        self.core().is_terminated()
    }

    #[instrument(skip(self), fields(process = P::PROCESS_TYPE, bean_id = %self.core().bean_id()))]
    async fn execute(&self) -> EngineResult<()> {
        let core = self.core();
        info!(event = events::PROCESS_STARTED, "🚀 PROCESS: Executing");

        if core.is_terminated() {
            debug!("Terminated before starting, skipping run");
        } else if let Err(e) = self.run().await {
            error!(error = %e, "Process run failed");
            core.report_fail(&e);
        }

        core.wait_for_gate().await;
        post_match_analysis(self).await
    }

    #[instrument(skip(self), fields(process = P::PROCESS_TYPE, bean_id = %self.core().bean_id()))]
    async fn terminate(&self) -> EngineResult<()> {
        let core = self.core();
        {
            let _guard = core.analysis_lock.lock().await;
            if core.has_ended() {
                debug!("Terminate requested after analysis finished, nothing to do");
                return Ok(());
            }
            if core.mark_terminated() {
                core.set_child_command(false);
                info!("Termination requested");
                if let Err(e) = self.do_terminate().await {
                    warn!(error = %e, "Termination hook failed");
                }
                core.open_gate();
            }
        }
        core.wait_until_ended().await;
        Ok(())
    }

    #[instrument(skip(self), fields(process = P::PROCESS_TYPE, bean_id = %self.core().bean_id()))]
    async fn pause(&self) -> EngineResult<()> {
        let core = self.core();
        let original = {
            let mut bean = core.lock_bean();
            let status = bean.status();
            if status.is_final() || status.is_paused() || core.is_terminated() {
                debug!(status = %status, "Pause not applicable");
                return Ok(());
            }
            if status != Status::RequestPause {
                bean.transition_to(Status::RequestPause);
            }
            core.set_child_command(false);
            status
        };

        if let Err(e) = self.do_pause().await {
            core.update_bean(|bean| {
                if bean.status() == Status::RequestPause {
                    bean.set_status(original);
                }
            });
            return Err(e);
        }

        core.update_and_broadcast(|bean| {
            if !bean.status().is_final() {
                bean.set_previous_status(Status::RequestPause);
                bean.set_status(Status::Paused);
            }
        })
    }

    #[instrument(skip(self), fields(process = P::PROCESS_TYPE, bean_id = %self.core().bean_id()))]
    async fn resume(&self) -> EngineResult<()> {
        let core = self.core();
        let original = {
            let mut bean = core.lock_bean();
            let status = bean.status();
            if !(status.is_paused() || status == Status::RequestResume) || core.is_terminated() {
                debug!(status = %status, "Resume not applicable");
                return Ok(());
            }
            if status != Status::RequestResume {
                bean.transition_to(Status::RequestResume);
            }
            core.set_child_command(false);
            status
        };

        if let Err(e) = self.do_resume().await {
            core.update_bean(|bean| {
                if bean.status() == Status::RequestResume {
                    bean.set_status(original);
                }
            });
            return Err(e);
        }

        core.update_and_broadcast(|bean| {
            if !bean.status().is_final() {
                bean.set_previous_status(Status::RequestResume);
                bean.set_status(Status::Resumed);
            }
        })
    }
}

/// Percent-complete a leaf process reports once its own work is done
pub(crate) fn work_done<B: Queueable>(core: &ProcessCore<B>) -> EngineResult<()> {
    core.broadcast_progress(None, Some(QUEUE_COMPLETE_PERCENT), None)
}
