//! # Queue Listener
//!
//! Folds the status events of a parent's children into the parent bean.
//!
//! ## Overview
//!
//! Each child gets a [`ProcessStatus`] record, created before any child is
//! submitted, with a work fraction derived from the children's runtime
//! estimates. Every event from the child topic is applied to the parent
//! under the parent's bean lock:
//!
//! 1. The first child progress fixes a baseline at the parent's current
//!    percent-complete. From then on a child moving from `old` to `new`
//!    percent adds `(99.5 - baseline) * fraction / 100 * (new - old)` to the
//!    parent, never beyond 99.5.
//! 2. The parent message mirrors the child's as `'<child>': <message>`.
//! 3. Child status changes become parent status requests (pause, resume,
//!    terminate) flagged as child-originated, or queue messages.
//! 4. Once every child has concluded, or as soon as one fails or is
//!    terminated, the parent's completion gate is released.
//!
//! Events that arrive after release, or once the parent has concluded, are
//! ignored.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::process::{BeanGuard, ProcessCore};
use super::process_status::{work_fractions, ProcessStatus};
use crate::constants::{messages, QUEUE_COMPLETE_PERCENT};
use crate::error::EngineResult;
use crate::events::{BeanEvent, BeanListener};
use crate::models::{HasChildQueue, Queueable};
use crate::state_machine::Status;

#[derive(Debug, Default)]
struct ListenerState {
    baseline: Option<f64>,
    released: bool,
}

#[derive(Debug, Default)]
struct ChildUpdate {
    concluded: bool,
    failed: bool,
    terminated: bool,
}

/// Aggregates child events of type `C` into a parent bean of type `B`
pub struct QueueListener<B: HasChildQueue, C: Queueable> {
    parent: Arc<ProcessCore<B>>,
    children: DashMap<String, ProcessStatus>,
    state: Mutex<ListenerState>,
    _child: PhantomData<fn(C)>,
}

impl<B: HasChildQueue, C: Queueable> QueueListener<B, C> {
    pub fn new(parent: Arc<ProcessCore<B>>, children: &[C]) -> Self {
        let run_times: Vec<Option<u64>> = children.iter().map(|c| c.run_time()).collect();
        let records = children
            .iter()
            .zip(work_fractions(&run_times))
            .map(|(child, fraction)| {
                (
                    child.unique_id().to_string(),
                    ProcessStatus::new(child, fraction),
                )
            })
            .collect();

        Self {
            parent,
            children: records,
            state: Mutex::new(ListenerState::default()),
            _child: PhantomData,
        }
    }

    pub fn child_status(&self, unique_id: &str) -> Option<ProcessStatus> {
        self.children.get(unique_id).map(|entry| entry.value().clone())
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// True once this listener has released the parent's completion gate
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Stop applying events. Used when the parent finishes without any
    /// children to wait for.
    pub fn release(&self) {
        self.state.lock().released = true;
    }

    fn apply(
        &self,
        state: &mut ListenerState,
        record: &mut ProcessStatus,
        parent: &mut BeanGuard<'_, B>,
        child: &C,
    ) -> EngineResult<ChildUpdate> {
        let mut update = ChildUpdate::default();
        let mut changed = false;

        let new_percent = child.percent_complete();
        if new_percent > record.percent_complete {
            let baseline = *state.baseline.get_or_insert(parent.percent_complete());
            let contribution = (QUEUE_COMPLETE_PERCENT - baseline) * record.work_fraction;
            let delta = contribution / 100.0 * (new_percent - record.percent_complete);
            let updated = (parent.percent_complete() + delta).min(QUEUE_COMPLETE_PERCENT);
            if updated > parent.percent_complete() {
                parent.set_percent_complete(updated);
            }
            record.percent_complete = new_percent;
            changed = true;
        }

        if let Some(message) = child.message() {
            let message = format!("'{}': {}", child.name(), message);
            if parent.message() != Some(message.as_str()) {
                parent.set_message(message);
                changed = true;
            }
        }

        let new_status = child.status();
        if new_status == record.status {
            if changed {
                parent.publish()?;
            }
            return Ok(update);
        }
        record.status = new_status;
        let parent_terminated = self.parent.is_terminated();

        match new_status {
            Status::Running | Status::Resumed => {
                record.operating = true;
                if parent.status().is_paused() && !parent_terminated {
                    self.parent.set_child_command(true);
                    parent.transition_to(Status::RequestResume);
                    parent.publish()?;
                    parent.set_previous_status(Status::RequestResume);
                    parent.set_status(Status::Resumed);
                } else {
                    self.parent.set_child_command(false);
                    parent.set_queue_message(messages::QUEUE_RUNNING.to_string());
                }
            }
            Status::Paused => {
                if parent.status().is_running() && !parent_terminated {
                    self.parent.set_child_command(true);
                    parent.transition_to(Status::RequestPause);
                    parent.publish()?;
                    parent.set_previous_status(Status::RequestPause);
                    parent.set_status(Status::Paused);
                }
            }
            Status::Terminated => {
                record.operating = false;
                update.concluded = true;
                update.terminated = true;
                if !parent_terminated {
                    parent.transition_to(Status::RequestTerminate);
                    self.parent.terminate_from_child();
                }
            }
            Status::Complete => {
                record.operating = false;
                update.concluded = true;
                parent.set_queue_message(format!("'{}' completed successfully.", child.name()));
            }
            Status::Failed => {
                record.operating = false;
                update.concluded = true;
                update.failed = true;
                self.parent.set_child_command(true);
                parent.set_queue_message(format!("Failure caused by '{}'", child.name()));
            }
            _ => {}
        }

        parent.publish()?;
        Ok(update)
    }

    fn all_concluded(&self) -> bool {
        self.children
            .iter()
            .all(|entry| entry.is_concluded() && !entry.operating)
    }
}

impl<B: HasChildQueue, C: Queueable> BeanListener<C> for QueueListener<B, C> {
    fn bean_change_performed(&self, event: &BeanEvent<C>) {
        let child = &event.bean;
        let mut state = self.state.lock();
        if state.released {
            trace!(child_id = %child.unique_id(), "Listener released, ignoring event");
            return;
        }

        let update = {
            let Some(mut record) = self.children.get_mut(child.unique_id()) else {
                trace!(child_id = %child.unique_id(), "Event for unknown child");
                return;
            };
            let mut parent = self.parent.lock_bean();
            if parent.status().is_concluded() {
                return;
            }
            match self.apply(&mut state, &mut record, &mut parent, child) {
                Ok(update) => update,
                Err(e) => {
                    warn!(child_id = %child.unique_id(), error = %e, "Failed to broadcast parent update");
                    return;
                }
            }
        };

        if !update.concluded {
            return;
        }
        let all_done = self.all_concluded();
        if !(all_done || update.failed || update.terminated) {
            return;
        }

        state.released = true;
        if all_done && !update.failed && !update.terminated {
            let finished = self.parent.update_and_broadcast(|parent| {
                if !parent.status().is_concluded() {
                    parent.set_message(messages::RUNNING_FINISHED);
                    parent.set_queue_message(messages::ALL_CHILDREN_COMPLETE.to_string());
                }
            });
            if let Err(e) = finished {
                warn!(error = %e, "Failed to broadcast completion of child processes");
            }
        }
        debug!(
            parent_id = %self.parent.bean_id(),
            all_done = all_done,
            failed = update.failed,
            terminated = update.terminated,
            "Releasing parent completion gate"
        );
        self.parent.open_gate();
    }
}
