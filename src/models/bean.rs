//! # Queueable Bean Model
//!
//! Common state carried by every unit of work that can sit in a queue.
//!
//! ## Overview
//!
//! Every bean embeds a [`BeanCore`] holding its identity, lifecycle status,
//! progress and provenance. The [`Queueable`] trait exposes that core so the
//! queue processes, the queue listener and the queue service can operate on
//! any bean type uniformly.
//!
//! Composite beans additionally implement [`HasChildQueue`] (a queue-level
//! message describing their nested queue) and [`HasAtomQueue`] (an ordered,
//! drainable sub-queue of children waiting to be spooled).
//!
//! ## Wire Format
//!
//! Beans serialize to JSON with camelCase field names (`uniqueId`,
//! `percentComplete`, `previousStatus`, ...). The core is flattened into the
//! owning bean so a serialized `MoveAtom` reads as a single object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Debug;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::state_machine::Status;

/// Identity, status and provenance shared by every queueable bean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeanCore {
    pub unique_id: String,
    pub name: String,
    pub status: Status,
    pub previous_status: Status,
    pub percent_complete: f64,
    pub message: Option<String>,
    pub beamline: Option<String>,
    pub host_name: Option<String>,
    pub user_name: Option<String>,
    pub submission_time: Option<DateTime<Utc>>,
    /// Estimated runtime in milliseconds, used to weight progress
    pub run_time: Option<u64>,
    pub run_directory: Option<String>,
}

impl BeanCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_run_time(mut self, run_time: u64) -> Self {
        self.run_time = Some(run_time);
        self
    }

    /// Copy beamline, host and user from a parent, keeping any values this
    /// bean already carries
    pub fn inherit_provenance(&mut self, parent: &BeanCore) {
        if self.beamline.is_none() {
            self.beamline = parent.beamline.clone();
        }
        if self.host_name.is_none() {
            self.host_name = parent.host_name.clone();
        }
        if self.user_name.is_none() {
            self.user_name = parent.user_name.clone();
        }
    }
}

impl Default for BeanCore {
    fn default() -> Self {
        Self {
            unique_id: Uuid::new_v4().to_string(),
            name: String::new(),
            status: Status::None,
            previous_status: Status::None,
            percent_complete: 0.0,
            message: None,
            beamline: None,
            host_name: None,
            user_name: None,
            submission_time: None,
            run_time: None,
            run_directory: None,
        }
    }
}

/// A bean that can be submitted to a queue and processed
pub trait Queueable: Debug + Clone + Send + Sync + 'static {
    fn core(&self) -> &BeanCore;
    fn core_mut(&mut self) -> &mut BeanCore;

    fn unique_id(&self) -> &str {
        &self.core().unique_id
    }

    fn name(&self) -> &str {
        &self.core().name
    }

    fn status(&self) -> Status {
        self.core().status
    }

    fn set_status(&mut self, status: Status) {
        self.core_mut().status = status;
    }

    fn previous_status(&self) -> Status {
        self.core().previous_status
    }

    fn set_previous_status(&mut self, status: Status) {
        self.core_mut().previous_status = status;
    }

    /// Move to `status`, remembering the current status as the previous one
    fn transition_to(&mut self, status: Status) {
        let core = self.core_mut();
        core.previous_status = core.status;
        core.status = status;
    }

    fn percent_complete(&self) -> f64 {
        self.core().percent_complete
    }

    fn set_percent_complete(&mut self, percent: f64) {
        self.core_mut().percent_complete = percent;
    }

    fn message(&self) -> Option<&str> {
        self.core().message.as_deref()
    }

    fn set_message(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.core_mut().message = Some(message.into());
    }

    fn run_time(&self) -> Option<u64> {
        self.core().run_time
    }
}

/// A composite bean whose children run in a nested queue
pub trait HasChildQueue: Queueable {
    fn queue_message(&self) -> Option<&str>;
    fn set_queue_message(&mut self, message: String);
}

/// A composite bean owning an ordered sub-queue of children not yet submitted
/// anywhere. The sub-queue only shrinks while the composite is processed.
pub trait HasAtomQueue: HasChildQueue {
    type Atom: Queueable;

    fn atom_queue(&self) -> &VecDeque<Self::Atom>;
    fn atom_queue_mut(&mut self) -> &mut VecDeque<Self::Atom>;

    fn atom_queue_size(&self) -> usize {
        self.atom_queue().len()
    }

    fn is_atom_present(&self, unique_id: &str) -> bool {
        self.atom_queue()
            .iter()
            .any(|atom| atom.unique_id() == unique_id)
    }

    /// Append a child. Children with a duplicate unique id are rejected. The
    /// composite's runtime estimate becomes the sum of its children's.
    fn add_atom(&mut self, atom: Self::Atom) -> EngineResult<()> {
        if self.is_atom_present(atom.unique_id()) {
            return Err(EngineError::InvalidBean(format!(
                "atom '{}' ({}) is already queued in '{}'",
                atom.name(),
                atom.unique_id(),
                self.name()
            )));
        }
        self.atom_queue_mut().push_back(atom);
        let run_time = self.calculate_run_time();
        self.core_mut().run_time = Some(run_time);
        Ok(())
    }

    fn view_next_atom(&self) -> Option<&Self::Atom> {
        self.atom_queue().front()
    }

    fn next_atom(&mut self) -> Option<Self::Atom> {
        self.atom_queue_mut().pop_front()
    }

    /// Remove and return every queued child, leaving the sub-queue empty
    fn drain_atoms(&mut self) -> Vec<Self::Atom> {
        self.atom_queue_mut().drain(..).collect()
    }

    fn calculate_run_time(&self) -> u64 {
        self.atom_queue()
            .iter()
            .filter_map(|atom| atom.run_time())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_core_has_unique_identity() {
        let a = BeanCore::new("a");
        let b = BeanCore::new("a");
        assert_ne!(a.unique_id, b.unique_id);
        assert_eq!(a.status, Status::None);
        assert_eq!(a.percent_complete, 0.0);
    }

    #[test]
    fn test_inherit_provenance_keeps_existing_values() {
        let mut parent = BeanCore::new("parent");
        parent.beamline = Some("i15-1".to_string());
        parent.host_name = Some("ws001".to_string());
        parent.user_name = Some("abc123".to_string());

        let mut child = BeanCore::new("child");
        child.user_name = Some("def456".to_string());
        child.inherit_provenance(&parent);

        assert_eq!(child.beamline.as_deref(), Some("i15-1"));
        assert_eq!(child.host_name.as_deref(), Some("ws001"));
        assert_eq!(child.user_name.as_deref(), Some("def456"));
    }

    #[test]
    fn test_core_wire_names() {
        let mut core = BeanCore::new("bean");
        core.percent_complete = 12.5;
        core.run_time = Some(300);
        let json = serde_json::to_value(&core).unwrap();
        assert_eq!(json["percentComplete"], 12.5);
        assert_eq!(json["runTime"], 300);
        assert_eq!(json["previousStatus"], "NONE");
        assert!(json.get("uniqueId").is_some());
    }
}
