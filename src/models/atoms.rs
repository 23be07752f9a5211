//! # Queue Atoms
//!
//! The units of work that can sit in an active queue. Leaf atoms drive a
//! single collaborator (a positioner, a monitor, the scanning service);
//! [`SubTaskAtom`] is a composite whose children are themselves atoms.
//!
//! [`QueueAtom`] is the closed set of atom variants an active queue accepts.
//! It serializes with an `@type` discriminator so mixed queues round-trip
//! through the event transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};

use super::bean::{BeanCore, HasAtomQueue, Queueable};
use crate::error::EngineResult;

/// Target positions keyed by device name
pub type Position = BTreeMap<String, f64>;

/// Move one or more devices to a configured position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveAtom {
    #[serde(flatten)]
    pub core: BeanCore,
    #[serde(default)]
    pub position_config: Position,
}

impl MoveAtom {
    pub fn new(name: impl Into<String>, position_config: Position) -> Self {
        Self {
            core: BeanCore::new(name),
            position_config,
        }
    }

    /// Convenience constructor for a single-device move
    pub fn single(name: impl Into<String>, device: impl Into<String>, target: f64) -> Self {
        let mut position_config = Position::new();
        position_config.insert(device.into(), target);
        Self::new(name, position_config)
    }

    pub fn with_run_time(mut self, run_time: u64) -> Self {
        self.core.run_time = Some(run_time);
        self
    }
}

/// Record the current value of a monitor to a data file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorAtom {
    #[serde(flatten)]
    pub core: BeanCore,
    pub monitor: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub dataset: Option<String>,
}

impl MonitorAtom {
    pub fn new(name: impl Into<String>, monitor: impl Into<String>) -> Self {
        Self {
            core: BeanCore::new(name),
            monitor: monitor.into(),
            file_path: None,
            dataset: None,
        }
    }

    pub fn with_run_time(mut self, run_time: u64) -> Self {
        self.core.run_time = Some(run_time);
        self
    }
}

/// Run a scan on the scanning service and track it to completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanAtom {
    #[serde(flatten)]
    pub core: BeanCore,
    #[serde(default)]
    pub queue_message: Option<String>,
    /// Opaque point-generation models, passed through to the scan request
    #[serde(default)]
    pub path_models: Vec<Value>,
    #[serde(default)]
    pub detector_models: BTreeMap<String, Value>,
    #[serde(default)]
    pub monitors: Vec<String>,
    #[serde(default)]
    pub scan_broker_uri: Option<String>,
    #[serde(default)]
    pub scan_status_topic: Option<String>,
    #[serde(default)]
    pub scan_submit_queue: Option<String>,
}

impl ScanAtom {
    pub fn new(name: impl Into<String>, path_models: Vec<Value>) -> Self {
        Self {
            core: BeanCore::new(name),
            queue_message: None,
            path_models,
            detector_models: BTreeMap::new(),
            monitors: Vec::new(),
            scan_broker_uri: None,
            scan_status_topic: None,
            scan_submit_queue: None,
        }
    }

    pub fn with_detector(mut self, name: impl Into<String>, model: Value) -> Self {
        self.detector_models.insert(name.into(), model);
        self
    }

    pub fn with_monitor(mut self, monitor: impl Into<String>) -> Self {
        self.monitors.push(monitor.into());
        self
    }

    pub fn with_run_time(mut self, run_time: u64) -> Self {
        self.core.run_time = Some(run_time);
        self
    }
}

/// A composite atom whose children run in their own active queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTaskAtom {
    #[serde(flatten)]
    pub core: BeanCore,
    #[serde(default)]
    pub queue_message: Option<String>,
    #[serde(default)]
    pub atom_queue: VecDeque<QueueAtom>,
}

impl SubTaskAtom {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: BeanCore::new(name),
            queue_message: None,
            atom_queue: VecDeque::new(),
        }
    }

    /// Build a sub-task from children, rejecting duplicate unique ids
    pub fn with_atoms(
        name: impl Into<String>,
        atoms: impl IntoIterator<Item = QueueAtom>,
    ) -> EngineResult<Self> {
        let mut sub_task = Self::new(name);
        for atom in atoms {
            sub_task.add_atom(atom)?;
        }
        Ok(sub_task)
    }
}

/// Any atom an active queue can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum QueueAtom {
    Move(MoveAtom),
    Monitor(MonitorAtom),
    Scan(ScanAtom),
    SubTask(SubTaskAtom),
}

impl QueueAtom {
    /// Name of the atom variant, for logging
    pub fn atom_type(&self) -> &'static str {
        match self {
            Self::Move(_) => "move",
            Self::Monitor(_) => "monitor",
            Self::Scan(_) => "scan",
            Self::SubTask(_) => "sub_task",
        }
    }
}

impl Queueable for QueueAtom {
    fn core(&self) -> &BeanCore {
        match self {
            Self::Move(atom) => &atom.core,
            Self::Monitor(atom) => &atom.core,
            Self::Scan(atom) => &atom.core,
            Self::SubTask(atom) => &atom.core,
        }
    }

    fn core_mut(&mut self) -> &mut BeanCore {
        match self {
            Self::Move(atom) => &mut atom.core,
            Self::Monitor(atom) => &mut atom.core,
            Self::Scan(atom) => &mut atom.core,
            Self::SubTask(atom) => &mut atom.core,
        }
    }
}

impl From<MoveAtom> for QueueAtom {
    fn from(atom: MoveAtom) -> Self {
        Self::Move(atom)
    }
}

impl From<MonitorAtom> for QueueAtom {
    fn from(atom: MonitorAtom) -> Self {
        Self::Monitor(atom)
    }
}

impl From<ScanAtom> for QueueAtom {
    fn from(atom: ScanAtom) -> Self {
        Self::Scan(atom)
    }
}

impl From<SubTaskAtom> for QueueAtom {
    fn from(atom: SubTaskAtom) -> Self {
        Self::SubTask(atom)
    }
}

impl_queueable!(MoveAtom, MonitorAtom, ScanAtom, SubTaskAtom);
impl_child_queue!(ScanAtom, SubTaskAtom);

impl HasAtomQueue for SubTaskAtom {
    type Atom = QueueAtom;

    fn atom_queue(&self) -> &VecDeque<QueueAtom> {
        &self.atom_queue
    }

    fn atom_queue_mut(&mut self) -> &mut VecDeque<QueueAtom> {
        &mut self.atom_queue
    }
}
