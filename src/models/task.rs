use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::atoms::SubTaskAtom;
use super::bean::{BeanCore, HasAtomQueue};
use crate::error::EngineResult;

/// Top-level job submitted to the job queue. Its children are sub-tasks,
/// each of which runs its own active queue of atoms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBean {
    #[serde(flatten)]
    pub core: BeanCore,
    #[serde(default)]
    pub queue_message: Option<String>,
    #[serde(default)]
    pub atom_queue: VecDeque<SubTaskAtom>,
}

impl TaskBean {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: BeanCore::new(name),
            queue_message: None,
            atom_queue: VecDeque::new(),
        }
    }

    pub fn with_sub_tasks(
        name: impl Into<String>,
        sub_tasks: impl IntoIterator<Item = SubTaskAtom>,
    ) -> EngineResult<Self> {
        let mut task = Self::new(name);
        for sub_task in sub_tasks {
            task.add_atom(sub_task)?;
        }
        Ok(task)
    }

    pub fn with_provenance(
        mut self,
        beamline: impl Into<String>,
        host_name: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        self.core.beamline = Some(beamline.into());
        self.core.host_name = Some(host_name.into());
        self.core.user_name = Some(user_name.into());
        self
    }
}

impl_queueable!(TaskBean);
impl_child_queue!(TaskBean);

impl HasAtomQueue for TaskBean {
    type Atom = SubTaskAtom;

    fn atom_queue(&self) -> &VecDeque<SubTaskAtom> {
        &self.atom_queue
    }

    fn atom_queue_mut(&mut self) -> &mut VecDeque<SubTaskAtom> {
        &mut self.atom_queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MoveAtom, Queueable};

    #[test]
    fn test_task_run_time_tracks_sub_tasks() {
        let first = SubTaskAtom::with_atoms(
            "first",
            vec![MoveAtom::single("a", "x", 1.0).with_run_time(40).into()],
        )
        .unwrap();
        let second = SubTaskAtom::with_atoms(
            "second",
            vec![MoveAtom::single("b", "y", 1.0).with_run_time(60).into()],
        )
        .unwrap();
        let task = TaskBean::with_sub_tasks("job", vec![first, second]).unwrap();
        assert_eq!(task.run_time(), Some(100));
        assert_eq!(task.atom_queue_size(), 2);
    }

    #[test]
    fn test_task_wire_format() {
        let task = TaskBean::new("job").with_provenance("i15-1", "ws001", "abc123");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["beamline"], "i15-1");
        assert_eq!(json["hostName"], "ws001");
        assert_eq!(json["userName"], "abc123");
        assert!(json["atomQueue"].as_array().unwrap().is_empty());
    }
}
