//! Concrete queue processes, one per bean type. Leaf processes drive a
//! single collaborator; composite processes spool their children into a
//! nested active queue through an
//! [`AtomQueueProcessor`](super::AtomQueueProcessor).

pub mod monitor_atom;
pub mod move_atom;
pub mod scan_atom;
pub mod sub_task;
pub mod task_bean;

pub use monitor_atom::MonitorAtomProcess;
pub use move_atom::MoveAtomProcess;
pub use scan_atom::ScanAtomProcess;
pub use sub_task::SubTaskAtomProcess;
pub use task_bean::TaskBeanProcess;
