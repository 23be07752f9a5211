//! # Queue Processing Engine
//!
//! Executes beans taken from the job queue and from active queues, and
//! aggregates child status into parent beans.
//!
//! ## Architecture
//!
//! Every bean is handled by a process built on the shared lifecycle in
//! [`process`]:
//!
//! - **Leaf processes** (`MoveAtomProcess`, `MonitorAtomProcess`) drive a
//!   single collaborator and open their completion gate themselves
//! - **Scan processes** (`ScanAtomProcess`) submit to the scanning service
//!   and follow the scan with a [`QueueListener`]
//! - **Composite processes** (`SubTaskAtomProcess`, `TaskBeanProcess`)
//!   spool their children into a nested active queue through an
//!   [`AtomQueueProcessor`] and follow them with a [`QueueListener`]
//!
//! Post-match analysis is the only place a bean receives its final status.
//! Composite processes tidy their nested queue during analysis, so a bean is
//! never reported final while its active queue is still registered.
//!
//! ## Core Components
//!
//! - **ProcessCore**: bean, publisher, completion gate and request flags
//! - **QueueProcess / ConsumerProcess**: per-type hooks and the object-safe
//!   lifecycle queue consumers drive
//! - **QueueListener**: weighted child progress and child-originated requests
//! - **ProcessFactory**: bean variant to process mapping

pub mod atom_queue_processor;
pub mod factory;
pub mod gate;
pub mod process;
pub mod process_status;
pub mod processes;
pub mod queue_listener;

pub use atom_queue_processor::AtomQueueProcessor;
pub use factory::{ProcessContext, ProcessFactory, QueueProcessFactory};
pub use gate::CompletionGate;
pub use process::{BeanGuard, ConsumerProcess, ProcessCore, QueueProcess};
pub use process_status::{work_fractions, ProcessStatus};
pub use processes::{
    MonitorAtomProcess, MoveAtomProcess, ScanAtomProcess, SubTaskAtomProcess, TaskBeanProcess,
};
pub use queue_listener::QueueListener;
