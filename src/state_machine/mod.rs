//! # Bean and Queue State
//!
//! Status values shared by every queueable bean, the lifecycle of active
//! queues, and the control requests that move a running bean between states.

pub mod events;
pub mod states;

pub use events::ControlRequest;
pub use states::{QueueStatus, Status};
