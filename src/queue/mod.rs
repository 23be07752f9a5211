//! # In-Memory Queue Service
//!
//! Process-local implementation of [`QueueService`](crate::services::QueueService)
//! and [`QueueController`](crate::services::QueueController).
//!
//! ## Overview
//!
//! - One job queue of [`TaskBean`](crate::models::TaskBean)s, started
//!   explicitly with [`InMemoryQueueService::start_job_queue`]
//! - Active queues of [`QueueAtom`](crate::models::QueueAtom)s, registered on
//!   demand by composite processes and named `<prefix>-<n>`
//! - Each queue has a single consumer task that runs one bean at a time and a
//!   status topic named `<queue id><suffix>` its processes publish on
//! - The latest state of every bean broadcast on any topic is archived and
//!   can be read back by unique id
//!
//! Processes are created through a [`ProcessFactory`](crate::orchestration::ProcessFactory)
//! installed after construction with [`InMemoryQueueService::set_process_factory`].
//! The factory's processes hold the service, so call
//! [`InMemoryQueueService::dispose`] when the service is no longer needed.

mod memory_queue;
pub mod service;

pub use service::{InMemoryQueueService, QueueRecord};
