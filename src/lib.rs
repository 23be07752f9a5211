#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Atom Queue Core
//!
//! Hierarchical queue processing engine for experiment automation.
//!
//! ## Overview
//!
//! Work arrives as [`TaskBean`](models::TaskBean)s on a job queue. A task
//! holds sub-tasks; a sub-task holds atoms: device moves, monitor reads and
//! scans. Each composite spools its children into a freshly registered
//! active queue, follows their progress over the queue's status topic and is
//! finalized exactly once, after every child has concluded or as soon as one
//! fails or is terminated.
//!
//! ## Module Organization
//!
//! - [`models`] - beans, atoms and the traits the engine uses to treat them
//!   uniformly
//! - [`state_machine`] - bean and queue statuses and control requests
//! - [`events`] - status topic publishers and subscriptions
//! - [`orchestration`] - process lifecycle, queue listener, atom queue
//!   processor and the concrete processes
//! - [`queue`] - in-memory job queue and active queues
//! - [`services`] - collaborator interfaces (devices, monitors, scanning
//!   service) and simulated implementations
//! - [`config`] - layered configuration
//! - [`logging`] - structured logging setup
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use atom_queue_core::config::ConfigManager;
//! use atom_queue_core::models::{MoveAtom, SubTaskAtom, TaskBean};
//! use atom_queue_core::orchestration::{ProcessContext, QueueProcessFactory};
//! use atom_queue_core::queue::InMemoryQueueService;
//! use atom_queue_core::services::simulated::{
//!     SimulatedDeviceService, SimulatedPositioner, SimulatedScanConnector,
//!     SimulatedScanService, SimulatedScannableService,
//! };
//! use atom_queue_core::services::{JsonMonitorWriter, QueueController};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ConfigManager::load()?.config().clone());
//! let service = Arc::new(InMemoryQueueService::new(config.clone()));
//! service.set_process_factory(Arc::new(QueueProcessFactory::new(ProcessContext {
//!     queue_service: service.clone(),
//!     controller: service.clone(),
//!     devices: Arc::new(SimulatedDeviceService::new(Arc::new(SimulatedPositioner::default()))),
//!     scannables: Arc::new(SimulatedScannableService::new().with_monitor("ic1", 1.0)),
//!     scan_connector: Arc::new(SimulatedScanConnector::new(Arc::new(
//!         SimulatedScanService::new(10, std::time::Duration::from_millis(10), 64),
//!     ))),
//!     monitor_writer: Arc::new(JsonMonitorWriter::new(&config.monitor.temp_dir)),
//!     config: config.clone(),
//! })));
//! service.start_job_queue()?;
//!
//! let sub_task = SubTaskAtom::with_atoms("align", [MoveAtom::single("x to 1", "x", 1.0).into()])?;
//! service.submit_task(TaskBean::with_sub_tasks("experiment", [sub_task])?).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod queue;
pub mod services;
pub mod state_machine;

pub use config::{ConfigManager, ConfigurationError, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use events::{BeanEvent, BeanListener, Publisher, Subscription, TopicPublisher};
pub use logging::init_structured_logging;
pub use models::{
    BeanCore, HasAtomQueue, HasChildQueue, MonitorAtom, MoveAtom, QueueAtom, Queueable, ScanAtom,
    ScanBean, SubTaskAtom, TaskBean,
};
pub use orchestration::{
    ConsumerProcess, ProcessContext, ProcessCore, ProcessFactory, QueueListener, QueueProcess,
    QueueProcessFactory,
};
pub use queue::InMemoryQueueService;
pub use state_machine::{ControlRequest, QueueStatus, Status};
