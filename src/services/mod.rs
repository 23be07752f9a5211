//! # Collaborator Services
//!
//! Interfaces the queue processes depend on: queue lifecycle and control,
//! device positioning, monitor lookup, the scanning service, and monitor
//! sample persistence. Processes receive implementations through
//! [`ProcessContext`](crate::orchestration::ProcessContext).
//!
//! [`simulated`] provides in-process implementations of the hardware and
//! scanning interfaces for tests and demonstrations.

pub mod devices;
pub mod monitor_writer;
pub mod queue;
pub mod scanning;
pub mod simulated;

pub use devices::{
    DeviceService, MonitorSample, Positioner, Scannable, ScannableDeviceService,
};
pub use monitor_writer::{monitor_dataset, JsonMonitorWriter, MonitorFileWriter};
pub use queue::{QueueController, QueueService};
pub use scanning::{ScanConnector, ScanEndpoint, ScanService};
