//! # Queue Engine Constants
//!
//! Progress thresholds, default names and bean messages shared by the queue
//! processes, the queue listener and the in-memory queue service.

/// Percent-complete a process reports once its own work is done. Post-match
/// analysis lifts a successful process from here to 100.
pub const QUEUE_COMPLETE_PERCENT: f64 = 99.5;

/// Threshold used by post-match analysis to decide success. Slightly below
/// [`QUEUE_COMPLETE_PERCENT`] to absorb floating point rounding in the
/// weighted child progress.
pub const COMPLETION_TOLERANCE_PERCENT: f64 = 99.49;

/// Percent-complete after post-match analysis marks a bean complete.
pub const FINISHED_PERCENT: f64 = 100.0;

/// Reason carried by queue service errors once the service has shut down.
pub const STOPPED_REASON: &str = "stopped";

/// Progress milestones broadcast while a composite spools its children
pub mod progress {
    pub const REGISTERING_QUEUE: f64 = 0.0;
    pub const SUBMITTING_ATOMS: f64 = 1.0;
    pub const QUEUE_STARTED: f64 = 5.0;

    pub const MOVE_POSITION_CREATED: f64 = 10.0;
    pub const MOVE_POSITIONER_READY: f64 = 20.0;

    pub const MONITOR_STARTED: f64 = 1.0;
    pub const MONITOR_DEVICE_READY: f64 = 10.0;
    pub const MONITOR_FILE_CREATED: f64 = 20.0;
    pub const MONITOR_SAMPLE_WRITTEN: f64 = 50.0;

    pub const SCAN_CONFIGURING: f64 = 1.0;
    pub const SCAN_ENDPOINT_RESOLVED: f64 = 2.0;
    pub const SCAN_REQUEST_BUILT: f64 = 3.0;
    pub const SCAN_BEAN_CREATED: f64 = 4.0;
    pub const SCAN_SUBMITTED: f64 = 5.0;
}

/// Defaults used when configuration does not override them
pub mod defaults {
    pub const JOB_QUEUE_NAME: &str = "queue-engine.job-queue";
    pub const ACTIVE_QUEUE_PREFIX: &str = "queue-engine.active-queue";
    pub const STATUS_TOPIC_SUFFIX: &str = ".status-topic";
    pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

    pub const SCAN_BROKER_URI: &str = "tcp://localhost:61616";
    pub const SCAN_STATUS_TOPIC: &str = "scanning.status.topic";
    pub const SCAN_SUBMIT_QUEUE: &str = "scanning.submission.queue";
}

/// Bean and queue messages broadcast by the engine
pub mod messages {
    pub const REGISTERING_QUEUE: &str = "Registering new active queue.";
    pub const SUBMITTING_ATOMS: &str = "Submitting atoms to active queue.";
    pub const STARTING_QUEUE: &str = "Atoms submitted. Starting active queue...";
    pub const QUEUE_RUNNING: &str = "Running...";
    pub const RUNNING_FINISHED: &str = "Running finished.";
    pub const ALL_CHILDREN_COMPLETE: &str = "All child processes complete.";
    pub const NO_CHILDREN: &str = "No atoms to process.";

    pub const MOVE_CREATING_POSITION: &str = "Creating position from configured values.";
    pub const MOVE_GETTING_POSITIONER: &str = "Getting device positioner.";
    pub const MOVE_MOVING: &str = "Moving device(s) to requested position.";
    pub const MOVE_ABORTED: &str = "Move aborted before completion (requested).";
    pub const MOVE_COMPLETED: &str = "Device move(s) completed.";

    pub const MONITOR_STARTING: &str = "Reading monitor value.";
    pub const MONITOR_ABORTED: &str = "Monitor read aborted before completion (requested).";
    pub const MONITOR_COMPLETED: &str = "Monitor value recorded.";

    pub const SCAN_CONFIGURING: &str = "Configuring scan submission.";
    pub const SCAN_SUBMITTED: &str = "Scan submitted to scanning service.";
    pub const SCAN_ABORTED_BY_SERVICE: &str = "Scan aborted from scanning service.";
    pub const SCAN_ABORTED: &str = "Scan aborted before completion (requested).";
    pub const SCAN_COMPLETED: &str = "Scan completed.";
    pub const SCAN_FAILED: &str = "Scan failed (caused by scanning service).";

    pub const SUBTASK_ABORTED: &str = "Active-queue aborted before completion (requested)";
    pub const SUBTASK_COMPLETED: &str = "Active-queue completed.";
    pub const SUBTASK_FAILED: &str = "Active-queue failed (caused by process Atom)";

    pub const TASK_ABORTED: &str = "Job-queue aborted before completion (requested)";
    pub const TASK_COMPLETED: &str = "Job-queue completed.";
    pub const TASK_FAILED: &str = "Job-queue failed (caused by process Atom)";
}

/// Structured event names used as the `event` field of lifecycle log lines
pub mod events {
    pub const PROCESS_STARTED: &str = "process.started";
    pub const PROCESS_FAILED: &str = "process.failed";
    pub const PROCESS_TERMINATED: &str = "process.terminated";
    pub const PROCESS_COMPLETED: &str = "process.completed";
    pub const QUEUE_REGISTERED: &str = "queue.registered";
    pub const QUEUE_STOPPED: &str = "queue.stopped";
    pub const QUEUE_DEREGISTERED: &str = "queue.deregistered";
}
