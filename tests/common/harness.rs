//! # Engine Test Harness
//!
//! Wires an [`InMemoryQueueService`] to simulated collaborators and records
//! every task event broadcast on the job queue, so integration tests can
//! submit work and then assert on final states and on event histories.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use atom_queue_core::config::EngineConfig;
use atom_queue_core::events::{BeanEvent, BeanListener, Subscription};
use atom_queue_core::models::{QueueAtom, Queueable, TaskBean};
use atom_queue_core::orchestration::{ProcessContext, QueueProcessFactory};
use atom_queue_core::queue::InMemoryQueueService;
use atom_queue_core::services::simulated::{
    SimulatedDeviceService, SimulatedPositioner, SimulatedScanConnector, SimulatedScanService,
    SimulatedScannableService,
};
use atom_queue_core::services::{JsonMonitorWriter, QueueController, QueueService};
use atom_queue_core::state_machine::{ControlRequest, Status};

/// Generous upper bound for any scenario to settle
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Keeps every task state seen on the job queue topic, in order
#[derive(Default)]
pub struct TaskRecorder {
    events: Mutex<Vec<TaskBean>>,
}

impl TaskRecorder {
    pub fn history(&self, task_id: &str) -> Vec<TaskBean> {
        self.events
            .lock()
            .iter()
            .filter(|task| task.unique_id() == task_id)
            .cloned()
            .collect()
    }

    pub fn statuses(&self, task_id: &str) -> Vec<Status> {
        self.history(task_id).iter().map(|task| task.status()).collect()
    }
}

impl BeanListener<TaskBean> for TaskRecorder {
    fn bean_change_performed(&self, event: &BeanEvent<TaskBean>) {
        self.events.lock().push(event.bean.clone());
    }
}

pub struct HarnessBuilder {
    move_delay: Duration,
    scan_steps: u32,
    scan_step_delay: Duration,
    scan_fail_at: Option<f64>,
    monitors: Vec<(String, f64)>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            move_delay: Duration::from_millis(20),
            scan_steps: 5,
            scan_step_delay: Duration::from_millis(10),
            scan_fail_at: None,
            monitors: vec![("ic1".to_string(), 1.5)],
        }
    }
}

impl HarnessBuilder {
    pub fn move_delay(mut self, delay: Duration) -> Self {
        self.move_delay = delay;
        self
    }

    pub fn scan_steps(mut self, steps: u32, step_delay: Duration) -> Self {
        self.scan_steps = steps;
        self.scan_step_delay = step_delay;
        self
    }

    pub fn scan_failing_at(mut self, percent: f64) -> Self {
        self.scan_fail_at = Some(percent);
        self
    }

    pub fn build(self) -> EngineHarness {
        let monitor_dir = TempDir::new().expect("create monitor directory");
        let mut config = EngineConfig::default();
        config.monitor.temp_dir = monitor_dir.path().to_path_buf();
        let config = Arc::new(config);

        let service = Arc::new(InMemoryQueueService::new(config.clone()));
        let positioner = Arc::new(SimulatedPositioner::new(self.move_delay));

        let mut scans = SimulatedScanService::new(
            self.scan_steps,
            self.scan_step_delay,
            config.events.channel_capacity,
        );
        if let Some(percent) = self.scan_fail_at {
            scans = scans.failing_at(percent);
        }
        let scans = Arc::new(scans);

        let scannables = self
            .monitors
            .into_iter()
            .fold(SimulatedScannableService::new(), |service, (name, value)| {
                service.with_monitor(name, value)
            });

        service.set_process_factory(Arc::new(QueueProcessFactory::new(ProcessContext {
            queue_service: service.clone(),
            controller: service.clone(),
            devices: Arc::new(SimulatedDeviceService::new(positioner.clone())),
            scannables: Arc::new(scannables),
            scan_connector: Arc::new(SimulatedScanConnector::new(scans.clone())),
            monitor_writer: Arc::new(JsonMonitorWriter::new(monitor_dir.path())),
            config,
        })));

        let recorder = Arc::new(TaskRecorder::default());
        let task_subscription = service
            .create_task_subscriber()
            .expect("subscribe to job queue");
        task_subscription
            .add_listener(recorder.clone())
            .expect("attach task recorder");
        service.start_job_queue().expect("start job queue");

        EngineHarness {
            service,
            positioner,
            scans,
            monitor_dir,
            recorder,
            task_subscription,
        }
    }
}

/// A running engine with simulated hardware. Must be created inside a tokio
/// runtime.
pub struct EngineHarness {
    pub service: Arc<InMemoryQueueService>,
    pub positioner: Arc<SimulatedPositioner>,
    pub scans: Arc<SimulatedScanService>,
    pub monitor_dir: TempDir,
    pub recorder: Arc<TaskRecorder>,
    task_subscription: Arc<dyn Subscription<TaskBean>>,
}

impl EngineHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn start() -> Self {
        Self::builder().build()
    }

    /// Submit a task and return its unique id
    pub async fn submit(&self, task: TaskBean) -> String {
        let task_id = task.unique_id().to_string();
        self.service
            .submit_task(task)
            .await
            .expect("submit task to job queue");
        task_id
    }

    pub fn task(&self, task_id: &str) -> TaskBean {
        self.service
            .latest_task(task_id)
            .unwrap_or_else(|| panic!("no state broadcast for task {task_id}"))
    }

    pub fn atom(&self, atom_id: &str) -> QueueAtom {
        self.service
            .latest_atom(atom_id)
            .unwrap_or_else(|| panic!("no state broadcast for atom {atom_id}"))
    }

    /// Wait for the task to reach a concluded status and return it
    pub async fn wait_for_task_end(&self, task_id: &str) -> TaskBean {
        self.wait_for_task(task_id, |task| task.status().is_concluded())
            .await
    }

    pub async fn wait_for_task(&self, task_id: &str, ready: impl Fn(&TaskBean) -> bool) -> TaskBean {
        eventually(|| self.service.latest_task(task_id).filter(|task| ready(task))).await
    }

    pub async fn wait_for_atom(&self, atom_id: &str, ready: impl Fn(&QueueAtom) -> bool) -> QueueAtom {
        eventually(|| self.service.latest_atom(atom_id).filter(|atom| ready(atom))).await
    }

    /// Wait until the recorder has seen an event for the task matching `seen`
    pub async fn wait_for_task_event(&self, task_id: &str, seen: impl Fn(&TaskBean) -> bool) {
        eventually(|| self.recorder.history(task_id).into_iter().find(|task| seen(task))).await;
    }

    /// Wait until every active queue has been deregistered
    pub async fn wait_for_queues_tidied(&self) {
        eventually(|| self.service.active_queue_ids().is_empty().then_some(())).await;
    }

    pub async fn request_task(&self, task_id: &str, request: ControlRequest) {
        self.service
            .request(&self.service.job_queue_id(), task_id, request)
            .await
            .expect("control request on job queue");
    }

    pub async fn shutdown(self) {
        let _ = self.task_subscription.disconnect();
        self.service.stop().await;
        self.service.dispose();
    }
}

/// Poll `check` until it yields a value
pub async fn eventually<T>(mut check: impl FnMut() -> Option<T>) -> T {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        loop {
            if let Some(value) = check() {
                return value;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .expect("condition not reached before timeout")
}

/// Percent values are sums of weighted fractions; compare with a tolerance
pub fn assert_percent(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}% complete, got {actual}%"
    );
}
