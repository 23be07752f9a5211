//! Simulated Collaborators
//!
//! In-process stand-ins for the positioners, monitors and scanning service
//! the engine drives. All delays use `tokio::time::sleep` so simulated work
//! never blocks a runtime thread.
//!
//! # Available Simulations
//!
//! - `SimulatedPositioner` - moves with a configurable delay, records every
//!   move and abort, can be told to fail on specific targets
//! - `SimulatedScannable` - monitor with a fixed value
//! - `SimulatedScanService` - advances scan beans through their lifecycle and
//!   honours pause, resume and terminate requests

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info};

use super::devices::{DeviceService, MonitorSample, Positioner, Scannable, ScannableDeviceService};
use super::scanning::{ScanConnector, ScanEndpoint, ScanService};
use crate::error::{EngineError, EngineResult};
use crate::events::{Publisher, Subscription, TopicPublisher};
use crate::models::{Position, Queueable, ScanBean};
use crate::state_machine::{ControlRequest, Status};

// =============================================================================
// Positioner
// =============================================================================

/// Positioner that takes `move_delay` to reach any target
pub struct SimulatedPositioner {
    position: Mutex<Position>,
    move_delay: Duration,
    failing_targets: Mutex<Vec<(String, f64)>>,
    moves: Mutex<Vec<Position>>,
    aborts: AtomicUsize,
}

impl SimulatedPositioner {
    pub fn new(move_delay: Duration) -> Self {
        Self {
            position: Mutex::new(Position::new()),
            move_delay,
            failing_targets: Mutex::new(Vec::new()),
            moves: Mutex::new(Vec::new()),
            aborts: AtomicUsize::new(0),
        }
    }

    /// Make any move that sends `device` to `target` fail
    pub fn fail_on(&self, device: impl Into<String>, target: f64) {
        self.failing_targets.lock().push((device.into(), target));
    }

    /// Positions successfully reached, in order
    pub fn moves(&self) -> Vec<Position> {
        self.moves.lock().clone()
    }

    pub fn abort_count(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedPositioner {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

#[async_trait]
impl Positioner for SimulatedPositioner {
    async fn set_position(&self, position: &Position) -> EngineResult<()> {
        debug!(?position, delay_ms = self.move_delay.as_millis() as u64, "Simulated move started");
        sleep(self.move_delay).await;

        let failing = self
            .failing_targets
            .lock()
            .iter()
            .find(|(device, target)| position.get(device) == Some(target))
            .cloned();
        if let Some((device, target)) = failing {
            return Err(EngineError::Device(format!(
                "device '{device}' could not reach {target}"
            )));
        }

        self.position.lock().extend(position.clone());
        self.moves.lock().push(position.clone());
        debug!(?position, "Simulated move finished");
        Ok(())
    }

    async fn abort(&self) -> EngineResult<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn position(&self) -> EngineResult<Position> {
        Ok(self.position.lock().clone())
    }
}

/// Hands out one shared simulated positioner
pub struct SimulatedDeviceService {
    positioner: Arc<SimulatedPositioner>,
}

impl SimulatedDeviceService {
    pub fn new(positioner: Arc<SimulatedPositioner>) -> Self {
        Self { positioner }
    }

    pub fn positioner(&self) -> &Arc<SimulatedPositioner> {
        &self.positioner
    }
}

#[async_trait]
impl DeviceService for SimulatedDeviceService {
    async fn create_positioner(&self) -> EngineResult<Arc<dyn Positioner>> {
        Ok(self.positioner.clone())
    }
}

// =============================================================================
// Monitors
// =============================================================================

/// Monitor returning a fixed sample
pub struct SimulatedScannable {
    name: String,
    value: MonitorSample,
}

impl SimulatedScannable {
    pub fn new(name: impl Into<String>, value: impl Into<MonitorSample>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl Scannable for SimulatedScannable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn value(&self) -> EngineResult<MonitorSample> {
        Ok(self.value.clone())
    }
}

#[derive(Default)]
pub struct SimulatedScannableService {
    scannables: DashMap<String, Arc<dyn Scannable>>,
}

impl SimulatedScannableService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_monitor(self, name: impl Into<String>, value: impl Into<MonitorSample>) -> Self {
        let name = name.into();
        self.scannables
            .insert(name.clone(), Arc::new(SimulatedScannable::new(name, value)));
        self
    }
}

#[async_trait]
impl ScannableDeviceService for SimulatedScannableService {
    async fn get_scannable(&self, name: &str) -> EngineResult<Arc<dyn Scannable>> {
        self.scannables
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::Device(format!("no scannable named '{name}'")))
    }
}

// =============================================================================
// Scanning service
// =============================================================================

/// Settings a detached simulated scan runs with
#[derive(Clone)]
struct ScanScript {
    topic: TopicPublisher<ScanBean>,
    steps: u32,
    step_delay: Duration,
    fail_at_percent: Option<f64>,
}

impl ScanScript {
    async fn run(
        self,
        mut bean: ScanBean,
        mut control: watch::Receiver<Option<ControlRequest>>,
    ) -> EngineResult<()> {
        bean.transition_to(Status::Running);
        bean.set_message("Scan running.");
        self.topic.broadcast(&bean)?;

        let mut paused = false;
        for step in 1..=self.steps {
            loop {
                let request = *control.borrow_and_update();
                match request {
                    Some(ControlRequest::Terminate) => {
                        bean.transition_to(Status::Terminated);
                        bean.set_message("Scan aborted on request.");
                        return self.topic.broadcast(&bean);
                    }
                    Some(ControlRequest::Pause) => {
                        if !paused {
                            paused = true;
                            bean.transition_to(Status::Paused);
                            self.topic.broadcast(&bean)?;
                        }
                        if control.changed().await.is_err() {
                            return Ok(());
                        }
                    }
                    Some(ControlRequest::Resume) | None => {
                        if paused {
                            paused = false;
                            bean.transition_to(Status::Resumed);
                            self.topic.broadcast(&bean)?;
                        }
                        break;
                    }
                }
            }

            sleep(self.step_delay).await;
            let percent = f64::from(step) * 100.0 / f64::from(self.steps);
            if let Some(fail_at) = self.fail_at_percent {
                if percent >= fail_at {
                    bean.transition_to(Status::Failed);
                    bean.set_message(format!("Scan failed at {fail_at}%."));
                    return self.topic.broadcast(&bean);
                }
            }
            bean.set_percent_complete(percent);
            bean.set_message(format!("Scan point {step} of {}.", self.steps));
            self.topic.broadcast(&bean)?;
        }

        bean.transition_to(Status::Complete);
        bean.set_percent_complete(100.0);
        bean.set_message("Scan complete.");
        self.topic.broadcast(&bean)
    }
}

/// Scanning service that runs each submitted scan as a number of equal steps
pub struct SimulatedScanService {
    script: ScanScript,
    controls: DashMap<String, watch::Sender<Option<ControlRequest>>>,
    submitted: Mutex<Vec<ScanBean>>,
    requests: Mutex<Vec<(String, ControlRequest)>>,
}

impl SimulatedScanService {
    pub fn new(steps: u32, step_delay: Duration, channel_capacity: usize) -> Self {
        Self {
            script: ScanScript {
                topic: TopicPublisher::new("simulated.scan.status", channel_capacity),
                steps: steps.max(1),
                step_delay,
                fail_at_percent: None,
            },
            controls: DashMap::new(),
            submitted: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail every scan once it would reach `percent`
    pub fn failing_at(mut self, percent: f64) -> Self {
        self.script.fail_at_percent = Some(percent);
        self
    }

    pub fn submitted(&self) -> Vec<ScanBean> {
        self.submitted.lock().clone()
    }

    pub fn requests(&self) -> Vec<(String, ControlRequest)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ScanService for SimulatedScanService {
    fn subscribe(&self) -> EngineResult<Arc<dyn Subscription<ScanBean>>> {
        Ok(Arc::new(self.script.topic.subscription()))
    }

    async fn submit(&self, bean: ScanBean) -> EngineResult<()> {
        info!(bean_id = %bean.unique_id(), name = %bean.name(), "Simulated scan submitted");
        let (sender, receiver) = watch::channel(None);
        self.controls.insert(bean.unique_id().to_string(), sender);
        self.submitted.lock().push(bean.clone());

        let script = self.script.clone();
        tokio::spawn(async move {
            let bean_id = bean.unique_id().to_string();
            if let Err(e) = script.run(bean, receiver).await {
                debug!(bean_id = %bean_id, error = %e, "Simulated scan stopped publishing");
            }
        });
        Ok(())
    }

    async fn request(&self, bean_id: &str, request: ControlRequest) -> EngineResult<()> {
        self.requests.lock().push((bean_id.to_string(), request));
        let control = self
            .controls
            .get(bean_id)
            .ok_or_else(|| EngineError::Scanning(format!("no scan with id '{bean_id}'")))?;
        control.send_replace(Some(request));
        Ok(())
    }
}

/// Connector that always hands out the same simulated scanning service and
/// remembers which endpoints were requested
pub struct SimulatedScanConnector {
    service: Arc<SimulatedScanService>,
    connections: Mutex<HashMap<String, ScanEndpoint>>,
}

impl SimulatedScanConnector {
    pub fn new(service: Arc<SimulatedScanService>) -> Self {
        Self {
            service,
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &Arc<SimulatedScanService> {
        &self.service
    }

    pub fn connections(&self) -> Vec<ScanEndpoint> {
        self.connections.lock().values().cloned().collect()
    }
}

#[async_trait]
impl ScanConnector for SimulatedScanConnector {
    async fn connect(&self, endpoint: &ScanEndpoint) -> EngineResult<Arc<dyn ScanService>> {
        self.connections
            .lock()
            .insert(endpoint.broker_uri.clone(), endpoint.clone());
        Ok(self.service.clone())
    }
}
