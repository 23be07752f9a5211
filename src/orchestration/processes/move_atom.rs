use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::constants::{messages, progress};
use crate::error::{EngineError, EngineResult};
use crate::models::{MoveAtom, Queueable};
use crate::orchestration::process::{work_done, ProcessCore, QueueProcess};
use crate::services::{DeviceService, Positioner};
use crate::state_machine::Status;

/// Moves devices to the position configured on a [`MoveAtom`]. The move
/// itself runs on a worker task so termination can abort it.
pub struct MoveAtomProcess {
    core: Arc<ProcessCore<MoveAtom>>,
    devices: Arc<dyn DeviceService>,
    positioner: Mutex<Option<Arc<dyn Positioner>>>,
    cancel: watch::Sender<bool>,
}

impl MoveAtomProcess {
    pub fn new(core: Arc<ProcessCore<MoveAtom>>, devices: Arc<dyn DeviceService>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            core,
            devices,
            positioner: Mutex::new(None),
            cancel,
        }
    }

    async fn abort_positioner(&self) {
        let positioner = self.positioner.lock().clone();
        if let Some(positioner) = positioner {
            if let Err(e) = positioner.abort().await {
                warn!(error = %e, "Failed to abort positioner");
            }
        }
    }
}

#[async_trait]
impl QueueProcess for MoveAtomProcess {
    type Bean = MoveAtom;
    const PROCESS_TYPE: &'static str = "move";

    fn core(&self) -> &Arc<ProcessCore<MoveAtom>> {
        &self.core
    }

    async fn run(&self) -> EngineResult<()> {
        self.core.broadcast_progress(
            Some(Status::Running),
            Some(progress::MOVE_POSITION_CREATED),
            Some(messages::MOVE_CREATING_POSITION),
        )?;
        let (name, position) = self
            .core
            .with_bean(|bean| (bean.name().to_string(), bean.position_config.clone()));
        if position.is_empty() {
            return Err(EngineError::InvalidBean(format!(
                "move '{name}' has no target positions"
            )));
        }

        self.core.broadcast_progress(
            None,
            Some(progress::MOVE_POSITIONER_READY),
            Some(messages::MOVE_GETTING_POSITIONER),
        )?;
        let positioner = self.devices.create_positioner().await?;
        *self.positioner.lock() = Some(positioner.clone());

        self.core
            .broadcast_progress(None, None, Some(messages::MOVE_MOVING))?;

        let core = self.core.clone();
        let mut cancelled = self.cancel.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                moved = positioner.set_position(&position) => match moved {
                    Ok(()) => {
                        if let Err(e) = work_done(&core) {
                            warn!(error = %e, "Failed to broadcast move completion");
                        }
                        core.open_gate();
                    }
                    Err(e) => core.report_fail(&e),
                },
                _ = async { let _ = cancelled.wait_for(|cancelled| *cancelled).await; } => {
                    debug!(?position, "Move cancelled, aborting positioner");
                    if let Err(e) = positioner.abort().await {
                        warn!(error = %e, "Failed to abort positioner");
                    }
                }
            }
        });
        Ok(())
    }

    async fn do_terminate(&self) -> EngineResult<()> {
        self.cancel.send_replace(true);
        Ok(())
    }

    async fn do_pause(&self) -> EngineResult<()> {
        Err(EngineError::UnsupportedOperation(
            "Pause/resume not implemented on MoveAtom".to_string(),
        ))
    }

    async fn do_resume(&self) -> EngineResult<()> {
        Err(EngineError::UnsupportedOperation(
            "Pause/resume not implemented on MoveAtom".to_string(),
        ))
    }

    async fn on_failed(&self) -> EngineResult<()> {
        self.abort_positioner().await;
        Ok(())
    }

    fn aborted_message(&self) -> String {
        messages::MOVE_ABORTED.to_string()
    }

    fn completed_message(&self) -> String {
        messages::MOVE_COMPLETED.to_string()
    }
}
