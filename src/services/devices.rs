use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::EngineResult;
use crate::models::Position;

/// Drives one or more devices to a position
#[async_trait]
pub trait Positioner: Send + Sync {
    /// Move to `position`, returning once every device has arrived
    async fn set_position(&self, position: &Position) -> EngineResult<()>;

    /// Abandon any move in progress
    async fn abort(&self) -> EngineResult<()>;

    async fn position(&self) -> EngineResult<Position>;
}

/// Hands out positioners for moves
#[async_trait]
pub trait DeviceService: Send + Sync {
    async fn create_positioner(&self) -> EngineResult<Arc<dyn Positioner>>;
}

/// One reading from a scannable: a single value or a detector array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonitorSample {
    Scalar(f64),
    Array(Vec<f64>),
}

impl From<f64> for MonitorSample {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for MonitorSample {
    fn from(values: Vec<f64>) -> Self {
        Self::Array(values)
    }
}

/// A readable device such as a beam monitor or ion chamber
#[async_trait]
pub trait Scannable: Send + Sync {
    fn name(&self) -> &str;

    async fn value(&self) -> EngineResult<MonitorSample>;
}

/// Looks up scannables by name
#[async_trait]
pub trait ScannableDeviceService: Send + Sync {
    async fn get_scannable(&self, name: &str) -> EngineResult<Arc<dyn Scannable>>;
}
