use serde::{Deserialize, Serialize};

use super::states::Status;

/// Control requests a queue client can send to the process handling a bean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlRequest {
    Pause,
    Resume,
    Terminate,
}

impl ControlRequest {
    /// Get a string representation of the request for logging
    pub fn request_type(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Terminate => "terminate",
        }
    }

    /// Status a bean carries while the request is outstanding
    pub fn requested_status(&self) -> Status {
        match self {
            Self::Pause => Status::RequestPause,
            Self::Resume => Status::RequestResume,
            Self::Terminate => Status::RequestTerminate,
        }
    }

    /// Map a request status back to its request
    pub fn from_status(status: Status) -> Option<Self> {
        match status {
            Status::RequestPause => Some(Self::Pause),
            Status::RequestResume => Some(Self::Resume),
            Status::RequestTerminate => Some(Self::Terminate),
            _ => None,
        }
    }

    /// Check whether a bean in `status` can still act on this request
    pub fn applies_to(&self, status: Status) -> bool {
        match self {
            Self::Pause => status.is_running(),
            Self::Resume => status.is_paused(),
            Self::Terminate => !status.is_concluded(),
        }
    }
}
