use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status carried by every queueable bean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Bean has not been handed to any queue
    #[default]
    None,
    /// Bean has been accepted by a queue
    Submitted,
    /// Bean is waiting in a queue
    Queued,
    /// Bean is being processed
    Running,
    /// Processing is suspended
    Paused,
    /// Processing continues after a pause
    Resumed,
    RequestPause,
    RequestResume,
    RequestTerminate,
    /// Processing finished successfully
    Complete,
    /// Processing finished unsuccessfully
    Failed,
    /// Processing was cancelled on request
    Terminated,
}

impl Status {
    /// Check if this is a final state. `None` counts as final because a bean
    /// in that state is not being worked on, but see [`Status::is_concluded`].
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::None | Self::Complete | Self::Failed | Self::Terminated
        )
    }

    /// Final and actually reached through processing
    pub fn is_concluded(&self) -> bool {
        self.is_final() && *self != Self::None
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running | Self::Resumed)
    }

    pub fn is_resumed(&self) -> bool {
        matches!(self, Self::Resumed)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Check if this state asks the owning process to change what it is doing
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Self::RequestPause | Self::RequestResume | Self::RequestTerminate
        )
    }

    /// Check if the bean is held by a process (running, paused or being asked
    /// to change state)
    pub fn is_active(&self) -> bool {
        self.is_running() || self.is_paused() || self.is_request()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::Queued => write!(f, "QUEUED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Resumed => write!(f, "RESUMED"),
            Self::RequestPause => write!(f, "REQUEST_PAUSE"),
            Self::RequestResume => write!(f, "REQUEST_RESUME"),
            Self::RequestTerminate => write!(f, "REQUEST_TERMINATE"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Failed => write!(f, "FAILED"),
            Self::Terminated => write!(f, "TERMINATED"),
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "SUBMITTED" => Ok(Self::Submitted),
            "QUEUED" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "PAUSED" => Ok(Self::Paused),
            "RESUMED" => Ok(Self::Resumed),
            "REQUEST_PAUSE" => Ok(Self::RequestPause),
            "REQUEST_RESUME" => Ok(Self::RequestResume),
            "REQUEST_TERMINATE" => Ok(Self::RequestTerminate),
            "COMPLETE" => Ok(Self::Complete),
            "FAILED" => Ok(Self::Failed),
            "TERMINATED" => Ok(Self::Terminated),
            _ => Err(format!("Invalid status: {s}")),
        }
    }
}

/// Lifecycle of an active queue inside a queue service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Initialised,
    Started,
    Paused,
    Stopping,
    Stopped,
    Disposed,
}

impl QueueStatus {
    /// Check if the queue still needs stopping before it can be deregistered
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initialised | Self::Started | Self::Paused)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialised => write!(f, "initialised"),
            Self::Started => write!(f, "started"),
            Self::Paused => write!(f, "paused"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}
