use serde::{Deserialize, Serialize};

use crate::ids::WorkerId;

/// Lifecycle state of a worker session. Exactly one state is active at a
/// time; transitions are driven only by events from the underlying
/// connection (or by an explicit destroy).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    PendingAuth,
    Authenticating,
    Ready,
    Busy,
    Disconnected,
    Error,
    Destroyed,
}

impl WorkerState {
    /// Terminal states trigger the registry's delayed re-creation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error | Self::Destroyed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PendingAuth => "pending_auth",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Busy => "busy",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Destroyed => "destroyed",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session's report of its own transition. This is the only channel
/// through which the registry learns about session health; sessions never
/// reach into the registry's map.
///
/// `instance` is unique per session instantiation so the registry can
/// ignore late reports from an instance it has already replaced.
#[derive(Clone, Debug)]
pub struct StatusUpdate {
    pub worker_id: WorkerId,
    pub instance: u64,
    pub state: WorkerState,
    pub detail: Option<String>,
}

/// Read-only view of one worker for the status surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub status: WorkerState,
}
