use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{OperationId, WorkerId};

/// Status of a submitted operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    InProgress,
    Completed,
}

/// Outcome of one worker's share of an operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed { reason: String },
}

/// One worker's recorded outcome. Appended independently of its siblings;
/// never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOutcome {
    pub worker_id: WorkerId,
    #[serde(flatten)]
    pub outcome: OutcomeStatus,
}

/// A submitted job, fanned out across a selected subset of ready workers.
/// Owned and mutated only by the coordinator; once `Completed` the outcomes
/// list is immutable and the record is retained until the reaper purges it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    pub target: String,
    pub strategy: String,
    pub status: OperationStatus,
    pub outcomes: Vec<WorkerOutcome>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Operation {
    pub fn new(target: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            id: OperationId::new(),
            target: target.into(),
            strategy: strategy.into(),
            status: OperationStatus::Pending,
            outcomes: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == OutcomeStatus::Success)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}
