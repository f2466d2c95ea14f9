// Progress - current lifecycle status of a job

use serde::{Deserialize, Serialize};

/// Lifecycle status. Transitions form a DAG:
/// `Queued -> Running -> {Completed, Aborted, Failed}`, with
/// `Queued -> Aborted` permitted on dequeue-abort and `Failed -> Queued`
/// permitted on requeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Queued,
    Running,
    Aborted,
    Completed,
    Failed,
}

impl Status {
    /// Terminal statuses never transition again absent an explicit requeue.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Aborted | Status::Failed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Queued => "queued",
            Status::Running => "running",
            Status::Aborted => "aborted",
            Status::Completed => "completed",
            Status::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub status: Status,
    pub verbose: String,
    pub numeric: u8,
}

impl Progress {
    pub fn queued() -> Self {
        Self {
            status: Status::Queued,
            verbose: "queued".into(),
            numeric: 0,
        }
    }

    pub fn running(verbose: impl Into<String>, numeric: u8) -> Self {
        Self {
            status: Status::Running,
            verbose: verbose.into(),
            numeric: numeric.min(100),
        }
    }

    pub fn completed(verbose: impl Into<String>) -> Self {
        Self {
            status: Status::Completed,
            verbose: verbose.into(),
            numeric: 100,
        }
    }

    pub fn aborted(verbose: impl Into<String>) -> Self {
        Self {
            status: Status::Aborted,
            verbose: verbose.into(),
            numeric: 100,
        }
    }

    pub fn failed(verbose: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            verbose: verbose.into(),
            numeric: 100,
        }
    }
}
