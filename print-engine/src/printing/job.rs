//! Print job types

use std::fmt;

use serde::{Deserialize, Serialize};

use super::command::PrintCommand;

/// What a job prints; also selects the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Receipt,
    KitchenTicket,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Receipt => write!(f, "receipt"),
            TargetKind::KitchenTicket => write!(f, "kitchen_ticket"),
        }
    }
}

/// Job lifecycle
///
/// ```text
/// PENDING -> PRINTING -> COMPLETED
///               |
///               +-> FAILED -> PENDING   (below the attempt cap)
///               +-> FAILED              (terminal)
/// PENDING -> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Printing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Printing)
                | (Pending, Cancelled)
                | (Printing, Completed)
                | (Printing, Failed)
                | (Failed, Pending)
        )
    }

    /// Nothing will happen to the job without an operator
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Printing => "PRINTING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// A durable unit of print work
///
/// The payload never changes after creation; a reprint is a new job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    pub id: String,
    /// Enqueue order, unique per store
    pub seq: u64,
    pub order_id: String,
    pub template_id: String,
    pub target_kind: TargetKind,
    /// Device whose queue holds this job
    pub device: String,
    pub payload: Vec<PrintCommand>,
    pub status: JobStatus,
    pub attempts: u32,
    /// Protocol errors seen so far, for operator alerts
    #[serde(default)]
    pub protocol_errors: u32,
    pub last_error: Option<String>,
    /// Earliest time (millis) a pending job may be claimed again
    #[serde(default)]
    pub next_attempt_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PrintJob {
    pub fn is_ready(&self, now: i64) -> bool {
        self.status == JobStatus::Pending && self.next_attempt_at <= now
    }
}

/// Input for [`PrintQueueStore::enqueue`](super::PrintQueueStore::enqueue)
#[derive(Debug, Clone)]
pub struct NewPrintJob {
    pub order_id: String,
    pub template_id: String,
    pub target_kind: TargetKind,
    pub device: String,
    pub payload: Vec<PrintCommand>,
}

/// Per-status job counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub printing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Printing));
        assert!(Printing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));
        assert!(!Printing.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Printing).unwrap(),
            "\"PRINTING\""
        );
        assert_eq!(
            serde_json::to_string(&TargetKind::KitchenTicket).unwrap(),
            "\"kitchen_ticket\""
        );
    }
}
