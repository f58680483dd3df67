//! Reason codes recorded by the controller for leaves and ends.

use crate::status::ActivityStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a participant left an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    /// The participant asked to leave.
    Manual,
    /// The participant's connection dropped.
    Disconnect,
    /// An operator removed the participant.
    Forced,
}

impl LeaveReason {
    /// Wire name of the reason.
    pub fn as_str(self) -> &'static str {
        match self {
            LeaveReason::Manual => "manual",
            LeaveReason::Disconnect => "disconnect",
            LeaveReason::Forced => "forced",
        }
    }
}

impl fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an activity ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The activity ran to completion.
    Completed,
    /// The activity was called off.
    Cancelled,
    /// The activity exceeded its allotted time.
    Timeout,
}

impl EndReason {
    /// Wire name of the reason.
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::Completed => "completed",
            EndReason::Cancelled => "cancelled",
            EndReason::Timeout => "timeout",
        }
    }

    /// The terminal status this reason moves an activity into.
    pub fn target_status(self) -> ActivityStatus {
        match self {
            EndReason::Cancelled => ActivityStatus::Cancelled,
            EndReason::Completed | EndReason::Timeout => ActivityStatus::Ended,
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_reason_targets() {
        assert_eq!(EndReason::Completed.target_status(), ActivityStatus::Ended);
        assert_eq!(EndReason::Timeout.target_status(), ActivityStatus::Ended);
        assert_eq!(EndReason::Cancelled.target_status(), ActivityStatus::Cancelled);
    }

    #[test]
    fn test_reason_serde_names() {
        let json = serde_json::to_string(&LeaveReason::Disconnect).unwrap();
        assert_eq!(json, "\"disconnect\"");
        let parsed: EndReason = serde_json::from_str("\"timeout\"").unwrap();
        assert_eq!(parsed, EndReason::Timeout);
    }
}
