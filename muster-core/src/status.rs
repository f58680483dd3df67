//! Activity state machine.
//!
//! ```text
//! Scheduled ──▶ Active ──▶ Ended
//!     │           │
//!     └──────┬────┘
//!            ▼
//!        Cancelled
//! ```
//!
//! `Ended` and `Cancelled` are terminal; no edge re-enters `Scheduled`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Created, waiting to start.
    Scheduled,
    /// Running.
    Active,
    /// Finished.
    Ended,
    /// Stopped before finishing.
    Cancelled,
}

impl ActivityStatus {
    /// Whether `self → next` is an edge of the state machine.
    pub fn can_transition_to(self, next: ActivityStatus) -> bool {
        use ActivityStatus::{Active, Cancelled, Ended, Scheduled};
        matches!(
            (self, next),
            (Scheduled, Active) | (Active, Ended) | (Scheduled, Cancelled) | (Active, Cancelled)
        )
    }

    /// Terminal states accept no further transitions, joins or leaves.
    pub fn is_terminal(self) -> bool {
        matches!(self, ActivityStatus::Ended | ActivityStatus::Cancelled)
    }

    /// Lower-case name used in logs and snapshots.
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Scheduled => "scheduled",
            ActivityStatus::Active => "active",
            ActivityStatus::Ended => "ended",
            ActivityStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle operation, used to label vetoes and log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Activity creation.
    Create,
    /// `Scheduled → Active`.
    Start,
    /// Participant join.
    Join,
    /// Participant leave.
    Leave,
    /// `→ Ended` or `→ Cancelled`.
    End,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transition::Create => "create",
            Transition::Start => "start",
            Transition::Join => "join",
            Transition::Leave => "leave",
            Transition::End => "end",
        })
    }
}
