//! Error types for Muster.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`MusterError`] - Top-level error type for all Muster operations
//! - [`RegistryError`] - Errors from extension registration
//! - [`LifecycleError`] - Structural rejections and vetoes from the controller
//! - [`ExtensionFault`] - A contained failure inside one extension callback

use crate::{
    activity::{ActivityId, ActivityKind, ParticipantId},
    status::{ActivityStatus, Transition},
};
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all Muster operations.
#[derive(Error, Debug)]
pub enum MusterError {
    /// An error occurred while registering or unregistering an extension.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A lifecycle operation was rejected.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// The core has already been shut down.
    #[error("core has been shut down")]
    Shutdown,

    /// The core was called from inside one of its own extension callbacks.
    ///
    /// The controller is busy with the dispatch that invoked the callback,
    /// so the nested call is refused instead of waiting on itself.
    #[error("core called from inside an extension callback")]
    Reentrant,

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors that can occur when mutating the extension registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An extension with this name is already registered.
    #[error("extension already registered: {0}")]
    DuplicateName(String),

    /// No extension with this name is registered.
    #[error("extension not registered: {0}")]
    NotFound(String),
}

/// Errors returned by lifecycle operations.
///
/// Every variant leaves the activity exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    /// No activity with this id exists.
    #[error("activity not found: {0}")]
    NotFound(ActivityId),

    /// The activity kind is not part of the configured catalog.
    #[error("unknown activity kind: {0}")]
    UnknownKind(ActivityKind),

    /// The requested status change is not an edge of the state machine.
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition {
        /// Current status.
        from: ActivityStatus,
        /// Requested status.
        to: ActivityStatus,
    },

    /// The activity has ended or been cancelled.
    #[error("activity {0} is closed")]
    Closed(ActivityId),

    /// The participant is already a member.
    #[error("participant {0} already joined")]
    AlreadyJoined(ParticipantId),

    /// The participant is not a member.
    #[error("participant {0} is not in the activity")]
    NotParticipant(ParticipantId),

    /// The activity is at capacity.
    #[error("activity is full ({capacity} participants)")]
    Full {
        /// Configured capacity.
        capacity: usize,
    },

    /// The participant does not meet the activity's join requirements.
    #[error("participant {0} does not meet the join requirements")]
    RequirementsUnmet(ParticipantId),

    /// An extension vetoed the transition.
    #[error("{transition} vetoed by extension `{extension}`")]
    Vetoed {
        /// The refused transition.
        transition: Transition,
        /// Name of the vetoing extension.
        extension: String,
        /// Optional explanation supplied by the extension.
        reason: Option<String>,
    },
}

impl LifecycleError {
    /// Returns `true` if this error is a veto rather than a structural rejection.
    pub fn is_veto(&self) -> bool {
        matches!(self, LifecycleError::Vetoed { .. })
    }
}

/// A failure raised by a single extension callback.
///
/// Faults are caught at the dispatch boundary, logged, and normalized to the
/// callback's neutral result. They never reach the lifecycle caller.
#[derive(Error, Debug)]
pub enum ExtensionFault {
    /// The callback panicked.
    #[error("callback panicked: {0}")]
    Panic(String),

    /// The callback returned an error.
    #[error(transparent)]
    Failed(BoxError),
}

impl ExtensionFault {
    /// Build a fault from a panic payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ExtensionFault::Panic(message)
    }
}

impl From<BoxError> for ExtensionFault {
    fn from(err: BoxError) -> Self {
        ExtensionFault::Failed(err)
    }
}

impl From<BoxError> for MusterError {
    fn from(err: BoxError) -> Self {
        MusterError::Custom(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_str() {
        let fault = ExtensionFault::from_panic(Box::new("boom"));
        assert_eq!(fault.to_string(), "callback panicked: boom");
    }

    #[test]
    fn test_panic_payload_string() {
        let fault = ExtensionFault::from_panic(Box::new(String::from("kaboom")));
        assert!(matches!(fault, ExtensionFault::Panic(ref m) if m == "kaboom"));
    }

    #[test]
    fn test_panic_payload_opaque() {
        let fault = ExtensionFault::from_panic(Box::new(42_u8));
        assert!(matches!(fault, ExtensionFault::Panic(ref m) if m == "non-string panic payload"));
    }

    #[test]
    fn test_reentrant_message() {
        assert_eq!(
            MusterError::Reentrant.to_string(),
            "core called from inside an extension callback"
        );
    }

    #[test]
    fn test_veto_is_not_structural() {
        let veto = LifecycleError::Vetoed {
            transition: Transition::Start,
            extension: "quorum".into(),
            reason: None,
        };
        assert!(veto.is_veto());
        assert!(!LifecycleError::Full { capacity: 2 }.is_veto());
        assert_eq!(veto.to_string(), "start vetoed by extension `quorum`");
    }
}
