//! # Extension capability trait
//!
//! The contract every extension implements. Each callback has a permissive
//! default, so an extension only overrides what it cares about.
//!
//! Callbacks come in two flavors:
//!
//! - **Gates** return a [`Verdict`]. Any gate may veto the pending
//!   transition; the first veto stops dispatch.
//! - **Notifies** observe a transition that already happened. They cannot
//!   veto and always run for every registered extension.
//!
//! A callback that returns `Err` or panics is a fault. The dispatcher logs
//! it and treats the call as if it had returned the default.
//!
//! # Example
//!
//! ```rust,ignore
//! use muster_core::{async_trait, ActivityMut, BoxError, Extension, Verdict};
//!
//! struct Quorum;
//!
//! #[async_trait]
//! impl Extension for Quorum {
//!     fn name(&self) -> &str {
//!         "quorum"
//!     }
//!
//!     async fn on_activity_pre_start(
//!         &self,
//!         activity: &mut ActivityMut<'_>,
//!     ) -> Result<Verdict, BoxError> {
//!         Ok((activity.participant_count() >= 2).into())
//!     }
//! }
//! ```

use crate::{
    activity::ParticipantId,
    context::{ActivityMut, UpdateContext},
    error::BoxError,
    reason::{EndReason, LeaveReason},
};
use async_trait::async_trait;

/// Priority used when an extension does not override [`Extension::priority`].
pub const DEFAULT_PRIORITY: i32 = 0;

/// Result of a gate callback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Verdict {
    /// Let the transition proceed.
    #[default]
    Allow,
    /// Refuse the transition, optionally explaining why.
    Veto(Option<String>),
}

impl Verdict {
    /// Veto with an explanation.
    pub fn veto(reason: impl Into<String>) -> Self {
        Verdict::Veto(Some(reason.into()))
    }

    /// Whether this verdict lets the transition proceed.
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

impl From<bool> for Verdict {
    fn from(allow: bool) -> Self {
        if allow { Verdict::Allow } else { Verdict::Veto(None) }
    }
}

/// Result type of gate callbacks.
pub type GateResult = Result<Verdict, BoxError>;

/// Result type of notify callbacks.
pub type NotifyResult = Result<(), BoxError>;

/// An independently written participant in activity lifecycle dispatch.
///
/// Extensions are identified by [`name`](Extension::name), which must be
/// unique within a registry, and ordered by [`priority`](Extension::priority)
/// (lower runs earlier).
#[async_trait]
pub trait Extension: Send + Sync + 'static {
    /// Unique identity of this extension.
    fn name(&self) -> &str;

    /// Ordering key; lower values dispatch earlier.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Gate: an activity is about to be created.
    async fn on_activity_pre_create(&self, _activity: &mut ActivityMut<'_>) -> GateResult {
        Ok(Verdict::Allow)
    }

    /// Notify: an activity was created.
    async fn on_activity_created(&self, _activity: &mut ActivityMut<'_>) -> NotifyResult {
        Ok(())
    }

    /// Gate: a scheduled activity is about to start.
    async fn on_activity_pre_start(&self, _activity: &mut ActivityMut<'_>) -> GateResult {
        Ok(Verdict::Allow)
    }

    /// Notify: the activity is now active.
    async fn on_activity_started(&self, _activity: &mut ActivityMut<'_>) -> NotifyResult {
        Ok(())
    }

    /// Notify: the activity ended or was cancelled.
    async fn on_activity_ended(
        &self,
        _activity: &mut ActivityMut<'_>,
        _reason: EndReason,
    ) -> NotifyResult {
        Ok(())
    }

    /// Gate: a participant is about to join.
    ///
    /// Only reached once capacity, duplicate membership and join
    /// requirements have been checked by the controller.
    async fn on_participant_pre_join(
        &self,
        _activity: &mut ActivityMut<'_>,
        _participant: &ParticipantId,
    ) -> GateResult {
        Ok(Verdict::Allow)
    }

    /// Notify: a participant joined.
    async fn on_participant_joined(
        &self,
        _activity: &mut ActivityMut<'_>,
        _participant: &ParticipantId,
    ) -> NotifyResult {
        Ok(())
    }

    /// Notify: a participant left.
    async fn on_participant_left(
        &self,
        _activity: &mut ActivityMut<'_>,
        _participant: &ParticipantId,
        _reason: LeaveReason,
    ) -> NotifyResult {
        Ok(())
    }

    /// Notify: periodic tick while the activity is active.
    async fn on_activity_update(&self, _ctx: &mut UpdateContext<'_>) -> NotifyResult {
        Ok(())
    }

    /// Notify: the host is shutting down. Called once per extension.
    async fn on_host_shutdown(&self) -> NotifyResult {
        Ok(())
    }
}
