//! Views of an activity handed to extension callbacks.
//!
//! Extensions may read the whole activity but may only write the
//! `metadata` and `requirements` maps. Status, names, timestamps and
//! membership stay with the lifecycle controller.

use crate::{
    activity::{Activity, Attributes},
    reason::EndReason,
};
use std::ops::Deref;

/// Restricted mutable access to an activity.
#[derive(Debug)]
pub struct ActivityMut<'a> {
    activity: &'a mut Activity,
}

impl<'a> ActivityMut<'a> {
    /// Wrap an activity for one callback.
    pub fn new(activity: &'a mut Activity) -> Self {
        Self { activity }
    }

    /// Extension-private data, writable.
    pub fn metadata_mut(&mut self) -> &mut Attributes {
        self.activity.metadata_mut()
    }

    /// Join preconditions, writable.
    pub fn requirements_mut(&mut self) -> &mut Attributes {
        self.activity.requirements_mut()
    }

    /// Insert one metadata entry, returning the previous value.
    pub fn set_metadata(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.activity.metadata_mut().insert(key.into(), value.into())
    }

    /// Insert one requirement, returning the previous value.
    pub fn set_requirement(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.activity.requirements_mut().insert(key.into(), value.into())
    }
}

impl Deref for ActivityMut<'_> {
    type Target = Activity;

    fn deref(&self) -> &Self::Target {
        self.activity
    }
}

/// Context for the periodic update callback.
///
/// Besides restricted write access to the activity it carries the one
/// privileged action available during a tick: asking the controller to end
/// the activity once every extension has observed the tick.
///
/// The dispatcher builds a fresh context for every extension call, so
/// whatever one extension does to its context never reaches the next.
#[derive(Debug)]
pub struct UpdateContext<'a> {
    activity: &'a mut Activity,
    earlier: Option<EndReason>,
    requested: Option<EndReason>,
}

/// An end requested from an update tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndRequest {
    /// Reason to record.
    pub reason: EndReason,
    /// Name of the requesting extension.
    pub requested_by: String,
}

impl<'a> UpdateContext<'a> {
    /// Wrap an activity for an update tick with no request recorded yet.
    pub fn new(activity: &'a mut Activity) -> Self {
        Self::after(activity, None)
    }

    /// Wrap an activity for an update tick in which an earlier extension
    /// already asked for `earlier`.
    pub fn after(activity: &'a mut Activity, earlier: Option<EndReason>) -> Self {
        Self {
            activity,
            earlier,
            requested: None,
        }
    }

    /// Extension-private data, writable.
    pub fn metadata_mut(&mut self) -> &mut Attributes {
        self.activity.metadata_mut()
    }

    /// Join preconditions, writable.
    pub fn requirements_mut(&mut self) -> &mut Attributes {
        self.activity.requirements_mut()
    }

    /// Insert one metadata entry, returning the previous value.
    pub fn set_metadata(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.activity.metadata_mut().insert(key.into(), value.into())
    }

    /// Insert one requirement, returning the previous value.
    pub fn set_requirement(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.activity.requirements_mut().insert(key.into(), value.into())
    }

    /// Ask the controller to end the activity after this tick.
    ///
    /// The first request wins; returns `false` if one was already recorded,
    /// by this extension or an earlier one.
    pub fn request_end(&mut self, reason: EndReason) -> bool {
        if self.pending_end().is_some() {
            return false;
        }
        self.requested = Some(reason);
        true
    }

    /// The request that will be applied after the tick, if any.
    pub fn pending_end(&self) -> Option<EndReason> {
        self.earlier.or(self.requested)
    }

    /// Consume the context, yielding the request made through it.
    ///
    /// A request recorded by an earlier extension is not repeated here.
    pub fn into_requested_end(self) -> Option<EndReason> {
        self.requested
    }
}

impl Deref for UpdateContext<'_> {
    type Target = Activity;

    fn deref(&self) -> &Self::Target {
        self.activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::NewActivity;

    #[test]
    fn test_activity_mut_writes_metadata_only() {
        let mut activity = Activity::new(NewActivity::new("Hunt", "hunt"), 4);
        let mut view = ActivityMut::new(&mut activity);
        view.set_metadata("scoreboard.enabled", true);
        view.set_requirement("min_level", 10);
        assert_eq!(view.name(), "Hunt");
        drop(view);
        assert_eq!(activity.metadata()["scoreboard.enabled"], serde_json::json!(true));
        assert_eq!(activity.requirements()["min_level"], serde_json::json!(10));
    }

    #[test]
    fn test_update_context_writes_metadata() {
        let mut activity = Activity::new(NewActivity::new("Hunt", "hunt"), 4);
        let mut ctx = UpdateContext::new(&mut activity);
        ctx.set_metadata("hunt.ticks", 1);
        ctx.requirements_mut().insert("min_level".into(), serde_json::json!(2));
        assert_eq!(ctx.kind().as_str(), "hunt");
        drop(ctx);
        assert_eq!(activity.metadata()["hunt.ticks"], serde_json::json!(1));
        assert_eq!(activity.requirements()["min_level"], serde_json::json!(2));
    }

    #[test]
    fn test_first_end_request_wins() {
        let mut activity = Activity::new(NewActivity::new("Hunt", "hunt"), 4);
        let mut ctx = UpdateContext::new(&mut activity);
        assert!(ctx.request_end(EndReason::Timeout));
        assert!(!ctx.request_end(EndReason::Completed));
        assert_eq!(ctx.into_requested_end(), Some(EndReason::Timeout));
    }

    #[test]
    fn test_earlier_request_cannot_be_replaced() {
        let mut activity = Activity::new(NewActivity::new("Hunt", "hunt"), 4);
        let mut ctx = UpdateContext::after(&mut activity, Some(EndReason::Timeout));
        assert!(!ctx.request_end(EndReason::Cancelled));
        assert_eq!(ctx.pending_end(), Some(EndReason::Timeout));
        assert_eq!(ctx.into_requested_end(), None);
    }
}
