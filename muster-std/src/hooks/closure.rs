//! Closure-backed extensions.
//!
//! [`FnExtension`] is an extension assembled from optional closures, one per
//! callback. Unset callbacks keep the permissive defaults. Handy for small
//! policies and for tests.
//!
//! ```rust,ignore
//! let quorum = FnExtension::new("quorum")
//!     .with_priority(10)
//!     .on_pre_start(|activity| activity.participant_count() >= 2);
//! registry.register_extension(quorum)?;
//! ```

use muster_core::{
    ActivityMut, EndReason, Extension, GateResult, LeaveReason, NotifyResult, ParticipantId,
    UpdateContext, Verdict, async_trait,
};
use std::fmt;

type GateFn = Box<dyn Fn(&mut ActivityMut<'_>) -> Verdict + Send + Sync>;
type JoinGateFn = Box<dyn Fn(&mut ActivityMut<'_>, &ParticipantId) -> Verdict + Send + Sync>;
type NotifyFn = Box<dyn Fn(&mut ActivityMut<'_>) + Send + Sync>;
type EndedFn = Box<dyn Fn(&mut ActivityMut<'_>, EndReason) + Send + Sync>;
type MemberFn = Box<dyn Fn(&mut ActivityMut<'_>, &ParticipantId) + Send + Sync>;
type LeftFn = Box<dyn Fn(&mut ActivityMut<'_>, &ParticipantId, LeaveReason) + Send + Sync>;
type UpdateFn = Box<dyn Fn(&mut UpdateContext<'_>) + Send + Sync>;
type ShutdownFn = Box<dyn Fn() + Send + Sync>;

/// An extension built from closures.
pub struct FnExtension {
    name: String,
    priority: i32,
    pre_create: Option<GateFn>,
    created: Option<NotifyFn>,
    pre_start: Option<GateFn>,
    started: Option<NotifyFn>,
    ended: Option<EndedFn>,
    pre_join: Option<JoinGateFn>,
    joined: Option<MemberFn>,
    left: Option<LeftFn>,
    update: Option<UpdateFn>,
    shutdown: Option<ShutdownFn>,
}

impl fmt::Debug for FnExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnExtension")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl FnExtension {
    /// An extension with every callback at its default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: muster_core::DEFAULT_PRIORITY,
            pre_create: None,
            created: None,
            pre_start: None,
            started: None,
            ended: None,
            pre_join: None,
            joined: None,
            left: None,
            update: None,
            shutdown: None,
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Gate creation.
    pub fn on_pre_create<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&mut ActivityMut<'_>) -> R + Send + Sync + 'static,
        R: Into<Verdict>,
    {
        self.pre_create = Some(Box::new(move |a: &mut ActivityMut<'_>| f(a).into()));
        self
    }

    /// Observe creation.
    pub fn on_created<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ActivityMut<'_>) + Send + Sync + 'static,
    {
        self.created = Some(Box::new(f));
        self
    }

    /// Gate start.
    pub fn on_pre_start<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&mut ActivityMut<'_>) -> R + Send + Sync + 'static,
        R: Into<Verdict>,
    {
        self.pre_start = Some(Box::new(move |a: &mut ActivityMut<'_>| f(a).into()));
        self
    }

    /// Observe start.
    pub fn on_started<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ActivityMut<'_>) + Send + Sync + 'static,
    {
        self.started = Some(Box::new(f));
        self
    }

    /// Observe end.
    pub fn on_ended<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ActivityMut<'_>, EndReason) + Send + Sync + 'static,
    {
        self.ended = Some(Box::new(f));
        self
    }

    /// Gate joins.
    pub fn on_pre_join<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&mut ActivityMut<'_>, &ParticipantId) -> R + Send + Sync + 'static,
        R: Into<Verdict>,
    {
        self.pre_join = Some(Box::new(
            move |a: &mut ActivityMut<'_>, p: &ParticipantId| f(a, p).into(),
        ));
        self
    }

    /// Observe joins.
    pub fn on_joined<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ActivityMut<'_>, &ParticipantId) + Send + Sync + 'static,
    {
        self.joined = Some(Box::new(f));
        self
    }

    /// Observe leaves.
    pub fn on_left<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ActivityMut<'_>, &ParticipantId, LeaveReason) + Send + Sync + 'static,
    {
        self.left = Some(Box::new(f));
        self
    }

    /// Observe update ticks.
    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut UpdateContext<'_>) + Send + Sync + 'static,
    {
        self.update = Some(Box::new(f));
        self
    }

    /// Observe host shutdown.
    pub fn on_shutdown<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shutdown = Some(Box::new(f));
        self
    }
}

#[async_trait]
impl Extension for FnExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn on_activity_pre_create(&self, activity: &mut ActivityMut<'_>) -> GateResult {
        Ok(self.pre_create.as_ref().map_or(Verdict::Allow, |f| f(activity)))
    }

    async fn on_activity_created(&self, activity: &mut ActivityMut<'_>) -> NotifyResult {
        if let Some(f) = &self.created {
            f(activity);
        }
        Ok(())
    }

    async fn on_activity_pre_start(&self, activity: &mut ActivityMut<'_>) -> GateResult {
        Ok(self.pre_start.as_ref().map_or(Verdict::Allow, |f| f(activity)))
    }

    async fn on_activity_started(&self, activity: &mut ActivityMut<'_>) -> NotifyResult {
        if let Some(f) = &self.started {
            f(activity);
        }
        Ok(())
    }

    async fn on_activity_ended(
        &self,
        activity: &mut ActivityMut<'_>,
        reason: EndReason,
    ) -> NotifyResult {
        if let Some(f) = &self.ended {
            f(activity, reason);
        }
        Ok(())
    }

    async fn on_participant_pre_join(
        &self,
        activity: &mut ActivityMut<'_>,
        participant: &ParticipantId,
    ) -> GateResult {
        Ok(self
            .pre_join
            .as_ref()
            .map_or(Verdict::Allow, |f| f(activity, participant)))
    }

    async fn on_participant_joined(
        &self,
        activity: &mut ActivityMut<'_>,
        participant: &ParticipantId,
    ) -> NotifyResult {
        if let Some(f) = &self.joined {
            f(activity, participant);
        }
        Ok(())
    }

    async fn on_participant_left(
        &self,
        activity: &mut ActivityMut<'_>,
        participant: &ParticipantId,
        reason: LeaveReason,
    ) -> NotifyResult {
        if let Some(f) = &self.left {
            f(activity, participant, reason);
        }
        Ok(())
    }

    async fn on_activity_update(&self, ctx: &mut UpdateContext<'_>) -> NotifyResult {
        if let Some(f) = &self.update {
            f(ctx);
        }
        Ok(())
    }

    async fn on_host_shutdown(&self) -> NotifyResult {
        if let Some(f) = &self.shutdown {
            f();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_core::{Activity, NewActivity};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[tokio::test]
    async fn test_unset_callbacks_are_permissive() {
        let ext = FnExtension::new("empty");
        let mut activity = Activity::new(NewActivity::new("Arena", "pvp"), 4);
        let mut view = ActivityMut::new(&mut activity);
        assert!(ext.on_activity_pre_start(&mut view).await.unwrap().is_allow());
        assert!(ext.on_activity_started(&mut view).await.is_ok());
    }

    #[tokio::test]
    async fn test_closures_are_invoked() {
        let joins = Arc::new(AtomicUsize::new(0));
        let counter = joins.clone();
        let ext = FnExtension::new("policy")
            .on_pre_join(|_, p: &ParticipantId| p.as_str() != "banned")
            .on_joined(move |activity, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                activity.set_metadata("policy.seen", true);
            });

        let mut activity = Activity::new(NewActivity::new("Arena", "pvp"), 4);
        let mut view = ActivityMut::new(&mut activity);

        let verdict = ext
            .on_participant_pre_join(&mut view, &"banned".into())
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Veto(None));

        ext.on_participant_joined(&mut view, &"p1".into()).await.unwrap();
        assert_eq!(joins.load(Ordering::SeqCst), 1);
        assert_eq!(view.metadata()["policy.seen"], serde_json::json!(true));
    }
}
