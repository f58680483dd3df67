//! Logging extension - observability for lifecycle dispatch.

use muster_core::{
    ActivityMut, EndReason, Extension, LeaveReason, NotifyResult, ParticipantId, UpdateContext,
    async_trait,
};

/// An extension that logs every lifecycle notification.
///
/// It never vetoes and defaults to the lowest priority value, so it
/// observes each transition before any other extension.
///
/// # Example
///
/// ```rust,ignore
/// use muster_std::hooks::LoggingExtension;
///
/// registry.register_extension(LoggingExtension::new())?;
/// // or with a custom name, when several loggers are registered
/// registry.register_extension(LoggingExtension::named("audit"))?;
/// ```
#[derive(Debug, Clone)]
pub struct LoggingExtension {
    name: String,
    priority: i32,
}

impl LoggingExtension {
    /// Create a logger named `muster.logging`.
    pub fn new() -> Self {
        Self::named("muster.logging")
    }

    /// Create a logger with a custom name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: i32::MIN,
        }
    }

    /// Override the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for LoggingExtension {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extension for LoggingExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn on_activity_created(&self, activity: &mut ActivityMut<'_>) -> NotifyResult {
        tracing::debug!(
            logger = %self.name,
            activity = %activity.id(),
            name = activity.name(),
            kind = %activity.kind(),
            "activity created"
        );
        Ok(())
    }

    async fn on_activity_started(&self, activity: &mut ActivityMut<'_>) -> NotifyResult {
        tracing::debug!(
            logger = %self.name,
            activity = %activity.id(),
            participants = activity.participant_count(),
            "activity started"
        );
        Ok(())
    }

    async fn on_activity_ended(
        &self,
        activity: &mut ActivityMut<'_>,
        reason: EndReason,
    ) -> NotifyResult {
        tracing::debug!(
            logger = %self.name,
            activity = %activity.id(),
            status = %activity.status(),
            %reason,
            "activity ended"
        );
        Ok(())
    }

    async fn on_participant_joined(
        &self,
        activity: &mut ActivityMut<'_>,
        participant: &ParticipantId,
    ) -> NotifyResult {
        tracing::debug!(
            logger = %self.name,
            activity = %activity.id(),
            %participant,
            "participant joined"
        );
        Ok(())
    }

    async fn on_participant_left(
        &self,
        activity: &mut ActivityMut<'_>,
        participant: &ParticipantId,
        reason: LeaveReason,
    ) -> NotifyResult {
        tracing::debug!(
            logger = %self.name,
            activity = %activity.id(),
            %participant,
            %reason,
            "participant left"
        );
        Ok(())
    }

    async fn on_activity_update(&self, ctx: &mut UpdateContext<'_>) -> NotifyResult {
        tracing::trace!(logger = %self.name, activity = %ctx.id(), "activity tick");
        Ok(())
    }

    async fn on_host_shutdown(&self) -> NotifyResult {
        tracing::debug!(logger = %self.name, "host shutting down");
        Ok(())
    }
}
