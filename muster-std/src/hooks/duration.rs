//! Duration limit - end an active activity once it has run too long.

use muster_core::{EndReason, Extension, NotifyResult, UpdateContext, async_trait};
use std::time::{Duration, SystemTime};

/// Requests an end with [`EndReason::Timeout`] from the update tick once an
/// activity has been active for longer than `limit`.
///
/// Precision is bounded by the tick cadence: an activity ends on the first
/// tick after the limit passes.
#[derive(Debug, Clone)]
pub struct MaxDuration {
    name: String,
    limit: Duration,
}

impl MaxDuration {
    /// End activities that have been active for longer than `limit`.
    pub fn new(limit: Duration) -> Self {
        Self {
            name: "muster.max-duration".to_string(),
            limit,
        }
    }

    /// Override the extension name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn expired(&self, started_at: SystemTime, now: SystemTime) -> bool {
        // A clock that went backwards counts as "not yet".
        now.duration_since(started_at)
            .is_ok_and(|running| running >= self.limit)
    }
}

#[async_trait]
impl Extension for MaxDuration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_activity_update(&self, ctx: &mut UpdateContext<'_>) -> NotifyResult {
        let Some(started_at) = ctx.started_at() else {
            return Ok(());
        };
        if self.expired(started_at, SystemTime::now()) {
            tracing::info!(
                activity = %ctx.id(),
                limit_secs = self.limit.as_secs(),
                "activity exceeded its duration limit"
            );
            ctx.request_end(EndReason::Timeout);
        }
        Ok(())
    }
}
