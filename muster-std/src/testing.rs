//! Testing utilities for Muster.
//!
//! This module provides utilities to make testing extensions and lifecycle
//! flows easier.
//!
//! # Features
//!
//! - [`CallLog`]: A shared, ordered record of callback invocations
//! - [`RecordingExtension`]: An extension that records every callback and
//!   can be programmed to veto, fail, panic, or request an end

use muster_core::{
    ActivityMut, EndReason, Extension, GateResult, LeaveReason, NotifyResult, ParticipantId,
    UpdateContext, Verdict, async_trait,
};
use std::sync::{Arc, Mutex, PoisonError};

// ============================================================================
// Call Log
// ============================================================================

/// An ordered log of `"<extension>:<callback>[:<args>]"` entries.
///
/// Clones share the same log, so one log can be handed to many extensions
/// to observe the global dispatch order.
///
/// # Example
///
/// ```rust,ignore
/// let log = CallLog::new();
/// registry.register_extension(RecordingExtension::new("a", 1, &log))?;
///
/// controller.start(id).await?;
/// assert_eq!(log.entries(), vec!["a:pre_start", "a:started"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    /// A copy of all entries so far.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries whose callback part (after the extension name) equals `callback`.
    pub fn calls_to(&self, callback: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| {
                e.split(':')
                    .nth(1)
                    .is_some_and(|c| c == callback)
            })
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all entries.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

// ============================================================================
// Recording Extension
// ============================================================================

/// An extension that records every callback into a [`CallLog`].
///
/// By default every gate allows and every notify succeeds. Builder methods
/// program vetoes, failures, panics and end requests.
pub struct RecordingExtension {
    name: String,
    priority: i32,
    log: CallLog,
    create: Verdict,
    start: Verdict,
    join: Verdict,
    panic_on: Vec<&'static str>,
    fail_notifies: bool,
    end_on_update: Option<EndReason>,
}

impl RecordingExtension {
    /// Create a permissive recording extension.
    pub fn new(name: impl Into<String>, priority: i32, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            priority,
            log: log.clone(),
            create: Verdict::Allow,
            start: Verdict::Allow,
            join: Verdict::Allow,
            panic_on: Vec::new(),
            fail_notifies: false,
            end_on_update: None,
        }
    }

    /// Veto creation.
    pub fn veto_create(mut self, reason: impl Into<String>) -> Self {
        self.create = Verdict::veto(reason);
        self
    }

    /// Veto start.
    pub fn veto_start(mut self, reason: impl Into<String>) -> Self {
        self.start = Verdict::veto(reason);
        self
    }

    /// Veto joins.
    pub fn veto_join(mut self, reason: impl Into<String>) -> Self {
        self.join = Verdict::veto(reason);
        self
    }

    /// Panic inside the callback labelled `callback` (e.g. `"pre_start"`).
    pub fn panic_on(mut self, callback: &'static str) -> Self {
        self.panic_on.push(callback);
        self
    }

    /// Panic inside the creation gate.
    pub fn panic_on_pre_create(self) -> Self {
        self.panic_on("pre_create")
    }

    /// Return an error from every notify callback.
    pub fn fail_on_notify(mut self) -> Self {
        self.fail_notifies = true;
        self
    }

    /// Request an end with `reason` on every update tick.
    pub fn end_on_update(mut self, reason: EndReason) -> Self {
        self.end_on_update = Some(reason);
        self
    }

    fn enter(&self, callback: &'static str, args: &[&str]) {
        let mut entry = format!("{}:{}", self.name, callback);
        for arg in args {
            entry.push(':');
            entry.push_str(arg);
        }
        self.log.record(entry);

        if self.panic_on.contains(&callback) {
            panic!("{} panicked in {}", self.name, callback);
        }
    }

    fn notified(&self) -> NotifyResult {
        if self.fail_notifies {
            return Err(format!("{} failed on purpose", self.name).into());
        }
        Ok(())
    }
}

#[async_trait]
impl Extension for RecordingExtension {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn on_activity_pre_create(&self, _activity: &mut ActivityMut<'_>) -> GateResult {
        self.enter("pre_create", &[]);
        Ok(self.create.clone())
    }

    async fn on_activity_created(&self, _activity: &mut ActivityMut<'_>) -> NotifyResult {
        self.enter("created", &[]);
        self.notified()
    }

    async fn on_activity_pre_start(&self, _activity: &mut ActivityMut<'_>) -> GateResult {
        self.enter("pre_start", &[]);
        Ok(self.start.clone())
    }

    async fn on_activity_started(&self, _activity: &mut ActivityMut<'_>) -> NotifyResult {
        self.enter("started", &[]);
        self.notified()
    }

    async fn on_activity_ended(
        &self,
        _activity: &mut ActivityMut<'_>,
        reason: EndReason,
    ) -> NotifyResult {
        self.enter("ended", &[reason.as_str()]);
        self.notified()
    }

    async fn on_participant_pre_join(
        &self,
        _activity: &mut ActivityMut<'_>,
        participant: &ParticipantId,
    ) -> GateResult {
        self.enter("pre_join", &[participant.as_str()]);
        Ok(self.join.clone())
    }

    async fn on_participant_joined(
        &self,
        _activity: &mut ActivityMut<'_>,
        participant: &ParticipantId,
    ) -> NotifyResult {
        self.enter("joined", &[participant.as_str()]);
        self.notified()
    }

    async fn on_participant_left(
        &self,
        _activity: &mut ActivityMut<'_>,
        participant: &ParticipantId,
        reason: LeaveReason,
    ) -> NotifyResult {
        self.enter("left", &[participant.as_str(), reason.as_str()]);
        self.notified()
    }

    async fn on_activity_update(&self, ctx: &mut UpdateContext<'_>) -> NotifyResult {
        self.enter("update", &[]);
        if let Some(reason) = self.end_on_update {
            ctx.request_end(reason);
        }
        self.notified()
    }

    async fn on_host_shutdown(&self) -> NotifyResult {
        self.enter("shutdown", &[]);
        self.notified()
    }
}
