//! The activity entity whose lifecycle extensions gate and observe.
//!
//! Mutating methods on [`Activity`] belong to the lifecycle controller.
//! Extensions never receive `&mut Activity`; they get an
//! [`ActivityMut`](crate::ActivityMut), which only opens the `metadata` and
//! `requirements` maps for writing.

use crate::{
    error::LifecycleError,
    reason::EndReason,
    status::ActivityStatus,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    time::SystemTime,
};
use uuid::Uuid;

/// Free-form extension data keyed by (conventionally namespaced) strings.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Unique, immutable activity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(Uuid);

impl ActivityId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing uuid (restoring a snapshot).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque participant identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a participant id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Activity kind name. The set of valid kinds comes from configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityKind(String);

impl ActivityKind {
    /// Create a kind. Kind names are case-insensitive and stored lower-case.
    pub fn new(kind: impl AsRef<str>) -> Self {
        Self(kind.as_ref().trim().to_ascii_lowercase())
    }

    /// The kind as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActivityKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

/// Parameters for creating an activity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    /// Display name.
    pub name: String,
    /// Kind, validated against the configured catalog.
    pub kind: ActivityKind,
    /// Display description.
    pub description: String,
    /// Participant limit; the configured default applies when `None`.
    pub capacity: Option<usize>,
    /// Scheduled start time, if any.
    pub start_time: Option<SystemTime>,
}

impl NewActivity {
    /// Describe a new activity with the given name and kind.
    pub fn new(name: impl Into<String>, kind: impl Into<ActivityKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            description: String::new(),
            capacity: None,
            start_time: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the participant limit.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Schedule the start.
    pub fn with_start_time(mut self, start_time: SystemTime) -> Self {
        self.start_time = Some(start_time);
        self
    }
}

/// A shared, long-lived activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    id: ActivityId,
    name: String,
    description: String,
    kind: ActivityKind,
    status: ActivityStatus,
    capacity: usize,
    participants: BTreeSet<ParticipantId>,
    #[serde(default)]
    metadata: Attributes,
    #[serde(default)]
    requirements: Attributes,
    created_at: SystemTime,
    start_time: Option<SystemTime>,
    started_at: Option<SystemTime>,
    ended_at: Option<SystemTime>,
    end_reason: Option<EndReason>,
}

impl Activity {
    /// Build a `Scheduled` activity from creation parameters.
    pub fn new(draft: NewActivity, default_capacity: usize) -> Self {
        Self {
            id: ActivityId::new(),
            name: draft.name,
            description: draft.description,
            kind: draft.kind,
            status: ActivityStatus::Scheduled,
            capacity: draft.capacity.unwrap_or(default_capacity),
            participants: BTreeSet::new(),
            metadata: Attributes::new(),
            requirements: Attributes::new(),
            created_at: SystemTime::now(),
            start_time: draft.start_time,
            started_at: None,
            ended_at: None,
            end_reason: None,
        }
    }

    // ===== Getters =====

    /// Activity id.
    pub fn id(&self) -> ActivityId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Activity kind.
    pub fn kind(&self) -> &ActivityKind {
        &self.kind
    }

    /// Current status.
    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    /// Participant limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current members.
    pub fn participants(&self) -> &BTreeSet<ParticipantId> {
        &self.participants
    }

    /// Number of members.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Whether `participant` is a member.
    pub fn has_participant(&self, participant: &ParticipantId) -> bool {
        self.participants.contains(participant)
    }

    /// Whether the activity is at capacity.
    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.capacity
    }

    /// Extension-private data.
    pub fn metadata(&self) -> &Attributes {
        &self.metadata
    }

    /// Join preconditions.
    pub fn requirements(&self) -> &Attributes {
        &self.requirements
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Scheduled start time.
    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    /// When the activity actually went `Active`.
    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    /// When the activity reached a terminal state.
    pub fn ended_at(&self) -> Option<SystemTime> {
        self.ended_at
    }

    /// Reason recorded when the activity ended.
    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    // ===== Controller mutations =====

    /// Rename the activity.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replace the description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut Attributes {
        &mut self.metadata
    }

    pub(crate) fn requirements_mut(&mut self) -> &mut Attributes {
        &mut self.requirements
    }

    /// Check that `next` is reachable from the current status.
    pub fn ensure_transition(&self, next: ActivityStatus) -> Result<(), LifecycleError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(LifecycleError::IllegalTransition {
                from: self.status,
                to: next,
            })
        }
    }

    /// Move `Scheduled → Active`, stamping `started_at`.
    pub fn begin(&mut self, now: SystemTime) -> Result<(), LifecycleError> {
        self.ensure_transition(ActivityStatus::Active)?;
        self.status = ActivityStatus::Active;
        self.started_at = Some(now);
        Ok(())
    }

    /// Move into the terminal status implied by `reason`.
    pub fn finish(&mut self, reason: EndReason, now: SystemTime) -> Result<(), LifecycleError> {
        self.ensure_transition(reason.target_status())?;
        self.status = reason.target_status();
        self.ended_at = Some(now);
        self.end_reason = Some(reason);
        Ok(())
    }

    /// Structural join checks: open, not a member, not full.
    pub fn ensure_joinable(&self, participant: &ParticipantId) -> Result<(), LifecycleError> {
        if self.status.is_terminal() {
            return Err(LifecycleError::Closed(self.id));
        }
        if self.participants.contains(participant) {
            return Err(LifecycleError::AlreadyJoined(participant.clone()));
        }
        if self.is_full() {
            return Err(LifecycleError::Full {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Add a member after [`ensure_joinable`](Self::ensure_joinable) passes.
    pub fn add_participant(&mut self, participant: ParticipantId) -> Result<(), LifecycleError> {
        self.ensure_joinable(&participant)?;
        self.participants.insert(participant);
        Ok(())
    }

    /// Remove a member of an open activity.
    pub fn remove_participant(&mut self, participant: &ParticipantId) -> Result<(), LifecycleError> {
        if self.status.is_terminal() {
            return Err(LifecycleError::Closed(self.id));
        }
        if !self.participants.remove(participant) {
            return Err(LifecycleError::NotParticipant(participant.clone()));
        }
        Ok(())
    }
}
