//! Host-side collaborators.
//!
//! The engine never stores, renders or checks anything on its own. The host
//! plugs these in through [`Collaborators`]:
//!
//! - [`SnapshotStore`] persists activities at shutdown
//! - [`Presenter`] delivers text to participants
//! - [`RequirementCheck`] decides whether a participant meets an activity's
//!   join requirements

use async_trait::async_trait;
use muster_core::{Activity, Attributes, BoxError, ParticipantId};
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

// ============================================================================
// Persistence
// ============================================================================

/// Persists a consistent snapshot of every activity.
#[async_trait]
pub trait SnapshotStore: Send + Sync + 'static {
    /// Save all activities, replacing any previous snapshot.
    async fn save_all(&self, activities: &[Activity]) -> Result<(), BoxError>;
}

/// Keeps the last saved snapshot in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Arc<Mutex<Option<Vec<Activity>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last saved snapshot, if any save happened.
    pub fn last_snapshot(&self) -> Option<Vec<Activity>> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The last snapshot encoded as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.last_snapshot().unwrap_or_default())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save_all(&self, activities: &[Activity]) -> Result<(), BoxError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(activities.to_vec());
        Ok(())
    }
}

// ============================================================================
// Presentation
// ============================================================================

/// Who a message is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// These participants only.
    Participants(Vec<ParticipantId>),
    /// Everyone connected to the host.
    Broadcast,
}

/// Delivers text to participants.
#[async_trait]
pub trait Presenter: Send + Sync + 'static {
    /// Deliver `message` to `audience`.
    async fn deliver(&self, audience: Audience, message: &str);
}

/// Writes every message to the log at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresenter;

#[async_trait]
impl Presenter for TracingPresenter {
    async fn deliver(&self, audience: Audience, message: &str) {
        match audience {
            Audience::Broadcast => tracing::info!(audience = "broadcast", "{message}"),
            Audience::Participants(participants) => {
                tracing::info!(recipients = participants.len(), "{message}")
            }
        }
    }
}

// ============================================================================
// Join requirements
// ============================================================================

/// Decides whether a participant satisfies an activity's requirements.
///
/// Consulted on join before any extension sees the request.
pub trait RequirementCheck: Send + Sync + 'static {
    /// `true` if `participant` may join an activity requiring `requirements`.
    fn check(&self, participant: &ParticipantId, requirements: &Attributes) -> bool;
}

/// Accepts everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl RequirementCheck for AcceptAll {
    fn check(&self, _participant: &ParticipantId, _requirements: &Attributes) -> bool {
        true
    }
}

impl<F> RequirementCheck for F
where
    F: Fn(&ParticipantId, &Attributes) -> bool + Send + Sync + 'static,
{
    fn check(&self, participant: &ParticipantId, requirements: &Attributes) -> bool {
        self(participant, requirements)
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// The collaborators a [`Muster`](crate::Muster) instance talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Shutdown persistence. `None` skips the final save.
    pub store: Option<Arc<dyn SnapshotStore>>,
    /// Message delivery.
    pub presenter: Arc<dyn Presenter>,
    /// Join requirement evaluation.
    pub requirements: Arc<dyn RequirementCheck>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            store: None,
            presenter: Arc::new(TracingPresenter),
            requirements: Arc::new(AcceptAll),
        }
    }
}

impl Collaborators {
    /// Persist to `store` at shutdown.
    pub fn with_store(mut self, store: impl SnapshotStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Deliver messages through `presenter`.
    pub fn with_presenter(mut self, presenter: impl Presenter) -> Self {
        self.presenter = Arc::new(presenter);
        self
    }

    /// Evaluate join requirements with `check`.
    pub fn with_requirement_check(mut self, check: impl RequirementCheck) -> Self {
        self.requirements = Arc::new(check);
        self
    }
}
