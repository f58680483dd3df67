//! The activity state machine, driven through the dispatcher.
//!
//! Every forward edge follows the same shape: structural checks, gate,
//! mutate, notify. A rejection at any step before the mutation leaves the
//! activity untouched. Leaves and ends have no gate.

use crate::{collab::RequirementCheck, config::MusterConfig};
use muster_core::{
    Activity, ActivityId, ActivityKind, ActivityStatus, EndReason, LeaveReason, LifecycleError,
    NewActivity, ParticipantId, Transition,
};
use muster_std::{Dispatcher, ExtensionRegistry};
use std::{collections::BTreeMap, fmt, sync::Arc, time::SystemTime};

/// Owns every activity and applies lifecycle transitions to them.
///
/// Not synchronized: one caller at a time. [`Muster`](crate::Muster) wraps
/// it in an async mutex.
pub struct LifecycleController {
    activities: BTreeMap<ActivityId, Activity>,
    dispatcher: Dispatcher,
    config: MusterConfig,
    requirements: Arc<dyn RequirementCheck>,
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("activities", &self.activities.len())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl LifecycleController {
    /// Create a controller dispatching to `registry`.
    pub fn new(
        registry: Arc<ExtensionRegistry>,
        config: MusterConfig,
        requirements: Arc<dyn RequirementCheck>,
    ) -> Self {
        let dispatcher = Dispatcher::new(registry, config.dispatch_config());
        Self {
            activities: BTreeMap::new(),
            dispatcher,
            config,
            requirements,
        }
    }

    /// The dispatcher used for every transition.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // ===== Transitions =====

    /// Create a `Scheduled` activity.
    ///
    /// The creation gate sees the activity before it is stored; a veto
    /// discards it.
    pub async fn create(&mut self, draft: NewActivity) -> Result<ActivityId, LifecycleError> {
        if !self.config.is_known_kind(&draft.kind) {
            return Err(LifecycleError::UnknownKind(draft.kind));
        }

        let mut activity = Activity::new(draft, self.config.default_capacity);
        self.dispatcher
            .pre_create(&mut activity)
            .await
            .into_result(Transition::Create)?;

        let id = activity.id();
        let activity = self.activities.entry(id).or_insert(activity);
        tracing::info!(activity = %id, kind = %activity.kind(), name = activity.name(), "activity created");

        self.dispatcher.created(activity).await;
        Ok(id)
    }

    /// Move a `Scheduled` activity to `Active`.
    pub async fn start(&mut self, id: ActivityId) -> Result<(), LifecycleError> {
        let activity = self
            .activities
            .get_mut(&id)
            .ok_or(LifecycleError::NotFound(id))?;
        activity.ensure_transition(ActivityStatus::Active)?;

        self.dispatcher
            .pre_start(activity)
            .await
            .into_result(Transition::Start)?;

        activity.begin(SystemTime::now())?;
        tracing::info!(activity = %id, participants = activity.participant_count(), "activity started");

        self.dispatcher.started(activity).await;
        Ok(())
    }

    /// Add a participant.
    ///
    /// Structural checks and the requirement check run first, so a join
    /// that could never succeed is not shown to any extension.
    pub async fn join(
        &mut self,
        id: ActivityId,
        participant: ParticipantId,
    ) -> Result<(), LifecycleError> {
        let activity = self
            .activities
            .get_mut(&id)
            .ok_or(LifecycleError::NotFound(id))?;
        activity.ensure_joinable(&participant)?;
        if !self.requirements.check(&participant, activity.requirements()) {
            return Err(LifecycleError::RequirementsUnmet(participant));
        }

        self.dispatcher
            .pre_join(activity, &participant)
            .await
            .into_result(Transition::Join)?;

        activity.add_participant(participant.clone())?;
        tracing::info!(activity = %id, participant = %participant, "participant joined");

        self.dispatcher
            .joined(activity, &participant)
            .await;
        Ok(())
    }

    /// Remove a participant. Leaves cannot be vetoed.
    pub async fn leave(
        &mut self,
        id: ActivityId,
        participant: &ParticipantId,
        reason: LeaveReason,
    ) -> Result<(), LifecycleError> {
        let activity = self
            .activities
            .get_mut(&id)
            .ok_or(LifecycleError::NotFound(id))?;
        activity.remove_participant(participant)?;
        tracing::info!(activity = %id, participant = %participant, %reason, "participant left");

        self.dispatcher
            .left(activity, participant, reason)
            .await;
        Ok(())
    }

    /// End an activity. Ends cannot be vetoed.
    ///
    /// [`EndReason::Cancelled`] moves to `Cancelled`, the other reasons to
    /// `Ended`, which is only reachable from `Active`.
    pub async fn end(&mut self, id: ActivityId, reason: EndReason) -> Result<(), LifecycleError> {
        let activity = self
            .activities
            .get_mut(&id)
            .ok_or(LifecycleError::NotFound(id))?;
        activity.finish(reason, SystemTime::now())?;
        tracing::info!(activity = %id, %reason, "activity ended");

        self.dispatcher
            .ended(activity, reason)
            .await;
        Ok(())
    }

    /// Cancel a scheduled or active activity.
    pub async fn cancel(&mut self, id: ActivityId) -> Result<(), LifecycleError> {
        self.end(id, EndReason::Cancelled).await
    }

    // ===== Update ticks =====

    /// Run one update tick for an `Active` activity.
    ///
    /// Returns the end reason if an extension asked to end the activity
    /// during the tick. Activities in any other status are skipped.
    pub async fn tick(&mut self, id: ActivityId) -> Result<Option<EndReason>, LifecycleError> {
        let activity = self
            .activities
            .get_mut(&id)
            .ok_or(LifecycleError::NotFound(id))?;
        if activity.status() != ActivityStatus::Active {
            return Ok(None);
        }

        let Some(request) = self.dispatcher.update(activity).await else {
            return Ok(None);
        };

        tracing::info!(
            activity = %id,
            reason = %request.reason,
            requested_by = %request.requested_by,
            "end requested during update"
        );
        self.end(id, request.reason).await?;
        Ok(Some(request.reason))
    }

    /// Tick every `Active` activity in id order.
    ///
    /// Returns the activities that ended during this pass.
    pub async fn tick_all(&mut self) -> Vec<(ActivityId, EndReason)> {
        let active: Vec<ActivityId> = self
            .activities
            .values()
            .filter(|a| a.status() == ActivityStatus::Active)
            .map(Activity::id)
            .collect();

        let mut ended = Vec::new();
        for id in active {
            match self.tick(id).await {
                Ok(Some(reason)) => ended.push((id, reason)),
                Ok(None) => {}
                Err(err) => tracing::warn!(activity = %id, error = %err, "update tick failed"),
            }
        }
        ended
    }

    // ===== Controller-only edits =====

    /// Rename an activity.
    pub fn rename(&mut self, id: ActivityId, name: impl Into<String>) -> Result<(), LifecycleError> {
        self.activities
            .get_mut(&id)
            .ok_or(LifecycleError::NotFound(id))?
            .rename(name);
        Ok(())
    }

    /// Replace an activity's description.
    pub fn set_description(
        &mut self,
        id: ActivityId,
        description: impl Into<String>,
    ) -> Result<(), LifecycleError> {
        self.activities
            .get_mut(&id)
            .ok_or(LifecycleError::NotFound(id))?
            .set_description(description);
        Ok(())
    }

    // ===== Queries =====

    /// Look up an activity.
    pub fn get(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.get(&id)
    }

    /// Every activity, in id order.
    pub fn list(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    /// Activities of one kind.
    pub fn by_kind<'a>(&'a self, kind: &'a ActivityKind) -> impl Iterator<Item = &'a Activity> {
        self.activities.values().filter(move |a| a.kind() == kind)
    }

    /// Activities in one status.
    pub fn by_status(&self, status: ActivityStatus) -> impl Iterator<Item = &Activity> {
        self.activities.values().filter(move |a| a.status() == status)
    }

    /// Owned copies of every activity.
    pub fn snapshot(&self) -> Vec<Activity> {
        self.activities.values().cloned().collect()
    }

    /// Number of activities held.
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    /// Whether no activities are held.
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Drop every `Ended` or `Cancelled` activity. Returns how many went.
    pub fn prune_finished(&mut self) -> usize {
        let before = self.activities.len();
        self.activities.retain(|_, a| !a.status().is_terminal());
        let pruned = before - self.activities.len();
        if pruned > 0 {
            tracing::debug!(pruned, "finished activities pruned");
        }
        pruned
    }

    /// Announce host shutdown to every extension.
    pub async fn shutdown(&self) {
        tracing::info!(activities = self.activities.len(), "shutting down extensions");
        self.dispatcher.shutdown().await;
    }
}
