//! The `Muster` core instance.

use crate::{
    collab::{Audience, Collaborators},
    config::{ConfigError, MusterConfig},
    controller::LifecycleController,
    facade,
};
use futures::lock::{Mutex, MutexGuard};
use muster_core::{
    Activity, ActivityId, ActivityKind, EndReason, Extension, LeaveReason, LifecycleError,
    MusterError, NewActivity, ParticipantId,
};
use muster_std::{ExtensionRegistry, dispatch};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// One engine: a registry, a controller and the host's collaborators.
///
/// Extensions may be registered from any thread at any time. Lifecycle
/// operations are serialized through an async mutex around the
/// [`LifecycleController`], so at most one transition is dispatching at
/// a time.
///
/// Lifecycle operations and queries called from inside an extension callback
/// fail with [`MusterError::Reentrant`], since the controller is held by
/// the dispatch that invoked the callback. Registration and
/// [`announce`](Self::announce) stay available there.
///
/// # Example
///
/// ```rust,ignore
/// let core = Muster::init(MusterConfig::default(), Collaborators::default())?;
/// core.register(MinParticipants::new(2))?;
///
/// let id = core.create(NewActivity::new("Friday Race", "race")).await?;
/// core.join(id, "alice".into()).await?;
/// core.join(id, "bob".into()).await?;
/// core.start(id).await?;
/// ```
pub struct Muster {
    registry: Arc<ExtensionRegistry>,
    controller: Mutex<LifecycleController>,
    collaborators: Collaborators,
    config: MusterConfig,
    shut_down: AtomicBool,
}

impl fmt::Debug for Muster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Muster")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl Muster {
    /// Build an engine after validating `config`.
    pub fn new(config: MusterConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = Arc::new(ExtensionRegistry::new());
        let controller = LifecycleController::new(
            Arc::clone(&registry),
            config.clone(),
            Arc::clone(&collaborators.requirements),
        );

        Ok(Self {
            registry,
            controller: Mutex::new(controller),
            collaborators,
            config,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Build a shared engine.
    pub fn init(
        config: MusterConfig,
        collaborators: Collaborators,
    ) -> Result<Arc<Self>, ConfigError> {
        let core = Arc::new(Self::new(config, collaborators)?);
        tracing::info!(kinds = core.config.kinds.len(), "muster initialized");
        Ok(core)
    }

    /// The configuration in effect.
    pub fn config(&self) -> &MusterConfig {
        &self.config
    }

    /// The extension registry.
    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<(), MusterError> {
        if self.is_shut_down() {
            Err(MusterError::Shutdown)
        } else {
            Ok(())
        }
    }

    fn ensure_not_dispatching(&self) -> Result<(), MusterError> {
        if dispatch::in_callback() {
            tracing::warn!("engine called from inside an extension callback, refusing");
            return Err(MusterError::Reentrant);
        }
        Ok(())
    }

    // ===== Extensions =====

    /// Register an extension.
    pub fn register<E: Extension>(&self, extension: E) -> Result<(), MusterError> {
        self.register_arc(Arc::new(extension))
    }

    /// Register a shared extension.
    pub fn register_arc(&self, extension: Arc<dyn Extension>) -> Result<(), MusterError> {
        self.ensure_running()?;
        Ok(self.registry.register(extension)?)
    }

    /// Unregister an extension by name.
    pub fn unregister(&self, name: &str) -> Result<Arc<dyn Extension>, MusterError> {
        self.ensure_running()?;
        Ok(self.registry.unregister(name)?)
    }

    /// Register every extension submitted with `submit_extension!`.
    #[cfg(feature = "inventory")]
    pub fn register_collected(&self) -> Result<usize, MusterError> {
        self.ensure_running()?;
        Ok(self.registry.register_collected())
    }

    // ===== Lifecycle =====

    /// Exclusive access to the controller for a sequence of operations.
    pub async fn controller(&self) -> Result<MutexGuard<'_, LifecycleController>, MusterError> {
        self.ensure_not_dispatching()?;
        self.ensure_running()?;
        Ok(self.controller.lock().await)
    }

    /// See [`LifecycleController::create`].
    pub async fn create(&self, draft: NewActivity) -> Result<ActivityId, MusterError> {
        Ok(self.controller().await?.create(draft).await?)
    }

    /// See [`LifecycleController::start`].
    pub async fn start(&self, id: ActivityId) -> Result<(), MusterError> {
        Ok(self.controller().await?.start(id).await?)
    }

    /// See [`LifecycleController::join`].
    pub async fn join(&self, id: ActivityId, participant: ParticipantId) -> Result<(), MusterError> {
        Ok(self.controller().await?.join(id, participant).await?)
    }

    /// See [`LifecycleController::leave`].
    pub async fn leave(
        &self,
        id: ActivityId,
        participant: &ParticipantId,
        reason: LeaveReason,
    ) -> Result<(), MusterError> {
        Ok(self.controller().await?.leave(id, participant, reason).await?)
    }

    /// See [`LifecycleController::end`].
    pub async fn end(&self, id: ActivityId, reason: EndReason) -> Result<(), MusterError> {
        Ok(self.controller().await?.end(id, reason).await?)
    }

    /// See [`LifecycleController::cancel`].
    pub async fn cancel(&self, id: ActivityId) -> Result<(), MusterError> {
        Ok(self.controller().await?.cancel(id).await?)
    }

    /// See [`LifecycleController::tick`].
    pub async fn tick(&self, id: ActivityId) -> Result<Option<EndReason>, MusterError> {
        Ok(self.controller().await?.tick(id).await?)
    }

    /// See [`LifecycleController::tick_all`].
    pub async fn tick_all(&self) -> Result<Vec<(ActivityId, EndReason)>, MusterError> {
        Ok(self.controller().await?.tick_all().await)
    }

    /// See [`LifecycleController::prune_finished`].
    pub async fn prune_finished(&self) -> Result<usize, MusterError> {
        Ok(self.controller().await?.prune_finished())
    }

    // ===== Queries =====

    /// A copy of one activity.
    pub async fn get(&self, id: ActivityId) -> Result<Activity, MusterError> {
        self.controller()
            .await?
            .get(id)
            .cloned()
            .ok_or(MusterError::Lifecycle(LifecycleError::NotFound(id)))
    }

    /// Copies of every activity.
    pub async fn list(&self) -> Result<Vec<Activity>, MusterError> {
        Ok(self.controller().await?.snapshot())
    }

    /// Copies of every activity of `kind`.
    pub async fn activities_by_kind(
        &self,
        kind: impl Into<ActivityKind>,
    ) -> Result<Vec<Activity>, MusterError> {
        let kind = kind.into();
        Ok(self.controller().await?.by_kind(&kind).cloned().collect())
    }

    // ===== Presentation =====

    /// Deliver `message` to the participants of one activity.
    pub async fn broadcast(&self, id: ActivityId, message: &str) -> Result<(), MusterError> {
        let participants: Vec<ParticipantId> = {
            let controller = self.controller().await?;
            let activity = controller
                .get(id)
                .ok_or(LifecycleError::NotFound(id))?;
            activity.participants().iter().cloned().collect()
        };
        if participants.is_empty() {
            return Ok(());
        }

        self.collaborators
            .presenter
            .deliver(Audience::Participants(participants), message)
            .await;
        Ok(())
    }

    /// Deliver `message` to everyone connected to the host.
    pub async fn announce(&self, message: &str) -> Result<(), MusterError> {
        self.ensure_running()?;
        self.collaborators
            .presenter
            .deliver(Audience::Broadcast, message)
            .await;
        Ok(())
    }

    // ===== Teardown =====

    /// Shut the engine down.
    ///
    /// Every registered extension receives `on_host_shutdown` exactly once,
    /// the activities are handed to the snapshot store, the registry is
    /// drained and the facade forgets this instance. A second call returns
    /// [`MusterError::Shutdown`]. Called from inside a callback it returns
    /// [`MusterError::Reentrant`] and leaves the engine running.
    ///
    /// A failing store is reported after teardown has completed.
    pub async fn shutdown(&self) -> Result<(), MusterError> {
        self.ensure_not_dispatching()?;
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Err(MusterError::Shutdown);
        }

        let controller = self.controller.lock().await;
        controller.shutdown().await;

        let mut saved = Ok(());
        if let Some(store) = &self.collaborators.store {
            let snapshot = controller.snapshot();
            if let Err(err) = store.save_all(&snapshot).await {
                tracing::error!(error = %err, activities = snapshot.len(), "snapshot save failed");
                saved = Err(MusterError::Custom(err));
            } else {
                tracing::info!(activities = snapshot.len(), "snapshot saved");
            }
        }
        drop(controller);

        let drained = self.registry.drain();
        facade::release(self);
        tracing::info!(extensions = drained.len(), "muster shut down");
        saved
    }
}
