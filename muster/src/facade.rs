//! Process-wide access to one installed [`Muster`] instance.
//!
//! For extensions that cannot be handed an `Arc<Muster>` at construction.
//! Every function forwards to the installed instance and fails with
//! [`FacadeError::Unavailable`] when there is none. Nothing is stored here
//! besides the handle, and [`Muster::shutdown`] clears it.
//!
//! Calls made from inside an extension callback get
//! [`MusterError::Reentrant`] for anything that needs the controller.
//!
//! ```rust,ignore
//! muster::facade::install(core.clone());
//!
//! if muster::facade::is_available() {
//!     let races = muster::facade::activities_by_kind("race").await?;
//! }
//! ```

use crate::host::Muster;
use muster_core::{Activity, ActivityId, ActivityKind, Extension, MusterError, NewActivity};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

static INSTALLED: RwLock<Option<Arc<Muster>>> = RwLock::new(None);

/// Errors returned by the facade.
#[derive(Error, Debug)]
pub enum FacadeError {
    /// No instance is installed.
    #[error("no muster instance is installed")]
    Unavailable,

    /// The installed instance rejected the call.
    #[error(transparent)]
    Muster(#[from] MusterError),
}

/// Install `core`, returning the instance it replaces.
pub fn install(core: Arc<Muster>) -> Option<Arc<Muster>> {
    INSTALLED
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(core)
}

/// Remove the installed instance.
pub fn uninstall() -> Option<Arc<Muster>> {
    INSTALLED
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}

/// Clear the handle if it points at `core`.
pub(crate) fn release(core: &Muster) {
    let mut installed = INSTALLED.write().unwrap_or_else(PoisonError::into_inner);
    if installed
        .as_ref()
        .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), core))
    {
        *installed = None;
    }
}

/// Whether an instance is installed and still running.
pub fn is_available() -> bool {
    INSTALLED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .is_some_and(|core| !core.is_shut_down())
}

/// The installed instance.
pub fn instance() -> Result<Arc<Muster>, FacadeError> {
    INSTALLED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(FacadeError::Unavailable)
}

/// Register an extension with the installed instance.
pub fn register<E: Extension>(extension: E) -> Result<(), FacadeError> {
    Ok(instance()?.register(extension)?)
}

/// Unregister an extension from the installed instance.
pub fn unregister(name: &str) -> Result<(), FacadeError> {
    instance()?.unregister(name)?;
    Ok(())
}

/// Copies of every activity of `kind`.
pub async fn activities_by_kind(
    kind: impl Into<ActivityKind>,
) -> Result<Vec<Activity>, FacadeError> {
    let core = instance()?;
    Ok(core.activities_by_kind(kind).await?)
}

/// Create an activity on the installed instance.
pub async fn create_activity(draft: NewActivity) -> Result<ActivityId, FacadeError> {
    let core = instance()?;
    Ok(core.create(draft).await?)
}

/// Deliver `message` to the participants of one activity.
pub async fn broadcast_to_activity(id: ActivityId, message: &str) -> Result<(), FacadeError> {
    let core = instance()?;
    Ok(core.broadcast(id, message).await?)
}
