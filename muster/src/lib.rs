//! # muster - Extension-Driven Activity Lifecycle Engine
//!
//! `muster` runs shared, long-lived activities (a race, a hunt, a build
//! contest) through a gated state machine. Independently written
//! extensions observe every transition and may veto the forward ones,
//! without the engine knowing them at compile time.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use muster::prelude::*;
//!
//! struct NoSoloRaces;
//!
//! #[muster::extension(name = "no-solo-races", priority = 10)]
//! impl Extension for NoSoloRaces {
//!     async fn on_activity_pre_start(&self, activity: &mut ActivityMut<'_>) -> GateResult {
//!         if activity.participant_count() < 2 {
//!             return Ok(Verdict::veto("races need two drivers"));
//!         }
//!         Ok(Verdict::Allow)
//!     }
//! }
//!
//! let core = Muster::init(MusterConfig::default(), Collaborators::default())?;
//! core.register(NoSoloRaces)?;
//! let id = core.create(NewActivity::new("Friday Race", "race")).await?;
//! ```
//!
//! ## Protocol
//!
//! - **Gates** (`pre_create`, `pre_start`, `pre_join`) run in priority order
//!   and stop at the first veto.
//! - **Notifies** reach every extension, in priority order.
//! - A callback that errors or panics is logged and treated as allowing.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub mod collab;
pub mod config;
pub mod controller;
pub mod facade;
pub mod host;
#[cfg(feature = "ticker")]
pub mod ticker;

pub use muster_core::{
    // Entity
    Activity,
    ActivityId,
    ActivityKind,
    // Views
    ActivityMut,
    ActivityStatus,
    Attributes,
    // Errors
    BoxError,
    DEFAULT_PRIORITY,
    EndReason,
    EndRequest,
    // Capability
    Extension,
    ExtensionFault,
    GateResult,
    LeaveReason,
    LifecycleError,
    MusterError,
    NewActivity,
    NotifyResult,
    ParticipantId,
    RegistryError,
    Transition,
    UpdateContext,
    Verdict,
};

pub use muster_std::{Callback, DispatchConfig, Dispatcher, ExtensionRegistry, GateOutcome, Registration};

pub use async_trait::async_trait;
pub use collab::{
    AcceptAll, Audience, Collaborators, MemoryStore, Presenter, RequirementCheck, SnapshotStore,
    TracingPresenter,
};
pub use config::{ConfigError, MusterConfig};
pub use controller::LifecycleController;
pub use facade::FacadeError;
pub use host::Muster;

/// Standard extension implementations.
pub mod hooks {
    pub use muster_std::hooks::{FnExtension, LoggingExtension, MaxDuration, MinParticipants};
}

/// Testing utilities.
pub mod testing {
    pub use muster_std::testing::{CallLog, RecordingExtension};
}

/// Prelude module - common imports for Muster.
///
/// # Usage
///
/// ```rust,ignore
/// use muster::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Activity, ActivityId, ActivityMut, ActivityStatus, BoxError, Collaborators, EndReason,
        Extension, GateResult, LeaveReason, LifecycleError, Muster, MusterConfig, MusterError,
        NewActivity, NotifyResult, ParticipantId, UpdateContext, Verdict, async_trait,
    };
}

#[cfg(feature = "macros")]
pub use muster_macros::extension;

#[cfg(feature = "inventory")]
pub use muster_std::{inventory, submit_extension};
