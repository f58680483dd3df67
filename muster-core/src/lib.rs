//! # muster-core
//!
//! Core types for the Muster activity lifecycle engine.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! extensions that don't need the registry, dispatcher, or controller.
//!
//! # Layers
//!
//! ## Entity ([`Activity`])
//!
//! The shared record whose lifecycle is being gated: identity, display
//! strings, kind, [`ActivityStatus`], participants, and two free-form maps
//! (`metadata`, `requirements`) that extensions own.
//!
//! ## Capability ([`Extension`])
//!
//! The contract an extension implements. Gate callbacks return a
//! [`Verdict`] and may veto; notify callbacks observe and cannot. Every
//! callback has a permissive default.
//!
//! ## Views ([`ActivityMut`], [`UpdateContext`])
//!
//! What a callback actually receives. The views expose the activity
//! read-only except for `metadata` and `requirements`, so an extension can
//! never change membership or status behind the controller's back. Each
//! extension call gets its own view.
//!
//! # Error Types
//!
//! - [`MusterError`] - Top-level error type
//! - [`RegistryError`] - Extension registration errors
//! - [`LifecycleError`] - Rejected or vetoed transitions
//! - [`ExtensionFault`] - A contained callback failure

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod activity;
mod context;
mod error;
mod extension;
mod reason;
mod status;

// Re-exports
pub use activity::{Activity, ActivityId, ActivityKind, Attributes, NewActivity, ParticipantId};
pub use async_trait::async_trait;
pub use context::{ActivityMut, EndRequest, UpdateContext};
pub use error::{BoxError, ExtensionFault, LifecycleError, MusterError, RegistryError};
pub use extension::{DEFAULT_PRIORITY, Extension, GateResult, NotifyResult, Verdict};
pub use reason::{EndReason, LeaveReason};
pub use status::{ActivityStatus, Transition};
