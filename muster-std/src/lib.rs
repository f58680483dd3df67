//! # muster-std
//!
//! Standard implementations for the Muster activity lifecycle engine.
//!
//! This crate provides:
//! - **Registry**: [`ExtensionRegistry`], named extensions in priority order
//! - **Dispatch**: [`Dispatcher`], gate and notify protocols with fault isolation
//! - **Standard extensions**: logging, quorum gate, duration limit, closures
//! - **Testing**: [`testing::RecordingExtension`] and [`testing::CallLog`]
//! - **Collection** (`inventory` feature): link-time extension submission

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use muster_core;

// Modules
#[cfg(feature = "inventory")]
pub mod collected;
pub mod dispatch;
pub mod hooks;
pub mod registry;
pub mod testing;

pub use dispatch::{Callback, DispatchConfig, Dispatcher, GateOutcome, in_callback};
pub use registry::{ExtensionRegistry, Registration};

#[cfg(feature = "inventory")]
pub use inventory;
