//! Link-time extension collection via `inventory`.
//!
//! Crates linked into the host can submit extension factories with
//! [`submit_extension!`](crate::submit_extension); the host registers all
//! of them at startup with [`ExtensionRegistry::register_collected`].

use crate::registry::ExtensionRegistry;
use muster_core::Extension;
use std::sync::Arc;

/// A factory for an extension submitted at link time.
pub struct ExtensionFactory {
    create: fn() -> Arc<dyn Extension>,
}

impl ExtensionFactory {
    /// Wrap a constructor.
    pub const fn new(create: fn() -> Arc<dyn Extension>) -> Self {
        Self { create }
    }

    /// Build the extension.
    pub fn create(&self) -> Arc<dyn Extension> {
        (self.create)()
    }
}

inventory::collect!(ExtensionFactory);

/// Submits an extension for collection by [`ExtensionRegistry::register_collected`].
///
/// The expression is evaluated once per `register_collected` call.
///
/// # Example
/// ```rust,ignore
/// muster_std::submit_extension!(MinParticipants::new(2));
/// ```
#[macro_export]
macro_rules! submit_extension {
    ($extension:expr) => {
        $crate::inventory::submit! {
            $crate::collected::ExtensionFactory::new(|| {
                ::std::sync::Arc::new($extension) as ::std::sync::Arc<dyn $crate::muster_core::Extension>
            })
        }
    };
}

impl ExtensionRegistry {
    /// Register every extension submitted with `submit_extension!`.
    ///
    /// Collection order is unspecified, so collected extensions that share
    /// a priority have no defined relative order. Duplicates are skipped.
    /// Returns the number registered.
    pub fn register_collected(&self) -> usize {
        let mut registered = 0;
        for factory in inventory::iter::<ExtensionFactory> {
            let extension = factory.create();
            let name = extension.name().to_string();
            match self.register(extension) {
                Ok(()) => registered += 1,
                Err(err) => {
                    tracing::warn!(extension = %name, error = %err, "collected extension skipped");
                }
            }
        }
        registered
    }
}
