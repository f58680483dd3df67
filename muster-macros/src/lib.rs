//! Procedural macros for Muster.

use proc_macro::TokenStream;

mod extension;

/// Fills in the identity methods of an `impl Extension for T` block.
///
/// - `name = "..."` generates `fn name(&self) -> &str`. Without it the name
///   is derived from the type, `ScoreBoard` becoming `score-board`.
/// - `priority = <expr>` generates `fn priority(&self) -> i32`.
///
/// The block is also given `#[muster::async_trait]` unless an
/// `async_trait` attribute is already present below this one.
///
/// # Example
///
/// ```rust,ignore
/// use muster::prelude::*;
///
/// struct Quorum;
///
/// #[muster::extension(name = "quorum", priority = -10)]
/// impl Extension for Quorum {
///     async fn on_activity_pre_start(&self, activity: &mut ActivityMut<'_>) -> GateResult {
///         Ok((activity.participant_count() >= 2).into())
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn extension(attr: TokenStream, item: TokenStream) -> TokenStream {
    extension::extension_impl(attr, item)
}
