//! Standard extensions.

pub mod closure;
pub mod duration;
pub mod logging;
pub mod quorum;

pub use closure::FnExtension;
pub use duration::MaxDuration;
pub use logging::LoggingExtension;
pub use quorum::MinParticipants;
