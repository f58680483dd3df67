#![allow(dead_code)]

use muster::{
    Collaborators, Muster, MusterConfig, NewActivity,
    testing::{CallLog, RecordingExtension},
};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Tracing
// ============================================================================

static TRACING: Once = Once::new();

/// Route engine logs through the test harness. `RUST_LOG` overrides the
/// default `muster=debug` filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("muster=debug,muster_std=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Engines
// ============================================================================

pub fn config() -> MusterConfig {
    MusterConfig::default().with_default_capacity(4)
}

pub fn core() -> Arc<Muster> {
    core_with(Collaborators::default())
}

pub fn core_with(collaborators: Collaborators) -> Arc<Muster> {
    init_tracing();
    Muster::init(config(), collaborators).unwrap()
}

/// An engine with one recording extension per `(name, priority)` pair,
/// all writing to the returned log.
pub fn recorded(extensions: &[(&str, i32)]) -> (Arc<Muster>, CallLog) {
    let core = core();
    let log = CallLog::new();
    for (name, priority) in extensions {
        core.register(RecordingExtension::new(*name, *priority, &log))
            .unwrap();
    }
    (core, log)
}

// ============================================================================
// Activities
// ============================================================================

pub fn race(name: &str) -> NewActivity {
    NewActivity::new(name, "race")
}

pub fn small_race(name: &str, capacity: usize) -> NewActivity {
    race(name).with_capacity(capacity)
}
