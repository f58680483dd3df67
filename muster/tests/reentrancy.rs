//! Extensions calling back into the engine through the facade.
//! One test function, since the facade handle is global.

use muster::{
    ActivityMut, Extension, FacadeError, MusterError, NotifyResult, async_trait, facade,
    hooks::LoggingExtension, testing::CallLog,
};
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;

mod common;
use common::{core, race};

fn outcome<T>(result: Result<T, FacadeError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(FacadeError::Muster(MusterError::Reentrant)) => "reentrant",
        Err(_) => "failed",
    }
}

/// Looks around through the facade whenever something happens.
struct Scout {
    log: CallLog,
}

#[async_trait]
impl Extension for Scout {
    fn name(&self) -> &str {
        "scout"
    }

    async fn on_activity_started(&self, _activity: &mut ActivityMut<'_>) -> NotifyResult {
        let by_kind = outcome(facade::activities_by_kind("race").await);
        self.log.record(format!("scout:by-kind:{by_kind}"));

        let created = outcome(facade::create_activity(race("Spawned")).await);
        self.log.record(format!("scout:create:{created}"));

        let registered = outcome(facade::register(LoggingExtension::named("scout.helper")));
        self.log.record(format!("scout:register:{registered}"));
        Ok(())
    }

    async fn on_host_shutdown(&self) -> NotifyResult {
        let by_kind = outcome(facade::activities_by_kind("race").await);
        self.log.record(format!("scout:shutdown:{by_kind}"));
        Ok(())
    }
}

#[tokio::test]
async fn test_facade_calls_from_callbacks_are_refused() {
    let engine = core();
    facade::install(Arc::clone(&engine));
    let log = CallLog::new();
    engine.register(Scout { log: log.clone() }).unwrap();

    let id = engine.create(race("Scouted")).await.unwrap();
    timeout(Duration::from_secs(2), engine.start(id))
        .await
        .expect("start waited on its own dispatch")
        .unwrap();

    assert_eq!(
        log.entries(),
        vec![
            "scout:by-kind:reentrant",
            "scout:create:reentrant",
            "scout:register:ok",
        ]
    );

    // Outside a callback the facade serves normally.
    assert_eq!(facade::activities_by_kind("race").await.unwrap().len(), 1);
    assert!(engine.registry().contains("scout.helper"));

    timeout(Duration::from_secs(2), engine.shutdown())
        .await
        .expect("shutdown waited on its own dispatch")
        .unwrap();

    assert_eq!(log.calls_to("shutdown"), vec!["scout:shutdown:reentrant"]);
    assert!(!facade::is_available());
}
