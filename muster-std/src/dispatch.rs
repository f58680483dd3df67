//! Ordered gate and notify dispatch with per-callback fault isolation.
//!
//! Both modes walk the registry's sorted snapshot in priority order:
//!
//! - **Gate** stops at the first [`Verdict::Veto`] and reports who vetoed.
//! - **Notify** always reaches every extension.
//!
//! Every callback runs inside [`FutureExt::catch_unwind`]. An `Err` or a
//! panic is logged with the extension and callback names, counted, and
//! replaced by the callback's neutral result (`Allow` for gates, nothing
//! for notifies). Faults never leave this module.
//!
//! Each call gets its own [`ActivityMut`] or [`UpdateContext`] built over
//! the controller's activity, so a callback can never hand a different view
//! to the extensions after it.
//!
//! While a callback is being polled, [`in_callback`] reports `true` on that
//! thread. Callers holding the controller use it to refuse nested calls.

use crate::registry::{ExtensionRegistry, Registration};
use futures::{
    FutureExt,
    future::{self, BoxFuture},
};
use muster_core::{
    Activity, ActivityMut, BoxError, EndReason, EndRequest, ExtensionFault, LeaveReason,
    LifecycleError, ParticipantId, Transition, UpdateContext, Verdict,
};
use std::{
    cell::Cell,
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tracing::Instrument;

thread_local! {
    static CALLBACK_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Whether this thread is currently polling an extension callback.
///
/// A nested call made from inside a callback is polled within the
/// callback's own poll, so it sees `true`. Other tasks sharing the thread
/// are polled between callback polls and see `false`.
pub fn in_callback() -> bool {
    CALLBACK_DEPTH.with(|depth| depth.get() > 0)
}

struct CallbackDepth;

impl CallbackDepth {
    fn enter() -> Self {
        CALLBACK_DEPTH.with(|depth| depth.set(depth.get() + 1));
        CallbackDepth
    }
}

impl Drop for CallbackDepth {
    fn drop(&mut self) {
        CALLBACK_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Warn when a single callback takes longer than this.
    ///
    /// There is no timeout: a slow callback still delays every extension
    /// after it. This only makes the delay visible.
    pub slow_callback_threshold: Option<Duration>,
}

impl DispatchConfig {
    /// Set the slow-callback warning threshold.
    pub fn with_slow_callback_threshold(mut self, threshold: Duration) -> Self {
        self.slow_callback_threshold = Some(threshold);
        self
    }
}

/// Aggregate result of a gate dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Every extension allowed the transition (or faulted).
    Allowed,
    /// An extension vetoed; later extensions were not consulted.
    Vetoed {
        /// Name of the vetoing extension.
        extension: String,
        /// Explanation supplied with the veto, if any.
        reason: Option<String>,
    },
}

impl GateOutcome {
    /// Whether the transition may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateOutcome::Allowed)
    }

    /// Convert into the controller's result type for `transition`.
    pub fn into_result(self, transition: Transition) -> Result<(), LifecycleError> {
        match self {
            GateOutcome::Allowed => Ok(()),
            GateOutcome::Vetoed { extension, reason } => Err(LifecycleError::Vetoed {
                transition,
                extension,
                reason,
            }),
        }
    }
}

/// Identifies an extension callback in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callback {
    /// [`Extension::on_activity_pre_create`](muster_core::Extension::on_activity_pre_create)
    PreCreate,
    /// [`Extension::on_activity_created`](muster_core::Extension::on_activity_created)
    Created,
    /// [`Extension::on_activity_pre_start`](muster_core::Extension::on_activity_pre_start)
    PreStart,
    /// [`Extension::on_activity_started`](muster_core::Extension::on_activity_started)
    Started,
    /// [`Extension::on_activity_ended`](muster_core::Extension::on_activity_ended)
    Ended,
    /// [`Extension::on_participant_pre_join`](muster_core::Extension::on_participant_pre_join)
    PreJoin,
    /// [`Extension::on_participant_joined`](muster_core::Extension::on_participant_joined)
    Joined,
    /// [`Extension::on_participant_left`](muster_core::Extension::on_participant_left)
    Left,
    /// [`Extension::on_activity_update`](muster_core::Extension::on_activity_update)
    Update,
    /// [`Extension::on_host_shutdown`](muster_core::Extension::on_host_shutdown)
    Shutdown,
}

impl Callback {
    /// The callback's method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Callback::PreCreate => "on_activity_pre_create",
            Callback::Created => "on_activity_created",
            Callback::PreStart => "on_activity_pre_start",
            Callback::Started => "on_activity_started",
            Callback::Ended => "on_activity_ended",
            Callback::PreJoin => "on_participant_pre_join",
            Callback::Joined => "on_participant_joined",
            Callback::Left => "on_participant_left",
            Callback::Update => "on_activity_update",
            Callback::Shutdown => "on_host_shutdown",
        }
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy)]
enum Gate<'p> {
    PreCreate,
    PreStart,
    PreJoin(&'p ParticipantId),
}

impl Gate<'_> {
    fn callback(self) -> Callback {
        match self {
            Gate::PreCreate => Callback::PreCreate,
            Gate::PreStart => Callback::PreStart,
            Gate::PreJoin(_) => Callback::PreJoin,
        }
    }
}

#[derive(Clone, Copy)]
enum Notify<'p> {
    Created,
    Started,
    Ended(EndReason),
    Joined(&'p ParticipantId),
    Left(&'p ParticipantId, LeaveReason),
}

impl Notify<'_> {
    fn callback(self) -> Callback {
        match self {
            Notify::Created => Callback::Created,
            Notify::Started => Callback::Started,
            Notify::Ended(_) => Callback::Ended,
            Notify::Joined(_) => Callback::Joined,
            Notify::Left(..) => Callback::Left,
        }
    }
}

/// Walks the registry for one transition at a time.
pub struct Dispatcher {
    registry: Arc<ExtensionRegistry>,
    config: DispatchConfig,
    faults: AtomicU64,
    slow_calls: AtomicU64,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("faults", &self.fault_count())
            .field("slow_calls", &self.slow_call_count())
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: Arc<ExtensionRegistry>, config: DispatchConfig) -> Self {
        Self {
            registry,
            config,
            faults: AtomicU64::new(0),
            slow_calls: AtomicU64::new(0),
        }
    }

    /// The registry this dispatcher reads.
    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    /// Total faults contained since creation.
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Callbacks that ran past the slow-callback threshold since creation.
    pub fn slow_call_count(&self) -> u64 {
        self.slow_calls.load(Ordering::Relaxed)
    }

    // ===== Gates =====

    /// Gate an activity creation.
    pub async fn pre_create(&self, activity: &mut Activity) -> GateOutcome {
        self.gate(Gate::PreCreate, activity).await
    }

    /// Gate an activity start.
    pub async fn pre_start(&self, activity: &mut Activity) -> GateOutcome {
        self.gate(Gate::PreStart, activity).await
    }

    /// Gate a participant join.
    pub async fn pre_join(
        &self,
        activity: &mut Activity,
        participant: &ParticipantId,
    ) -> GateOutcome {
        self.gate(Gate::PreJoin(participant), activity).await
    }

    // ===== Notifies =====

    /// Announce a created activity.
    pub async fn created(&self, activity: &mut Activity) {
        self.notify(Notify::Created, activity).await
    }

    /// Announce a started activity.
    pub async fn started(&self, activity: &mut Activity) {
        self.notify(Notify::Started, activity).await
    }

    /// Announce an ended or cancelled activity.
    pub async fn ended(&self, activity: &mut Activity, reason: EndReason) {
        self.notify(Notify::Ended(reason), activity).await
    }

    /// Announce a join.
    pub async fn joined(&self, activity: &mut Activity, participant: &ParticipantId) {
        self.notify(Notify::Joined(participant), activity).await
    }

    /// Announce a leave.
    pub async fn left(
        &self,
        activity: &mut Activity,
        participant: &ParticipantId,
        reason: LeaveReason,
    ) {
        self.notify(Notify::Left(participant, reason), activity).await
    }

    /// Run the periodic update tick, returning the end request it produced.
    ///
    /// The first request wins. A request recorded by an extension that then
    /// faults is discarded along with the rest of that call.
    pub async fn update(&self, activity: &mut Activity) -> Option<EndRequest> {
        let snapshot = self.registry.snapshot();
        let span = tracing::debug_span!(
            "notify",
            callback = Callback::Update.as_str(),
            activity = %activity.id(),
        );

        async move {
            let mut request: Option<EndRequest> = None;
            for reg in snapshot.iter() {
                let mut ctx =
                    UpdateContext::after(&mut *activity, request.as_ref().map(|r| r.reason));
                let fut = reg.extension().on_activity_update(&mut ctx);
                if self.guard(reg, Callback::Update, fut).await.is_none() {
                    continue;
                }
                if request.is_none() {
                    request = ctx.into_requested_end().map(|reason| EndRequest {
                        reason,
                        requested_by: reg.name().to_string(),
                    });
                }
            }
            request
        }
        .instrument(span)
        .await
    }

    /// Announce host shutdown to every registered extension.
    pub async fn shutdown(&self) {
        let snapshot = self.registry.snapshot();
        let span = tracing::debug_span!("notify", callback = Callback::Shutdown.as_str());

        async move {
            for reg in snapshot.iter() {
                let fut = reg.extension().on_host_shutdown();
                self.guard(reg, Callback::Shutdown, fut).await;
            }
        }
        .instrument(span)
        .await
    }

    // ===== Protocol =====

    async fn gate(&self, gate: Gate<'_>, activity: &mut Activity) -> GateOutcome {
        let snapshot = self.registry.snapshot();
        let callback = gate.callback();
        let span = tracing::debug_span!(
            "gate",
            callback = callback.as_str(),
            activity = %activity.id(),
        );

        async move {
            for reg in snapshot.iter() {
                let ext = reg.extension();
                let mut view = ActivityMut::new(&mut *activity);
                let fut = match gate {
                    Gate::PreCreate => ext.on_activity_pre_create(&mut view),
                    Gate::PreStart => ext.on_activity_pre_start(&mut view),
                    Gate::PreJoin(participant) => ext.on_participant_pre_join(&mut view, participant),
                };

                // A faulted gate counts as an allow.
                if let Some(Verdict::Veto(reason)) = self.guard(reg, callback, fut).await {
                    tracing::debug!(
                        extension = reg.name(),
                        callback = callback.as_str(),
                        reason = reason.as_deref().unwrap_or(""),
                        "transition vetoed"
                    );
                    return GateOutcome::Vetoed {
                        extension: reg.name().to_string(),
                        reason,
                    };
                }
            }
            GateOutcome::Allowed
        }
        .instrument(span)
        .await
    }

    async fn notify(&self, notify: Notify<'_>, activity: &mut Activity) {
        let snapshot = self.registry.snapshot();
        let callback = notify.callback();
        let span = tracing::debug_span!(
            "notify",
            callback = callback.as_str(),
            activity = %activity.id(),
        );

        async move {
            for reg in snapshot.iter() {
                let ext = reg.extension();
                let mut view = ActivityMut::new(&mut *activity);
                let fut = match notify {
                    Notify::Created => ext.on_activity_created(&mut view),
                    Notify::Started => ext.on_activity_started(&mut view),
                    Notify::Ended(reason) => ext.on_activity_ended(&mut view, reason),
                    Notify::Joined(participant) => ext.on_participant_joined(&mut view, participant),
                    Notify::Left(participant, reason) => {
                        ext.on_participant_left(&mut view, participant, reason)
                    }
                };
                self.guard(reg, callback, fut).await;
            }
        }
        .instrument(span)
        .await
    }

    /// Run one callback, containing any fault. `None` means it faulted.
    async fn guard<T>(
        &self,
        reg: &Registration,
        callback: Callback,
        mut fut: BoxFuture<'_, Result<T, BoxError>>,
    ) -> Option<T> {
        let marked = future::poll_fn(move |cx| {
            let _depth = CallbackDepth::enter();
            fut.as_mut().poll(cx)
        });

        let started = Instant::now();
        let result = AssertUnwindSafe(marked).catch_unwind().await;
        self.note_duration(reg, callback, started.elapsed());

        let fault = match result {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => ExtensionFault::Failed(err),
            Err(payload) => ExtensionFault::from_panic(payload),
        };

        self.faults.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            extension = reg.name(),
            callback = callback.as_str(),
            error = %fault,
            "extension callback faulted, continuing with neutral result"
        );
        None
    }

    fn note_duration(&self, reg: &Registration, callback: Callback, elapsed: Duration) {
        if let Some(threshold) = self.config.slow_callback_threshold {
            if elapsed > threshold {
                self.slow_calls.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    extension = reg.name(),
                    callback = callback.as_str(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold_ms = threshold.as_millis() as u64,
                    "slow extension callback"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hooks::FnExtension,
        testing::{CallLog, RecordingExtension},
    };
    use muster_core::{Extension, NewActivity};
    use std::sync::Mutex;

    fn activity() -> Activity {
        Activity::new(NewActivity::new("Arena", "pvp"), 8)
    }

    fn dispatcher(extensions: Vec<RecordingExtension>) -> Dispatcher {
        let registry = Arc::new(ExtensionRegistry::new());
        for ext in extensions {
            registry.register_extension(ext).unwrap();
        }
        Dispatcher::new(registry, DispatchConfig::default())
    }

    #[tokio::test]
    async fn test_gate_short_circuits_on_veto() {
        let log = CallLog::new();
        let dispatcher = dispatcher(vec![
            RecordingExtension::new("first", 1, &log),
            RecordingExtension::new("second", 2, &log).veto_start("not yet"),
            RecordingExtension::new("third", 3, &log),
        ]);

        let mut activity = activity();
        let outcome = dispatcher.pre_start(&mut activity).await;

        assert_eq!(
            outcome,
            GateOutcome::Vetoed {
                extension: "second".into(),
                reason: Some("not yet".into()),
            }
        );
        assert_eq!(log.entries(), vec!["first:pre_start", "second:pre_start"]);
    }

    #[tokio::test]
    async fn test_panicking_gate_counts_as_allow() {
        let log = CallLog::new();
        let dispatcher = dispatcher(vec![
            RecordingExtension::new("faulty", 1, &log).panic_on_pre_create(),
            RecordingExtension::new("after", 2, &log),
        ]);

        let mut activity = activity();
        let outcome = dispatcher.pre_create(&mut activity).await;

        assert!(outcome.is_allowed());
        assert_eq!(log.entries(), vec!["faulty:pre_create", "after:pre_create"]);
        assert_eq!(dispatcher.fault_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_notify_does_not_stop_later_extensions() {
        let log = CallLog::new();
        let dispatcher = dispatcher(vec![
            RecordingExtension::new("a", 1, &log).fail_on_notify(),
            RecordingExtension::new("b", 2, &log),
        ]);

        let mut activity = activity();
        dispatcher.started(&mut activity).await;

        assert_eq!(log.entries(), vec!["a:started", "b:started"]);
        assert_eq!(dispatcher.fault_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_registry_allows() {
        let dispatcher = dispatcher(vec![]);
        let mut activity = activity();
        assert!(dispatcher.pre_join(&mut activity, &"p1".into()).await.is_allowed());
    }

    #[tokio::test]
    async fn test_faulted_update_discards_its_end_request() {
        let log = CallLog::new();
        let dispatcher = dispatcher(vec![
            RecordingExtension::new("quitter", 1, &log)
                .end_on_update(EndReason::Timeout)
                .fail_on_notify(),
        ]);

        let mut activity = activity();
        assert!(dispatcher.update(&mut activity).await.is_none());
    }

    #[tokio::test]
    async fn test_update_attributes_end_request() {
        let log = CallLog::new();
        let dispatcher = dispatcher(vec![
            RecordingExtension::new("observer", 1, &log),
            RecordingExtension::new("timer", 2, &log).end_on_update(EndReason::Timeout),
            RecordingExtension::new("late", 3, &log).end_on_update(EndReason::Completed),
        ]);

        let mut activity = activity();
        let request = dispatcher.update(&mut activity).await.unwrap();
        assert_eq!(request.reason, EndReason::Timeout);
        assert_eq!(request.requested_by, "timer");
        assert_eq!(log.entries(), vec!["observer:update", "timer:update", "late:update"]);
    }

    fn dispatcher_of(
        extensions: Vec<Box<dyn FnOnce(&ExtensionRegistry)>>,
        config: DispatchConfig,
    ) -> Dispatcher {
        let registry = Arc::new(ExtensionRegistry::new());
        for install in extensions {
            install(registry.as_ref());
        }
        Dispatcher::new(registry, config)
    }

    fn add(ext: impl Extension + 'static) -> Box<dyn FnOnce(&ExtensionRegistry)> {
        Box::new(move |registry| {
            registry.register_extension(ext).unwrap();
        })
    }

    #[tokio::test]
    async fn test_replaced_view_does_not_reach_later_extensions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = dispatcher_of(
            vec![
                add(FnExtension::new("impostor").with_priority(1).on_started(|view| {
                    let forged = Box::leak(Box::new(Activity::new(
                        NewActivity::new("Forged", "pvp"),
                        1,
                    )));
                    *view = ActivityMut::new(forged);
                    view.set_metadata("forged", true);
                })),
                add(FnExtension::new("witness").with_priority(2).on_started(move |view| {
                    sink.lock().unwrap().push(view.name().to_string());
                })),
            ],
            DispatchConfig::default(),
        );

        let mut activity = activity();
        dispatcher.started(&mut activity).await;

        assert_eq!(*seen.lock().unwrap(), vec!["Arena".to_string()]);
        assert!(activity.metadata().get("forged").is_none());
    }

    #[tokio::test]
    async fn test_later_update_sees_earlier_request() {
        let pending = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&pending);
        let dispatcher = dispatcher_of(
            vec![
                add(FnExtension::new("timer").with_priority(1).on_update(|ctx| {
                    ctx.request_end(EndReason::Timeout);
                })),
                add(FnExtension::new("late").with_priority(2).on_update(move |ctx| {
                    let accepted = ctx.request_end(EndReason::Completed);
                    *sink.lock().unwrap() = Some((accepted, ctx.pending_end()));
                })),
            ],
            DispatchConfig::default(),
        );

        let mut activity = activity();
        let request = dispatcher.update(&mut activity).await.unwrap();

        assert_eq!(request.requested_by, "timer");
        assert_eq!(*pending.lock().unwrap(), Some((false, Some(EndReason::Timeout))));
    }

    #[tokio::test]
    async fn test_callbacks_run_marked_as_in_callback() {
        let marked = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&marked);
        let dispatcher = dispatcher_of(
            vec![add(FnExtension::new("inside").on_created(move |_| {
                *sink.lock().unwrap() = Some(in_callback());
            }))],
            DispatchConfig::default(),
        );

        assert!(!in_callback());
        let mut activity = activity();
        dispatcher.created(&mut activity).await;

        assert_eq!(*marked.lock().unwrap(), Some(true));
        assert!(!in_callback());
    }

    #[tokio::test]
    async fn test_panicking_callback_clears_marker() {
        let log = CallLog::new();
        let dispatcher = dispatcher(vec![
            RecordingExtension::new("faulty", 1, &log).panic_on_pre_create(),
        ]);

        let mut activity = activity();
        assert!(dispatcher.pre_create(&mut activity).await.is_allowed());
        assert!(!in_callback());
    }

    #[tokio::test]
    async fn test_slow_callback_is_counted_not_faulted() {
        let dispatcher = dispatcher_of(
            vec![
                add(FnExtension::new("sluggish").with_priority(1).on_started(|_| {
                    std::thread::sleep(Duration::from_millis(40));
                })),
                add(FnExtension::new("brisk").with_priority(2)),
            ],
            DispatchConfig::default().with_slow_callback_threshold(Duration::from_millis(20)),
        );

        let mut activity = activity();
        dispatcher.started(&mut activity).await;

        assert_eq!(dispatcher.slow_call_count(), 1);
        assert_eq!(dispatcher.fault_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_threshold_flags_sleeping_callback() {
        let dispatcher = dispatcher_of(
            vec![add(FnExtension::new("napper").on_created(|_| {
                std::thread::sleep(Duration::from_millis(2));
            }))],
            DispatchConfig::default().with_slow_callback_threshold(Duration::ZERO),
        );

        let mut activity = activity();
        dispatcher.created(&mut activity).await;
        assert_eq!(dispatcher.slow_call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_threshold_counts_nothing() {
        let dispatcher = dispatcher_of(
            vec![add(FnExtension::new("napper").on_created(|_| {
                std::thread::sleep(Duration::from_millis(2));
            }))],
            DispatchConfig::default(),
        );

        let mut activity = activity();
        dispatcher.created(&mut activity).await;
        assert_eq!(dispatcher.slow_call_count(), 0);
    }

    #[test]
    fn test_vetoed_outcome_into_error() {
        let outcome = GateOutcome::Vetoed {
            extension: "quorum".into(),
            reason: None,
        };
        let err = outcome.into_result(Transition::Start).unwrap_err();
        assert!(err.is_veto());
        assert!(GateOutcome::Allowed.into_result(Transition::Start).is_ok());
    }
}
