use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::capabilities::{CallAlertIntegration, CallEvent, CallEventListener};
use crate::config::AlertConfig;
use crate::dedup::DedupStore;
use crate::failure::{Failure, FailureKind, FailureReporter};
use crate::model::OrderId;

// ============================================================================
// Integration state
// ============================================================================

/// `Uninitialized -> Initializing -> Ready`, or `-> Failed` and back to
/// `Initializing` on the next fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl IntegrationState {
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// What a single fire attempt ended in. Callers may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireOutcome {
    Displayed,
    Duplicate,
    /// Another fire for the same id is still running in this process.
    InFlight,
    EmptyOrderId,
    IntegrationUnavailable,
    InitializationFailed,
    DisplayFailed,
}

impl FireOutcome {
    pub const fn displayed(self) -> bool {
        matches!(self, Self::Displayed)
    }
}

// ============================================================================
// Metrics
// ============================================================================

#[derive(Debug, Default)]
pub struct AlertMetrics {
    pub fires: AtomicU64,
    pub displayed: AtomicU64,
    pub duplicates_suppressed: AtomicU64,
    pub in_flight_rejections: AtomicU64,
    pub unavailable: AtomicU64,
    pub initialization_failures: AtomicU64,
    pub display_failures: AtomicU64,
}

impl AlertMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, outcome: FireOutcome) {
        let counter = match outcome {
            FireOutcome::Displayed => &self.displayed,
            FireOutcome::Duplicate => &self.duplicates_suppressed,
            FireOutcome::InFlight => &self.in_flight_rejections,
            FireOutcome::IntegrationUnavailable => &self.unavailable,
            FireOutcome::InitializationFailed => &self.initialization_failures,
            FireOutcome::DisplayFailed => &self.display_failures,
            FireOutcome::EmptyOrderId => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AlertMetricsSnapshot {
        AlertMetricsSnapshot {
            fires: self.fires.load(Ordering::Relaxed),
            displayed: self.displayed.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            in_flight_rejections: self.in_flight_rejections.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            initialization_failures: self.initialization_failures.load(Ordering::Relaxed),
            display_failures: self.display_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMetricsSnapshot {
    pub fires: u64,
    pub displayed: u64,
    pub duplicates_suppressed: u64,
    pub in_flight_rejections: u64,
    pub unavailable: u64,
    pub initialization_failures: u64,
    pub display_failures: u64,
}

// ============================================================================
// Call event routing
// ============================================================================

/// Answer ends the simulated call and foregrounds the app; end only
/// foregrounds. Errors are reported, never raised.
pub struct CallEventRouter {
    integration: Weak<dyn CallAlertIntegration>,
    reporter: Arc<dyn FailureReporter>,
}

impl CallEventRouter {
    pub fn new(integration: &Arc<dyn CallAlertIntegration>, reporter: Arc<dyn FailureReporter>) -> Self {
        Self {
            integration: Arc::downgrade(integration),
            reporter,
        }
    }

    fn report(&self, event: &CallEvent, message: String) {
        self.reporter.report(
            Failure::new(FailureKind::CallEventHandlingFailed, message)
                .for_order(&OrderId::new(event.call_uuid())),
        );
    }
}

impl CallEventListener for CallEventRouter {
    fn on_call_event(&self, event: CallEvent) {
        let Some(integration) = self.integration.upgrade() else {
            debug!(call_uuid = event.call_uuid(), "integration dropped; ignoring call event");
            return;
        };

        if let CallEvent::Answered { call_uuid } = &event {
            if let Err(e) = integration.end_call(call_uuid) {
                self.report(&event, format!("end_call failed: {e}"));
            }
        }
        if let Err(e) = integration.back_to_foreground() {
            self.report(&event, format!("back_to_foreground failed: {e}"));
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

pub struct CallAlertDispatcher {
    integration: Option<Arc<dyn CallAlertIntegration>>,
    dedup: DedupStore,
    config: AlertConfig,
    reporter: Arc<dyn FailureReporter>,
    state: tokio::sync::Mutex<IntegrationState>,
    listeners_attached: Mutex<bool>,
    metrics: AlertMetrics,
}

impl CallAlertDispatcher {
    pub fn new(
        integration: Option<Arc<dyn CallAlertIntegration>>,
        dedup: DedupStore,
        config: AlertConfig,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            integration,
            dedup,
            config,
            reporter,
            state: tokio::sync::Mutex::new(IntegrationState::Uninitialized),
            listeners_attached: Mutex::new(false),
            metrics: AlertMetrics::new(),
        }
    }

    /// Runs a fire on the current runtime and returns without waiting.
    /// Returns `None` when called from outside any runtime.
    pub fn spawn_fire_call(
        self: &Arc<Self>,
        order_id: OrderId,
    ) -> Option<JoinHandle<FireOutcome>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.reporter.report(
                Failure::new(FailureKind::RuntimeUnavailable, "no async runtime; alert not fired")
                    .for_order(&order_id),
            );
            return None;
        };
        let dispatcher = Arc::clone(self);
        Some(runtime.spawn(async move { dispatcher.fire_call(&order_id).await }))
    }

    #[instrument(skip_all, fields(order_id = %order_id))]
    pub async fn fire_call(&self, order_id: &OrderId) -> FireOutcome {
        self.metrics.fires.fetch_add(1, Ordering::Relaxed);
        let outcome = self.fire_inner(order_id).await;
        self.metrics.record(outcome);
        debug!(?outcome, "fire finished");
        outcome
    }

    async fn fire_inner(&self, order_id: &OrderId) -> FireOutcome {
        if order_id.is_empty() {
            self.reporter
                .report(Failure::new(FailureKind::EmptyOrderId, "fire requested without an order id"));
            return FireOutcome::EmptyOrderId;
        }

        let Some(integration) = self.integration.as_ref().filter(|i| i.is_available()) else {
            self.reporter.report(
                Failure::new(FailureKind::IntegrationUnavailable, "call-alert integration not present")
                    .for_order(order_id),
            );
            return FireOutcome::IntegrationUnavailable;
        };

        if !self.ensure_initialized(integration, order_id).await {
            return FireOutcome::InitializationFailed;
        }

        self.ensure_listeners(integration);

        let Some(_claim) = self.dedup.try_begin(order_id) else {
            debug!("fire already in flight for this order");
            return FireOutcome::InFlight;
        };

        if self.dedup.has(order_id).await {
            debug!("already alerted; suppressing duplicate");
            return FireOutcome::Duplicate;
        }

        if let Some(delay) = self.config.display_delay() {
            tokio::time::sleep(delay).await;
        }

        let caller = self.config.caller_name.as_str();
        match integration
            .display_incoming_call(order_id.as_str(), caller, caller)
            .await
        {
            Ok(()) => {
                info!("incoming call alert displayed");
                self.dedup.mark_alerted(order_id).await;
                FireOutcome::Displayed
            }
            Err(e) => {
                self.reporter.report(
                    Failure::new(FailureKind::DisplayFailed, e.to_string()).for_order(order_id),
                );
                FireOutcome::DisplayFailed
            }
        }
    }

    /// Holds the state lock across `setup` so concurrent fires wait for a
    /// single attempt instead of starting their own.
    async fn ensure_initialized(
        &self,
        integration: &Arc<dyn CallAlertIntegration>,
        order_id: &OrderId,
    ) -> bool {
        let mut state = self.state.lock().await;
        if state.is_ready() {
            return true;
        }

        *state = IntegrationState::Initializing;
        match integration.setup(&self.config.setup).await {
            Ok(()) => {
                *state = IntegrationState::Ready;
                info!("call-alert integration ready");
                true
            }
            Err(e) => {
                *state = IntegrationState::Failed;
                warn!(retryable = e.is_retryable(), "call-alert setup failed");
                self.reporter.report(
                    Failure::new(FailureKind::InitializationFailed, e.to_string()).for_order(order_id),
                );
                false
            }
        }
    }

    fn ensure_listeners(&self, integration: &Arc<dyn CallAlertIntegration>) {
        let Ok(mut attached) = self.listeners_attached.lock() else {
            return;
        };
        if *attached {
            return;
        }

        let router = Arc::new(CallEventRouter::new(integration, self.reporter.clone()));
        match integration.add_event_listener(router) {
            Ok(()) => {
                *attached = true;
                debug!("call event listeners attached");
            }
            Err(e) => self.reporter.report(Failure::new(
                FailureKind::ListenerSetupFailed,
                format!("could not attach call event listeners: {e}"),
            )),
        }
    }

    pub async fn integration_state(&self) -> IntegrationState {
        *self.state.lock().await
    }

    pub fn listeners_attached(&self) -> bool {
        self.listeners_attached.lock().map(|a| *a).unwrap_or(false)
    }

    pub fn metrics(&self) -> AlertMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::capabilities::{
        CallAlertIntegration, CallEvent, CallEventListener, SetupOptions, TelephonyError,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scriptable integration: setup can fail N times, display and listener
    /// attachment can be switched to fail.
    #[derive(Default)]
    pub struct FakeTelephony {
        pub unavailable: AtomicBool,
        pub setup_failures_remaining: AtomicUsize,
        pub setup_calls: AtomicUsize,
        pub fail_display: AtomicBool,
        pub fail_listener_attach: AtomicBool,
        pub fail_end_call: AtomicBool,
        pub foreground_calls: AtomicUsize,
        displayed: Mutex<Vec<(String, String)>>,
        ended: Mutex<Vec<String>>,
        listeners: Mutex<Vec<Arc<dyn CallEventListener>>>,
    }

    impl FakeTelephony {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn failing_setup(times: usize) -> Arc<Self> {
            let fake = Self::default();
            fake.setup_failures_remaining.store(times, Ordering::SeqCst);
            Arc::new(fake)
        }

        pub fn displayed_ids(&self) -> Vec<String> {
            self.displayed.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
        }

        pub fn displayed_callers(&self) -> Vec<String> {
            self.displayed.lock().unwrap().iter().map(|(_, name)| name.clone()).collect()
        }

        pub fn ended(&self) -> Vec<String> {
            self.ended.lock().unwrap().clone()
        }

        pub fn listener_count(&self) -> usize {
            self.listeners.lock().unwrap().len()
        }

        pub fn emit(&self, event: CallEvent) {
            let listeners = self.listeners.lock().unwrap().clone();
            for listener in listeners {
                listener.on_call_event(event.clone());
            }
        }
    }

    #[async_trait::async_trait]
    impl CallAlertIntegration for FakeTelephony {
        fn is_available(&self) -> bool {
            !self.unavailable.load(Ordering::SeqCst)
        }

        async fn setup(&self, _options: &SetupOptions) -> Result<(), TelephonyError> {
            self.setup_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.setup_failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.setup_failures_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err(TelephonyError::SetupRejected { reason: "injected".into() });
            }
            Ok(())
        }

        async fn display_incoming_call(
            &self,
            call_id: &str,
            _handle: &str,
            caller_name: &str,
        ) -> Result<(), TelephonyError> {
            if self.fail_display.load(Ordering::SeqCst) {
                return Err(TelephonyError::native("display rejected"));
            }
            self.displayed
                .lock()
                .unwrap()
                .push((call_id.to_string(), caller_name.to_string()));
            Ok(())
        }

        fn end_call(&self, call_id: &str) -> Result<(), TelephonyError> {
            if self.fail_end_call.load(Ordering::SeqCst) {
                return Err(TelephonyError::UnknownCall { call_id: call_id.to_string() });
            }
            self.ended.lock().unwrap().push(call_id.to_string());
            Ok(())
        }

        fn back_to_foreground(&self) -> Result<(), TelephonyError> {
            self.foreground_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn add_event_listener(&self, listener: Arc<dyn CallEventListener>) -> Result<(), TelephonyError> {
            if self.fail_listener_attach.load(Ordering::SeqCst) {
                return Err(TelephonyError::native("listener attach rejected"));
            }
            self.listeners.lock().unwrap().push(listener);
            Ok(())
        }
    }
}
