use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::call_alert::{CallAlertDispatcher, FireOutcome};
use crate::capabilities::{NotificationListener, ReloadOptions};
use crate::event::{DispatchSignal, PushMessage, ReconcileTarget};
use crate::failure::{Failure, FailureKind, FailureReporter};
use crate::sync::ReconcileHandle;

/// What an entry point did with a message. Returned immediately; the alert
/// keeps running on its own task.
#[derive(Debug, Default)]
pub struct PushHandling {
    pub signal: Option<DispatchSignal>,
    pub alert: Option<JoinHandle<FireOutcome>>,
    pub reconcile_requested: bool,
}

impl PushHandling {
    pub fn fired(&self) -> bool {
        self.alert.is_some()
    }
}

pub struct PushSignalHandler {
    dispatcher: Arc<CallAlertDispatcher>,
    reporter: Arc<dyn FailureReporter>,
}

impl PushSignalHandler {
    pub fn new(dispatcher: Arc<CallAlertDispatcher>, reporter: Arc<dyn FailureReporter>) -> Self {
        Self { dispatcher, reporter }
    }

    /// Background delivery. Returns as soon as the fire has been issued.
    #[instrument(skip_all)]
    pub fn handle_background(&self, message: &PushMessage) -> PushHandling {
        let mut handling = PushHandling::default();
        self.dispatch(message, &mut handling);
        handling
    }

    /// Raw background payload straight from the transport.
    pub fn handle_background_json(&self, payload: serde_json::Value) -> PushHandling {
        match PushMessage::from_json(payload) {
            Ok(message) => self.handle_background(&message),
            Err(e) => {
                self.reporter
                    .report(Failure::new(FailureKind::MalformedPayload, e.to_string()));
                PushHandling::default()
            }
        }
    }

    #[instrument(skip_all)]
    pub fn handle_foreground(&self, message: &PushMessage, reconcile: &ReconcileHandle) -> PushHandling {
        let mut handling = PushHandling::default();
        if message.refers_to_order() {
            debug!("push names an order; reconciling current orders");
            handling.reconcile_requested = reconcile
                .request(ReconcileTarget::Current, ReloadOptions::default())
                .is_some();
        }
        self.dispatch(message, &mut handling);
        handling
    }

    fn dispatch(&self, message: &PushMessage, handling: &mut PushHandling) {
        let signal = match DispatchSignal::from_push(message) {
            Ok(signal) => signal,
            Err(e) => {
                self.reporter
                    .report(Failure::new(FailureKind::MalformedPayload, e.to_string()));
                return;
            }
        };

        if signal.is_dispatch() {
            debug!(order_id = %signal.order_id, "dispatch push; firing call alert");
            handling.alert = self.dispatcher.spawn_fire_call(signal.order_id.clone());
        }
        handling.signal = Some(signal);
    }
}

/// Mounted on the notification center while the app is in the foreground.
pub struct ForegroundPushListener {
    handler: Arc<PushSignalHandler>,
    reconcile: ReconcileHandle,
}

impl ForegroundPushListener {
    pub fn new(handler: Arc<PushSignalHandler>, reconcile: ReconcileHandle) -> Self {
        Self { handler, reconcile }
    }
}

impl NotificationListener for ForegroundPushListener {
    fn on_notification(&self, message: &PushMessage) {
        self.handler.handle_foreground(message, &self.reconcile);
    }
}
