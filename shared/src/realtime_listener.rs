use std::sync::Arc;
use tracing::{debug, info};

use crate::call_alert::CallAlertDispatcher;
use crate::capabilities::{EventCallback, RealtimeTransport, ReloadOptions, Subscription};
use crate::event::RealtimeEvent;
use crate::failure::{Failure, FailureKind, FailureReporter};
use crate::model::DriverId;
use crate::sync::ReconcileHandle;

pub const CHANNEL_PREFIX: &str = "driver.";

pub fn channel_name(driver_id: &DriverId) -> String {
    format!("{CHANNEL_PREFIX}{driver_id}")
}

/// Driver-channel subscriber. `order.ready` refreshes current orders,
/// `order.ping` refreshes nearby orders, and a body carrying an
/// `order_dispatched` block is handed to the call-alert dispatcher.
pub struct RealtimeEventListener {
    transport: Arc<dyn RealtimeTransport>,
    reconcile: ReconcileHandle,
    dispatcher: Option<Arc<CallAlertDispatcher>>,
    reporter: Arc<dyn FailureReporter>,
}

impl RealtimeEventListener {
    pub fn new(
        transport: Arc<dyn RealtimeTransport>,
        reconcile: ReconcileHandle,
        dispatcher: Option<Arc<CallAlertDispatcher>>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            transport,
            reconcile,
            dispatcher,
            reporter,
        }
    }

    /// `None` when the transport refused; the next focus tries again.
    pub async fn subscribe(&self, driver_id: &DriverId) -> Option<Box<dyn Subscription>> {
        let channel = channel_name(driver_id);
        match self.transport.listen(&channel, self.callback()).await {
            Ok(subscription) => {
                info!(%channel, "listening on driver channel");
                Some(subscription)
            }
            Err(e) => {
                self.reporter.report(Failure::new(
                    FailureKind::SubscriptionFailed,
                    format!("could not listen on {channel}: {e}"),
                ));
                None
            }
        }
    }

    fn callback(&self) -> EventCallback {
        let reconcile = self.reconcile.clone();
        let dispatcher = self.dispatcher.clone();
        let reporter = self.reporter.clone();

        Arc::new(move |body: serde_json::Value| {
            let event = match RealtimeEvent::from_json(body) {
                Ok(event) => event,
                Err(e) => {
                    reporter.report(Failure::new(FailureKind::MalformedPayload, e.to_string()));
                    return;
                }
            };

            if let Some(target) = event.reconcile_target() {
                debug!(collection = %target, "realtime event triggers reconciliation");
                reconcile.request(target, ReloadOptions::default());
            }

            if let (Some(signal), Some(dispatcher)) = (event.signal, dispatcher.as_ref()) {
                if signal.is_dispatch() {
                    debug!(order_id = %signal.order_id, source = %signal.source, "dispatch signal");
                    dispatcher.spawn_fire_call(signal.order_id);
                }
            }
        })
    }
}
