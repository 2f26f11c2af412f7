use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::call_alert::CallAlertDispatcher;
use crate::capabilities::{
    CallAlertIntegration, CapabilityError, InMemoryKvStore, KeyValueStore, ListenerId,
    NotificationCenter, OrderSource, RealtimeTransport,
};
use crate::config::{ConfigError, CoreConfig};
use crate::dedup::DedupStore;
use crate::failure::FailureReporter;
use crate::push_handler::{ForegroundPushListener, PushHandling, PushSignalHandler};
use crate::realtime_listener::RealtimeEventListener;
use crate::sync::{OrderSyncOrchestrator, ReconcileHandle};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// Everything the host provides.
pub struct Collaborators {
    pub kv: Arc<dyn KeyValueStore>,
    /// `None` where the native call UI is missing (simulators, tests).
    pub telephony: Option<Arc<dyn CallAlertIntegration>>,
    pub realtime: Arc<dyn RealtimeTransport>,
    pub orders: Arc<dyn OrderSource>,
    pub reporter: Arc<dyn FailureReporter>,
}

pub struct DispatchApp {
    config: CoreConfig,
    dispatcher: Arc<CallAlertDispatcher>,
    push: Arc<PushSignalHandler>,
    orders: OrderSyncOrchestrator,
}

impl DispatchApp {
    pub fn new(config: CoreConfig, collaborators: Collaborators) -> Result<Self, AppError> {
        config.validate()?;
        let Collaborators {
            kv,
            telephony,
            realtime,
            orders,
            reporter,
        } = collaborators;

        let dedup = DedupStore::new(kv, reporter.clone());
        let dispatcher = Arc::new(CallAlertDispatcher::new(
            telephony,
            dedup,
            config.alert.clone(),
            reporter.clone(),
        ));
        let push = Arc::new(PushSignalHandler::new(dispatcher.clone(), reporter.clone()));

        let reconcile = ReconcileHandle::new(orders, reporter.clone());
        let listener = RealtimeEventListener::new(
            realtime,
            reconcile.clone(),
            Some(dispatcher.clone()),
            reporter,
        );
        let orders = OrderSyncOrchestrator::new(
            reconcile,
            listener,
            config.nearby_refresh_interval(),
            config.current_refresh_interval(),
        );

        info!(
            platform = ?config.alert.platform,
            persistent_dedup = config.dedup_db_path.is_some(),
            "dispatch core ready"
        );
        Ok(Self {
            config,
            dispatcher,
            push,
            orders,
        })
    }

    /// Like [`DispatchApp::new`], with the dedup store opened from
    /// `config.dedup_db_path`.
    pub fn open(
        config: CoreConfig,
        telephony: Option<Arc<dyn CallAlertIntegration>>,
        realtime: Arc<dyn RealtimeTransport>,
        orders: Arc<dyn OrderSource>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Result<Self, AppError> {
        let kv = open_dedup_store(&config)?;
        Self::new(
            config,
            Collaborators {
                kv,
                telephony,
                realtime,
                orders,
                reporter,
            },
        )
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<CallAlertDispatcher> {
        &self.dispatcher
    }

    pub fn push_handler(&self) -> &Arc<PushSignalHandler> {
        &self.push
    }

    pub fn orders(&self) -> &OrderSyncOrchestrator {
        &self.orders
    }

    /// Entry point for the platform's background message handler.
    pub fn handle_background_push(&self, payload: serde_json::Value) -> PushHandling {
        self.push.handle_background_json(payload)
    }

    /// Registers the foreground listener; remove it with the returned id on unmount.
    pub fn mount_notifications(&self, center: &NotificationCenter) -> ListenerId {
        center.add_listener(Arc::new(ForegroundPushListener::new(
            self.push.clone(),
            self.orders.reconcile_handle(),
        )))
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn open_dedup_store(config: &CoreConfig) -> Result<Arc<dyn KeyValueStore>, CapabilityError> {
    match &config.dedup_db_path {
        Some(path) => Ok(Arc::new(crate::capabilities::SqliteKvStore::open(path)?)),
        None => Ok(Arc::new(InMemoryKvStore::new())),
    }
}

#[cfg(target_arch = "wasm32")]
pub fn open_dedup_store(config: &CoreConfig) -> Result<Arc<dyn KeyValueStore>, CapabilityError> {
    if config.dedup_db_path.is_some() {
        tracing::warn!("persistent dedup store unavailable on this target; using memory");
    }
    Ok(Arc::new(InMemoryKvStore::new()))
}
