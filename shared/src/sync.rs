use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::capabilities::{OrderFilters, OrderSource, ReloadOptions, SourceError, Subscription};
use crate::event::ReconcileTarget;
use crate::failure::{Failure, FailureKind, FailureReporter};
use crate::model::{DriverId, Order, OrderId, OrderSummary};
use crate::board::OrderBoard;
use crate::realtime_listener::RealtimeEventListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    Applied,
    /// The focus session ended while the fetch was in flight.
    Discarded,
    Failed,
}

// ============================================================================
// Reconcile handle
// ============================================================================

struct SyncState {
    source: Arc<dyn OrderSource>,
    reporter: Arc<dyn FailureReporter>,
    board: Mutex<OrderBoard>,
    filters: Mutex<OrderFilters>,
    epoch: AtomicU64,
    next_ticket: AtomicU64,
    loading_owners: Mutex<LoadingOwners>,
}

/// Which reconcile last raised each loading flag.
#[derive(Default)]
struct LoadingOwners {
    nearby: Option<u64>,
    current: Option<u64>,
}

impl LoadingOwners {
    fn slot(&mut self, target: ReconcileTarget) -> Option<&mut Option<u64>> {
        match target {
            ReconcileTarget::Nearby => Some(&mut self.nearby),
            ReconcileTarget::Current => Some(&mut self.current),
            ReconcileTarget::Active => None,
        }
    }
}

/// Cheap, cloneable entry point for anything that wants a collection
/// re-fetched: timers, socket events, foreground pushes.
#[derive(Clone)]
pub struct ReconcileHandle {
    state: Arc<SyncState>,
}

impl ReconcileHandle {
    pub fn new(source: Arc<dyn OrderSource>, reporter: Arc<dyn FailureReporter>) -> Self {
        Self {
            state: Arc::new(SyncState {
                source,
                reporter,
                board: Mutex::new(OrderBoard::new()),
                filters: Mutex::new(OrderFilters::default()),
                epoch: AtomicU64::new(0),
                next_ticket: AtomicU64::new(1),
                loading_owners: Mutex::new(LoadingOwners::default()),
            }),
        }
    }

    /// Fire-and-forget reconciliation on the current runtime. The focus
    /// session and filters are captured now, not when the task first runs.
    /// Returns `None` without a runtime to spawn on.
    pub fn request(
        &self,
        target: ReconcileTarget,
        options: ReloadOptions,
    ) -> Option<JoinHandle<ReconcileOutcome>> {
        let epoch = self.epoch();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.state.reporter.report(Failure::new(
                FailureKind::RuntimeUnavailable,
                format!("no async runtime; {target} reload skipped"),
            ));
            return None;
        };

        let filters = self.filters();
        let handle = self.clone();
        Some(runtime.spawn(async move {
            handle.reconcile_with(target, &filters, options, epoch).await
        }))
    }

    pub async fn reconcile(&self, target: ReconcileTarget, options: ReloadOptions) -> ReconcileOutcome {
        let epoch = self.epoch();
        let filters = self.filters();
        self.reconcile_with(target, &filters, options, epoch).await
    }

    #[instrument(skip_all, fields(collection = %target, epoch = epoch))]
    async fn reconcile_with(
        &self,
        target: ReconcileTarget,
        filters: &OrderFilters,
        options: ReloadOptions,
        epoch: u64,
    ) -> ReconcileOutcome {
        if self.epoch() != epoch {
            debug!("focus changed before fetch; skipping");
            return ReconcileOutcome::Discarded;
        }
        let ticket = options.set_loading_flag.then(|| self.raise_loading(target));

        let result = self.fetch(target, filters).await;

        if self.epoch() != epoch {
            debug!("focus changed during fetch; discarding result");
            if let Some(ticket) = ticket {
                self.lower_loading(target, ticket);
            }
            return ReconcileOutcome::Discarded;
        }

        match result {
            Ok(orders) => {
                debug!(count = orders.len(), "reconciled");
                self.with_board(|board| {
                    board.replace(target, orders);
                    board.set_loading(target, false);
                });
                ReconcileOutcome::Applied
            }
            Err(e) => {
                self.state.reporter.report(Failure::new(
                    FailureKind::ReconciliationFailed,
                    format!("{target} reload failed: {e}"),
                ));
                self.with_board(|board| board.set_loading(target, false));
                ReconcileOutcome::Failed
            }
        }
    }

    async fn fetch(&self, target: ReconcileTarget, filters: &OrderFilters) -> Result<Vec<Order>, SourceError> {
        let source = &self.state.source;
        match target {
            ReconcileTarget::Nearby => source.fetch_nearby_orders(filters).await,
            ReconcileTarget::Current => source.fetch_current_orders(filters).await,
            ReconcileTarget::Active => source.fetch_active_orders().await,
        }
    }

    fn with_board<T>(&self, f: impl FnOnce(&mut OrderBoard) -> T) -> Option<T> {
        match self.state.board.lock() {
            Ok(mut board) => Some(f(&mut board)),
            Err(_) => {
                warn!("order board lock poisoned");
                None
            }
        }
    }

    fn filters(&self) -> OrderFilters {
        self.state
            .filters
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    /// Raises the loading flag and records this reconcile as its owner.
    fn raise_loading(&self, target: ReconcileTarget) -> u64 {
        let ticket = self.state.next_ticket.fetch_add(1, Ordering::SeqCst);
        let mut owners = self.state.loading_owners.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = owners.slot(target) {
            *slot = Some(ticket);
        }
        self.with_board(|board| board.set_loading(target, true));
        ticket
    }

    /// Lowers the flag only if no later reconcile has raised it since.
    fn lower_loading(&self, target: ReconcileTarget, ticket: u64) {
        let mut owners = self.state.loading_owners.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = owners.slot(target) {
            if *slot == Some(ticket) {
                *slot = None;
                self.with_board(|board| board.set_loading(target, false));
            }
        }
    }

    fn epoch(&self) -> u64 {
        self.state.epoch.load(Ordering::SeqCst)
    }

    fn bump_epoch(&self) {
        self.state.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> OrderBoard {
        self.with_board(|board| board.clone()).unwrap_or_default()
    }

    pub fn revision(&self) -> u64 {
        self.with_board(|board| board.revision).unwrap_or(0)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

struct FocusSession {
    driver_id: DriverId,
    timers: Vec<JoinHandle<()>>,
    subscription: Option<Box<dyn Subscription>>,
}

pub struct OrderSyncOrchestrator {
    reconcile: ReconcileHandle,
    listener: RealtimeEventListener,
    nearby_interval: Duration,
    current_interval: Duration,
    session: tokio::sync::Mutex<Option<FocusSession>>,
    focused: AtomicBool,
}

impl OrderSyncOrchestrator {
    pub fn new(
        reconcile: ReconcileHandle,
        listener: RealtimeEventListener,
        nearby_interval: Duration,
        current_interval: Duration,
    ) -> Self {
        Self {
            reconcile,
            listener,
            nearby_interval,
            current_interval,
            session: tokio::sync::Mutex::new(None),
            focused: AtomicBool::new(false),
        }
    }

    /// Screen gained focus: catch up on active and current orders, start
    /// both polling loops and subscribe to the driver channel. A second
    /// focus without a blur replaces the previous session.
    #[instrument(skip_all, fields(driver_id = %driver_id))]
    pub async fn on_focus(&self, driver_id: &DriverId) {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            debug!(previous = %previous.driver_id, "replacing focus session");
            Self::teardown(previous);
        }

        self.reconcile.bump_epoch();
        self.focused.store(true, Ordering::SeqCst);

        self.reconcile.request(ReconcileTarget::Active, ReloadOptions::default());
        self.reconcile.request(ReconcileTarget::Current, ReloadOptions::default());

        let timers = vec![
            self.spawn_loop(self.nearby_interval, ReconcileTarget::Nearby),
            self.spawn_loop(self.current_interval, ReconcileTarget::Current),
        ];
        let subscription = self.listener.subscribe(driver_id).await;

        info!(subscribed = subscription.is_some(), "order sync started");
        *session = Some(FocusSession {
            driver_id: driver_id.clone(),
            timers,
            subscription,
        });
    }

    /// Screen lost focus: stop timers and the subscription. Fetches already
    /// in flight finish but their results are dropped.
    pub async fn on_blur(&self) {
        let mut session = self.session.lock().await;
        self.reconcile.bump_epoch();
        self.focused.store(false, Ordering::SeqCst);
        self.reconcile.with_board(OrderBoard::clear_loading);

        if let Some(previous) = session.take() {
            Self::teardown(previous);
            info!("order sync stopped");
        }
    }

    fn teardown(session: FocusSession) {
        for timer in &session.timers {
            timer.abort();
        }
        if let Some(subscription) = session.subscription {
            subscription.stop();
        }
    }

    fn spawn_loop(&self, period: Duration, target: ReconcileTarget) -> JoinHandle<()> {
        let reconcile = self.reconcile.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // skip immediate tick
            loop {
                interval.tick().await;
                debug!(collection = %target, "refresh tick");
                reconcile.request(target, ReloadOptions::silent());
            }
        })
    }

    pub fn is_focused(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }

    // --- Reconciliation entry points ---

    pub async fn reload_nearby_orders(&self, filters: &OrderFilters, options: ReloadOptions) -> ReconcileOutcome {
        self.reconcile
            .reconcile_with(ReconcileTarget::Nearby, filters, options, self.reconcile.epoch())
            .await
    }

    pub async fn reload_current_orders(&self, filters: &OrderFilters, options: ReloadOptions) -> ReconcileOutcome {
        self.reconcile
            .reconcile_with(ReconcileTarget::Current, filters, options, self.reconcile.epoch())
            .await
    }

    pub async fn reload_active_orders(&self) -> ReconcileOutcome {
        self.reconcile
            .reconcile_with(
                ReconcileTarget::Active,
                &OrderFilters::default(),
                ReloadOptions::default(),
                self.reconcile.epoch(),
            )
            .await
    }

    /// Pull-to-refresh on the current list.
    pub async fn refresh_current(&self) -> ReconcileOutcome {
        self.reconcile
            .reconcile(ReconcileTarget::Current, ReloadOptions::default())
            .await
    }

    /// Filters used by timer, socket and push triggered reloads.
    pub fn set_filters(&self, filters: OrderFilters) {
        if let Ok(mut current) = self.reconcile.state.filters.lock() {
            *current = filters;
        }
    }

    // --- Adhoc orders ---

    /// The driver accepted an adhoc order elsewhere; both lists change.
    pub async fn on_adhoc_accepted(&self) -> (ReconcileOutcome, ReconcileOutcome) {
        let nearby = self.reconcile.reconcile(ReconcileTarget::Nearby, ReloadOptions::default());
        let current = self.reconcile.reconcile(ReconcileTarget::Current, ReloadOptions::default());
        tokio::join!(nearby, current)
    }

    /// Local-only hide. Never reaches the order source.
    pub fn dismiss_adhoc(&self, order_id: &OrderId) -> bool {
        self.reconcile
            .with_board(|board| board.dismiss(order_id))
            .unwrap_or(false)
    }

    // --- Read side ---

    pub fn snapshot(&self) -> OrderBoard {
        self.reconcile.snapshot()
    }

    pub fn visible_orders(&self) -> Vec<Order> {
        self.reconcile
            .with_board(|board| board.visible_orders().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> OrderSummary {
        self.reconcile
            .with_board(|board| board.summary())
            .unwrap_or_default()
    }

    pub fn reconcile_handle(&self) -> ReconcileHandle {
        self.reconcile.clone()
    }
}
