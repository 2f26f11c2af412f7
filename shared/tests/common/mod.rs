#![allow(dead_code)]

use navigator_core::capabilities::{
    CallAlertIntegration, CallEvent, CallEventListener, OrderFilters, OrderSource, SetupOptions,
    SourceError, TelephonyError,
};
use navigator_core::{Order, OrderId, OrderStatus};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// --- Telephony ---

#[derive(Default)]
pub struct ScriptedTelephony {
    pub setup_failures: AtomicUsize,
    pub fail_display: AtomicBool,
    pub setup_calls: AtomicUsize,
    pub foreground_calls: AtomicUsize,
    pub displayed: Mutex<Vec<String>>,
    pub ended: Mutex<Vec<String>>,
    listeners: Mutex<Vec<Arc<dyn CallEventListener>>>,
}

impl ScriptedTelephony {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn displayed(&self) -> Vec<String> {
        self.displayed.lock().unwrap().clone()
    }

    pub fn emit(&self, event: CallEvent) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_call_event(event.clone());
        }
    }
}

#[async_trait::async_trait]
impl CallAlertIntegration for ScriptedTelephony {
    async fn setup(&self, _options: &SetupOptions) -> Result<(), TelephonyError> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        if self.setup_failures.load(Ordering::SeqCst) > 0 {
            self.setup_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(TelephonyError::PermissionDenied);
        }
        Ok(())
    }

    async fn display_incoming_call(
        &self,
        call_id: &str,
        _handle: &str,
        _caller_name: &str,
    ) -> Result<(), TelephonyError> {
        if self.fail_display.load(Ordering::SeqCst) {
            return Err(TelephonyError::native("display failed"));
        }
        self.displayed.lock().unwrap().push(call_id.to_string());
        Ok(())
    }

    fn end_call(&self, call_id: &str) -> Result<(), TelephonyError> {
        self.ended.lock().unwrap().push(call_id.to_string());
        Ok(())
    }

    fn back_to_foreground(&self) -> Result<(), TelephonyError> {
        self.foreground_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn add_event_listener(&self, listener: Arc<dyn CallEventListener>) -> Result<(), TelephonyError> {
        self.listeners.lock().unwrap().push(listener);
        Ok(())
    }
}

// --- Order source ---

#[derive(Default)]
pub struct CountingOrderSource {
    pub nearby_calls: AtomicUsize,
    pub current_calls: AtomicUsize,
    pub active_calls: AtomicUsize,
    pub nearby: Mutex<Vec<Order>>,
    pub current: Mutex<Vec<Order>>,
}

impl CountingOrderSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.nearby_calls.load(Ordering::SeqCst),
            self.current_calls.load(Ordering::SeqCst),
            self.active_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait::async_trait]
impl OrderSource for CountingOrderSource {
    async fn fetch_nearby_orders(&self, _filters: &OrderFilters) -> Result<Vec<Order>, SourceError> {
        self.nearby_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.nearby.lock().unwrap().clone())
    }

    async fn fetch_current_orders(&self, _filters: &OrderFilters) -> Result<Vec<Order>, SourceError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.current.lock().unwrap().clone())
    }

    async fn fetch_active_orders(&self) -> Result<Vec<Order>, SourceError> {
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.current.lock().unwrap().iter().filter(|o| o.is_active()).cloned().collect())
    }
}

pub fn order(id: &str, status: OrderStatus) -> Order {
    Order::new(OrderId::new(id), status)
}

pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
