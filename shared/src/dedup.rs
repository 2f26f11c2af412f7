use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

use crate::capabilities::KeyValueStore;
use crate::failure::{Failure, FailureKind, FailureReporter};
use crate::model::OrderId;

pub struct DedupStore {
    store: Arc<dyn KeyValueStore>,
    reporter: Arc<dyn FailureReporter>,
    in_flight: Mutex<HashSet<OrderId>>,
}

impl DedupStore {
    pub fn new(store: Arc<dyn KeyValueStore>, reporter: Arc<dyn FailureReporter>) -> Self {
        Self {
            store,
            reporter,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// True only when a non-empty record exists for the id.
    #[instrument(skip_all, fields(order_id = %order_id))]
    pub async fn has(&self, order_id: &OrderId) -> bool {
        match self.store.get_item(order_id.as_str()).await {
            Ok(Some(value)) => !value.is_empty(),
            Ok(None) => false,
            Err(e) => {
                self.reporter.report(
                    Failure::new(FailureKind::StorageReadFailed, e.to_string()).for_order(order_id),
                );
                false
            }
        }
    }

    #[instrument(skip_all, fields(order_id = %order_id))]
    pub async fn mark_alerted(&self, order_id: &OrderId) {
        match self
            .store
            .set_item(order_id.as_str(), order_id.as_str())
            .await
        {
            Ok(()) => debug!("alert recorded"),
            Err(e) => self.reporter.report(
                Failure::new(FailureKind::StorageWriteFailed, e.to_string()).for_order(order_id),
            ),
        }
    }

    /// Claims the id for the current process. `None` means another fire for
    /// the same id is between its check and its record.
    pub fn try_begin(&self, order_id: &OrderId) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().ok()?;
        if !in_flight.insert(order_id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            owner: self,
            order_id: order_id.clone(),
        })
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().map(|set| set.len()).unwrap_or(0)
    }
}

/// Releases the in-flight claim on drop.
pub struct InFlightGuard<'a> {
    owner: &'a DedupStore,
    order_id: OrderId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.owner.in_flight.lock() {
            in_flight.remove(&self.order_id);
        }
    }
}
