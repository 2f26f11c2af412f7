use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::event::ReconcileTarget;
use crate::model::{active_orders, Order, OrderId, OrderSummary};

/// In-memory order collections the driver screen renders from.
///
/// Every mutation bumps `revision`, so "nothing changed" is observable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBoard {
    pub nearby_orders: Vec<Order>,
    pub current_orders: Vec<Order>,
    pub all_active_orders: Vec<Order>,
    /// Session-local; never persisted or sent anywhere.
    pub dismissed: BTreeSet<OrderId>,
    pub is_fetching_nearby: bool,
    pub is_fetching_current: bool,
    pub revision: u64,
}

impl OrderBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn replace(&mut self, target: ReconcileTarget, orders: Vec<Order>) {
        match target {
            ReconcileTarget::Nearby => self.nearby_orders = orders,
            ReconcileTarget::Current => self.current_orders = orders,
            ReconcileTarget::Active => self.all_active_orders = orders,
        }
        self.revision += 1;
    }

    pub(crate) fn set_loading(&mut self, target: ReconcileTarget, loading: bool) {
        let flag = match target {
            ReconcileTarget::Nearby => &mut self.is_fetching_nearby,
            ReconcileTarget::Current => &mut self.is_fetching_current,
            ReconcileTarget::Active => return,
        };
        if *flag != loading {
            *flag = loading;
            self.revision += 1;
        }
    }

    pub(crate) fn clear_loading(&mut self) {
        self.set_loading(ReconcileTarget::Nearby, false);
        self.set_loading(ReconcileTarget::Current, false);
    }

    /// Hides an adhoc-unassigned order on the board. Returns `false` when
    /// nothing changed, including for ids no list holds.
    pub(crate) fn dismiss(&mut self, order_id: &OrderId) -> bool {
        let dismissible = self
            .nearby_orders
            .iter()
            .chain(self.current_orders.iter())
            .any(|o| &o.id == order_id && o.is_adhoc_unassigned());
        if !dismissible || !self.dismissed.insert(order_id.clone()) {
            return false;
        }
        self.revision += 1;
        true
    }

    pub fn is_dismissed(&self, order_id: &OrderId) -> bool {
        self.dismissed.contains(order_id)
    }

    /// Nearby then current, minus dismissed adhoc-unassigned entries.
    pub fn visible_orders(&self) -> Vec<&Order> {
        self.nearby_orders
            .iter()
            .chain(self.current_orders.iter())
            .filter(|o| !(o.is_adhoc_unassigned() && self.dismissed.contains(&o.id)))
            .collect()
    }

    pub fn active_current_orders(&self) -> Vec<&Order> {
        active_orders(&self.current_orders).collect()
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary::of_active(&self.current_orders)
    }
}
