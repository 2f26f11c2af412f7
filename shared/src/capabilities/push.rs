use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::event::PushMessage;

/// Receives push messages while the app is in the foreground.
pub trait NotificationListener: Send + Sync {
    fn on_notification(&self, message: &PushMessage);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, Arc<dyn NotificationListener>)>,
}

/// Foreground listener registry. Listeners are added on mount and removed
/// on unmount; background delivery bypasses it entirely.
#[derive(Default, Clone)]
pub struct NotificationCenter {
    registry: Arc<Mutex<Registry>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn NotificationListener>) -> ListenerId {
        let Ok(mut registry) = self.registry.lock() else {
            return ListenerId(u64::MAX);
        };
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.listeners.push((id, listener));
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let Ok(mut registry) = self.registry.lock() else {
            return false;
        };
        let before = registry.listeners.len();
        registry.listeners.retain(|(lid, _)| *lid != id);
        registry.listeners.len() != before
    }

    /// Fans the message out to every registered listener; returns how many.
    pub fn deliver(&self, message: &PushMessage) -> usize {
        let listeners: Vec<Arc<dyn NotificationListener>> = match self.registry.lock() {
            Ok(registry) => registry.listeners.iter().map(|(_, l)| l.clone()).collect(),
            Err(_) => return 0,
        };
        debug!(listeners = listeners.len(), "delivering foreground notification");
        for listener in &listeners {
            listener.on_notification(message);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().map(|r| r.listeners.len()).unwrap_or(0)
    }
}
