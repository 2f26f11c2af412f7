use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub type EventCallback = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Handle to a live channel subscription.
pub trait Subscription: Send + Sync {
    fn stop(&self);
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RealtimeError {
    #[error("not connected")]
    NotConnected,

    #[error("invalid channel name: {0}")]
    InvalidChannel(String),

    #[error("subscribe failed: {message}")]
    SubscribeFailed { message: String, is_retryable: bool },
}

impl RealtimeError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NotConnected => true,
            Self::SubscribeFailed { is_retryable, .. } => *is_retryable,
            Self::InvalidChannel(_) => false,
        }
    }
}

/// Persistent socket connection with named channels. Reconnection is the
/// transport's business.
#[async_trait::async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn listen(
        &self,
        channel: &str,
        on_event: EventCallback,
    ) -> Result<Box<dyn Subscription>, RealtimeError>;
}

// ============================================================================
// In-process hub
// ============================================================================

type Channels = HashMap<String, Vec<(Uuid, EventCallback)>>;

/// In-process transport: `publish` fans a JSON body out to every listener
/// on the channel.
#[derive(Default, Clone)]
pub struct LocalRealtimeHub {
    channels: Arc<Mutex<Channels>>,
}

impl LocalRealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of listeners reached.
    pub fn publish(&self, channel: &str, body: serde_json::Value) -> usize {
        // Snapshot so callbacks can subscribe/stop without deadlocking.
        let callbacks: Vec<EventCallback> = match self.channels.lock() {
            Ok(channels) => channels
                .get(channel)
                .map(|subs| subs.iter().map(|(_, cb)| cb.clone()).collect())
                .unwrap_or_default(),
            Err(_) => return 0,
        };
        for callback in &callbacks {
            callback(body.clone());
        }
        callbacks.len()
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .map(|channels| channels.get(channel).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

struct HubSubscription {
    channels: Arc<Mutex<Channels>>,
    channel: String,
    id: Uuid,
}

impl Subscription for HubSubscription {
    fn stop(&self) {
        if let Ok(mut channels) = self.channels.lock() {
            if let Some(subs) = channels.get_mut(&self.channel) {
                subs.retain(|(id, _)| *id != self.id);
                if subs.is_empty() {
                    channels.remove(&self.channel);
                }
            }
        }
        debug!(channel = %self.channel, subscription = %self.id, "subscription stopped");
    }
}

#[async_trait::async_trait]
impl RealtimeTransport for LocalRealtimeHub {
    async fn listen(
        &self,
        channel: &str,
        on_event: EventCallback,
    ) -> Result<Box<dyn Subscription>, RealtimeError> {
        if channel.trim().is_empty() {
            return Err(RealtimeError::InvalidChannel(channel.to_string()));
        }
        let id = Uuid::new_v4();
        self.channels
            .lock()
            .map_err(|_| RealtimeError::NotConnected)?
            .entry(channel.to_string())
            .or_default()
            .push((id, on_event));
        debug!(channel, subscription = %id, "subscribed");
        Ok(Box::new(HubSubscription {
            channels: self.channels.clone(),
            channel: channel.to_string(),
            id,
        }))
    }
}
