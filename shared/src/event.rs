use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::OrderId;

/// `type` value carried by a push or socket payload for a newly dispatched order.
pub const ORDER_DISPATCHED: &str = "order_dispatched";
/// Push ids with this prefix refer to an order and warrant a current-orders reconciliation.
pub const ORDER_ID_PREFIX: &str = "order_";
pub const EVENT_ORDER_READY: &str = "order.ready";
pub const EVENT_ORDER_PING: &str = "order.ping";

// --- Push payloads ---

/// `{ data: { id, type } }` as delivered by the push transport.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    #[serde(default)]
    pub data: PushData,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushData {
    #[serde(default)]
    pub id: Option<OrderId>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl PushMessage {
    pub fn new(id: impl Into<OrderId>, kind: impl Into<String>) -> Self {
        Self {
            data: PushData {
                id: Some(id.into()),
                kind: Some(kind.into()),
            },
        }
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, SignalError> {
        serde_json::from_value(value).map_err(|e| SignalError::Malformed(e.to_string()))
    }

    /// True when the id names an order (`order_...`), whatever the type.
    pub fn refers_to_order(&self) -> bool {
        self.data
            .id
            .as_ref()
            .is_some_and(|id| id.as_str().starts_with(ORDER_ID_PREFIX))
    }
}

// --- Signals ---

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    OrderDispatched,
    Other(String),
}

impl SignalKind {
    pub fn parse(raw: &str) -> Self {
        if raw == ORDER_DISPATCHED {
            Self::OrderDispatched
        } else {
            Self::Other(raw.to_string())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Push,
    Socket,
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => f.write_str("push"),
            Self::Socket => f.write_str("socket"),
        }
    }
}

/// Normalized "something happened to an order" value. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchSignal {
    pub order_id: OrderId,
    pub kind: SignalKind,
    pub source: SignalSource,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("payload has no id")]
    MissingId,
    #[error("payload has no type")]
    MissingType,
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl DispatchSignal {
    pub fn from_push(message: &PushMessage) -> Result<Self, SignalError> {
        Self::from_parts(&message.data, SignalSource::Push)
    }

    fn from_parts(data: &PushData, source: SignalSource) -> Result<Self, SignalError> {
        let order_id = data.id.clone().ok_or(SignalError::MissingId)?;
        let kind = data.kind.as_deref().ok_or(SignalError::MissingType)?;
        Ok(Self {
            order_id,
            kind: SignalKind::parse(kind),
            source,
        })
    }

    pub fn is_dispatch(&self) -> bool {
        self.kind == SignalKind::OrderDispatched
    }
}

// --- Realtime events ---

/// Order collection a reconciliation refreshes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileTarget {
    Nearby,
    Current,
    Active,
}

impl fmt::Display for ReconcileTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearby => f.write_str("nearby"),
            Self::Current => f.write_str("current"),
            Self::Active => f.write_str("active"),
        }
    }
}

#[derive(Deserialize)]
struct RawRealtimeEvent {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Option<PushData>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RealtimeEventKind {
    OrderReady,
    OrderPing,
    Other(String),
}

/// Event received on the driver channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealtimeEvent {
    pub kind: RealtimeEventKind,
    /// Set when the body carries a `data: { id, type }` block.
    pub signal: Option<DispatchSignal>,
}

impl RealtimeEvent {
    pub fn from_json(value: serde_json::Value) -> Result<Self, SignalError> {
        let raw: RawRealtimeEvent =
            serde_json::from_value(value).map_err(|e| SignalError::Malformed(e.to_string()))?;
        let name = raw.event.ok_or_else(|| SignalError::Malformed("missing event".into()))?;
        let kind = match name.as_str() {
            EVENT_ORDER_READY => RealtimeEventKind::OrderReady,
            EVENT_ORDER_PING => RealtimeEventKind::OrderPing,
            _ => RealtimeEventKind::Other(name),
        };
        let signal = raw
            .data
            .as_ref()
            .and_then(|data| DispatchSignal::from_parts(data, SignalSource::Socket).ok());
        Ok(Self { kind, signal })
    }

    pub fn reconcile_target(&self) -> Option<ReconcileTarget> {
        match self.kind {
            RealtimeEventKind::OrderReady => Some(ReconcileTarget::Current),
            RealtimeEventKind::OrderPing => Some(ReconcileTarget::Nearby),
            RealtimeEventKind::Other(_) => None,
        }
    }
}
