use serde::{Deserialize, Serialize};
use std::fmt;

// --- Typed IDs ---

/// Wire form of an identifier: the order source and push payloads send
/// either strings or bare numbers.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum IdRepr {
    Text(String),
    Number(serde_json::Number),
}

impl From<IdRepr> for String {
    fn from(repr: IdRepr) -> Self {
        match repr {
            IdRepr::Text(s) => s,
            IdRepr::Number(n) => n.to_string(),
        }
    }
}

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(from = "IdRepr", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<IdRepr> for $name {
            fn from(repr: IdRepr) -> Self {
                Self(repr.into())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<u64> for $name {
            fn from(n: u64) -> Self {
                Self(n.to_string())
            }
        }
    };
}

typed_id!(OrderId);
typed_id!(DriverId);

/// Validated lat/lon
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() { return None; }
        if !(-90.0..=90.0).contains(&lat) { return None; }
        if !(-180.0..=180.0).contains(&lon) { return None; }
        Some(Self { lat, lon })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Created,
    Dispatched,
    Started,
    Completed,
    Canceled,
    Other(String),
}

impl OrderStatus {
    /// Statuses that no longer (or not yet) need driver attention.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Completed | Self::Created | Self::Canceled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Dispatched => "dispatched",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self { Self::Created }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => Self::Created,
            "dispatched" => Self::Dispatched,
            "started" => Self::Started,
            "completed" => Self::Completed,
            "canceled" => Self::Canceled,
            _ => Self::Other(s),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pickup, dropoff or waypoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Place {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub location: Option<LatLon>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct OrderPayload {
    #[serde(default)]
    pub pickup: Option<Place>,
    #[serde(default)]
    pub dropoff: Option<Place>,
    #[serde(default)]
    pub waypoints: Option<Vec<Option<Place>>>,
}

impl OrderPayload {
    /// Pickup, dropoff, then waypoints in order, skipping absent entries.
    pub fn stops(&self) -> impl Iterator<Item = &Place> {
        self.pickup
            .iter()
            .chain(self.dropoff.iter())
            .chain(self.waypoints.iter().flatten().flatten())
    }
}

/// Order as returned by the remote order source. This core only reads it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub adhoc: bool,
    /// Driver reference; its shape is owned by the order source.
    #[serde(default)]
    pub driver_assigned: Option<serde_json::Value>,
    #[serde(default)]
    pub payload: Option<OrderPayload>,
    /// Estimated duration in seconds.
    #[serde(default)]
    pub time: Option<f64>,
    /// Route distance in meters.
    #[serde(default)]
    pub distance: Option<f64>,
}

impl Order {
    pub fn new(id: impl Into<OrderId>, status: OrderStatus) -> Self {
        Self {
            id: id.into(),
            status,
            adhoc: false,
            driver_assigned: None,
            payload: None,
            time: None,
            distance: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Open for ad-hoc pickup and not yet claimed by any driver.
    pub fn is_adhoc_unassigned(&self) -> bool {
        self.adhoc && self.driver_assigned.is_none()
    }

    pub fn stop_count(&self) -> usize {
        self.payload.as_ref().map_or(0, |p| p.stops().count())
    }

    fn time_or_zero(&self) -> f64 {
        self.time.filter(|t| t.is_finite()).unwrap_or(0.0)
    }

    fn distance_or_zero(&self) -> f64 {
        self.distance.filter(|d| d.is_finite()).unwrap_or(0.0)
    }
}

pub fn active_orders(orders: &[Order]) -> impl Iterator<Item = &Order> {
    orders.iter().filter(|o| o.is_active())
}

/// Header figures for the driver's day.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_count: usize,
    pub stop_count: usize,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
}

impl OrderSummary {
    /// Aggregates over the given orders as-is; callers filter to active first.
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        orders.into_iter().fold(Self::default(), |mut acc, order| {
            acc.order_count += 1;
            acc.stop_count += order.stop_count();
            acc.total_distance_m += order.distance_or_zero();
            acc.total_duration_s += order.time_or_zero();
            acc
        })
    }

    pub fn of_active(orders: &[Order]) -> Self {
        Self::from_orders(active_orders(orders))
    }
}
