// lib.rs - Order dispatch alerting and order sync core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod app;
pub mod board;
pub mod call_alert;
pub mod capabilities;
pub mod config;
pub mod dedup;
pub mod event;
pub mod failure;
pub mod model;
pub mod push_handler;
pub mod realtime_listener;
pub mod sync;

use std::time::Duration;

pub use app::{AppError, Collaborators, DispatchApp};
pub use board::OrderBoard;
pub use call_alert::{
    AlertMetricsSnapshot, CallAlertDispatcher, CallEventRouter, FireOutcome, IntegrationState,
};
pub use config::{AlertConfig, ConfigError, CoreConfig, Platform};
pub use dedup::DedupStore;
pub use event::{DispatchSignal, PushMessage, RealtimeEvent, ReconcileTarget, SignalKind, SignalSource};
pub use failure::{Failure, FailureKind, FailureReporter, RecordingReporter, TracingReporter};
pub use model::{DriverId, Order, OrderId, OrderStatus, OrderSummary};
pub use push_handler::{ForegroundPushListener, PushHandling, PushSignalHandler};
pub use realtime_listener::{channel_name, RealtimeEventListener};
pub use sync::{OrderSyncOrchestrator, ReconcileHandle, ReconcileOutcome};

pub const NEARBY_REFRESH_INTERVAL: Duration =
    Duration::from_millis(config::DEFAULT_NEARBY_REFRESH_MS);
pub const CURRENT_REFRESH_INTERVAL: Duration =
    Duration::from_millis(config::DEFAULT_CURRENT_REFRESH_MS);
pub const ANDROID_DISPLAY_DELAY: Duration =
    Duration::from_millis(config::DEFAULT_ANDROID_DISPLAY_DELAY_MS);
pub const CALLER_NAME: &str = config::DEFAULT_CALLER_NAME;
