use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tracing::{error, warn};

use crate::model::OrderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    EmptyOrderId,
    IntegrationUnavailable,
    InitializationFailed,
    ListenerSetupFailed,
    DisplayFailed,
    CallEventHandlingFailed,
    StorageReadFailed,
    StorageWriteFailed,
    ReconciliationFailed,
    SubscriptionFailed,
    MalformedPayload,
    RuntimeUnavailable,
}

impl FailureKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::EmptyOrderId => "EMPTY_ORDER_ID",
            Self::IntegrationUnavailable => "INTEGRATION_UNAVAILABLE",
            Self::InitializationFailed => "INITIALIZATION_FAILED",
            Self::ListenerSetupFailed => "LISTENER_SETUP_FAILED",
            Self::DisplayFailed => "DISPLAY_FAILED",
            Self::CallEventHandlingFailed => "CALL_EVENT_HANDLING_FAILED",
            Self::StorageReadFailed => "STORAGE_READ_FAILED",
            Self::StorageWriteFailed => "STORAGE_WRITE_FAILED",
            Self::ReconciliationFailed => "RECONCILIATION_FAILED",
            Self::SubscriptionFailed => "SUBSCRIPTION_FAILED",
            Self::MalformedPayload => "MALFORMED_PAYLOAD",
            Self::RuntimeUnavailable => "RUNTIME_UNAVAILABLE",
        }
    }

    /// Whether a later delivery or tick gets another attempt at the same work.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::InitializationFailed
                | Self::ListenerSetupFailed
                | Self::DisplayFailed
                | Self::StorageReadFailed
                | Self::ReconciliationFailed
                | Self::SubscriptionFailed
        )
    }

    /// Expected in degraded environments (simulators, junk payloads).
    #[must_use]
    pub const fn is_degradation(self) -> bool {
        matches!(
            self,
            Self::EmptyOrderId
                | Self::IntegrationUnavailable
                | Self::MalformedPayload
                | Self::RuntimeUnavailable
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub order_id: Option<OrderId>,
    pub message: String,
}

impl Failure {
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            order_id: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn for_order(mut self, order_id: &OrderId) -> Self {
        self.order_id = Some(order_id.clone());
        self
    }
}

pub trait FailureReporter: Send + Sync {
    fn report(&self, failure: Failure);
}

/// Default reporter: one structured log line per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, failure: Failure) {
        let order_id = failure.order_id.as_ref().map_or("", OrderId::as_str);
        if failure.kind.is_degradation() {
            warn!(code = failure.kind.code(), order_id, "{}", failure.message);
        } else {
            error!(code = failure.kind.code(), order_id, "{}", failure.message);
        }
    }
}

/// Keeps every failure in memory, then forwards it to tracing.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    failures: Mutex<Vec<Failure>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.failures.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<FailureKind> {
        self.failures().into_iter().map(|f| f.kind).collect()
    }

    pub fn count(&self, kind: FailureKind) -> usize {
        self.failures().iter().filter(|f| f.kind == kind).count()
    }
}

impl FailureReporter for RecordingReporter {
    fn report(&self, failure: Failure) {
        TracingReporter.report(failure.clone());
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(FailureKind::DisplayFailed.code(), "DISPLAY_FAILED");
        assert_eq!(FailureKind::StorageWriteFailed.to_string(), "STORAGE_WRITE_FAILED");
    }

    #[test]
    fn retry_classification() {
        assert!(FailureKind::InitializationFailed.is_retryable());
        assert!(FailureKind::DisplayFailed.is_retryable());
        assert!(FailureKind::ReconciliationFailed.is_retryable());
        assert!(!FailureKind::IntegrationUnavailable.is_retryable());
        assert!(!FailureKind::StorageWriteFailed.is_retryable());
        assert!(FailureKind::EmptyOrderId.is_degradation());
        assert!(!FailureKind::DisplayFailed.is_degradation());
        assert!(FailureKind::RuntimeUnavailable.is_degradation());
        assert!(!FailureKind::RuntimeUnavailable.is_retryable());
    }

    #[test]
    fn recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        let id = OrderId::new("order_1");
        reporter.report(Failure::new(FailureKind::InitializationFailed, "setup rejected").for_order(&id));
        reporter.report(Failure::new(FailureKind::DisplayFailed, "boom"));

        assert_eq!(
            reporter.kinds(),
            vec![FailureKind::InitializationFailed, FailureKind::DisplayFailed]
        );
        assert_eq!(reporter.failures()[0].order_id, Some(id));
        assert_eq!(reporter.count(FailureKind::DisplayFailed), 1);
    }
}
