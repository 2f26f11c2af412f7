use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IosSetup {
    pub app_name: String,
    pub supports_video: bool,
}

impl Default for IosSetup {
    fn default() -> Self {
        Self {
            app_name: "Navigator".to_string(),
            supports_video: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AndroidSetup {
    pub alert_title: String,
    pub alert_description: String,
    pub cancel_button: String,
    pub ok_button: String,
    pub additional_permissions: Vec<String>,
    pub self_managed: bool,
}

impl Default for AndroidSetup {
    fn default() -> Self {
        Self {
            alert_title: "Permissions required".to_string(),
            alert_description: "This application needs to access your phone accounts".to_string(),
            cancel_button: "Cancel".to_string(),
            ok_button: "OK".to_string(),
            additional_permissions: Vec::new(),
            self_managed: false,
        }
    }
}

/// Options passed once to the native call-alert integration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SetupOptions {
    pub ios: IosSetup,
    pub android: AndroidSetup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    Answered { call_uuid: String },
    Ended { call_uuid: String },
}

impl CallEvent {
    pub fn call_uuid(&self) -> &str {
        match self {
            Self::Answered { call_uuid } | Self::Ended { call_uuid } => call_uuid,
        }
    }
}

pub trait CallEventListener: Send + Sync {
    fn on_call_event(&self, event: CallEvent);
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TelephonyError {
    #[error("call-alert integration not available on this platform")]
    NotAvailable,

    #[error("permission denied by user")]
    PermissionDenied,

    #[error("setup rejected: {reason}")]
    SetupRejected { reason: String },

    #[error("unknown call: {call_id}")]
    UnknownCall { call_id: String },

    #[error("native error: {message}")]
    Native { message: String },
}

impl TelephonyError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::SetupRejected { .. } | Self::Native { .. })
    }

    #[must_use]
    pub fn native(message: impl Into<String>) -> Self {
        Self::Native {
            message: message.into(),
        }
    }
}

/// Native incoming-call UI, used as a high-attention alert rather than a
/// real telephony session. The call id doubles as the order id.
#[async_trait::async_trait]
pub trait CallAlertIntegration: Send + Sync {
    /// Availability check; `false` in simulators and stripped builds.
    fn is_available(&self) -> bool {
        true
    }

    async fn setup(&self, options: &SetupOptions) -> Result<(), TelephonyError>;

    async fn display_incoming_call(
        &self,
        call_id: &str,
        handle: &str,
        caller_name: &str,
    ) -> Result<(), TelephonyError>;

    fn end_call(&self, call_id: &str) -> Result<(), TelephonyError>;

    fn back_to_foreground(&self) -> Result<(), TelephonyError>;

    fn add_event_listener(&self, listener: Arc<dyn CallEventListener>) -> Result<(), TelephonyError>;
}
