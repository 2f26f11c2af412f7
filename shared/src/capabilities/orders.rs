use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::Order;

/// Query parameters forwarded verbatim to the order source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilters {
    #[serde(flatten)]
    pub params: BTreeMap<String, String>,
}

impl OrderFilters {
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadOptions {
    /// Raise the collection's loading flag while the fetch runs.
    pub set_loading_flag: bool,
}

impl ReloadOptions {
    /// Timer-driven refresh: no loading indicator, so the list doesn't flicker.
    pub const fn silent() -> Self {
        Self { set_loading_flag: false }
    }
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self { set_loading_flag: true }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceError {
    #[error("network error: {message}")]
    Network {
        message: String,
        #[serde(default)]
        is_retryable: bool,
    },

    #[error("unauthorized")]
    Unauthorized,

    #[error("server returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("could not decode orders: {0}")]
    Decode(String),

    #[error("operation timed out")]
    Timeout,
}

impl SourceError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { is_retryable, .. } => *is_retryable,
            Self::Remote { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout => true,
            Self::Unauthorized | Self::Decode(_) => false,
        }
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            is_retryable: true,
        }
    }
}

/// Remote order API. The core only reads through it.
#[async_trait::async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_nearby_orders(&self, filters: &OrderFilters) -> Result<Vec<Order>, SourceError>;
    async fn fetch_current_orders(&self, filters: &OrderFilters) -> Result<Vec<Order>, SourceError>;
    async fn fetch_active_orders(&self) -> Result<Vec<Order>, SourceError>;
}
