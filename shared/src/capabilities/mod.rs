mod kv;
mod orders;
mod push;
mod realtime;
mod telephony;

pub use self::kv::{
    validate_key, InMemoryKvStore, KeyValueStore, KvError, StorageErrorCode, MAX_KEY_LENGTH,
    MAX_VALUE_SIZE,
};
#[cfg(not(target_arch = "wasm32"))]
pub use self::kv::SqliteKvStore;
pub use self::orders::{OrderFilters, OrderSource, ReloadOptions, SourceError};
pub use self::push::{ListenerId, NotificationCenter, NotificationListener};
pub use self::realtime::{
    EventCallback, LocalRealtimeHub, RealtimeError, RealtimeTransport, Subscription,
};
pub use self::telephony::{
    AndroidSetup, CallAlertIntegration, CallEvent, CallEventListener, IosSetup, SetupOptions,
    TelephonyError,
};

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Storage error: {0}")]
    Kv(#[from] KvError),

    #[error("Telephony error: {0}")]
    Telephony(#[from] TelephonyError),

    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    #[error("Order source error: {0}")]
    Source(#[from] SourceError),
}

impl CapabilityError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kv(e) => e.is_retryable(),
            Self::Telephony(e) => e.is_retryable(),
            Self::Realtime(e) => e.is_retryable(),
            Self::Source(e) => e.is_retryable(),
        }
    }
}
