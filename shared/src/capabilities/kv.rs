use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

pub const MAX_KEY_LENGTH: usize = 512;
pub const MAX_VALUE_SIZE: usize = 64 * 1024;

/// Host-provided persistent string store (`getItem` / `setItem`).
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), KvError>;
}

pub fn validate_key(key: &str) -> Result<(), KvError> {
    if key.trim().is_empty() {
        return Err(KvError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot be empty".to_string(),
        });
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(KvError::InvalidKey {
            key: key.chars().take(50).collect::<String>() + "...",
            reason: format!("key exceeds maximum length of {} bytes", MAX_KEY_LENGTH),
        });
    }

    if key.contains('\0') {
        return Err(KvError::InvalidKey {
            key: key.replace('\0', "\\0"),
            reason: "key cannot contain null bytes".to_string(),
        });
    }

    if key.chars().any(|c| c.is_control() && c != '\t') {
        return Err(KvError::InvalidKey {
            key: key.to_string(),
            reason: "key contains invalid control characters".to_string(),
        });
    }

    Ok(())
}

fn validate_value(value: &str) -> Result<(), KvError> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(KvError::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("storage error: {message} (code: {code:?}, retryable: {retryable})")]
    Storage {
        code: StorageErrorCode,
        message: String,
        retryable: bool,
    },

    #[error("operation timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl KvError {
    pub fn is_retryable(&self) -> bool {
        match self {
            KvError::Storage { retryable, .. } => *retryable,
            KvError::Timeout { .. } => true,
            _ => false,
        }
    }

    pub fn storage(code: StorageErrorCode, message: impl Into<String>) -> Self {
        let retryable = code.is_retryable();
        Self::Storage {
            code,
            message: message.into(),
            retryable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageErrorCode {
    Unknown,
    ConnectionFailed,
    Corrupted,
    DiskFull,
    PermissionDenied,
    Busy,
    Locked,
    IoError,
}

impl StorageErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageErrorCode::ConnectionFailed | StorageErrorCode::Busy | StorageErrorCode::Locked
        )
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-lifetime store. Useful on targets without SQLite and in tests.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, KvError> {
        validate_key(key)?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), KvError> {
        validate_key(key)?;
        validate_value(value)?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// SQLite store
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
pub use self::sqlite::SqliteKvStore;

#[cfg(not(target_arch = "wasm32"))]
mod sqlite {
    use super::{validate_key, validate_value, KeyValueStore, KvError, StorageErrorCode};
    use rusqlite::{params, Connection, OptionalExtension};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tracing::info;

    /// Durable store; survives process restarts, which push redelivery can span.
    pub struct SqliteKvStore {
        conn: Arc<Mutex<Connection>>,
    }

    impl SqliteKvStore {
        pub fn open(path: impl AsRef<Path>) -> Result<Self, KvError> {
            let conn = Connection::open(path.as_ref()).map_err(map_sqlite_error)?;
            let store = Self::from_connection(conn)?;
            info!(path = %path.as_ref().display(), "SQLite key-value store opened");
            Ok(store)
        }

        pub fn open_in_memory() -> Result<Self, KvError> {
            let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
            Self::from_connection(conn)
        }

        fn from_connection(conn: Connection) -> Result<Self, KvError> {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS kv_entries (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
                );
                "#,
            )
            .map_err(map_sqlite_error)?;

            Ok(Self {
                conn: Arc::new(Mutex::new(conn)),
            })
        }

        async fn with_conn<T, F>(&self, f: F) -> Result<T, KvError>
        where
            T: Send + 'static,
            F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        {
            let conn = self.conn.clone();
            tokio::task::spawn_blocking(move || {
                let guard = conn
                    .lock()
                    .map_err(|_| KvError::storage(StorageErrorCode::Locked, "connection mutex poisoned"))?;
                f(&guard).map_err(map_sqlite_error)
            })
            .await
            .map_err(|e| KvError::storage(StorageErrorCode::Unknown, format!("blocking task failed: {e}")))?
        }
    }

    #[async_trait::async_trait]
    impl KeyValueStore for SqliteKvStore {
        async fn get_item(&self, key: &str) -> Result<Option<String>, KvError> {
            validate_key(key)?;
            let key = key.to_string();
            self.with_conn(move |conn| {
                conn.query_row(
                    "SELECT value FROM kv_entries WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
            })
            .await
        }

        async fn set_item(&self, key: &str, value: &str) -> Result<(), KvError> {
            validate_key(key)?;
            validate_value(value)?;
            let key = key.to_string();
            let value = value.to_string();
            self.with_conn(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = strftime('%s', 'now')
                    "#,
                    params![key, value],
                )
                .map(|_| ())
            })
            .await
        }
    }

    fn map_sqlite_error(e: rusqlite::Error) -> KvError {
        let code = match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) => StorageErrorCode::Busy,
            Some(rusqlite::ErrorCode::DatabaseLocked) => StorageErrorCode::Locked,
            Some(rusqlite::ErrorCode::DiskFull) => StorageErrorCode::DiskFull,
            Some(rusqlite::ErrorCode::PermissionDenied | rusqlite::ErrorCode::ReadOnly) => {
                StorageErrorCode::PermissionDenied
            }
            Some(rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase) => {
                StorageErrorCode::Corrupted
            }
            Some(rusqlite::ErrorCode::CannotOpen) => StorageErrorCode::ConnectionFailed,
            Some(rusqlite::ErrorCode::SystemIoFailure) => StorageErrorCode::IoError,
            _ => StorageErrorCode::Unknown,
        };
        KvError::storage(code, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation_empty() {
        let result = validate_key("");
        assert!(matches!(result, Err(KvError::InvalidKey { .. })));
        assert!(validate_key("   ").is_err());
    }

    #[test]
    fn test_key_validation_null_byte() {
        assert!(validate_key("order\0_1").is_err());
    }

    #[test]
    fn test_key_validation_too_long() {
        let long_key = "a".repeat(MAX_KEY_LENGTH + 1);
        assert!(validate_key(&long_key).is_err());
    }

    #[test]
    fn test_key_validation_control_chars() {
        assert!(validate_key("order\x01").is_err());
    }

    #[test]
    fn test_key_validation_valid() {
        assert!(validate_key("order_8f3a-11").is_ok());
        assert!(validate_key("12345").is_ok());
    }

    #[test]
    fn test_error_retryable() {
        assert!(KvError::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(KvError::storage(StorageErrorCode::Busy, "busy").is_retryable());
        assert!(!KvError::storage(StorageErrorCode::Corrupted, "bad").is_retryable());
        assert!(!KvError::ValueTooLarge { size: 1, max: 0 }.is_retryable());
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let store = InMemoryKvStore::new();
        assert_eq!(store.get_item("order_1").await.unwrap(), None);

        store.set_item("order_1", "order_1").await.unwrap();
        assert_eq!(store.get_item("order_1").await.unwrap().as_deref(), Some("order_1"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_in_memory_rejects_oversized_value() {
        let store = InMemoryKvStore::new();
        let big = "x".repeat(MAX_VALUE_SIZE + 1);
        assert!(matches!(
            store.set_item("k", &big).await,
            Err(KvError::ValueTooLarge { .. })
        ));
        assert!(store.is_empty().await);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn test_sqlite_overwrite() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store.set_item("order_1", "a").await.unwrap();
        store.set_item("order_1", "b").await.unwrap();
        assert_eq!(store.get_item("order_1").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.get_item("order_2").await.unwrap(), None);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn test_sqlite_persistence_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dedup.db");

        // First "session"
        {
            let store = SqliteKvStore::open(&path).unwrap();
            store.set_item("order_42", "order_42").await.unwrap();
        }

        // Second "session" - reopen and verify
        {
            let store = SqliteKvStore::open(&path).unwrap();
            assert_eq!(
                store.get_item("order_42").await.unwrap().as_deref(),
                Some("order_42")
            );
        }
    }
}
