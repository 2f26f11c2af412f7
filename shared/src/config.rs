use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::capabilities::SetupOptions;

pub const DEFAULT_NEARBY_REFRESH_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_CURRENT_REFRESH_MS: u64 = 15 * 60 * 1000;
pub const DEFAULT_ANDROID_DISPLAY_DELAY_MS: u64 = 100;
pub const DEFAULT_CALLER_NAME: &str = "New Order";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("could not parse configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Android,
    Ios,
    Other,
}

impl Platform {
    pub const fn current() -> Self {
        if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else {
            Self::Other
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub platform: Platform,
    /// Pause before showing the call UI on Android, where an immediate
    /// display right after setup is unreliable.
    pub android_display_delay_ms: u64,
    pub caller_name: String,
    pub setup: SetupOptions,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            android_display_delay_ms: DEFAULT_ANDROID_DISPLAY_DELAY_MS,
            caller_name: DEFAULT_CALLER_NAME.to_string(),
            setup: SetupOptions::default(),
        }
    }
}

impl AlertConfig {
    pub fn display_delay(&self) -> Option<Duration> {
        match self.platform {
            Platform::Android if self.android_display_delay_ms > 0 => {
                Some(Duration::from_millis(self.android_display_delay_ms))
            }
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.caller_name.trim().is_empty() {
            return Err(ConfigError::Validation("caller_name must not be empty".into()));
        }
        if self.android_display_delay_ms > 10_000 {
            return Err(ConfigError::Validation(
                "android_display_delay_ms should be at most 10000ms".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub nearby_refresh_interval_ms: u64,
    pub current_refresh_interval_ms: u64,
    pub alert: AlertConfig,
    /// SQLite file for the alert records. `None` keeps them in memory.
    pub dedup_db_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            nearby_refresh_interval_ms: DEFAULT_NEARBY_REFRESH_MS,
            current_refresh_interval_ms: DEFAULT_CURRENT_REFRESH_MS,
            alert: AlertConfig::default(),
            dedup_db_path: None,
        }
    }
}

impl CoreConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nearby_refresh_interval_ms < 1000 {
            return Err(ConfigError::Validation(
                "nearby_refresh_interval_ms should be at least 1000ms".into(),
            ));
        }
        if self.current_refresh_interval_ms < 1000 {
            return Err(ConfigError::Validation(
                "current_refresh_interval_ms should be at least 1000ms".into(),
            ));
        }
        self.alert.validate()
    }

    pub fn nearby_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.nearby_refresh_interval_ms)
    }

    pub fn current_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.current_refresh_interval_ms)
    }
}
