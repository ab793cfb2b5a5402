//! Connection settings storage.
//!
//! Persists the remote endpoint and API key under the `veo_config` storage key.
//! Environment variables are used as initial defaults when nothing has been saved.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, RwLock};

use crate::storage::{SharedStorage, StorageError, SETTINGS_KEY};

/// Remote connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Root URL of the remote API. Empty disables all network activity.
    #[serde(default)]
    pub base_url: String,
    /// Optional bearer token.
    #[serde(default)]
    pub api_key: String,
}

impl Settings {
    /// Resolved connection, or `None` when no endpoint is configured.
    pub fn connection(&self) -> Option<Connection> {
        let base_url = self.base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return None;
        }

        let api_key = self.api_key.trim();
        Some(Connection {
            base_url: base_url.to_string(),
            api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.connection().is_some()
    }

    /// Check the base URL and normalize it.
    ///
    /// An empty base URL is valid and means "not configured".
    pub fn validated(self) -> Result<Self, SettingsError> {
        let base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if !base_url.is_empty() {
            let parsed = url::Url::parse(&base_url)
                .map_err(|e| SettingsError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(SettingsError::InvalidBaseUrl(format!(
                    "{}: scheme must be http or https",
                    base_url
                )));
            }
        }

        Ok(Self {
            base_url,
            api_key: self.api_key.trim().to_string(),
        })
    }
}

/// Endpoint and credentials used for one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Base URL without a trailing slash
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Connection {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid base URL {0}")]
    InvalidBaseUrl(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// In-memory store for connection settings with persistence.
///
/// Subscribers are notified whenever the settings actually change.
pub struct SettingsStore {
    settings: RwLock<Settings>,
    storage: SharedStorage,
    changes: watch::Sender<Settings>,
}

impl SettingsStore {
    /// Create a new settings store, loading saved settings if available.
    ///
    /// If nothing is saved, uses environment variables as defaults:
    /// - `VEO_BASE_URL` - remote API root
    /// - `VEO_API_KEY` - bearer token
    pub fn new(storage: SharedStorage) -> Self {
        let settings = match storage.load(SETTINGS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Settings>(&raw) {
                Ok(s) => {
                    tracing::info!("Loaded connection settings");
                    s
                }
                Err(e) => {
                    tracing::warn!("Saved settings are malformed: {}, using defaults", e);
                    Self::defaults_from_env()
                }
            },
            Ok(None) => {
                tracing::info!("No saved settings, using environment defaults");
                Self::defaults_from_env()
            }
            Err(e) => {
                tracing::warn!("Failed to read saved settings: {}, using defaults", e);
                Self::defaults_from_env()
            }
        };

        let (changes, _) = watch::channel(settings.clone());
        Self {
            settings: RwLock::new(settings),
            storage,
            changes,
        }
    }

    /// Load settings from environment variables as initial defaults.
    fn defaults_from_env() -> Settings {
        let settings = Settings {
            base_url: std::env::var("VEO_BASE_URL").unwrap_or_default(),
            api_key: std::env::var("VEO_API_KEY").unwrap_or_default(),
        };

        match settings.clone().validated() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Ignoring VEO_BASE_URL: {}", e);
                Settings {
                    base_url: String::new(),
                    ..settings
                }
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let contents = serde_json::to_string(settings)?;
        self.storage.save(SETTINGS_KEY, &contents)?;
        Ok(())
    }

    /// Get a clone of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Receiver that changes whenever the settings change.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.changes.subscribe()
    }

    /// Replace the settings.
    ///
    /// Returns whether anything changed. Unchanged settings are not saved
    /// and do not notify subscribers.
    pub async fn update(&self, new_settings: Settings) -> Result<bool, SettingsError> {
        let new_settings = new_settings.validated()?;

        let mut settings = self.settings.write().await;
        if *settings == new_settings {
            return Ok(false);
        }

        self.save(&new_settings)?;
        *settings = new_settings.clone();
        drop(settings); // Release lock before notifying

        tracing::info!(
            configured = new_settings.is_configured(),
            "Connection settings updated"
        );
        self.changes.send_replace(new_settings);
        Ok(true)
    }

    /// Clear the endpoint and key. Stops all network activity.
    pub async fn reset(&self) -> Result<bool, SettingsError> {
        self.update(Settings::default()).await
    }
}

/// Shared settings store wrapped in Arc for concurrent access.
pub type SharedSettingsStore = Arc<SettingsStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage};

    fn settings(base_url: &str, api_key: &str) -> Settings {
        Settings {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    #[test]
    fn test_connection_requires_base_url() {
        assert!(settings("", "sk-1").connection().is_none());
        assert!(settings("   ", "").connection().is_none());

        let conn = settings("https://api.example.com/", "").connection().unwrap();
        assert_eq!(conn.base_url, "https://api.example.com");
        assert_eq!(conn.api_key, None);

        let conn = settings("https://api.example.com", "sk-1").connection().unwrap();
        assert_eq!(conn.api_key.as_deref(), Some("sk-1"));
    }

    #[test]
    fn test_validation() {
        assert!(settings("", "").validated().is_ok());
        assert!(settings("not a url", "").validated().is_err());
        assert!(settings("ftp://example.com", "").validated().is_err());

        let s = settings(" https://api.example.com/ ", " sk-1 ").validated().unwrap();
        assert_eq!(s, settings("https://api.example.com", "sk-1"));
    }

    #[tokio::test]
    async fn test_update_persists_and_notifies() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SettingsStore::new(storage.clone());
        let mut rx = store.subscribe();

        let changed = store
            .update(settings("https://api.example.com", "sk-1"))
            .await
            .unwrap();
        assert!(changed);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().base_url, "https://api.example.com");

        // Same value again is not a change
        let changed = store
            .update(settings("https://api.example.com/", "sk-1"))
            .await
            .unwrap();
        assert!(!changed);
        assert!(!rx.has_changed().unwrap());

        let reloaded = SettingsStore::new(storage);
        assert_eq!(reloaded.get().await, settings("https://api.example.com", "sk-1"));
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_settings_alone() {
        let storage = Arc::new(MemoryStorage::new().with_entry(
            SETTINGS_KEY,
            r#"{"baseUrl":"https://api.example.com","apiKey":""}"#,
        ));
        let store = SettingsStore::new(storage.clone());

        assert!(store.update(settings("nope", "")).await.is_err());
        assert_eq!(store.get().await.base_url, "https://api.example.com");
        assert!(storage.load(SETTINGS_KEY).unwrap().unwrap().contains("api.example.com"));
    }

    #[tokio::test]
    async fn test_malformed_saved_settings_do_not_fail() {
        let storage = Arc::new(MemoryStorage::new().with_entry(SETTINGS_KEY, "]]"));
        let store = SettingsStore::new(storage.clone());
        assert_eq!(store.get().await, SettingsStore::defaults_from_env());

        // The next update replaces the unreadable blob
        let fresh = settings("https://recovered.example.com", "sk-9");
        assert!(store.update(fresh.clone()).await.unwrap());
        let saved = storage.load(SETTINGS_KEY).unwrap().unwrap();
        assert_eq!(serde_json::from_str::<Settings>(&saved).unwrap(), fresh);
        assert_eq!(SettingsStore::new(storage).get().await, fresh);
    }

    #[tokio::test]
    async fn test_reset_clears_connection() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SettingsStore::new(storage);
        store
            .update(settings("https://api.example.com", "sk-1"))
            .await
            .unwrap();

        assert!(store.reset().await.unwrap());
        assert!(!store.get().await.is_configured());
    }
}
