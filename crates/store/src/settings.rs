//! App-wide viewer settings.

use std::collections::BTreeSet;

use runtime::event_bus::{SubscriptionId, Subscribers};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Stored values are merged over these defaults field by field, so older
/// documents missing a field still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub show_hotspots: bool,
    pub show_navigation: bool,
    pub enable_antialiasing: bool,
    pub progressive_loading: bool,
    /// Hotspot ids hidden individually.
    pub disabled_hotspots: BTreeSet<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_hotspots: true,
            show_navigation: true,
            enable_antialiasing: true,
            progressive_loading: true,
            disabled_hotspots: BTreeSet::new(),
        }
    }
}

impl Settings {
    /// Whether `hotspot_id` should be shown (and hit-testable) at all.
    pub fn hotspot_visible(&self, hotspot_id: &str) -> bool {
        self.show_hotspots && !self.disabled_hotspots.contains(hotspot_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    StorageUnavailable,
    Corrupt(String),
    Io(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::StorageUnavailable => write!(f, "settings storage unavailable"),
            SettingsError::Corrupt(msg) => write!(f, "settings corrupt: {msg}"),
            SettingsError::Io(msg) => write!(f, "settings storage error: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

pub trait SettingsBackend {
    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> Result<Option<Settings>, SettingsError>;
    fn write(&mut self, settings: &Settings) -> Result<(), SettingsError>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySettings {
    stored: Option<Settings>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsBackend for InMemorySettings {
    fn read(&self) -> Result<Option<Settings>, SettingsError> {
        Ok(self.stored.clone())
    }

    fn write(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        self.stored = Some(settings.clone());
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileSettings {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl SettingsBackend for FileSettings {
    fn read(&self) -> Result<Option<Settings>, SettingsError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SettingsError::Io(err.to_string())),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| SettingsError::Corrupt(e.to_string()))
    }

    fn write(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        let raw =
            serde_json::to_string_pretty(settings).map_err(|e| SettingsError::Io(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| SettingsError::Io(e.to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct LocalStorageSettings {
    key: String,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorageSettings {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn storage() -> Result<web_sys::Storage, SettingsError> {
        crate::local_storage::window_local_storage().map_err(|_| SettingsError::StorageUnavailable)
    }
}

#[cfg(target_arch = "wasm32")]
impl SettingsBackend for LocalStorageSettings {
    fn read(&self) -> Result<Option<Settings>, SettingsError> {
        let raw = Self::storage()?
            .get_item(&self.key)
            .map_err(|e| SettingsError::Io(format!("get_item failed: {:?}", e)))?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| SettingsError::Corrupt(e.to_string()))
    }

    fn write(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        let raw = serde_json::to_string(settings).map_err(|e| SettingsError::Io(e.to_string()))?;
        Self::storage()?
            .set_item(&self.key, &raw)
            .map_err(|e| SettingsError::Io(format!("set_item failed: {:?}", e)))
    }
}

/// Current settings plus change notification.
///
/// A failed write keeps the last good value; subscribers only hear about
/// values that were actually persisted.
#[derive(Debug)]
pub struct SettingsProvider<B> {
    backend: B,
    current: Settings,
    subscribers: Subscribers<Settings>,
}

impl<B: SettingsBackend> SettingsProvider<B> {
    pub fn new(backend: B) -> Self {
        let current = match backend.read() {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err) => {
                warn!("failed to load settings, using defaults: {err}");
                Settings::default()
            }
        };
        Self {
            backend,
            current,
            subscribers: Subscribers::new(),
        }
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Settings) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Applies `edit` to a copy of the current settings and persists it.
    pub fn update(&mut self, edit: impl FnOnce(&mut Settings)) -> Result<&Settings, SettingsError> {
        let mut next = self.current.clone();
        edit(&mut next);
        if next == self.current {
            return Ok(&self.current);
        }
        if let Err(err) = self.backend.write(&next) {
            warn!("failed to save settings: {err}");
            return Err(err);
        }
        self.current = next;
        self.subscribers.emit(&self.current);
        Ok(&self.current)
    }

    pub fn set_hotspot_enabled(
        &mut self,
        hotspot_id: &str,
        enabled: bool,
    ) -> Result<&Settings, SettingsError> {
        self.update(|s| {
            if enabled {
                s.disabled_hotspots.remove(hotspot_id);
            } else {
                s.disabled_hotspots.insert(hotspot_id.to_string());
            }
        })
    }

    /// Restores the defaults.
    pub fn reset(&mut self) -> Result<&Settings, SettingsError> {
        self.update(|s| *s = Settings::default())
    }
}
