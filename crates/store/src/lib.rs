//! Hotspot persistence and app settings.
//!
//! [`HotspotStore`] caches every viewpoint's hotspots in memory over a
//! pluggable [`HotspotBackend`] and notifies subscribers of committed
//! changes. Backends: in-memory, a JSON file, the REST API, and browser
//! `localStorage` on wasm32.

pub mod backend;
pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod file;
pub mod local_storage;
#[cfg(not(target_arch = "wasm32"))]
pub mod remote;
pub mod settings;
pub mod store;
pub mod wire;

pub use backend::{HotspotBackend, HotspotSnapshot, InMemoryBackend};
pub use error::StoreError;
#[cfg(not(target_arch = "wasm32"))]
pub use file::FileBackend;
pub use local_storage::LocalStorageBackend;
#[cfg(not(target_arch = "wasm32"))]
pub use remote::RemoteBackend;
pub use settings::{InMemorySettings, Settings, SettingsBackend, SettingsError, SettingsProvider};
#[cfg(not(target_arch = "wasm32"))]
pub use settings::FileSettings;
#[cfg(target_arch = "wasm32")]
pub use settings::LocalStorageSettings;
pub use store::{HotspotChange, HotspotStore, SyncStatus};
