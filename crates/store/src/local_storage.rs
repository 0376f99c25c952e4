#[cfg(target_arch = "wasm32")]
mod wasm_storage {
    use scene::Hotspot;

    use crate::StoreError;
    use crate::backend::{HotspotBackend, HotspotSnapshot, parse_snapshot, snapshot_to_json};

    /// Browser `localStorage`, one JSON document under `key`.
    #[derive(Debug)]
    pub struct LocalStorageBackend {
        key: String,
        defaults: HotspotSnapshot,
    }

    impl LocalStorageBackend {
        pub fn new(key: impl Into<String>, defaults: HotspotSnapshot) -> Result<Self, StoreError> {
            // Fail early when storage is disabled (private mode, sandboxed iframe).
            window_local_storage()?;
            Ok(Self {
                key: key.into(),
                defaults,
            })
        }

        fn read(&self) -> Result<HotspotSnapshot, StoreError> {
            let storage = window_local_storage()?;
            let raw = storage
                .get_item(&self.key)
                .map_err(|e| StoreError::Io(format!("get_item failed: {:?}", e)))?;
            let Some(raw) = raw else {
                return Ok(self.defaults.clone());
            };
            if raw.trim().is_empty() {
                return Ok(self.defaults.clone());
            }
            match parse_snapshot(&raw) {
                Ok(snapshot) => Ok(snapshot),
                Err(err) => {
                    tracing::warn!(key = %self.key, "stored hotspots unreadable, using defaults: {err}");
                    Ok(self.defaults.clone())
                }
            }
        }

        fn write(&self, snapshot: &HotspotSnapshot) -> Result<(), StoreError> {
            let storage = window_local_storage()?;
            let raw = snapshot_to_json(snapshot)?;
            // Quota errors surface here.
            storage
                .set_item(&self.key, &raw)
                .map_err(|e| StoreError::Io(format!("set_item failed: {:?}", e)))
        }
    }

    impl HotspotBackend for LocalStorageBackend {
        fn load_all(&self) -> Result<HotspotSnapshot, StoreError> {
            self.read()
        }

        fn save(&mut self, viewpoint: &str, hotspots: &[Hotspot]) -> Result<(), StoreError> {
            let mut snapshot = self.read()?;
            snapshot.insert(viewpoint.to_string(), hotspots.to_vec());
            self.write(&snapshot)
        }

        fn save_all(&mut self, snapshot: &HotspotSnapshot) -> Result<(), StoreError> {
            self.write(snapshot)
        }
    }

    pub(crate) fn window_local_storage() -> Result<web_sys::Storage, StoreError> {
        let win = web_sys::window().ok_or(StoreError::StorageUnavailable)?;
        win.local_storage()
            .map_err(|e| StoreError::Io(format!("localStorage error: {:?}", e)))?
            .ok_or(StoreError::StorageUnavailable)
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_storage::LocalStorageBackend;
#[cfg(target_arch = "wasm32")]
pub(crate) use wasm_storage::window_local_storage;

#[cfg(not(target_arch = "wasm32"))]
mod native_stub {
    use scene::Hotspot;

    use crate::StoreError;
    use crate::backend::{HotspotBackend, HotspotSnapshot};

    /// Browser storage does not exist off wasm32; every call fails.
    #[derive(Debug)]
    pub struct LocalStorageBackend;

    impl LocalStorageBackend {
        pub fn new(
            _key: impl Into<String>,
            _defaults: HotspotSnapshot,
        ) -> Result<Self, StoreError> {
            Err(StoreError::StorageUnavailable)
        }
    }

    impl HotspotBackend for LocalStorageBackend {
        fn load_all(&self) -> Result<HotspotSnapshot, StoreError> {
            Err(StoreError::StorageUnavailable)
        }

        fn save(&mut self, _viewpoint: &str, _hotspots: &[Hotspot]) -> Result<(), StoreError> {
            Err(StoreError::StorageUnavailable)
        }

        fn save_all(&mut self, _snapshot: &HotspotSnapshot) -> Result<(), StoreError> {
            Err(StoreError::StorageUnavailable)
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_stub::LocalStorageBackend;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::LocalStorageBackend;
    use crate::StoreError;
    use crate::backend::HotspotSnapshot;

    #[test]
    fn unavailable_off_wasm() {
        assert!(matches!(
            LocalStorageBackend::new("vantage.hotspots", HotspotSnapshot::new()),
            Err(StoreError::StorageUnavailable)
        ));
    }
}
