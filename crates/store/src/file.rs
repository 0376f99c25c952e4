use std::io::Write as _;
use std::path::{Path, PathBuf};

use scene::Hotspot;
use tracing::{debug, warn};

use crate::StoreError;
use crate::backend::{HotspotBackend, HotspotSnapshot, parse_snapshot, snapshot_to_json};

/// Single JSON document on disk.
///
/// Every call re-reads the file, so several processes (or the CLI and the
/// server) observe each other's writes. Writes go to a temp file in the same
/// directory and are renamed over the target.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    defaults: HotspotSnapshot,
}

impl FileBackend {
    /// Opens `path`, creating it (and its directory) from `defaults` when missing.
    pub fn open(path: impl Into<PathBuf>, defaults: HotspotSnapshot) -> Result<Self, StoreError> {
        let backend = Self {
            path: path.into(),
            defaults,
        };
        if let Some(dir) = backend.dir() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        if !backend.path.exists() {
            debug!(path = %backend.path.display(), "seeding hotspot file with defaults");
            backend.write(&backend.defaults)?;
        }
        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> &HotspotSnapshot {
        &self.defaults
    }

    fn dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    fn read(&self) -> Result<HotspotSnapshot, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(self.defaults.clone());
            }
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };
        if raw.trim().is_empty() {
            return Ok(self.defaults.clone());
        }
        match parse_snapshot(&raw) {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                warn!(path = %self.path.display(), "hotspot file unreadable, using defaults: {err}");
                Ok(self.defaults.clone())
            }
        }
    }

    fn write(&self, snapshot: &HotspotSnapshot) -> Result<(), StoreError> {
        let body = snapshot_to_json(snapshot)?;
        let dir = self.dir().unwrap_or_else(|| Path::new("."));
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::Io(e.to_string()))?;
        tmp.write_all(body.as_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::Io(e.error.to_string()))?;
        Ok(())
    }
}

impl HotspotBackend for FileBackend {
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
