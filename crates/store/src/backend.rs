use std::collections::{BTreeMap, BTreeSet};

use scene::Hotspot;

use crate::StoreError;

/// Every viewpoint's hotspot list, keyed by viewpoint id.
///
/// This is also the export/import document shape.
pub type HotspotSnapshot = BTreeMap<String, Vec<Hotspot>>;

/// Persistence provider behind a [`crate::HotspotStore`].
///
/// Only the four whole-list operations are required; the per-hotspot
/// operations default to read-modify-write over them. Backends talking to a
/// remote API override those to hit the dedicated endpoints.
pub trait HotspotBackend {
    fn load_all(&self) -> Result<HotspotSnapshot, StoreError>;

    fn load(&self, viewpoint: &str) -> Result<Vec<Hotspot>, StoreError> {
        Ok(self.load_all()?.remove(viewpoint).unwrap_or_default())
    }

    /// Replaces the full list for `viewpoint`.
    fn save(&mut self, viewpoint: &str, hotspots: &[Hotspot]) -> Result<(), StoreError>;

    /// Replaces every viewpoint's list.
    fn save_all(&mut self, snapshot: &HotspotSnapshot) -> Result<(), StoreError>;

    fn update_hotspot(&mut self, viewpoint: &str, hotspot: &Hotspot) -> Result<(), StoreError> {
        let mut list = self.load(viewpoint)?;
        *find_mut(&mut list, viewpoint, &hotspot.id)? = hotspot.clone();
        self.save(viewpoint, &list)
    }

    fn set_images(
        &mut self,
        viewpoint: &str,
        hotspot_id: &str,
        images: &[String],
    ) -> Result<(), StoreError> {
        let mut list = self.load(viewpoint)?;
        find_mut(&mut list, viewpoint, hotspot_id)?.images = images.to_vec();
        self.save(viewpoint, &list)
    }

    fn add_image(&mut self, viewpoint: &str, hotspot_id: &str, image: &str) -> Result<(), StoreError> {
        let mut list = self.load(viewpoint)?;
        push_image(find_mut(&mut list, viewpoint, hotspot_id)?, image)?;
        self.save(viewpoint, &list)
    }

    /// Removes the image at `index`, returning it.
    fn remove_image(
        &mut self,
        viewpoint: &str,
        hotspot_id: &str,
        index: usize,
    ) -> Result<String, StoreError> {
        let mut list = self.load(viewpoint)?;
        let removed = take_image(find_mut(&mut list, viewpoint, hotspot_id)?, index)?;
        self.save(viewpoint, &list)?;
        Ok(removed)
    }

    /// Restores `defaults` and returns what the backend now holds.
    fn reset(&mut self, defaults: &HotspotSnapshot) -> Result<HotspotSnapshot, StoreError> {
        self.save_all(defaults)?;
        Ok(defaults.clone())
    }
}

pub(crate) fn find_mut<'a>(
    list: &'a mut [Hotspot],
    viewpoint: &str,
    hotspot_id: &str,
) -> Result<&'a mut Hotspot, StoreError> {
    list.iter_mut()
        .find(|h| h.id == hotspot_id)
        .ok_or_else(|| StoreError::HotspotNotFound {
            viewpoint: viewpoint.to_string(),
            hotspot: hotspot_id.to_string(),
        })
}

pub(crate) fn push_image(hotspot: &mut Hotspot, image: &str) -> Result<(), StoreError> {
    if image.trim().is_empty() {
        return Err(StoreError::EmptyImage);
    }
    hotspot.images.push(image.to_string());
    Ok(())
}

pub(crate) fn take_image(hotspot: &mut Hotspot, index: usize) -> Result<String, StoreError> {
    if index >= hotspot.images.len() {
        return Err(StoreError::ImageIndexOutOfRange {
            hotspot: hotspot.id.clone(),
            index,
            len: hotspot.images.len(),
        });
    }
    Ok(hotspot.images.remove(index))
}

/// Checks a viewpoint's list: every record valid, ids unique.
pub fn validate_list(viewpoint: &str, hotspots: &[Hotspot]) -> Result<(), StoreError> {
    let mut seen = BTreeSet::new();
    for h in hotspots {
        h.validate()?;
        if !seen.insert(h.id.as_str()) {
            return Err(StoreError::DuplicateHotspot {
                viewpoint: viewpoint.to_string(),
                hotspot: h.id.clone(),
            });
        }
    }
    Ok(())
}

pub fn validate_snapshot(snapshot: &HotspotSnapshot) -> Result<(), StoreError> {
    for (viewpoint, list) in snapshot {
        validate_list(viewpoint, list)?;
    }
    Ok(())
}

pub fn parse_snapshot(json: &str) -> Result<HotspotSnapshot, StoreError> {
    let snapshot: HotspotSnapshot =
        serde_json::from_str(json).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

pub fn snapshot_to_json(snapshot: &HotspotSnapshot) -> Result<String, StoreError> {
    serde_json::to_string_pretty(snapshot).map_err(|e| StoreError::Io(e.to_string()))
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    snapshot: HotspotSnapshot,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: HotspotSnapshot) -> Self {
        Self { snapshot }
    }
}

impl HotspotBackend for InMemoryBackend {
    fn load_all(&self) -> Result<HotspotSnapshot, StoreError> {
        Ok(self.snapshot.clone())
    }

    fn load(&self, viewpoint: &str) -> Result<Vec<Hotspot>, StoreError> {
        Ok(self.snapshot.get(viewpoint).cloned().unwrap_or_default())
    }

    fn save(&mut self, viewpoint: &str, hotspots: &[Hotspot]) -> Result<(), StoreError> {
        self.snapshot
            .insert(viewpoint.to_string(), hotspots.to_vec());
        Ok(())
    }

    fn save_all(&mut self, snapshot: &HotspotSnapshot) -> Result<(), StoreError> {
        self.snapshot = snapshot.clone();
        Ok(())
    }
}
