use runtime::event_bus::{SubscriptionId, Subscribers};
use scene::Hotspot;
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::backend::{
    HotspotBackend, HotspotSnapshot, find_mut, parse_snapshot, push_image, snapshot_to_json,
    take_image, validate_list, validate_snapshot,
};

/// Outcome of a write that reached (or failed to reach) the backend.
///
/// Persistence failures are not errors to the caller: they are logged and
/// reported as `Stale`, and the store's committed state is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    Synced,
    Stale(StoreError),
}

impl SyncStatus {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncStatus::Synced)
    }
}

/// Typed change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum HotspotChange {
    /// One viewpoint's list changed; carries the new list.
    Viewpoint {
        viewpoint: String,
        hotspots: Vec<Hotspot>,
    },
    /// Every viewpoint may have changed (import, reset, full refresh).
    All,
}

/// Cached, observable view over a [`HotspotBackend`].
#[derive(Debug)]
pub struct HotspotStore<B> {
    backend: B,
    cache: HotspotSnapshot,
    defaults: HotspotSnapshot,
    stale: bool,
    subscribers: Subscribers<HotspotChange>,
}

impl<B: HotspotBackend> HotspotStore<B> {
    /// Loads everything from `backend`. When that fails the store starts
    /// from `defaults` and is marked stale.
    pub fn new(backend: B, defaults: HotspotSnapshot) -> Self {
        let (cache, stale) = match backend.load_all() {
            Ok(snapshot) => (snapshot, false),
            Err(err) => {
                warn!("hotspot backend unavailable, using defaults: {err}");
                (defaults.clone(), true)
            }
        };
        Self {
            backend,
            cache,
            defaults,
            stale,
            subscribers: Subscribers::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// `true` after a failed sync, until the next successful one.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn defaults(&self) -> &HotspotSnapshot {
        &self.defaults
    }

    pub fn snapshot(&self) -> &HotspotSnapshot {
        &self.cache
    }

    /// Hotspots for `viewpoint` in display order; empty when none are stored.
    pub fn list(&self, viewpoint: &str) -> &[Hotspot] {
        self.cache.get(viewpoint).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, viewpoint: &str, hotspot_id: &str) -> Option<&Hotspot> {
        self.list(viewpoint).iter().find(|h| h.id == hotspot_id)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&HotspotChange) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Replaces the full list for `viewpoint` (last write wins).
    ///
    /// `Err` only for an invalid list; persistence failures come back as
    /// [`SyncStatus::Stale`].
    pub fn save(
        &mut self,
        viewpoint: &str,
        hotspots: Vec<Hotspot>,
    ) -> Result<SyncStatus, StoreError> {
        validate_list(viewpoint, &hotspots)?;
        let result = self.backend.save(viewpoint, &hotspots);
        Ok(self.commit(viewpoint, result, hotspots))
    }

    /// Replaces the record with the same id.
    pub fn update_hotspot(
        &mut self,
        viewpoint: &str,
        hotspot: Hotspot,
    ) -> Result<SyncStatus, StoreError> {
        hotspot.validate()?;
        let mut list = self.list(viewpoint).to_vec();
        *find_mut(&mut list, viewpoint, &hotspot.id)? = hotspot.clone();
        let result = self.backend.update_hotspot(viewpoint, &hotspot);
        Ok(self.commit(viewpoint, result, list))
    }

    pub fn set_images(
        &mut self,
        viewpoint: &str,
        hotspot_id: &str,
        images: Vec<String>,
    ) -> Result<SyncStatus, StoreError> {
        let mut list = self.list(viewpoint).to_vec();
        find_mut(&mut list, viewpoint, hotspot_id)?.images = images.clone();
        let result = self.backend.set_images(viewpoint, hotspot_id, &images);
        Ok(self.commit(viewpoint, result, list))
    }

    pub fn add_image(
        &mut self,
        viewpoint: &str,
        hotspot_id: &str,
        image: &str,
    ) -> Result<SyncStatus, StoreError> {
        let mut list = self.list(viewpoint).to_vec();
        push_image(find_mut(&mut list, viewpoint, hotspot_id)?, image)?;
        let result = self.backend.add_image(viewpoint, hotspot_id, image);
        Ok(self.commit(viewpoint, result, list))
    }

    pub fn remove_image(
        &mut self,
        viewpoint: &str,
        hotspot_id: &str,
        index: usize,
    ) -> Result<SyncStatus, StoreError> {
        let mut list = self.list(viewpoint).to_vec();
        take_image(find_mut(&mut list, viewpoint, hotspot_id)?, index)?;
        let result = self
            .backend
            .remove_image(viewpoint, hotspot_id, index)
            .map(drop);
        Ok(self.commit(viewpoint, result, list))
    }

    /// Serialized snapshot of every viewpoint's hotspots.
    pub fn export_all(&self) -> Result<String, StoreError> {
        snapshot_to_json(&self.cache)
    }

    /// Replaces every viewpoint's hotspots with the parsed `json` snapshot.
    pub fn import_all(&mut self, json: &str) -> Result<SyncStatus, StoreError> {
        let snapshot = parse_snapshot(json)?;
        Ok(self.import_snapshot_unchecked(snapshot))
    }

    pub fn import_snapshot(&mut self, snapshot: HotspotSnapshot) -> Result<SyncStatus, StoreError> {
        validate_snapshot(&snapshot)?;
        Ok(self.import_snapshot_unchecked(snapshot))
    }

    fn import_snapshot_unchecked(&mut self, snapshot: HotspotSnapshot) -> SyncStatus {
        match self.backend.save_all(&snapshot) {
            Ok(()) => {
                info!(viewpoints = snapshot.len(), "hotspots imported");
                self.replace_all(snapshot)
            }
            Err(err) => self.mark_stale("import", err),
        }
    }

    /// Restores the configured defaults.
    pub fn reset(&mut self) -> SyncStatus {
        match self.backend.reset(&self.defaults) {
            Ok(snapshot) => {
                info!("hotspots reset to defaults");
                self.replace_all(snapshot)
            }
            Err(err) => self.mark_stale("reset", err),
        }
    }

    /// Re-reads one viewpoint from the backend.
    pub fn refresh(&mut self, viewpoint: &str) -> SyncStatus {
        match self.backend.load(viewpoint) {
            Ok(list) => {
                self.stale = false;
                if self.list(viewpoint) != list.as_slice() {
                    self.cache.insert(viewpoint.to_string(), list.clone());
                    self.subscribers.emit(&HotspotChange::Viewpoint {
                        viewpoint: viewpoint.to_string(),
                        hotspots: list,
                    });
                }
                SyncStatus::Synced
            }
            Err(err) => self.mark_stale("refresh", err),
        }
    }

    pub fn refresh_all(&mut self) -> SyncStatus {
        match self.backend.load_all() {
            Ok(snapshot) => {
                if snapshot == self.cache {
                    self.stale = false;
                    return SyncStatus::Synced;
                }
                self.replace_all(snapshot)
            }
            Err(err) => self.mark_stale("refresh", err),
        }
    }

    fn commit(
        &mut self,
        viewpoint: &str,
        result: Result<(), StoreError>,
        list: Vec<Hotspot>,
    ) -> SyncStatus {
        match result {
            Ok(()) => {
                debug!(viewpoint, count = list.len(), "hotspots saved");
                self.stale = false;
                self.cache.insert(viewpoint.to_string(), list.clone());
                self.subscribers.emit(&HotspotChange::Viewpoint {
                    viewpoint: viewpoint.to_string(),
                    hotspots: list,
                });
                SyncStatus::Synced
            }
            Err(err) => self.mark_stale("save", err),
        }
    }

    fn replace_all(&mut self, snapshot: HotspotSnapshot) -> SyncStatus {
        self.stale = false;
        self.cache = snapshot;
        self.subscribers.emit(&HotspotChange::All);
        SyncStatus::Synced
    }

    fn mark_stale(&mut self, op: &str, err: StoreError) -> SyncStatus {
        warn!(op, "hotspot persistence failed: {err}");
        self.stale = true;
        SyncStatus::Stale(err)
    }
}

#[cfg(test)]
mod tests {
    use super::{HotspotChange, HotspotStore, SyncStatus};
    use crate::StoreError;
    use crate::backend::{HotspotBackend, HotspotSnapshot, InMemoryBackend};
    use foundation::math::Vec3;
    use pretty_assertions::assert_eq;
    use scene::Hotspot;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Backend whose writes can be switched off, like a full quota.
    #[derive(Debug, Default)]
    struct Flaky {
        inner: InMemoryBackend,
        fail_writes: bool,
        fail_reads: bool,
    }

    impl HotspotBackend for Flaky {
        fn load_all(&self) -> Result<HotspotSnapshot, StoreError> {
            if self.fail_reads {
                return Err(StoreError::StorageUnavailable);
            }
            self.inner.load_all()
        }

        fn save(&mut self, viewpoint: &str, hotspots: &[Hotspot]) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Io("quota exceeded".to_string()));
            }
            self.inner.save(viewpoint, hotspots)
        }

        fn save_all(&mut self, snapshot: &HotspotSnapshot) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Io("quota exceeded".to_string()));
            }
            self.inner.save_all(snapshot)
        }
    }

    fn defaults() -> HotspotSnapshot {
        let mut snap = HotspotSnapshot::new();
        snap.insert(
            "storeP1".to_string(),
            vec![
                Hotspot::percent("p1-1", 65.0, 50.0).with_label("Product 1"),
                Hotspot::percent("p1-2", 35.0, 50.0).with_label("Product 2"),
            ],
        );
        snap
    }

    fn recorder<B: HotspotBackend>(store: &mut HotspotStore<B>) -> Rc<RefCell<Vec<HotspotChange>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        store.subscribe(move |c| sink.borrow_mut().push(c.clone()));
        log
    }

    #[test]
    fn list_preserves_order_and_unknown_is_empty() {
        let store = HotspotStore::new(InMemoryBackend::with_snapshot(defaults()), defaults());
        let ids: Vec<&str> = store.list("storeP1").iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["p1-1", "p1-2"]);
        assert!(store.list("storeP9").is_empty());
    }

    #[test]
    fn save_replaces_and_notifies() {
        let mut store = HotspotStore::new(InMemoryBackend::new(), defaults());
        let log = recorder(&mut store);

        let list = vec![Hotspot::percent("a", 10.0, 10.0)];
        assert_eq!(store.save("storeP2", list.clone()), Ok(SyncStatus::Synced));
        assert_eq!(store.list("storeP2"), list.as_slice());
        assert_eq!(store.backend().load("storeP2").expect("load"), list);
        assert_eq!(
            *log.borrow(),
            vec![HotspotChange::Viewpoint {
                viewpoint: "storeP2".to_string(),
                hotspots: list,
            }]
        );
    }

    #[test]
    fn failed_save_keeps_committed_state_and_goes_stale() {
        let backend = Flaky {
            inner: InMemoryBackend::with_snapshot(defaults()),
            ..Flaky::default()
        };
        let mut store = HotspotStore::new(backend, defaults());
        let log = recorder(&mut store);
        store.backend_mut().fail_writes = true;

        let status = store
            .save("storeP1", vec![Hotspot::percent("z", 1.0, 1.0)])
            .expect("valid list");
        assert!(matches!(status, SyncStatus::Stale(StoreError::Io(_))));
        assert!(store.is_stale());
        assert_eq!(store.list("storeP1"), defaults()["storeP1"].as_slice());
        assert!(log.borrow().is_empty());

        store.backend_mut().fail_writes = false;
        let status = store
            .save("storeP1", vec![Hotspot::percent("z", 1.0, 1.0)])
            .expect("valid list");
        assert!(status.is_synced());
        assert!(!store.is_stale());
    }

    #[test]
    fn unreachable_backend_starts_from_defaults() {
        let backend = Flaky {
            fail_reads: true,
            ..Flaky::default()
        };
        let store = HotspotStore::new(backend, defaults());
        assert!(store.is_stale());
        assert_eq!(store.snapshot(), &defaults());
    }

    #[test]
    fn invalid_lists_are_rejected_before_the_backend() {
        let mut store = HotspotStore::new(InMemoryBackend::new(), defaults());
        let dup = vec![Hotspot::percent("a", 1.0, 1.0), Hotspot::percent("a", 2.0, 2.0)];
        assert!(matches!(
            store.save("vp", dup),
            Err(StoreError::DuplicateHotspot { .. })
        ));
        assert!(store.backend().load("vp").expect("load").is_empty());
    }

    #[test]
    fn export_import_round_trip() {
        let mut source = HotspotStore::new(InMemoryBackend::with_snapshot(defaults()), defaults());
        source
            .save(
                "storeFront",
                vec![
                    Hotspot::world("w1", Vec3::new(0.5, -0.2, 2.0))
                        .with_title("Lamp")
                        .with_price("$40.00")
                        .with_images(vec!["/lamp.jpg".to_string()]),
                ],
            )
            .expect("save");
        let exported = source.export_all().expect("export");

        let mut target = HotspotStore::new(InMemoryBackend::new(), HotspotSnapshot::new());
        let log = recorder(&mut target);
        assert_eq!(target.import_all(&exported), Ok(SyncStatus::Synced));
        assert_eq!(target.snapshot(), source.snapshot());
        assert_eq!(*log.borrow(), vec![HotspotChange::All]);
    }

    #[test]
    fn ray_placed_coordinates_survive_export_and_import() {
        use foundation::math::{Camera3D, ScreenRect, Vec2, point_at_depth, screen_ray};

        let camera = Camera3D::look_at(
            Vec3::new(0.3, 1.7, -4.1),
            Vec3::new(-0.2, 0.9, 3.3),
            75f64.to_radians(),
            0.1,
            1000.0,
        )
        .with_aspect(16.0 / 9.0);
        let rect = ScreenRect::sized(1280.0, 720.0);

        let mut placed = Vec::new();
        for i in 0..40 {
            for j in 0..25 {
                let pointer = Vec2::new(i as f64 * 31.7 + 3.3, j as f64 * 28.9 + 1.1);
                let ray = screen_ray(&camera, pointer, rect).expect("ray");
                let depth = 0.1 + (i * 25 + j) as f64 * 0.0493;
                let p = point_at_depth(&ray, depth).expect("point");
                placed.push(Hotspot::world(format!("h{i}-{j}"), p));
            }
        }

        let mut source = HotspotStore::new(InMemoryBackend::new(), HotspotSnapshot::new());
        source.save("storeP2", placed.clone()).expect("save");
        let exported = source.export_all().expect("export");

        let mut target = HotspotStore::new(InMemoryBackend::new(), HotspotSnapshot::new());
        assert_eq!(target.import_all(&exported), Ok(SyncStatus::Synced));
        let imported = target.list("storeP2");
        assert_eq!(imported.len(), placed.len());
        for (a, b) in placed.iter().zip(imported) {
            let (pa, pb) = (a.placement.world_position(), b.placement.world_position());
            assert!(
                pa.zip(pb).is_some_and(|(pa, pb)| {
                    pa.x.to_bits() == pb.x.to_bits()
                        && pa.y.to_bits() == pb.y.to_bits()
                        && pa.z.to_bits() == pb.z.to_bits()
                }),
                "{}: {pa:?} != {pb:?}",
                a.id
            );
        }
        assert_eq!(target.export_all().expect("export"), exported);
    }

    #[test]
    fn import_rejects_bad_documents() {
        let mut store = HotspotStore::new(InMemoryBackend::with_snapshot(defaults()), defaults());
        assert!(matches!(store.import_all("[]"), Err(StoreError::Corrupt(_))));
        assert_eq!(store.snapshot(), &defaults());
    }

    #[test]
    fn image_operations_update_cache() {
        let mut store = HotspotStore::new(InMemoryBackend::with_snapshot(defaults()), defaults());
        store.add_image("storeP1", "p1-1", "/a.jpg").expect("add");
        store.add_image("storeP1", "p1-1", "/b.jpg").expect("add");
        store.remove_image("storeP1", "p1-1", 0).expect("remove");
        assert_eq!(
            store.get("storeP1", "p1-1").map(|h| h.images.clone()),
            Some(vec!["/b.jpg".to_string()])
        );
        assert_eq!(
            store.backend().load("storeP1").expect("load")[0].images,
            vec!["/b.jpg".to_string()]
        );

        store
            .set_images("storeP1", "p1-2", vec!["/c.jpg".to_string()])
            .expect("set");
        assert_eq!(store.get("storeP1", "p1-2").map(|h| h.images.len()), Some(1));

        assert!(matches!(
            store.remove_image("storeP1", "p1-1", 3),
            Err(StoreError::ImageIndexOutOfRange { .. })
        ));
        assert!(matches!(
            store.add_image("storeP1", "nope", "/x.jpg"),
            Err(StoreError::HotspotNotFound { .. })
        ));
    }

    #[test]
    fn update_hotspot_replaces_record_in_place() {
        let mut store = HotspotStore::new(InMemoryBackend::with_snapshot(defaults()), defaults());
        let edited = Hotspot::percent("p1-2", 36.0, 51.0).with_label("Renamed");
        store.update_hotspot("storeP1", edited.clone()).expect("update");
        assert_eq!(store.list("storeP1")[1], edited);
    }

    #[test]
    fn reset_restores_defaults_and_notifies() {
        let mut store = HotspotStore::new(InMemoryBackend::with_snapshot(defaults()), defaults());
        store.save("storeP1", Vec::new()).expect("save");
        let log = recorder(&mut store);

        assert_eq!(store.reset(), SyncStatus::Synced);
        assert_eq!(store.snapshot(), &defaults());
        assert_eq!(*log.borrow(), vec![HotspotChange::All]);
    }

    #[test]
    fn refresh_picks_up_external_writes() {
        let mut store = HotspotStore::new(InMemoryBackend::with_snapshot(defaults()), defaults());
        let log = recorder(&mut store);

        store
            .backend_mut()
            .save("storeP1", &[Hotspot::percent("ext", 5.0, 5.0)])
            .expect("external write");
        assert_eq!(store.list("storeP1").len(), 2);

        assert_eq!(store.refresh("storeP1"), SyncStatus::Synced);
        assert_eq!(store.list("storeP1")[0].id, "ext");
        assert_eq!(log.borrow().len(), 1);

        // Nothing changed: no second notification.
        store.refresh_all();
        assert_eq!(log.borrow().len(), 1);
    }
}
