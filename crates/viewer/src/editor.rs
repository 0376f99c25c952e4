//! In-viewer hotspot editing.
//!
//! The editor works on a copy of one viewpoint's hotspots. Nothing reaches
//! the store until [`HotspotEditor::save`], which replaces the viewpoint's
//! whole list.

use foundation::math::{Camera3D, ScreenRect, Vec2};
use scene::{CoordinateSpace, Hotspot, Placement, Viewpoint};
use store::{HotspotBackend, HotspotStore, StoreError, SyncStatus};
use tracing::{debug, info, warn};

use crate::interaction::SpatialInteractionLayer;

/// Distance along the view ray used for new world placements.
pub const DEFAULT_DEPTH: f64 = 2.0;
pub const MIN_DEPTH: f64 = 0.1;
pub const MAX_DEPTH: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlacementMode {
    #[default]
    None,
    Add,
    Move {
        hotspot_id: String,
    },
}

/// Transient add/move state; reset after every successful placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementSession {
    pub mode: PlacementMode,
    pub depth: f64,
}

impl Default for PlacementSession {
    fn default() -> Self {
        Self {
            mode: PlacementMode::None,
            depth: DEFAULT_DEPTH,
        }
    }
}

impl PlacementSession {
    pub fn is_placing(&self) -> bool {
        self.mode != PlacementMode::None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementError {
    NotPlacing,
    Transitioning,
    CoordinateSpaceMismatch {
        expected: CoordinateSpace,
        found: CoordinateSpace,
    },
    /// The pointer ray (or image rect) gave no usable point.
    NoSolution,
    UnknownHotspot(String),
}

impl std::fmt::Display for PlacementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementError::NotPlacing => write!(f, "no placement in progress"),
            PlacementError::Transitioning => write!(f, "placement ignored during transition"),
            PlacementError::CoordinateSpaceMismatch { expected, found } => write!(
                f,
                "placement uses {found:?} coordinates but this viewpoint needs {expected:?}"
            ),
            PlacementError::NoSolution => write!(f, "pointer has no placement solution"),
            PlacementError::UnknownHotspot(id) => write!(f, "unknown hotspot {id}"),
        }
    }
}

impl std::error::Error for PlacementError {}

#[derive(Debug, Clone)]
pub struct HotspotEditor {
    viewpoint_id: String,
    space: CoordinateSpace,
    working: Vec<Hotspot>,
    session: PlacementSession,
    dirty: bool,
}

impl HotspotEditor {
    pub fn open(viewpoint: &Viewpoint, hotspots: &[Hotspot]) -> Self {
        debug!(viewpoint = %viewpoint.id, count = hotspots.len(), "hotspot editor opened");
        Self {
            viewpoint_id: viewpoint.id.clone(),
            space: viewpoint.placement_space(),
            working: hotspots.to_vec(),
            session: PlacementSession::default(),
            dirty: false,
        }
    }

    pub fn viewpoint_id(&self) -> &str {
        &self.viewpoint_id
    }

    pub fn space(&self) -> CoordinateSpace {
        self.space
    }

    pub fn hotspots(&self) -> &[Hotspot] {
        &self.working
    }

    pub fn get(&self, hotspot_id: &str) -> Option<&Hotspot> {
        self.working.iter().find(|h| h.id == hotspot_id)
    }

    pub fn session(&self) -> &PlacementSession {
        &self.session
    }

    /// Unsaved edits exist (including a save that did not reach storage).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn start_add(&mut self) {
        self.session.mode = PlacementMode::Add;
    }

    pub fn start_move(&mut self, hotspot_id: &str) -> Result<(), PlacementError> {
        if self.get(hotspot_id).is_none() {
            return Err(PlacementError::UnknownHotspot(hotspot_id.to_string()));
        }
        self.session.mode = PlacementMode::Move {
            hotspot_id: hotspot_id.to_string(),
        };
        Ok(())
    }

    pub fn cancel_placement(&mut self) {
        self.session.mode = PlacementMode::None;
    }

    /// Non-finite values are ignored.
    pub fn set_depth(&mut self, depth: f64) {
        if depth.is_finite() {
            self.session.depth = depth.clamp(MIN_DEPTH, MAX_DEPTH);
        }
    }

    pub fn adjust_depth(&mut self, delta: f64) {
        self.set_depth(self.session.depth + delta);
    }

    /// Commits `placement` for the active add/move and returns the hotspot id.
    pub fn place(
        &mut self,
        placement: Placement,
        transitioning: bool,
    ) -> Result<String, PlacementError> {
        if transitioning {
            debug!("placement ignored during transition");
            return Err(PlacementError::Transitioning);
        }
        if placement.space() != self.space {
            return Err(PlacementError::CoordinateSpaceMismatch {
                expected: self.space,
                found: placement.space(),
            });
        }

        let id = match &self.session.mode {
            PlacementMode::None => return Err(PlacementError::NotPlacing),
            PlacementMode::Add => {
                let id = format!("hotspot-{}", uuid::Uuid::new_v4());
                self.working.push(Hotspot::new(id.clone(), placement));
                id
            }
            PlacementMode::Move { hotspot_id } => {
                let Some(existing) = self.working.iter_mut().find(|h| &h.id == hotspot_id) else {
                    return Err(PlacementError::UnknownHotspot(hotspot_id.clone()));
                };
                if existing.placement.space() != placement.space() {
                    return Err(PlacementError::CoordinateSpaceMismatch {
                        expected: existing.placement.space(),
                        found: placement.space(),
                    });
                }
                existing.placement = placement;
                hotspot_id.clone()
            }
        };

        self.session = PlacementSession {
            depth: self.session.depth,
            ..PlacementSession::default()
        };
        self.dirty = true;
        debug!(viewpoint = %self.viewpoint_id, hotspot = %id, "hotspot placed");
        Ok(id)
    }

    /// Places at the session depth along the ray under `pointer`.
    pub fn place_at_pointer_3d(
        &mut self,
        camera: &Camera3D,
        rect: ScreenRect,
        pointer: Vec2,
        transitioning: bool,
    ) -> Result<String, PlacementError> {
        let world =
            SpatialInteractionLayer::place_world(camera, rect, pointer, self.session.depth)
                .ok_or(PlacementError::NoSolution)?;
        self.place(Placement::world(world), transitioning)
    }

    /// Places at the percent position of `pointer` over the displayed image.
    pub fn place_at_pointer_2d(
        &mut self,
        image: ScreenRect,
        pointer: Vec2,
        transitioning: bool,
    ) -> Result<String, PlacementError> {
        let (x, y) = SpatialInteractionLayer::place_percent(image, pointer)
            .ok_or(PlacementError::NoSolution)?;
        self.place(Placement::Percent2D { x, y }, transitioning)
    }

    fn edit(
        &mut self,
        hotspot_id: &str,
        apply: impl FnOnce(&mut Hotspot),
    ) -> Result<(), PlacementError> {
        let hotspot = self
            .working
            .iter_mut()
            .find(|h| h.id == hotspot_id)
            .ok_or_else(|| PlacementError::UnknownHotspot(hotspot_id.to_string()))?;
        apply(hotspot);
        self.dirty = true;
        Ok(())
    }

    pub fn set_label(&mut self, hotspot_id: &str, label: &str) -> Result<(), PlacementError> {
        self.edit(hotspot_id, |h| h.label = label.to_string())
    }

    /// Empty `price` clears it.
    pub fn set_details(
        &mut self,
        hotspot_id: &str,
        title: &str,
        price: &str,
    ) -> Result<(), PlacementError> {
        self.edit(hotspot_id, |h| {
            h.title = title.to_string();
            h.price = (!price.trim().is_empty()).then(|| price.trim().to_string());
        })
    }

    pub fn delete(&mut self, hotspot_id: &str) -> Result<Hotspot, PlacementError> {
        let index = self
            .working
            .iter()
            .position(|h| h.id == hotspot_id)
            .ok_or_else(|| PlacementError::UnknownHotspot(hotspot_id.to_string()))?;
        if self.session.mode
            == (PlacementMode::Move {
                hotspot_id: hotspot_id.to_string(),
            })
        {
            self.session.mode = PlacementMode::None;
        }
        self.dirty = true;
        Ok(self.working.remove(index))
    }

    /// Pushes the working list to `store`. The working copy stays dirty
    /// unless the store reports [`SyncStatus::Synced`].
    pub fn save<B: HotspotBackend>(
        &mut self,
        store: &mut HotspotStore<B>,
    ) -> Result<SyncStatus, StoreError> {
        let status = store.save(&self.viewpoint_id, self.working.clone())?;
        match &status {
            SyncStatus::Synced => {
                self.dirty = false;
                info!(viewpoint = %self.viewpoint_id, count = self.working.len(), "hotspots saved");
            }
            SyncStatus::Stale(err) => {
                warn!(viewpoint = %self.viewpoint_id, "hotspot edits kept locally: {err}");
            }
        }
        Ok(status)
    }

    /// Discards the placement session; returns the working list when it has
    /// unsaved edits.
    pub fn close(self) -> Option<Vec<Hotspot>> {
        debug!(viewpoint = %self.viewpoint_id, dirty = self.dirty, "hotspot editor closed");
        self.dirty.then_some(self.working)
    }
}
