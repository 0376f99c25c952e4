//! Wires navigation, the viewer, hit-testing, the stores and the editor
//! into one single-threaded control loop.
//!
//! A transition runs as `navigate_to` → `PendingTransition::load().await` →
//! `finish_transition`. Between the first and last step the navigation
//! controller is transitioning and pointer input is ignored. A pending
//! transition that is dropped instead lands on the fallback presentation
//! the next time the session is driven.

use std::cell::Cell;
use std::rc::Rc;

use foundation::math::{ScreenRect, Vec2};
use futures_util::future::LocalBoxFuture;
use runtime::frame::{Frame, FrameToken};
use scene::{CoordinateSpace, Direction, Hotspot, ViewpointGraph};
use store::{
    HotspotBackend, HotspotStore, Settings, SettingsBackend, SettingsError, SettingsProvider,
    StoreError, SyncStatus,
};
use tracing::{debug, warn};

use crate::adapter::{Container, LoadError, RenderAdapter};
use crate::editor::{HotspotEditor, PlacementError};
use crate::interaction::SpatialInteractionLayer;
use crate::lifecycle::{MountError, MountOutcome, MountTicket, ViewerLifecycleManager};
use crate::navigation::{NavigationController, NavigationKey, Transition};

/// A started transition whose visual is still loading.
///
/// Dropping it (or a `LoadedTransition`) without `finish_transition` is
/// allowed: the session lands the transition on the fallback presentation
/// the next time it is driven.
pub struct PendingTransition<V> {
    target: String,
    ticket: MountTicket,
    load: LocalBoxFuture<'static, Result<V, LoadError>>,
    guard: AbandonGuard,
}

impl<V> PendingTransition<V> {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Waits for the visual. Holds no borrow of the session.
    pub async fn load(self) -> LoadedTransition<V> {
        let PendingTransition {
            target,
            ticket,
            load,
            guard,
        } = self;
        let result = load.await;
        LoadedTransition {
            target,
            ticket,
            result,
            guard,
        }
    }
}

/// A transition whose load has settled; hand it to `finish_transition`.
pub struct LoadedTransition<V> {
    target: String,
    ticket: MountTicket,
    result: Result<V, LoadError>,
    guard: AbandonGuard,
}

impl<V> LoadedTransition<V> {
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Raises the session's abandoned flag unless disarmed.
struct AbandonGuard {
    abandoned: Rc<Cell<bool>>,
    armed: bool,
}

impl AbandonGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.set(true);
        }
    }
}

/// The mount the session is waiting on; `transition` is `None` at startup.
struct InFlight {
    ticket: MountTicket,
    transition: Option<Transition>,
}

pub struct ViewerSession<A: RenderAdapter, C, B, S> {
    graph: ViewpointGraph,
    navigation: NavigationController,
    viewer: ViewerLifecycleManager<A, C>,
    interaction: SpatialInteractionLayer,
    store: HotspotStore<B>,
    settings: SettingsProvider<S>,
    editor: Option<HotspotEditor>,
    selected: Option<String>,
    hotspots_changed: Rc<Cell<bool>>,
    settings_changed: Rc<Cell<bool>>,
    in_flight: Option<InFlight>,
    abandoned: Rc<Cell<bool>>,
}

impl<A, C, B, S> ViewerSession<A, C, B, S>
where
    A: RenderAdapter,
    C: Container,
    B: HotspotBackend,
    S: SettingsBackend,
{
    pub fn new(
        graph: ViewpointGraph,
        mut viewer: ViewerLifecycleManager<A, C>,
        mut store: HotspotStore<B>,
        mut settings: SettingsProvider<S>,
    ) -> Self {
        let hotspots_changed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&hotspots_changed);
        store.subscribe(move |_| flag.set(true));

        let settings_changed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&settings_changed);
        settings.subscribe(move |_| flag.set(true));

        viewer.apply_settings(settings.get());
        let navigation = NavigationController::new(&graph);
        Self {
            graph,
            navigation,
            viewer,
            interaction: SpatialInteractionLayer::new(),
            store,
            settings,
            editor: None,
            selected: None,
            hotspots_changed,
            settings_changed,
            in_flight: None,
            abandoned: Rc::new(Cell::new(false)),
        }
    }

    pub fn graph(&self) -> &ViewpointGraph {
        &self.graph
    }

    pub fn navigation(&self) -> &NavigationController {
        &self.navigation
    }

    pub fn navigation_mut(&mut self) -> &mut NavigationController {
        &mut self.navigation
    }

    pub fn viewer(&self) -> &ViewerLifecycleManager<A, C> {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut ViewerLifecycleManager<A, C> {
        &mut self.viewer
    }

    pub fn interaction(&self) -> &SpatialInteractionLayer {
        &self.interaction
    }

    pub fn store(&self) -> &HotspotStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut HotspotStore<B> {
        &mut self.store
    }

    pub fn settings(&self) -> &Settings {
        self.settings.get()
    }

    pub fn current(&self) -> &str {
        self.navigation.current()
    }

    pub fn is_transitioning(&self) -> bool {
        self.navigation.is_transitioning()
    }

    /// Hotspots of the current viewpoint, as stored.
    pub fn hotspots(&self) -> &[Hotspot] {
        self.store.list(self.navigation.current())
    }

    /// Mounts the current viewpoint (the graph's initial one at startup).
    pub async fn start(&mut self) -> Result<MountOutcome, MountError> {
        self.settle_abandoned();
        let Some(viewpoint) = self.graph.get(self.navigation.current()) else {
            return Ok(MountOutcome::Stale);
        };
        let mount = self.viewer.begin_mount(viewpoint)?;
        self.in_flight = Some(InFlight {
            ticket: mount.ticket,
            transition: None,
        });
        let guard = self.guard();
        let result = mount.load.await;
        guard.disarm();
        Ok(self.land(mount.ticket, result))
    }

    /// Starts a transition to `target`; `None` when navigation ignores it.
    pub fn navigate_to(&mut self, target: &str) -> Option<PendingTransition<A::Visual>> {
        self.settle_abandoned();
        if self.viewer.is_loading() && !self.navigation.is_transitioning() {
            debug!(viewpoint = target, "navigation ignored, viewer still loading");
            return None;
        }
        let transition = self.navigation.begin(&self.graph, target)?;
        self.start_transition(transition)
    }

    pub fn navigate(&mut self, direction: Direction) -> Option<PendingTransition<A::Visual>> {
        self.settle_abandoned();
        let target = self.graph.get(self.navigation.current())?.connection(direction)?.to_string();
        self.navigate_to(&target)
    }

    pub fn go_back(&mut self) -> Option<PendingTransition<A::Visual>> {
        self.settle_abandoned();
        if self.viewer.is_loading() && !self.navigation.is_transitioning() {
            return None;
        }
        let transition = self.navigation.go_back(&self.graph)?;
        self.start_transition(transition)
    }

    pub fn key(&mut self, key: NavigationKey) -> Option<PendingTransition<A::Visual>> {
        self.settle_abandoned();
        if self.viewer.is_loading() && !self.navigation.is_transitioning() {
            return None;
        }
        let transition = self.navigation.handle_key(&self.graph, key)?;
        self.start_transition(transition)
    }

    fn start_transition(&mut self, transition: Transition) -> Option<PendingTransition<A::Visual>> {
        if let Some(editor) = self.editor.take() {
            if editor.close().is_some() {
                warn!(from = %transition.from(), "discarding unsaved hotspot edits on navigation");
            }
        }
        self.selected = None;
        self.interaction.clear();

        let Some(viewpoint) = self.graph.get(transition.to()) else {
            self.navigation.finish(transition);
            return None;
        };
        match self.viewer.begin_mount(viewpoint) {
            Ok(mount) => {
                let target = transition.to().to_string();
                self.in_flight = Some(InFlight {
                    ticket: mount.ticket,
                    transition: Some(transition),
                });
                Some(PendingTransition {
                    target,
                    ticket: mount.ticket,
                    load: mount.load,
                    guard: self.guard(),
                })
            }
            Err(err) => {
                // Transitions always complete; this one lands without a visual.
                warn!(to = %transition.to(), "could not start mount: {err}");
                self.navigation.finish(transition);
                None
            }
        }
    }

    /// Completes a transition: mounts (or falls back), then lands navigation.
    pub fn finish_transition(&mut self, loaded: LoadedTransition<A::Visual>) -> MountOutcome {
        let LoadedTransition {
            ticket,
            result,
            guard,
            ..
        } = loaded;
        guard.disarm();
        self.land(ticket, result)
    }

    /// `navigate_to`, await the load, `finish_transition`.
    pub async fn go_to(&mut self, target: &str) -> Option<MountOutcome> {
        let pending = self.navigate_to(target)?;
        let loaded = pending.load().await;
        Some(self.finish_transition(loaded))
    }

    fn guard(&self) -> AbandonGuard {
        AbandonGuard {
            abandoned: Rc::clone(&self.abandoned),
            armed: true,
        }
    }

    fn land(&mut self, ticket: MountTicket, result: Result<A::Visual, LoadError>) -> MountOutcome {
        let outcome = self.viewer.finish_mount(ticket, result);
        match self.in_flight.take() {
            Some(in_flight) if in_flight.ticket == ticket => {
                if let Some(transition) = in_flight.transition {
                    self.navigation.finish(transition);
                }
            }
            other => self.in_flight = other,
        }
        self.refresh_proxies();
        outcome
    }

    /// Lands a mount whose pending handle was dropped before completion.
    fn settle_abandoned(&mut self) {
        if !self.abandoned.replace(false) {
            return;
        }
        let Some(ticket) = self.in_flight.as_ref().map(|f| f.ticket) else {
            return;
        };
        warn!(?ticket, "pending load dropped, landing without a visual");
        self.land(ticket, Err(LoadError::Cancelled));
    }

    /// Hit-tests a click and selects the hotspot under it.
    pub fn click(&mut self, pointer: Vec2) -> Option<&Hotspot> {
        self.settle_abandoned();
        let camera = self.viewer.camera()?;
        let hit = self.interaction.hit_test(
            camera,
            self.viewer.surface_rect(),
            pointer,
            self.navigation.is_transitioning(),
        )?;
        debug!(hotspot = %hit.hotspot_id, distance = hit.distance, "hotspot clicked");
        self.selected = Some(hit.hotspot_id);
        self.selected_hotspot()
    }

    pub fn select(&mut self, hotspot_id: Option<&str>) {
        self.selected = hotspot_id.map(str::to_string);
    }

    pub fn selected_hotspot(&self) -> Option<&Hotspot> {
        let id = self.selected.as_deref()?;
        self.store.get(self.navigation.current(), id)
    }

    /// Where the selected hotspot's card goes this frame.
    pub fn selected_anchor(&self) -> Option<Vec2> {
        let hotspot = self.selected_hotspot()?;
        let rect = self.viewer.surface_rect();
        match hotspot.placement {
            scene::Placement::Percent2D { x, y } => {
                Some(SpatialInteractionLayer::percent_anchor(rect, x, y))
            }
            scene::Placement::World3D { .. } => {
                SpatialInteractionLayer::anchor_hotspot(self.viewer.camera()?, rect, hotspot)
            }
        }
    }

    pub fn wheel(&mut self, delta_y: f64) -> bool {
        self.settle_abandoned();
        if self.navigation.is_transitioning() {
            debug!("wheel ignored during transition");
            return false;
        }
        self.viewer.dolly(delta_y)
    }

    /// Host frame callback. Applies pending store/settings changes first.
    pub fn on_frame(&mut self, token: FrameToken) -> Option<Frame> {
        self.settle_abandoned();
        if self.settings_changed.replace(false) {
            self.viewer.apply_settings(self.settings.get());
            self.hotspots_changed.set(true);
        }
        if self.hotspots_changed.get() && !self.navigation.is_transitioning() {
            self.refresh_proxies();
        }
        self.viewer.on_frame(token)
    }

    pub fn resize(&mut self) {
        self.viewer.resize();
    }

    pub fn update_settings(
        &mut self,
        edit: impl FnOnce(&mut Settings),
    ) -> Result<&Settings, SettingsError> {
        self.settings.update(edit)
    }

    fn refresh_proxies(&mut self) {
        self.hotspots_changed.set(false);
        let current = self.navigation.current();
        self.interaction
            .populate(self.store.list(current), self.settings.get());
    }

    /// Opens the editor on the current viewpoint. Not while transitioning.
    pub fn open_editor(&mut self) -> Option<&mut HotspotEditor> {
        self.settle_abandoned();
        if self.navigation.is_transitioning() {
            debug!("editor not opened during transition");
            return None;
        }
        let viewpoint = self.graph.get(self.navigation.current())?;
        let editor = HotspotEditor::open(viewpoint, self.store.list(&viewpoint.id));
        Some(self.editor.insert(editor))
    }

    pub fn editor(&self) -> Option<&HotspotEditor> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut HotspotEditor> {
        self.editor.as_mut()
    }

    /// Commits the editor's add/move at `pointer`.
    ///
    /// 3D viewpoints cast through the camera; 2D viewpoints map the pointer
    /// onto the image, which fills the render surface.
    pub fn editor_place(&mut self, pointer: Vec2) -> Result<String, PlacementError> {
        let transitioning = self.navigation.is_transitioning();
        let rect: ScreenRect = self.viewer.surface_rect();
        let camera = self.viewer.camera().copied();
        let editor = self.editor.as_mut().ok_or(PlacementError::NotPlacing)?;
        match editor.space() {
            CoordinateSpace::World => {
                let camera = camera.ok_or(PlacementError::NoSolution)?;
                editor.place_at_pointer_3d(&camera, rect, pointer, transitioning)
            }
            CoordinateSpace::Image => editor.place_at_pointer_2d(rect, pointer, transitioning),
        }
    }

    /// Saves the editor's working list; `None` when no editor is open.
    pub fn save_editor(&mut self) -> Option<Result<SyncStatus, StoreError>> {
        let editor = self.editor.as_mut()?;
        let result = editor.save(&mut self.store);
        if self.hotspots_changed.get() {
            self.refresh_proxies();
        }
        Some(result)
    }

    /// Closes the editor, returning unsaved edits if there were any.
    pub fn close_editor(&mut self) -> Option<Vec<Hotspot>> {
        self.editor.take()?.close()
    }
}
