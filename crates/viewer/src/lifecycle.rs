use foundation::bounds::Aabb3;
use foundation::math::{Camera3D, ScreenRect};
use futures_util::future::LocalBoxFuture;
use runtime::frame::{Frame, FrameLoop, FrameToken};
use scene::Viewpoint;
use store::Settings;
use tracing::{debug, info, warn};

use crate::adapter::{
    CameraControls, Container, ContainerNode, LoadError, LoadRequest, NodeId, ProgressReporter,
    RenderAdapter, SceneVisual, SurfaceSize, VisualSource,
};
use crate::config::ViewerConfig;

/// Identifies one `begin_mount`; invalidated by `unmount`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MountTicket(u64);

/// An in-flight mount. Await `load`, then hand the result to
/// [`ViewerLifecycleManager::finish_mount`] together with `ticket`.
pub struct PendingMount<V> {
    pub ticket: MountTicket,
    pub load: LocalBoxFuture<'static, Result<V, LoadError>>,
}

impl<V> std::fmt::Debug for PendingMount<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingMount")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MountError {
    /// A load is already in flight for `viewpoint`.
    Busy { viewpoint: String },
}

impl std::fmt::Display for MountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MountError::Busy { viewpoint } => {
                write!(f, "viewer is still loading viewpoint {viewpoint}")
            }
        }
    }
}

impl std::error::Error for MountError {}

#[derive(Debug, Clone, PartialEq)]
pub enum MountOutcome {
    /// Visual loaded; the render loop is running.
    Ready,
    /// Load failed; the static fallback message is showing.
    Fallback(LoadError),
    /// The ticket was invalidated before the load finished; nothing mounted.
    Stale,
}

enum Presentation<V> {
    Loading,
    Ready(V),
    Fallback { message: NodeId },
}

/// The one live resource set, bound to a single viewpoint.
struct ActiveScene<A: RenderAdapter> {
    viewpoint_id: String,
    canvas: NodeId,
    renderer: A::Renderer,
    camera: Camera3D,
    controls: A::Controls,
    presentation: Presentation<A::Visual>,
}

/// Owns the renderer, camera, controls and visual for the active viewpoint.
///
/// At most one [`ActiveScene`] exists. `begin_mount` always tears the
/// previous one down before creating anything, and `unmount` stops the
/// render loop so no frame runs afterwards.
pub struct ViewerLifecycleManager<A: RenderAdapter, C> {
    adapter: A,
    container: C,
    config: ViewerConfig,
    scene: Option<ActiveScene<A>>,
    frame_loop: FrameLoop,
    next_ticket: u64,
    loading: Option<MountTicket>,
    progress: Option<ProgressReporter>,
}

impl<A: RenderAdapter, C: Container> ViewerLifecycleManager<A, C> {
    pub fn new(adapter: A, container: C, config: ViewerConfig) -> Self {
        Self {
            adapter,
            container,
            config,
            scene: None,
            frame_loop: FrameLoop::new(1.0 / 60.0),
            next_ticket: 0,
            loading: None,
            progress: None,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Quality settings take effect on the next mount.
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.config.renderer.antialias = settings.enable_antialiasing;
        self.config.progressive_loading = settings.progressive_loading;
    }

    pub fn is_mounted(&self) -> bool {
        self.scene.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn is_fallback(&self) -> bool {
        matches!(
            self.scene.as_ref().map(|s| &s.presentation),
            Some(Presentation::Fallback { .. })
        )
    }

    pub fn is_rendering(&self) -> bool {
        self.frame_loop.is_running()
    }

    pub fn mounted_viewpoint(&self) -> Option<&str> {
        self.scene.as_ref().map(|s| s.viewpoint_id.as_str())
    }

    pub fn camera(&self) -> Option<&Camera3D> {
        self.scene.as_ref().map(|s| &s.camera)
    }

    /// Render surface rect; pointer positions are relative to the same space.
    pub fn surface_rect(&self) -> ScreenRect {
        self.container.rect()
    }

    /// Last reported load percentage, `None` when nothing has been loaded.
    pub fn progress(&self) -> Option<f64> {
        self.progress.as_ref().map(ProgressReporter::get)
    }

    pub fn visual_bounds(&self) -> Option<Aabb3> {
        match &self.scene.as_ref()?.presentation {
            Presentation::Ready(visual) => visual.bounding_box(),
            _ => None,
        }
    }

    /// Frames accepted since construction.
    pub fn frames_rendered(&self) -> u64 {
        self.frame_loop.frames_run()
    }

    fn surface_size(&self) -> SurfaceSize {
        let rect = self.container.rect();
        SurfaceSize {
            width: rect.width,
            height: rect.height,
            pixel_ratio: self
                .config
                .renderer
                .effective_pixel_ratio(self.container.device_pixel_ratio()),
        }
    }

    /// Acquires renderer, camera and controls for `viewpoint` and starts
    /// loading its visual. Any mounted scene is unmounted first.
    pub fn begin_mount(
        &mut self,
        viewpoint: &Viewpoint,
    ) -> Result<PendingMount<A::Visual>, MountError> {
        if self.loading.is_some() {
            let busy = self.mounted_viewpoint().unwrap_or_default().to_string();
            debug!(viewpoint = %viewpoint.id, loading = %busy, "mount rejected while loading");
            return Err(MountError::Busy { viewpoint: busy });
        }
        if self.scene.is_some() {
            self.unmount();
        }

        let size = self.surface_size();
        let canvas = self.container.append(ContainerNode::Canvas);
        let renderer = self.adapter.create_renderer(&self.config.renderer, size);
        let camera = self.config.camera.build(size.aspect().unwrap_or(1.0));
        let controls = self.adapter.create_controls(&camera, &self.config.controls);

        self.next_ticket += 1;
        let ticket = MountTicket(self.next_ticket);
        let progress = ProgressReporter::new();

        let source = match &viewpoint.splat_path {
            Some(url) => VisualSource::Splat {
                url: url.clone(),
                placement: viewpoint.splat_placement,
            },
            None => VisualSource::Image {
                url: viewpoint.image_path.clone(),
            },
        };
        let request = LoadRequest {
            viewpoint_id: viewpoint.id.clone(),
            source,
            progressive: self.config.progressive_loading,
        };
        info!(viewpoint = %viewpoint.id, url = %request.source.url(), "mounting viewpoint");
        let load = self.adapter.load(request, progress.clone());

        self.scene = Some(ActiveScene {
            viewpoint_id: viewpoint.id.clone(),
            canvas,
            renderer,
            camera,
            controls,
            presentation: Presentation::Loading,
        });
        self.loading = Some(ticket);
        self.progress = Some(progress);

        Ok(PendingMount { ticket, load })
    }

    /// Completes a mount started by `begin_mount`.
    ///
    /// A failed load shows the fallback message instead of propagating. A
    /// stale ticket's visual is disposed immediately.
    pub fn finish_mount(
        &mut self,
        ticket: MountTicket,
        result: Result<A::Visual, LoadError>,
    ) -> MountOutcome {
        if self.loading != Some(ticket) {
            debug!(?ticket, "discarding stale mount");
            if let Ok(visual) = result {
                self.adapter.dispose_visual(visual);
            }
            return MountOutcome::Stale;
        }
        self.loading = None;

        let Some(scene) = self.scene.as_mut() else {
            if let Ok(visual) = result {
                self.adapter.dispose_visual(visual);
            }
            return MountOutcome::Stale;
        };

        match result {
            Ok(visual) => {
                scene.presentation = Presentation::Ready(visual);
                if let Some(progress) = &self.progress {
                    progress.report(100.0);
                }
                self.frame_loop.start(&mut self.adapter);
                info!(viewpoint = %scene.viewpoint_id, "viewpoint mounted");
                MountOutcome::Ready
            }
            Err(err) => {
                warn!(viewpoint = %scene.viewpoint_id, "visual failed to load, showing fallback: {err}");
                let message = self
                    .container
                    .append(ContainerNode::Message(self.config.fallback_message.clone()));
                scene.presentation = Presentation::Fallback { message };
                MountOutcome::Fallback(err)
            }
        }
    }

    /// `begin_mount`, await the load, `finish_mount`.
    pub async fn mount(&mut self, viewpoint: &Viewpoint) -> Result<MountOutcome, MountError> {
        let pending = self.begin_mount(viewpoint)?;
        let result = pending.load.await;
        Ok(self.finish_mount(pending.ticket, result))
    }

    /// Releases everything bound to the active viewpoint. Idempotent.
    ///
    /// Returns `true` when something was torn down.
    pub fn unmount(&mut self) -> bool {
        self.frame_loop.stop(&mut self.adapter);
        let was_loading = self.loading.take().is_some();
        self.progress = None;

        let Some(scene) = self.scene.take() else {
            return was_loading;
        };

        self.adapter.dispose_controls(scene.controls);
        match scene.presentation {
            Presentation::Ready(visual) => self.adapter.dispose_visual(visual),
            Presentation::Fallback { message } => self.container.remove(message),
            Presentation::Loading => {}
        }
        self.adapter.dispose_renderer(scene.renderer);
        self.container.remove(scene.canvas);
        info!(viewpoint = %scene.viewpoint_id, "viewpoint unmounted");
        true
    }

    /// Runs one frame if `token` is the outstanding render callback.
    pub fn on_frame(&mut self, token: FrameToken) -> Option<Frame> {
        let frame = self.frame_loop.accept(token, &mut self.adapter)?;
        let scene = self.scene.as_mut()?;
        let Presentation::Ready(visual) = &scene.presentation else {
            return None;
        };
        scene.controls.update(&mut scene.camera);
        self.adapter
            .render(&mut scene.renderer, visual, &scene.camera);
        Some(frame)
    }

    /// Re-reads the container size; camera and renderer follow without remounting.
    pub fn resize(&mut self) {
        let size = self.surface_size();
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        if let Some(aspect) = size.aspect() {
            scene.camera.aspect = aspect;
        }
        self.adapter.resize_renderer(&mut scene.renderer, size);
        debug!(width = size.width, height = size.height, "viewer resized");
    }

    /// Wheel fly-through: moves camera and orbit target together along the
    /// view direction. Positive deltas move backwards.
    pub fn dolly(&mut self, wheel_delta_y: f64) -> bool {
        if !wheel_delta_y.is_finite() {
            return false;
        }
        let Some(scene) = self.scene.as_mut() else {
            return false;
        };
        let Some(basis) = scene.camera.basis() else {
            return false;
        };
        let offset = basis.forward * -(wheel_delta_y * self.config.dolly_speed);
        scene.camera.position = scene.camera.position + offset;
        scene.camera.target = scene.camera.target + offset;
        scene.controls.set_target(scene.camera.target);
        true
    }
}

impl<A: RenderAdapter, C> Drop for ViewerLifecycleManager<A, C> {
    fn drop(&mut self) {
        // Same teardown as `unmount`, without requiring `C: Container` for
        // node removal; the container goes away with us.
        self.frame_loop.stop(&mut self.adapter);
        if let Some(scene) = self.scene.take() {
            self.adapter.dispose_controls(scene.controls);
            if let Presentation::Ready(visual) = scene.presentation {
                self.adapter.dispose_visual(visual);
            }
            self.adapter.dispose_renderer(scene.renderer);
        }
    }
}
