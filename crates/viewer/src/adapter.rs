//! Seams to the rendering library and the host surface.
//!
//! The lifecycle manager never talks to a GPU API directly. A host crate
//! implements [`RenderAdapter`] over its splat renderer and scene graph, and
//! [`Container`] over the element the viewer draws into.

use std::cell::Cell;
use std::rc::Rc;

use foundation::bounds::Aabb3;
use foundation::math::{Camera3D, ScreenRect, Vec3};
use futures_util::future::LocalBoxFuture;
use runtime::frame::FrameScheduler;
use scene::SplatPlacement;

use crate::config::{ControlsConfig, RendererConfig};

/// Drawing-buffer size for the renderer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceSize {
    /// CSS pixels.
    pub width: f64,
    pub height: f64,
    /// Already clamped to the configured maximum.
    pub pixel_ratio: f64,
}

impl SurfaceSize {
    pub fn aspect(&self) -> Option<f64> {
        (self.width > 0.0 && self.height > 0.0).then(|| self.width / self.height)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Elements the viewer injects into its container.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerNode {
    /// The renderer's drawing surface.
    Canvas,
    /// Static text shown instead of a visual that failed to load.
    Message(String),
}

pub trait Container {
    /// Client rect in CSS pixels; pointer coordinates share this space.
    fn rect(&self) -> ScreenRect;

    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }

    fn append(&mut self, node: ContainerNode) -> NodeId;
    fn remove(&mut self, node: NodeId);
}

/// What to load for a viewpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualSource {
    Splat {
        url: String,
        placement: SplatPlacement,
    },
    Image {
        url: String,
    },
}

impl VisualSource {
    pub fn url(&self) -> &str {
        match self {
            VisualSource::Splat { url, .. } | VisualSource::Image { url } => url,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub viewpoint_id: String,
    pub source: VisualSource,
    pub progressive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    Asset { url: String, reason: String },
    Cancelled,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Asset { url, reason } => write!(f, "failed to load {url}: {reason}"),
            LoadError::Cancelled => write!(f, "load cancelled"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Load progress sink handed to the rendering library.
///
/// Values are clamped to `0..=100` and never go backwards within one load.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    percent: Rc<Cell<f64>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, percent: f64) {
        if !percent.is_finite() {
            return;
        }
        let p = percent.clamp(0.0, 100.0);
        if p > self.percent.get() {
            self.percent.set(p);
        }
    }

    pub fn get(&self) -> f64 {
        self.percent.get()
    }
}

pub trait SceneVisual {
    fn bounding_box(&self) -> Option<Aabb3>;
}

/// Orbit-style camera controls owned by the rendering library.
pub trait CameraControls {
    /// Per-frame step (damping); may move the camera.
    fn update(&mut self, camera: &mut Camera3D);
    fn set_target(&mut self, target: Vec3);
}

/// The rendering library, resolved once and injected into the viewer.
///
/// Each `create_*` is paired with a `dispose_*` that consumes the handle,
/// so a handle cannot be used after disposal.
pub trait RenderAdapter: FrameScheduler {
    type Renderer;
    type Controls: CameraControls;
    type Visual: SceneVisual;

    fn create_renderer(&mut self, config: &RendererConfig, size: SurfaceSize) -> Self::Renderer;
    fn resize_renderer(&mut self, renderer: &mut Self::Renderer, size: SurfaceSize);
    fn render(&mut self, renderer: &mut Self::Renderer, visual: &Self::Visual, camera: &Camera3D);
    fn dispose_renderer(&mut self, renderer: Self::Renderer);

    fn create_controls(&mut self, camera: &Camera3D, config: &ControlsConfig) -> Self::Controls;
    fn dispose_controls(&mut self, controls: Self::Controls);

    /// Starts loading; the future must not borrow the adapter.
    fn load(
        &mut self,
        request: LoadRequest,
        progress: ProgressReporter,
    ) -> LocalBoxFuture<'static, Result<Self::Visual, LoadError>>;
    fn dispose_visual(&mut self, visual: Self::Visual);
}
