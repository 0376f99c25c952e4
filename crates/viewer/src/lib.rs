//! Walk-through viewer core: one mounted viewpoint at a time, transitions
//! between viewpoints, hotspot hit-testing and in-place hotspot editing.
//!
//! Rendering is delegated to a [`RenderAdapter`] supplied by the host.

pub mod adapter;
pub mod config;
pub mod editor;
pub mod interaction;
pub mod lifecycle;
pub mod navigation;
pub mod session;

#[cfg(test)]
mod testing;

pub use adapter::{
    CameraControls, Container, ContainerNode, LoadError, LoadRequest, NodeId, ProgressReporter,
    RenderAdapter, SceneVisual, SurfaceSize, VisualSource,
};
pub use config::{CameraConfig, ControlsConfig, RendererConfig, ViewerConfig};
pub use editor::{HotspotEditor, PlacementError, PlacementMode, PlacementSession};
pub use interaction::SpatialInteractionLayer;
pub use lifecycle::{MountError, MountOutcome, MountTicket, PendingMount, ViewerLifecycleManager};
pub use navigation::{NavigationController, NavigationEvent, NavigationKey, Transition};
pub use session::{LoadedTransition, PendingTransition, ViewerSession};
