//! Camera, controls and renderer parameters.
//!
//! Defaults reproduce the walk-through viewer: a 75° camera sitting just
//! behind the origin with an inverted up axis (point-cloud captures are
//! y-down), orbit controls with damping and no zoom, and wheel dolly.

use foundation::math::{Camera3D, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub renderer: RendererConfig,
    /// Scene units moved per wheel delta unit.
    pub dolly_speed: f64,
    /// Request progressive (streamed) splat loading.
    pub progressive_loading: bool,
    /// Text shown when a viewpoint's visual fails to load.
    pub fallback_message: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            renderer: RendererConfig::default(),
            dolly_speed: 0.002,
            progressive_loading: true,
            fallback_message: "Failed to load splat file".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_deg: f64,
    pub near: f64,
    pub far: f64,
    pub position: [f64; 3],
    pub target: [f64; 3],
    pub up: [f64; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 75.0,
            near: 0.01,
            far: 500.0,
            position: [0.0, 0.0, -0.5],
            target: [0.0, 0.0, 0.0],
            up: [0.0, -1.0, 0.0],
        }
    }
}

impl CameraConfig {
    pub fn build(&self, aspect: f64) -> Camera3D {
        Camera3D::look_at(
            Vec3::from_array(self.position),
            Vec3::from_array(self.target),
            self.fov_deg.to_radians(),
            self.near,
            self.far,
        )
        .with_up(Vec3::from_array(self.up))
        .with_aspect(aspect)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub enable_damping: bool,
    pub damping_factor: f64,
    pub rotate_speed: f64,
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub pan_speed: f64,
    /// Radians from the up axis.
    pub min_polar_angle: f64,
    pub max_polar_angle: f64,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.1,
            rotate_speed: 0.8,
            enable_zoom: false,
            enable_pan: true,
            pan_speed: 0.8,
            min_polar_angle: 0.1,
            max_polar_angle: std::f64::consts::PI - 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub antialias: bool,
    /// Device pixel ratios above this are clamped.
    pub max_pixel_ratio: f64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            antialias: true,
            max_pixel_ratio: 2.0,
        }
    }
}

impl RendererConfig {
    pub fn effective_pixel_ratio(&self, device_pixel_ratio: f64) -> f64 {
        if !(device_pixel_ratio > 0.0) || !device_pixel_ratio.is_finite() {
            return 1.0;
        }
        device_pixel_ratio.min(self.max_pixel_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::{RendererConfig, ViewerConfig};
    use foundation::math::Vec3;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_camera_looks_down_z_with_inverted_up() {
        let cam = ViewerConfig::default().camera.build(16.0 / 9.0);
        let basis = cam.basis().expect("non-degenerate");
        assert_eq!(basis.forward, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(basis.up, Vec3::new(0.0, -1.0, 0.0));
        assert!((cam.fov_y_rad - 75f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn pixel_ratio_is_capped() {
        let cfg = RendererConfig::default();
        assert_eq!(cfg.effective_pixel_ratio(3.0), 2.0);
        assert_eq!(cfg.effective_pixel_ratio(1.5), 1.5);
        assert_eq!(cfg.effective_pixel_ratio(0.0), 1.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ViewerConfig =
            serde_json::from_str(r#"{ "camera": { "fov_deg": 60 }, "dolly_speed": 0.01 }"#)
                .expect("decode");
        assert_eq!(cfg.camera.fov_deg, 60.0);
        assert_eq!(cfg.camera.near, 0.01);
        assert_eq!(cfg.dolly_speed, 0.01);
        assert!(cfg.controls.enable_pan);
    }
}
