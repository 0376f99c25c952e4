//! Screen/world coordinate math for a perspective camera.
//!
//! Conventions match the usual WebGL scene-graph libraries:
//! - NDC spans `[-1, 1]` on both axes, `+y` up.
//! - Screen pixels grow right and down from the top-left of the render surface.
//! - The camera looks from `position` toward `target`; `up` only needs to be
//!   non-parallel to the view direction.

use super::Vec2;
use super::Vec3;

/// A rectangle in screen pixels (typically the render surface's client rect).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A rect anchored at the origin.
    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn aspect(&self) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }
        Some(self.width / self.height)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    /// Point at parameter `t` along the ray: `origin + dir * t`.
    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir * t
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f64,
    /// Width / height of the render surface.
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

/// Orthonormal view basis derived from a camera pose.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraBasis {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl Camera3D {
    pub fn look_at(position: Vec3, target: Vec3, fov_y_rad: f64, near: f64, far: f64) -> Self {
        Self {
            position,
            target,
            up: Vec3::new(0.0, 1.0, 0.0),
            fov_y_rad,
            aspect: 1.0,
            near,
            far,
        }
    }

    pub fn with_up(mut self, up: Vec3) -> Self {
        self.up = up;
        self
    }

    pub fn with_aspect(mut self, aspect: f64) -> Self {
        self.aspect = aspect;
        self
    }

    /// View basis, or `None` when the pose is degenerate (eye on target,
    /// `up` parallel to the view direction, or a non-finite component).
    pub fn basis(&self) -> Option<CameraBasis> {
        let forward = (self.target - self.position).normalized()?;
        let right = forward.cross(self.up).normalized()?;
        let up = right.cross(forward);
        Some(CameraBasis { forward, right, up })
    }

    fn half_extents(&self) -> Option<(f64, f64)> {
        if !(self.fov_y_rad > 0.0 && self.fov_y_rad < std::f64::consts::PI) {
            return None;
        }
        if !(self.aspect > 0.0) || !self.aspect.is_finite() {
            return None;
        }
        let tan_half = (self.fov_y_rad * 0.5).tan();
        Some((tan_half * self.aspect, tan_half))
    }
}

/// Convert a pointer position (screen pixels) to NDC relative to `rect`.
pub fn screen_to_ndc(pointer: Vec2, rect: ScreenRect) -> Option<Vec2> {
    if rect.is_degenerate() {
        return None;
    }
    let x = ((pointer.x - rect.left) / rect.width) * 2.0 - 1.0;
    let y = -((pointer.y - rect.top) / rect.height) * 2.0 + 1.0;
    Some(Vec2::new(x, y))
}

/// Cast a ray from the camera eye through `ndc`.
///
/// The returned direction is normalized, so the ray parameter is a distance.
pub fn camera_ray(camera: &Camera3D, ndc: Vec2) -> Option<Ray> {
    let basis = camera.basis()?;
    let (half_w, half_h) = camera.half_extents()?;
    let dir = basis.forward + basis.right * (ndc.x * half_w) + basis.up * (ndc.y * half_h);
    Some(Ray::new(camera.position, dir.normalized()?))
}

/// Pointer position straight to a camera ray.
pub fn screen_ray(camera: &Camera3D, pointer: Vec2, rect: ScreenRect) -> Option<Ray> {
    let ndc = screen_to_ndc(pointer, rect)?;
    camera_ray(camera, ndc)
}

/// World point `depth` units along `ray`. `None` for non-positive or non-finite depths.
pub fn point_at_depth(ray: &Ray, depth: f64) -> Option<Vec3> {
    if !(depth > 0.0) || !depth.is_finite() {
        return None;
    }
    let p = ray.at(depth);
    p.is_finite().then_some(p)
}

/// Project a world point to screen pixels inside `rect`.
///
/// Returns `None` when the point is behind the near plane or the camera is degenerate.
pub fn project_to_screen(camera: &Camera3D, world: Vec3, rect: ScreenRect) -> Option<Vec2> {
    if rect.is_degenerate() {
        return None;
    }
    let basis = camera.basis()?;
    let (half_w, half_h) = camera.half_extents()?;

    let d = world - camera.position;
    let z = d.dot(basis.forward);
    if z < camera.near || z <= 0.0 {
        return None;
    }

    let ndc_x = d.dot(basis.right) / (z * half_w);
    let ndc_y = d.dot(basis.up) / (z * half_h);

    Some(Vec2::new(
        rect.left + (ndc_x + 1.0) * 0.5 * rect.width,
        rect.top + (1.0 - ndc_y) * 0.5 * rect.height,
    ))
}

#[cfg(test)]
mod tests {
    use super::{
        Camera3D, ScreenRect, camera_ray, point_at_depth, project_to_screen, screen_ray,
        screen_to_ndc,
    };
    use crate::math::{Vec2, Vec3};

    fn camera() -> Camera3D {
        Camera3D::look_at(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            60f64.to_radians(),
            0.01,
            500.0,
        )
        .with_aspect(2.0)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn ndc_corners_and_center() {
        let rect = ScreenRect::new(10.0, 20.0, 200.0, 100.0);
        assert_eq!(
            screen_to_ndc(Vec2::new(110.0, 70.0), rect),
            Some(Vec2::new(0.0, 0.0))
        );
        assert_eq!(
            screen_to_ndc(Vec2::new(10.0, 20.0), rect),
            Some(Vec2::new(-1.0, 1.0))
        );
        assert_eq!(
            screen_to_ndc(Vec2::new(210.0, 120.0), rect),
            Some(Vec2::new(1.0, -1.0))
        );
        assert_eq!(screen_to_ndc(Vec2::new(0.0, 0.0), ScreenRect::sized(0.0, 10.0)), None);
    }

    #[test]
    fn center_ray_looks_at_target() {
        let ray = camera_ray(&camera(), Vec2::new(0.0, 0.0)).expect("ray");
        assert_eq!(ray.origin, Vec3::new(0.0, 0.0, 5.0));
        assert!(close(ray.dir.x, 0.0) && close(ray.dir.y, 0.0) && close(ray.dir.z, -1.0));
    }

    #[test]
    fn degenerate_camera_has_no_ray() {
        let mut cam = camera();
        cam.target = cam.position;
        assert!(camera_ray(&cam, Vec2::new(0.0, 0.0)).is_none());

        let mut cam = camera();
        cam.up = Vec3::new(0.0, 0.0, 1.0);
        assert!(camera_ray(&cam, Vec2::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn depth_must_be_positive_and_finite() {
        let ray = camera_ray(&camera(), Vec2::new(0.0, 0.0)).expect("ray");
        assert!(point_at_depth(&ray, 0.0).is_none());
        assert!(point_at_depth(&ray, -1.0).is_none());
        assert!(point_at_depth(&ray, f64::INFINITY).is_none());
        let p = point_at_depth(&ray, 2.0).expect("point");
        assert!(close(p.z, 3.0));
    }

    #[test]
    fn projection_inverts_ray_cast() {
        let cam = camera();
        let rect = ScreenRect::new(0.0, 0.0, 800.0, 400.0);
        let pointer = Vec2::new(612.0, 97.0);
        let ray = screen_ray(&cam, pointer, rect).expect("ray");
        let world = point_at_depth(&ray, 3.5).expect("point");

        let back = project_to_screen(&cam, world, rect).expect("visible");
        assert!(close(back.x, pointer.x), "{back:?}");
        assert!(close(back.y, pointer.y), "{back:?}");
    }

    #[test]
    fn points_behind_camera_do_not_project() {
        let cam = camera();
        let rect = ScreenRect::sized(800.0, 400.0);
        assert!(project_to_screen(&cam, Vec3::new(0.0, 0.0, 10.0), rect).is_none());
    }

    #[test]
    fn projection_follows_camera_motion() {
        let rect = ScreenRect::sized(800.0, 400.0);
        let world = Vec3::new(1.0, 0.0, 0.0);
        let a = project_to_screen(&camera(), world, rect).expect("visible");

        let mut moved = camera();
        moved.position = Vec3::new(2.0, 0.0, 5.0);
        moved.target = Vec3::new(2.0, 0.0, 0.0);
        let b = project_to_screen(&moved, world, rect).expect("visible");
        assert!(b.x < a.x);
    }
}
