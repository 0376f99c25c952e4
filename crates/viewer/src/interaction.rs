//! Pointer hit-testing, card anchoring and placement.

use foundation::math::precision::round_to;
use foundation::math::{
    Camera3D, ScreenRect, Vec2, Vec3, point_at_depth, project_to_screen, screen_ray,
};
use scene::{DEFAULT_PROXY_RADIUS, HitProxies, HitProxy, Hotspot, PickHit, PickOptions, pick_screen};
use store::Settings;
use tracing::debug;

/// Decimal places kept for percent placements.
pub const PERCENT_DECIMALS: u32 = 2;

/// Hit proxies for the hotspots of the mounted viewpoint.
#[derive(Debug, Clone)]
pub struct SpatialInteractionLayer {
    proxies: HitProxies,
    radius: f64,
}

impl Default for SpatialInteractionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialInteractionLayer {
    pub fn new() -> Self {
        Self::with_radius(DEFAULT_PROXY_RADIUS)
    }

    pub fn with_radius(radius: f64) -> Self {
        Self {
            proxies: HitProxies::new(),
            radius,
        }
    }

    pub fn proxies(&self) -> &HitProxies {
        &self.proxies
    }

    /// Rebuilds the proxy list in `hotspots` order.
    ///
    /// Only world-anchored hotspots that `settings` leaves visible get a
    /// proxy; image hotspots are hit by their DOM markers instead.
    pub fn populate(&mut self, hotspots: &[Hotspot], settings: &Settings) {
        self.proxies.clear();
        for hotspot in hotspots {
            if !settings.hotspot_visible(&hotspot.id) {
                continue;
            }
            let Some(center) = hotspot.placement.world_position() else {
                continue;
            };
            self.proxies
                .register(HitProxy::new(hotspot.id.clone(), center).with_radius(self.radius));
        }
        debug!(proxies = self.proxies.len(), "hit proxies rebuilt");
    }

    pub fn clear(&mut self) {
        self.proxies.clear();
    }

    /// Nearest hotspot under `pointer`. Input during a transition is ignored.
    pub fn hit_test(
        &self,
        camera: &Camera3D,
        rect: ScreenRect,
        pointer: Vec2,
        transitioning: bool,
    ) -> Option<PickHit> {
        if transitioning {
            debug!("click ignored during transition");
            return None;
        }
        pick_screen(&self.proxies, camera, pointer, rect, PickOptions::default())
    }

    /// Screen position for a card attached to `world`.
    ///
    /// Call again every frame the card is shown; the result depends on the
    /// camera and is never cached.
    pub fn screen_anchor(camera: &Camera3D, rect: ScreenRect, world: Vec3) -> Option<Vec2> {
        project_to_screen(camera, world, rect)
    }

    /// [`screen_anchor`](Self::screen_anchor) for a hotspot; `None` for image hotspots.
    pub fn anchor_hotspot(camera: &Camera3D, rect: ScreenRect, hotspot: &Hotspot) -> Option<Vec2> {
        let world = hotspot.placement.world_position()?;
        Self::screen_anchor(camera, rect, world)
    }

    /// World point `depth` units along the ray under `pointer`.
    pub fn place_world(
        camera: &Camera3D,
        rect: ScreenRect,
        pointer: Vec2,
        depth: f64,
    ) -> Option<Vec3> {
        let ray = screen_ray(camera, pointer, rect)?;
        point_at_depth(&ray, depth)
    }

    /// Percent-of-image coordinates for `pointer` over the displayed image.
    ///
    /// `None` for a pointer outside the image or a zero-sized image.
    pub fn place_percent(image: ScreenRect, pointer: Vec2) -> Option<(f64, f64)> {
        if image.is_degenerate() {
            return None;
        }
        let x = 100.0 * (pointer.x - image.left) / image.width;
        let y = 100.0 * (pointer.y - image.top) / image.height;
        if !(0.0..=100.0).contains(&x) || !(0.0..=100.0).contains(&y) {
            return None;
        }
        Some((round_to(x, PERCENT_DECIMALS), round_to(y, PERCENT_DECIMALS)))
    }

    /// Pixel position of a percent placement within the displayed image.
    pub fn percent_anchor(image: ScreenRect, x: f64, y: f64) -> Vec2 {
        Vec2::new(
            image.left + image.width * x / 100.0,
            image.top + image.height * y / 100.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::SpatialInteractionLayer;
    use crate::config::CameraConfig;
    use foundation::math::{ScreenRect, Vec2, Vec3};
    use pretty_assertions::assert_eq;
    use scene::Hotspot;
    use store::Settings;

    fn camera() -> foundation::math::Camera3D {
        CameraConfig::default().build(1.0)
    }

    fn rect() -> ScreenRect {
        ScreenRect::sized(400.0, 400.0)
    }

    fn centre() -> Vec2 {
        Vec2::new(200.0, 200.0)
    }

    fn spots() -> Vec<Hotspot> {
        vec![
            Hotspot::world("far", Vec3::new(0.0, 0.0, 3.0)),
            Hotspot::world("near", Vec3::new(0.0, 0.0, 1.0)),
            Hotspot::percent("flat", 50.0, 50.0),
        ]
    }

    #[test]
    fn only_world_hotspots_get_proxies() {
        let mut layer = SpatialInteractionLayer::new();
        layer.populate(&spots(), &Settings::default());
        let ids: Vec<&str> = layer.proxies().iter().map(|p| p.hotspot_id.as_str()).collect();
        assert_eq!(ids, vec!["far", "near"]);
    }

    #[test]
    fn hidden_hotspots_are_not_hit_testable() {
        let mut layer = SpatialInteractionLayer::new();
        let mut settings = Settings::default();
        settings.disabled_hotspots.insert("near".to_string());
        layer.populate(&spots(), &settings);
        let hit = layer.hit_test(&camera(), rect(), centre(), false).expect("hit");
        assert_eq!(hit.hotspot_id, "far");

        settings.show_hotspots = false;
        layer.populate(&spots(), &settings);
        assert!(layer.proxies().is_empty());
        assert_eq!(layer.hit_test(&camera(), rect(), centre(), false), None);
    }

    #[test]
    fn nearest_proxy_wins() {
        let mut layer = SpatialInteractionLayer::new();
        layer.populate(&spots(), &Settings::default());
        let hit = layer.hit_test(&camera(), rect(), centre(), false).expect("hit");
        assert_eq!(hit.hotspot_id, "near");
        assert_eq!(hit.index, 1);
    }

    #[test]
    fn clicks_are_ignored_while_transitioning() {
        let mut layer = SpatialInteractionLayer::new();
        layer.populate(&spots(), &Settings::default());
        assert_eq!(layer.hit_test(&camera(), rect(), centre(), true), None);
    }

    #[test]
    fn miss_is_none() {
        let mut layer = SpatialInteractionLayer::new();
        layer.populate(&spots(), &Settings::default());
        assert_eq!(layer.hit_test(&camera(), rect(), Vec2::new(5.0, 5.0), false), None);
    }

    #[test]
    fn anchor_follows_the_camera() {
        let spot = Hotspot::world("w", Vec3::new(0.0, 0.0, 1.0));
        let mut cam = camera();
        let a = SpatialInteractionLayer::anchor_hotspot(&cam, rect(), &spot).expect("visible");
        assert!((a.x - 200.0).abs() < 1e-9 && (a.y - 200.0).abs() < 1e-9, "{a:?}");

        cam.position = cam.position + Vec3::new(0.2, 0.0, 0.0);
        cam.target = cam.target + Vec3::new(0.2, 0.0, 0.0);
        let b = SpatialInteractionLayer::anchor_hotspot(&cam, rect(), &spot).expect("visible");
        assert!((b.x - a.x).abs() > 1.0, "{a:?} vs {b:?}");

        let flat = Hotspot::percent("p", 10.0, 10.0);
        assert_eq!(SpatialInteractionLayer::anchor_hotspot(&cam, rect(), &flat), None);
    }

    #[test]
    fn world_placement_is_monotonic_in_depth() {
        let cam = camera();
        let pointer = Vec2::new(120.0, 310.0);
        let near = SpatialInteractionLayer::place_world(&cam, rect(), pointer, 1.0).expect("near");
        let far = SpatialInteractionLayer::place_world(&cam, rect(), pointer, 4.0).expect("far");
        assert!(far.distance(cam.position) > near.distance(cam.position));
        assert!((near.distance(cam.position) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_camera_has_no_placement() {
        let mut cam = camera();
        cam.target = cam.position;
        assert_eq!(
            SpatialInteractionLayer::place_world(&cam, rect(), centre(), 2.0),
            None
        );
    }

    #[test]
    fn percent_placement_is_rounded_and_idempotent() {
        let image = ScreenRect::new(10.0, 20.0, 300.0, 200.0);
        let pointer = Vec2::new(110.0, 70.0);
        let first = SpatialInteractionLayer::place_percent(image, pointer);
        assert_eq!(first, Some((33.33, 25.0)));
        assert_eq!(SpatialInteractionLayer::place_percent(image, pointer), first);
    }

    #[test]
    fn percent_placement_outside_the_image_is_none() {
        let image = ScreenRect::sized(300.0, 200.0);
        assert_eq!(
            SpatialInteractionLayer::place_percent(image, Vec2::new(301.0, 10.0)),
            None
        );
        assert_eq!(
            SpatialInteractionLayer::place_percent(ScreenRect::sized(0.0, 200.0), Vec2::new(0.0, 0.0)),
            None
        );
    }

    #[test]
    fn percent_anchor_inverts_placement() {
        let image = ScreenRect::new(10.0, 20.0, 300.0, 200.0);
        assert_eq!(
            SpatialInteractionLayer::percent_anchor(image, 50.0, 25.0),
            Vec2::new(160.0, 70.0)
        );
    }
}
