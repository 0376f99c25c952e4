use foundation::math::precision::{DISTANCE_EPSILON, approx_eq};
use foundation::math::{Camera3D, Ray, ScreenRect, Vec2, Vec3, screen_ray};

/// Pick sphere radius (scene units) for world-anchored hotspots.
pub const DEFAULT_PROXY_RADIUS: f64 = 0.12;

/// Invisible sphere registered for ray picking.
#[derive(Debug, Clone, PartialEq)]
pub struct HitProxy {
    pub hotspot_id: String,
    pub center: Vec3,
    pub radius: f64,
}

impl HitProxy {
    pub fn new(hotspot_id: impl Into<String>, center: Vec3) -> Self {
        Self {
            hotspot_id: hotspot_id.into(),
            center,
            radius: DEFAULT_PROXY_RADIUS,
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }
}

/// Registration-ordered set of hit proxies, keyed by hotspot id.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HitProxies {
    proxies: Vec<HitProxy>,
}

impl HitProxies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a proxy. Re-registering an id replaces it in place, keeping
    /// its original position in the tie-break order.
    pub fn register(&mut self, proxy: HitProxy) {
        match self
            .proxies
            .iter_mut()
            .find(|p| p.hotspot_id == proxy.hotspot_id)
        {
            Some(slot) => *slot = proxy,
            None => self.proxies.push(proxy),
        }
    }

    pub fn remove(&mut self, hotspot_id: &str) -> Option<HitProxy> {
        let idx = self.proxies.iter().position(|p| p.hotspot_id == hotspot_id)?;
        Some(self.proxies.remove(idx))
    }

    pub fn get(&self, hotspot_id: &str) -> Option<&HitProxy> {
        self.proxies.iter().find(|p| p.hotspot_id == hotspot_id)
    }

    pub fn clear(&mut self) {
        self.proxies.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &HitProxy> + '_ {
        self.proxies.iter()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub hotspot_id: String,
    /// Registration index of the winning proxy.
    pub index: usize,
    pub distance: f64,
    pub point: Vec3,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickOptions {
    pub max_distance: f64,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            max_distance: 1.0e30,
        }
    }
}

/// Deterministic ray picking against hit proxies.
///
/// Ordering contract:
/// - The smallest non-negative intersection distance wins.
/// - Distances equal within `DISTANCE_EPSILON` tie-break to the proxy registered first.
///
/// A ray starting inside a sphere hits at its exit point.
pub fn pick_ray(proxies: &HitProxies, ray: Ray, opts: PickOptions) -> Option<PickHit> {
    let dir = ray.dir.normalized()?;
    if !ray.origin.is_finite() {
        return None;
    }

    let mut best: Option<(f64, usize)> = None;
    for (index, proxy) in proxies.iter().enumerate() {
        let Some(t) = ray_sphere_hit_t(ray.origin, dir, proxy.center, proxy.radius) else {
            continue;
        };
        if t > opts.max_distance {
            continue;
        }
        best = match best {
            None => Some((t, index)),
            Some((bt, _)) if t < bt && !approx_eq(t, bt, DISTANCE_EPSILON) => Some((t, index)),
            keep => keep,
        };
    }

    let (t, index) = best?;
    let proxy = &proxies.proxies[index];
    Some(PickHit {
        hotspot_id: proxy.hotspot_id.clone(),
        index,
        distance: t,
        point: ray.origin + dir * t,
    })
}

/// Screen picking wrapper: pointer pixels to a camera ray, then `pick_ray`.
pub fn pick_screen(
    proxies: &HitProxies,
    camera: &Camera3D,
    pointer: Vec2,
    rect: ScreenRect,
    opts: PickOptions,
) -> Option<PickHit> {
    let ray = screen_ray(camera, pointer, rect)?;
    pick_ray(proxies, ray, opts)
}

fn ray_sphere_hit_t(origin: Vec3, dir: Vec3, center: Vec3, radius: f64) -> Option<f64> {
    if !(radius > 0.0) || !center.is_finite() {
        return None;
    }
    // `dir` is unit length, so the quadratic's leading coefficient is 1.
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let t0 = -b - sq;
    let t1 = -b + sq;
    if t0 >= 0.0 {
        Some(t0)
    } else if t1 >= 0.0 {
        Some(t1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{HitProxies, HitProxy, PickOptions, pick_ray, pick_screen};
    use foundation::math::{Camera3D, Ray, ScreenRect, Vec2, Vec3};

    fn x_ray() -> Ray {
        Ray::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0))
    }

    #[test]
    fn ray_picks_nearest_hit() {
        let mut proxies = HitProxies::new();
        proxies.register(HitProxy::new("far", Vec3::new(10.0, 0.0, 0.0)));
        proxies.register(HitProxy::new("near", Vec3::new(5.0, 0.0, 0.0)));

        let hit = pick_ray(&proxies, x_ray(), PickOptions::default()).expect("hit");
        assert_eq!(hit.hotspot_id, "near");
        assert_eq!(hit.index, 1);
        assert!((hit.distance - 4.88).abs() < 1e-9);
        assert!((hit.point.x - 4.88).abs() < 1e-9);
    }

    #[test]
    fn tie_breaks_by_registration_order() {
        let mut proxies = HitProxies::new();
        proxies.register(HitProxy::new("first", Vec3::new(5.0, 0.0, 0.0)));
        proxies.register(HitProxy::new("second", Vec3::new(5.0, 0.0, 0.0)));

        let hit = pick_ray(&proxies, x_ray(), PickOptions::default()).expect("hit");
        assert_eq!(hit.hotspot_id, "first");
    }

    #[test]
    fn reregistering_keeps_order_slot() {
        let mut proxies = HitProxies::new();
        proxies.register(HitProxy::new("a", Vec3::new(5.0, 0.0, 0.0)));
        proxies.register(HitProxy::new("b", Vec3::new(5.0, 0.0, 0.0)));
        proxies.register(HitProxy::new("a", Vec3::new(5.0, 0.0, 0.0)).with_radius(0.12));
        assert_eq!(proxies.len(), 2);

        let hit = pick_ray(&proxies, x_ray(), PickOptions::default()).expect("hit");
        assert_eq!(hit.hotspot_id, "a");

        assert!(proxies.remove("a").is_some());
        let hit = pick_ray(&proxies, x_ray(), PickOptions::default()).expect("hit");
        assert_eq!(hit.hotspot_id, "b");
    }

    #[test]
    fn misses_and_objects_behind_are_ignored() {
        let mut proxies = HitProxies::new();
        proxies.register(HitProxy::new("behind", Vec3::new(-5.0, 0.0, 0.0)));
        proxies.register(HitProxy::new("aside", Vec3::new(5.0, 1.0, 0.0)));
        assert!(pick_ray(&proxies, x_ray(), PickOptions::default()).is_none());

        proxies.clear();
        assert!(pick_ray(&proxies, x_ray(), PickOptions::default()).is_none());
    }

    #[test]
    fn origin_inside_sphere_hits_exit_point() {
        let mut proxies = HitProxies::new();
        proxies.register(HitProxy::new("around", Vec3::ZERO).with_radius(1.0));
        let hit = pick_ray(&proxies, x_ray(), PickOptions::default()).expect("hit");
        assert!((hit.distance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn max_distance_limits_hits() {
        let mut proxies = HitProxies::new();
        proxies.register(HitProxy::new("far", Vec3::new(10.0, 0.0, 0.0)));
        let opts = PickOptions { max_distance: 5.0 };
        assert!(pick_ray(&proxies, x_ray(), opts).is_none());
    }

    #[test]
    fn screen_center_picks_target() {
        let mut proxies = HitProxies::new();
        proxies.register(HitProxy::new("target", Vec3::ZERO));
        let cam = Camera3D::look_at(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
            75f64.to_radians(),
            0.01,
            500.0,
        );
        let rect = ScreenRect::sized(400.0, 400.0);

        let hit = pick_screen(&proxies, &cam, Vec2::new(200.0, 200.0), rect, PickOptions::default());
        assert_eq!(hit.map(|h| h.hotspot_id), Some("target".to_string()));

        let miss = pick_screen(&proxies, &cam, Vec2::new(10.0, 10.0), rect, PickOptions::default());
        assert!(miss.is_none());
    }
}
