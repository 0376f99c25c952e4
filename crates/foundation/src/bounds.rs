use crate::math::Vec3;

/// Axis-aligned bounding box in world units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3 {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb3 {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Aabb3 { min, max }
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?.to_array();
        let mut b = Aabb3::new(first, first);
        for p in iter {
            let p = p.to_array();
            for axis in 0..3 {
                b.min[axis] = b.min[axis].min(p[axis]);
                b.max[axis] = b.max[axis].max(p[axis]);
            }
        }
        Some(b)
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        )
    }

    pub fn size(&self) -> Vec3 {
        Vec3::new(
            (self.max[0] - self.min[0]).max(0.0),
            (self.max[1] - self.min[1]).max(0.0),
            (self.max[2] - self.min[2]).max(0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Aabb3;
    use crate::math::Vec3;

    #[test]
    fn from_points_spans_all_inputs() {
        let b = Aabb3::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 3.0),
        ])
        .expect("bounds");
        assert_eq!(b.min, [-1.0, -2.0, 0.0]);
        assert_eq!(b.max, [1.0, 4.0, 3.0]);
        assert_eq!(b.center(), Vec3::new(0.0, 1.0, 1.5));
        assert_eq!(b.size(), Vec3::new(2.0, 6.0, 3.0));
    }

    #[test]
    fn empty_input_has_no_bounds() {
        assert!(Aabb3::from_points(std::iter::empty()).is_none());
    }
}
