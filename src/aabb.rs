use super::*;

/// Axis-aligned bounding box. `repr(C)` and `Pod` so a slice of them can be
/// reinterpreted as raw bytes when batching bounds for the BVH build.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    bmin: Point3,
    bmax: Point3,
}

impl Aabb {
    #[inline]
    pub fn empty() -> Self {
        Self {
            bmin: Point3::from(Vec3::repeat(f32::MAX)),
            bmax: Point3::from(Vec3::repeat(-f32::MAX)),
        }
    }

    #[inline]
    pub fn from_min_max(bmin: Point3, bmax: Point3) -> Self {
        Self { bmin, bmax }
    }

    pub fn from_points<'a, Iter>(points: Iter) -> Self
    where
        Iter: IntoIterator<Item = &'a Point3>,
    {
        let mut aabb = Self::empty();
        for point in points {
            aabb.grow_point(point);
        }
        aabb
    }

    #[inline]
    pub fn bmin(&self) -> Point3 {
        self.bmin
    }

    #[inline]
    pub fn bmax(&self) -> Point3 {
        self.bmax
    }

    #[inline]
    pub fn center(&self) -> Point3 {
        na::center(&self.bmin, &self.bmax)
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.bmax - self.bmin
    }

    pub fn grow_point(&mut self, point: &Point3) {
        self.bmin = self.bmin.coords.inf(&point.coords).into();
        self.bmax = self.bmax.coords.sup(&point.coords).into();
    }

    pub fn grow(&mut self, other: &Aabb) {
        self.bmin = self.bmin.inf(&other.bmin);
        self.bmax = self.bmax.sup(&other.bmax);
    }

    pub fn grown(&self, other: &Aabb) -> Self {
        let mut result = *self;
        result.grow(other);
        result
    }

    /// Surface area; `0.0` for a degenerate (empty or single-point) box,
    /// never negative or NaN.
    pub fn area(&self) -> f32 {
        let e = self.extent();
        if e.x < 0.0 || e.y < 0.0 || e.z < 0.0 {
            return 0.0;
        }
        let area = 2.0 * (e.x * e.y + e.x * e.z + e.y * e.z);
        if area.is_finite() {
            area
        } else {
            0.0
        }
    }

    /// Index (0/1/2) of the axis with the largest extent.
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e.x > e.y && e.x > e.z {
            0
        } else if e.y > e.z {
            1
        } else {
            2
        }
    }

    /// `true` if `other` is entirely within `self`, with a small epsilon of
    /// slack to tolerate float rounding from repeated `grow` calls.
    pub fn contains(&self, other: &Aabb) -> bool {
        const EPS: f32 = 1e-4;
        self.bmin.x - EPS <= other.bmin.x
            && self.bmin.y - EPS <= other.bmin.y
            && self.bmin.z - EPS <= other.bmin.z
            && self.bmax.x + EPS >= other.bmax.x
            && self.bmax.y + EPS >= other.bmax.y
            && self.bmax.z + EPS >= other.bmax.z
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

/// Ray/box slab test. Returns the entry/exit distances when the ray crosses
/// the box, `None` on a miss (including boxes entirely behind the ray).
pub fn intersect_aabb(ray: &Ray, aabb: &Aabb) -> Option<(f32, f32)> {
    let inv_dir = vector![1.0 / ray.dir.x, 1.0 / ray.dir.y, 1.0 / ray.dir.z];

    let t1 = (aabb.bmin().coords - ray.origin.coords).component_mul(&inv_dir);
    let t2 = (aabb.bmax().coords - ray.origin.coords).component_mul(&inv_dir);

    let tmin = t1.zip_map(&t2, f32::min);
    let tmax = t1.zip_map(&t2, f32::max);

    let tmin = tmin.x.max(tmin.y).max(tmin.z);
    let tmax = tmax.x.min(tmax.y).min(tmax.z);

    if tmax < 0.0 || tmin > tmax {
        None
    } else {
        Some((tmin, tmax))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_ulps_eq;

    #[test]
    fn test_empty_area_is_zero() {
        assert_ulps_eq!(Aabb::empty().area(), 0.0, max_ulps = 1);
    }

    #[test]
    fn test_grow_point_expands_bounds() {
        let mut aabb = Aabb::empty();
        aabb.grow_point(&Point3::new(1.0, 2.0, 3.0));
        aabb.grow_point(&Point3::new(-1.0, 0.0, 5.0));
        assert_eq!(aabb.bmin(), Point3::new(-1.0, 0.0, 3.0));
        assert_eq!(aabb.bmax(), Point3::new(1.0, 2.0, 5.0));
    }

    #[test]
    fn test_longest_axis() {
        let aabb = Aabb::from_min_max(Point3::origin(), Point3::new(1.0, 5.0, 2.0));
        assert_eq!(aabb.longest_axis(), 1);
    }

    #[test]
    fn test_unit_cube_area() {
        let aabb = Aabb::from_min_max(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert_ulps_eq!(aabb.area(), 6.0, max_ulps = 2);
    }

    #[test]
    fn test_ray_box_hit_and_miss() {
        let aabb = Aabb::from_min_max(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let hit_ray = Ray::new(Point3::new(0.0, 0.0, -5.0), normal!(vector![0.0, 0.0, 1.0]));
        assert!(intersect_aabb(&hit_ray, &aabb).is_some());

        let miss_ray = Ray::new(Point3::new(5.0, 5.0, -5.0), normal!(vector![0.0, 0.0, 1.0]));
        assert!(intersect_aabb(&miss_ray, &aabb).is_none());
    }

    #[test]
    fn test_contains() {
        let parent = Aabb::from_min_max(Point3::new(-2.0, -2.0, -2.0), Point3::new(2.0, 2.0, 2.0));
        let child = Aabb::from_min_max(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        assert!(parent.contains(&child));
        assert!(!child.contains(&parent));
    }
}
