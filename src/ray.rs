use super::*;

/// Sentinel stored in `hit_id` until a primitive claims the ray.
pub const NO_HIT: u32 = u32::MAX;

/// A traced ray. `t` starts at `+inf` and only ever shrinks during traversal;
/// `hit_id` is an arena index into whichever primitive list produced the
/// current closest hit, not a pointer, so `Ray` stays `Copy` and free of
/// lifetimes.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3,
    pub dir: Normal,
    pub t: f32,
    pub hit_id: u32,
}

impl Ray {
    pub fn new(origin: Point3, dir: Normal) -> Self {
        Self {
            origin,
            dir,
            t: f32::INFINITY,
            hit_id: NO_HIT,
        }
    }

    #[inline]
    pub fn has_hit(&self) -> bool {
        self.hit_id != NO_HIT
    }

    #[inline]
    pub fn point_at(&self, t: f32) -> Point3 {
        self.origin + self.dir.into_inner() * t
    }

    /// Point the ray currently stops at: `origin + t * dir`, or the origin
    /// unmodified if nothing has been hit yet.
    #[inline]
    pub fn hit_point(&self) -> Point3 {
        if self.has_hit() {
            self.point_at(self.t)
        } else {
            self.origin
        }
    }

    /// A fresh ray offset a small epsilon along `normal` to avoid
    /// self-intersection at the origin surface, oriented to the same side of
    /// the surface as `dir`.
    pub fn spawn(origin: Point3, dir: Normal, normal: &Vec3) -> Self {
        const EPSILON: f32 = 1e-4;
        let side = if dir.dot(normal) > 0.0 { 1.0 } else { -1.0 };
        Self::new(origin + normal * (side * EPSILON), dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ray_has_infinite_t_and_no_hit() {
        let ray = Ray::new(Point3::origin(), normal!(vector![0.0, 0.0, 1.0]));
        assert_eq!(ray.t, f32::INFINITY);
        assert!(!ray.has_hit());
    }

    #[test]
    fn test_point_at_follows_direction() {
        let ray = Ray::new(Point3::origin(), normal!(vector![1.0, 0.0, 0.0]));
        let p = ray.point_at(5.0);
        assert_eq!(p, Point3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_spawn_offsets_along_normal() {
        let dir = normal!(vector![0.0, 1.0, 0.0]);
        let normal = vector![0.0, 1.0, 0.0];
        let spawned = Ray::spawn(Point3::origin(), dir, &normal);
        assert!(spawned.origin.y > 0.0);
    }
}
