use super::*;

/// A triangle with a single face normal (not interpolated per-vertex) and
/// UVs stored as deltas from `t0`, matching how the barycentric lerp
/// `t0 + u*dt1 + v*dt2` is actually used at shading time.
#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub p0: Point3,
    pub p1: Point3,
    pub p2: Point3,
    pub normal: Normal,
    pub t0: Point2,
    pub dt1: Vec2,
    pub dt2: Vec2,
    pub material_id: u32,
}

impl Triangle {
    pub fn new(p0: Point3, p1: Point3, p2: Point3, t0: Point2, t1: Point2, t2: Point2, material_id: u32) -> Self {
        let normal = normal!((p1 - p0).cross(&(p2 - p0)));
        Self {
            p0,
            p1,
            p2,
            normal,
            t0,
            dt1: t1 - t0,
            dt2: t2 - t0,
            material_id,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points([&self.p0, &self.p1, &self.p2])
    }

    pub fn centroid(&self) -> Point3 {
        na::center(&na::center(&self.p0, &self.p1), &self.p2)
    }

    #[inline]
    pub fn tex_coord(&self, u: f32, v: f32) -> Point2 {
        self.t0 + u * self.dt1 + v * self.dt2
    }

    /// Recovers the Möller-Trumbore `(u, v)` weights for an arbitrary point
    /// already known to lie on the triangle's plane (typically a ray hit
    /// point recovered from `hit_id`, after barycentrics were discarded by
    /// the BVH traversal).
    pub fn barycentric_at(&self, point: &Point3) -> (f32, f32) {
        let v0 = self.p1 - self.p0;
        let v1 = self.p2 - self.p0;
        let v2 = point - self.p0;
        let d00 = v0.dot(&v0);
        let d01 = v0.dot(&v1);
        let d11 = v1.dot(&v1);
        let d20 = v2.dot(&v0);
        let d21 = v2.dot(&v1);
        let denom = d00 * d11 - d01 * d01;
        let u = (d11 * d20 - d01 * d21) / denom;
        let v = (d00 * d21 - d01 * d20) / denom;
        (u, v)
    }

    /// Möller-Trumbore intersection. Updates `ray.t`/`ray.hit_id` in place
    /// and returns the barycentric `(u, v)` on a hit closer than the ray's
    /// current `t`.
    pub fn intersect(&self, ray: &mut Ray, id: u32) -> Option<(f32, f32)> {
        const EPSILON: f32 = 1e-7;

        let edge1 = self.p1 - self.p0;
        let edge2 = self.p2 - self.p0;
        let pvec = ray.dir.cross(&edge2);
        let det = edge1.dot(&pvec);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let tvec = ray.origin - self.p0;
        let u = tvec.dot(&pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(&edge1);
        let v = ray.dir.dot(&qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(&qvec) * inv_det;
        if t > 0.0 && t < ray.t {
            ray.t = t;
            ray.hit_id = id;
            Some((u, v))
        } else {
            None
        }
    }

    /// Occlusion-only variant: no barycentrics, stops at the first hit
    /// nearer than `ray.t`.
    pub fn intersect_occlusion(&self, ray: &Ray) -> bool {
        const EPSILON: f32 = 1e-7;

        let edge1 = self.p1 - self.p0;
        let edge2 = self.p2 - self.p0;
        let pvec = ray.dir.cross(&edge2);
        let det = edge1.dot(&pvec);
        if det.abs() < EPSILON {
            return false;
        }
        let inv_det = 1.0 / det;

        let tvec = ray.origin - self.p0;
        let u = tvec.dot(&pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return false;
        }

        let qvec = tvec.cross(&edge1);
        let v = ray.dir.dot(&qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return false;
        }

        let t = edge2.dot(&qvec) * inv_det;
        t > 0.0 && t < ray.t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_ulps_eq;

    fn unit_triangle() -> Triangle {
        Triangle::new(
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            0,
        )
    }

    #[test]
    fn test_face_normal_points_towards_viewer() {
        let tri = unit_triangle();
        assert_ulps_eq!(tri.normal.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_intersect_through_center() {
        let tri = unit_triangle();
        let mut ray = Ray::new(Point3::new(0.0, -0.2, -5.0), normal!(vector![0.0, 0.0, 1.0]));
        let hit = tri.intersect(&mut ray, 7);
        assert!(hit.is_some());
        assert_eq!(ray.hit_id, 7);
        assert_ulps_eq!(ray.t, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_intersect_misses_outside_edges() {
        let tri = unit_triangle();
        let mut ray = Ray::new(Point3::new(5.0, 5.0, -5.0), normal!(vector![0.0, 0.0, 1.0]));
        assert!(tri.intersect(&mut ray, 0).is_none());
        assert_eq!(ray.hit_id, NO_HIT);
    }

    #[test]
    fn test_intersect_parallel_ray_misses() {
        let tri = unit_triangle();
        let mut ray = Ray::new(Point3::new(0.0, 0.0, -5.0), normal!(vector![1.0, 0.0, 0.0]));
        assert!(tri.intersect(&mut ray, 0).is_none());
    }

    #[test]
    fn test_intersect_does_not_overwrite_closer_hit() {
        let tri = unit_triangle();
        let mut ray = Ray::new(Point3::new(0.0, -0.2, -5.0), normal!(vector![0.0, 0.0, 1.0]));
        ray.t = 1.0;
        ray.hit_id = 42;
        assert!(tri.intersect(&mut ray, 7).is_none());
        assert_eq!(ray.hit_id, 42);
    }

    #[test]
    fn test_barycentric_at_recovers_hit_weights() {
        let tri = unit_triangle();
        let mut ray = Ray::new(Point3::new(0.0, -0.2, -5.0), normal!(vector![0.0, 0.0, 1.0]));
        let (u, v) = tri.intersect(&mut ray, 0).unwrap();
        let recovered = tri.barycentric_at(&ray.hit_point());
        assert_ulps_eq!(recovered.0, u, epsilon = 1e-4);
        assert_ulps_eq!(recovered.1, v, epsilon = 1e-4);
    }

    #[test]
    fn test_tex_coord_at_vertices() {
        let tri = unit_triangle();
        assert_eq!(tri.tex_coord(0.0, 0.0), tri.t0);
        assert_ulps_eq!(tri.tex_coord(1.0, 0.0).x, 1.0, epsilon = 1e-6);
        assert_ulps_eq!(tri.tex_coord(0.0, 1.0).y, 1.0, epsilon = 1e-6);
    }
}
