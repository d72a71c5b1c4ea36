use super::*;

/// A uniformly emissive sphere. Lights are visible geometry: a camera ray
/// that hits one directly sees `color` as if it were shaded, so intersect
/// and occlusion tests mirror `Sphere`'s.
#[derive(Clone, Copy, Debug)]
pub struct Light {
    pub center: Point3,
    pub radius: f32,
    pub color: ColorRgb,
}

impl Light {
    pub fn new(center: Point3, radius: f32, color: ColorRgb) -> Self {
        Self {
            center,
            radius,
            color,
        }
    }

    #[inline]
    pub fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }

    #[inline]
    pub fn normal_at(&self, point: &Point3) -> Normal {
        normal!(point - self.center)
    }

    /// Uniform point on the sphere's surface, driven by two independent
    /// `[0,1)` samples.
    pub fn sample_point(&self, u1: f32, u2: f32) -> Point3 {
        let z = 1.0 - 2.0 * u1;
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = TAU * u2;
        let local = vector![r * phi.cos(), r * phi.sin(), z];
        self.center + local * self.radius
    }

    pub fn intersect(&self, ray: &mut Ray, id: u32) -> bool {
        let c = self.center - ray.origin;
        let t = c.dot(&ray.dir);
        let q = c - t * ray.dir.into_inner();
        let p2 = q.dot(&q);
        let r2 = self.radius * self.radius;
        if p2 > r2 {
            return false;
        }
        let thc = (r2 - p2).sqrt();
        let t_near = t - thc;
        let t = if t_near > 0.0 { t_near } else { t + thc };
        if t > 0.0 && t < ray.t {
            ray.t = t;
            ray.hit_id = id;
            true
        } else {
            false
        }
    }

    pub fn intersect_occlusion(&self, ray: &Ray) -> bool {
        let c = self.center - ray.origin;
        let t = c.dot(&ray.dir);
        let q = c - t * ray.dir.into_inner();
        let p2 = q.dot(&q);
        let r2 = self.radius * self.radius;
        if p2 > r2 {
            return false;
        }
        let thc = (r2 - p2).sqrt();
        let t_near = t - thc;
        let t = if t_near > 0.0 { t_near } else { t + thc };
        t > 0.0 && t < ray.t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_ulps_eq;

    #[test]
    fn test_area_matches_sphere_formula() {
        let light = Light::new(Point3::origin(), 2.0, ColorRgb::WHITE);
        assert_ulps_eq!(light.area(), 4.0 * PI * 4.0, epsilon = 1e-4);
    }

    #[test]
    fn test_sample_point_lies_on_surface() {
        let light = Light::new(Point3::new(1.0, 2.0, 3.0), 5.0, ColorRgb::WHITE);
        let point = light.sample_point(0.37, 0.81);
        let dist = (point - light.center).norm();
        assert_ulps_eq!(dist, 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_intersect_through_center() {
        let light = Light::new(Point3::new(0.0, 10.0, 5.0), 1.0, ColorRgb::new(100.0, 100.0, 100.0));
        let mut ray = Ray::new(Point3::new(0.0, 10.0, 0.0), normal!(vector![0.0, 0.0, 1.0]));
        assert!(light.intersect(&mut ray, 3));
        assert_eq!(ray.hit_id, 3);
        assert_ulps_eq!(ray.t, 4.0, epsilon = 1e-5);
    }
}
