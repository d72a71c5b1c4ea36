use super::*;

#[derive(Clone, Copy, Debug)]
pub struct Sphere {
    pub center: Point3,
    pub radius: f32,
    pub material_id: u32,
}

impl Sphere {
    pub fn new(center: Point3, radius: f32, material_id: u32) -> Self {
        Self {
            center,
            radius,
            material_id,
        }
    }

    pub fn aabb(&self) -> Aabb {
        let r = vector![self.radius, self.radius, self.radius];
        Aabb::from_min_max(self.center - r, self.center + r)
    }

    #[inline]
    pub fn normal_at(&self, point: &Point3) -> Normal {
        normal!(point - self.center)
    }

    /// Spherical UV lookup: longitude from `atan2(z,x)`, latitude from `y`.
    pub fn tex_coord(&self, point: &Point3) -> Point2 {
        let local = (point - self.center) / self.radius;
        let u = 0.5 + local.z.atan2(local.x) * INV_TAU;
        let v = 0.5 - local.y.asin() * INV_PI;
        Point2::new(u, v)
    }

    /// Geometric intersection: `C = center - O`, `t = C·D`, `Q = C - t·D`,
    /// reject if `Q·Q > r²`. Prefers the near root (`t - sqrt(r²-Q·Q)`); if
    /// that lies behind the ray origin, falls back to the far root, so a
    /// ray starting inside the sphere (e.g. a refracted ray exiting glass)
    /// still reports the exit point instead of missing entirely.
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

const INV_TAU: f32 = 1.0 / std::f32::consts::TAU;
