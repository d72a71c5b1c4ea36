use super::*;

/// A tangent frame built around a single unit normal, used to transform
/// hemisphere samples from local (z-up) into world space.
pub struct OrthonormalBasis {
    tangent: Vec3,
    bitangent: Vec3,
    normal: Vec3,
}

impl OrthonormalBasis {
    /// Branchless construction. See Duff et al., "Building an Orthonormal
    /// Basis, Revisited" (https://graphics.pixar.com/library/OrthonormalB/paper.pdf).
    pub fn new(normal: &Normal) -> Self {
        let n = normal.into_inner();
        let sign = f32::copysign(1.0, n.z);
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;
        let tangent = vector![1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x];
        let bitangent = vector![b, sign + n.y * n.y * a, -n.y];
        Self {
            tangent,
            bitangent,
            normal: n,
        }
    }

    #[inline]
    pub fn world_from_local(&self, local: &Vec3) -> Vec3 {
        local.x * self.tangent + local.y * self.bitangent + local.z * self.normal
    }
}

/// Cosine-weighted direction in the hemisphere around `normal`, via
/// Malley's method (uniform disk lifted onto the hemisphere). `pdf = cos/pi`.
pub fn hemisphere_cosine(normal: &Normal, r1: f32, r2: f32) -> (Normal, f32) {
    let theta = TAU * r1;
    let r = (1.0 - r2).sqrt();
    let local = vector![theta.cos() * r, theta.sin() * r, r2.sqrt()];
    let basis = OrthonormalBasis::new(normal);
    let dir = normal!(basis.world_from_local(&local));
    let cos_theta = local.z;
    (dir, hemisphere_cosine_pdf(cos_theta))
}

#[inline]
pub fn hemisphere_cosine_pdf(cos_theta: f32) -> f32 {
    (cos_theta / PI).max(0.0)
}
