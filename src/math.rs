use super::*;

//
// Type aliases
//
// The renderer works in `f32` throughout; these aliases exist so call sites
// read as what they mean geometrically rather than as bare `nalgebra` types.
//

pub type Vec2 = na::Vector2<f32>;
pub type Vec3 = na::Vector3<f32>;
pub type Vec3u = na::Vector3<u32>;
pub type Vec3b = na::Vector3<bool>;
pub type Point2 = na::Point2<f32>;
pub type Point3 = na::Point3<f32>;
pub type Normal = na::Unit<na::Vector3<f32>>;
pub type Mat3 = na::Matrix3<f32>;
pub type Mat4 = na::Matrix4<f32>;

#[macro_export]
macro_rules! vector {
    ($x:expr, $y:expr, $z:expr) => {
        $crate::math::Vec3::new($x, $y, $z)
    };
}

#[macro_export]
macro_rules! normal {
    ($v:expr) => {
        $crate::math::Normal::new_normalize($v)
    };
}

//
// Interpolation
//

pub fn lerp_scalar<T: num::Float>(a: T, b: T, t: T) -> T {
    a * (T::one() - t) + b * t
}

pub fn lerp_color(a: &ColorRgb, b: &ColorRgb, t: f32) -> ColorRgb {
    ColorRgb::new(
        lerp_scalar(a.r(), b.r(), t),
        lerp_scalar(a.g(), b.g(), t),
        lerp_scalar(a.b(), b.b(), t),
    )
}

//
// Geometric
//

/// Mirror reflection of `v` about unit normal `n`. Both point away from the
/// surface (`v` is typically `-ray.dir`).
pub fn reflect_vector(v: &Vec3, n: &Vec3) -> Vec3 {
    (2.0 * v.dot(n) * n - v).normalize()
}

/// Refracts incoming direction `d` (pointing into the surface) through a
/// unit normal `n` oriented against `d`, with `eta = ior_from / ior_to`.
/// Returns `None` on total internal reflection.
pub fn refract_vector(d: &Vec3, n: &Vec3, eta: f32) -> Option<Vec3> {
    let cos_theta_i = (-d).dot(n);
    let k = 1.0 - eta * eta * (1.0 - cos_theta_i * cos_theta_i);
    if k < 0.0 {
        None
    } else {
        Some((eta * d + n * (eta * cos_theta_i - k.sqrt())).normalize())
    }
}

//
// Tests
//
