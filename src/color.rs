use std::{fmt, ops};

use super::*;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorRgb([f32; 3]);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorRgba([f32; 4]);

impl ColorRgb {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self([r, g, b])
    }

    pub const fn r(&self) -> f32 {
        self.0[0]
    }

    pub const fn g(&self) -> f32 {
        self.0[1]
    }

    pub const fn b(&self) -> f32 {
        self.0[2]
    }

    pub fn r_mut(&mut self) -> &mut f32 {
        &mut self.0[0]
    }

    pub fn g_mut(&mut self) -> &mut f32 {
        &mut self.0[1]
    }

    pub fn b_mut(&mut self) -> &mut f32 {
        &mut self.0[2]
    }

    pub fn as_mut(&mut self) -> &mut [f32; 3] {
        &mut self.0
    }

    pub fn is_finite(&self) -> bool {
        self.r().is_finite() && self.g().is_finite() && self.b().is_finite()
    }

    pub fn clamp(self) -> Self {
        Self::new(
            self.r().clamp(0.0, 1.0),
            self.g().clamp(0.0, 1.0),
            self.b().clamp(0.0, 1.0),
        )
    }

    pub fn max_component(self) -> f32 {
        self.r().max(self.g()).max(self.b())
    }

    pub fn luminance(self) -> f32 {
        // "3.2: Derivation of luminance signal"
        // https://www.itu.int/dms_pubrec/itu-r/rec/bt/R-REC-BT.709-6-201506-I!!PDF-E.pdf
        // https://en.wikipedia.org/wiki/Relative_luminance
        0.2126 * self.r() + 0.7152 * self.g() + 0.0722 * self.b()
    }

    pub fn tonemap(self) -> Self {
        // https://knarkowicz.wordpress.com/2016/01/06/aces-filmic-tone-mapping-curve/
        let aces = |x: f32| {
            let a = 2.51;
            let b = 0.03;
            let c = 2.43;
            let d = 0.59;
            let e = 0.14;
            f32::clamp((x * (a * x + b)) / (x * (c * x + d) + e), 0.0, 1.0)
        };
        Self::new(aces(self.r()), aces(self.g()), aces(self.b()))
    }

    /// The hard-coded gamma curve named in the design: linear below `0.018`,
    /// a square-root shoulder above it. Input is expected in `[0,1]`.
    pub fn gamma_encode(self) -> Self {
        let curve = |v: f32| {
            if v <= 0.018 {
                v * 4.5
            } else {
                1.099 * v.powf(0.5) - 0.099
            }
        };
        Self::new(curve(self.r()), curve(self.g()), curve(self.b()))
    }

    /// Inverse of [`Self::gamma_encode`], for decoding 8-bit texture sources
    /// (assumed encoded with the same curve as the output surface) back to
    /// linear before shading.
    pub fn gamma_decode(self) -> Self {
        let curve = |v: f32| {
            if v <= 0.081 {
                v / 4.5
            } else {
                ((v + 0.099) / 1.099).powf(2.0)
            }
        };
        Self::new(curve(self.r()), curve(self.g()), curve(self.b()))
    }

    /// Darkens the color towards the image border. `radius` is the distance
    /// of this pixel from the image center, normalized so the corner is `1.0`.
    pub fn vignette(self, radius: f32, strength: f32) -> Self {
        let falloff = (1.0 - strength * radius * radius).clamp(0.0, 1.0);
        self * falloff
    }

    /// Packs a clamped, gamma-encoded color into a 32-bit BGRA pixel with a
    /// fully opaque alpha channel: `(R<<16)|(G<<8)|B`, per the output-surface
    /// contract.
    pub fn into_bgra_u32(self) -> u32 {
        let c = self.clamp();
        let r = (c.r() * 255.0).round() as u32;
        let g = (c.g() * 255.0).round() as u32;
        let b = (c.b() * 255.0).round() as u32;
        0xff00_0000 | (r << 16) | (g << 8) | b
    }
}

impl Default for ColorRgb {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<ColorRgb> for [f32; 3] {
    fn from(value: ColorRgb) -> Self {
        value.0
    }
}

impl ops::Add for ColorRgb {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.r() + rhs.r(), self.g() + rhs.g(), self.b() + rhs.b())
    }
}

impl ops::AddAssign for ColorRgb {
    fn add_assign(&mut self, rhs: Self) {
        *self.r_mut() += rhs.r();
        *self.g_mut() += rhs.g();
        *self.b_mut() += rhs.b();
    }
}

impl ops::Sub for ColorRgb {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.r() - rhs.r(), self.g() - rhs.g(), self.b() - rhs.b())
    }
}

impl ops::Mul for ColorRgb {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::new(self.r() * rhs.r(), self.g() * rhs.g(), self.b() * rhs.b())
    }
}

impl ops::Mul<f32> for ColorRgb {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.r() * rhs, self.g() * rhs, self.b() * rhs)
    }
}

impl ops::Mul<ColorRgb> for f32 {
    type Output = ColorRgb;

    fn mul(self, rhs: ColorRgb) -> Self::Output {
        ColorRgb::new(self * rhs.r(), self * rhs.g(), self * rhs.b())
    }
}

impl ops::MulAssign for ColorRgb {
    fn mul_assign(&mut self, rhs: Self) {
        *self.r_mut() *= rhs.r();
        *self.g_mut() *= rhs.g();
        *self.b_mut() *= rhs.b();
    }
}

impl ops::Div<f32> for ColorRgb {
    type Output = Self;

    fn div(self, rhs: f32) -> Self::Output {
        Self::new(self.r() / rhs, self.g() / rhs, self.b() / rhs)
    }
}

impl fmt::Display for ColorRgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(precision) = f.precision() {
            write!(
                f,
                "{:.precision$},{:.precision$},{:.precision$}",
                self.r(),
                self.g(),
                self.b(),
            )
        } else {
            write!(f, "{},{},{}", self.r(), self.g(), self.b())
        }
    }
}

impl ColorRgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([r, g, b, a])
    }

    pub const fn r(&self) -> f32 {
        self.0[0]
    }

    pub const fn g(&self) -> f32 {
        self.0[1]
    }

    pub const fn b(&self) -> f32 {
        self.0[2]
    }

    pub const fn a(&self) -> f32 {
        self.0[3]
    }

    pub const fn rgb(&self) -> ColorRgb {
        ColorRgb::new(self.r(), self.g(), self.b())
    }
}

impl fmt::Display for ColorRgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(precision) = f.precision() {
            write!(
                f,
                "{:.precision$},{:.precision$},{:.precision$},{:.precision$}",
                self.r(),
                self.g(),
                self.b(),
                self.a(),
            )
        } else {
            write!(f, "{},{},{},{}", self.r(), self.g(), self.b(), self.a())
        }
    }
}
