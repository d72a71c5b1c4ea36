use super::*;

/// A material's optional diffuse texture, looked up by UV at shading time
/// and multiplied into `albedo`. Images are stored as decoded BGRA bitmaps,
/// matching the importer's texture output.
#[derive(Clone, Debug)]
pub enum Texture {
    Image {
        width: u32,
        height: u32,
        pixels: Vec<ColorRgb>,
    },
}

impl Texture {
    /// Nearest-neighbor sample, wrapping UV into `[0,1)` first so texture
    /// tiling never indexes out of bounds.
    pub fn sample(&self, uv: Point2) -> ColorRgb {
        let Texture::Image {
            width,
            height,
            pixels,
        } = self;
        let wrap = |v: f32| v - v.floor();
        let u = wrap(uv.x);
        let v = wrap(uv.y);
        let x = ((u * *width as f32) as u32).min(width - 1);
        let y = ((v * *height as f32) as u32).min(height - 1);
        pixels[(y * width + x) as usize]
    }
}

/// Surface description: a diffuse/reflective/refractive mix, plus an
/// optional emission used only by mesh-based emitters loaded through the
/// importer (`Ke`). Dedicated sphere `Light`s never route through here.
#[derive(Clone, Debug)]
pub struct Material {
    pub albedo: ColorRgb,
    pub texture: Option<Texture>,
    pub reflection: f32,
    pub refraction: f32,
    pub ior: f32,
    pub emission: ColorRgb,
}

impl Material {
    pub fn new(albedo: ColorRgb, reflection: f32, refraction: f32, ior: f32) -> Self {
        Self {
            albedo,
            texture: None,
            reflection,
            refraction,
            ior,
            emission: ColorRgb::BLACK,
        }
    }

    pub fn with_texture(mut self, texture: Texture) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_emission(mut self, emission: ColorRgb) -> Self {
        self.emission = emission;
        self
    }

    #[inline]
    pub fn diffuse(&self) -> f32 {
        1.0 - self.reflection - self.refraction
    }

    pub fn is_emissive(&self) -> bool {
        self.emission.max_component() > 0.0
    }

    pub fn albedo_at(&self, uv: Point2) -> ColorRgb {
        match &self.texture {
            Some(texture) => self.albedo * texture.sample(uv),
            None => self.albedo,
        }
    }

    /// Normal-incidence Fresnel reflectance used by Schlick's approximation:
    /// `R0 = ((ior-1)/(ior+1))^2`.
    pub fn r0(&self) -> f32 {
        let r0 = (self.ior - 1.0) / (self.ior + 1.0);
        r0 * r0
    }
}

/// Stochastic branch chosen at a BSDF sample, per the material mix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BsdfBranch {
    Refract,
    Reflect,
    Diffuse,
}

impl BsdfBranch {
    /// `u < refraction` refracts, `u < refraction + reflection` reflects,
    /// otherwise diffuse. `u` is expected uniform in `[0,1)`.
    pub fn sample(material: &Material, u: f32) -> Self {
        if u < material.refraction {
            Self::Refract
        } else if u < material.refraction + material.reflection {
            Self::Reflect
        } else {
            Self::Diffuse
        }
    }
}
