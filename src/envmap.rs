use super::*;

/// An equirectangular floating-point environment map, decoded once from its
/// binary cache and kept resident for the life of the render.
pub struct EnvMap {
    width: u32,
    height: u32,
    pixels: Vec<ColorRgb>,
}

impl EnvMap {
    /// Looks up the cache file next to `hdr_path` (same path, `.cache`
    /// appended) and reads it. Returns `NoDecoder` if the cache is missing —
    /// decoding the HDR source directly is out of scope.
    pub fn load(hdr_path: &Path) -> Result<Self> {
        let cache_path = cache_path_for(hdr_path);
        if !cache_path.exists() {
            bail!(EnvMapError::NoDecoder {
                path: hdr_path.to_path_buf()
            });
        }
        Self::read_cache(&cache_path)
    }

    pub fn read_cache(path: &Path) -> Result<Self> {
        let mut reader =
            BufReader::new(File::open(path).with_context(|| format!("Opening {}", path.display()))?);

        let mut header = [0u8; 8];
        reader
            .read_exact(&mut header)
            .map_err(|_| EnvMapError::Truncated)?;
        let width = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let height = u32::from_le_bytes(header[4..8].try_into().unwrap());

        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count);
        let mut triple = [0u8; 12];
        for _ in 0..count {
            reader
                .read_exact(&mut triple)
                .map_err(|_| EnvMapError::Truncated)?;
            let r = f32::from_le_bytes(triple[0..4].try_into().unwrap());
            let g = f32::from_le_bytes(triple[4..8].try_into().unwrap());
            let b = f32::from_le_bytes(triple[8..12].try_into().unwrap());
            pixels.push(ColorRgb::new(r, g, b));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn write_cache(&self, path: &Path) -> Result<()> {
        let mut writer =
            BufWriter::new(File::create(path).with_context(|| format!("Creating {}", path.display()))?);
        writer.write_all(&self.width.to_le_bytes())?;
        writer.write_all(&self.height.to_le_bytes())?;
        for pixel in &self.pixels {
            writer.write_all(&pixel.r().to_le_bytes())?;
            writer.write_all(&pixel.g().to_le_bytes())?;
            writer.write_all(&pixel.b().to_le_bytes())?;
        }
        Ok(())
    }

    /// Full-width equirectangular lookup: `x = w*(0.5 + atan2(d.x,-d.z)/(2*pi))`,
    /// `y = h*acos(d.y)/pi`.
    pub fn sample(&self, dir: &Vec3) -> ColorRgb {
        if self.width == 0 || self.height == 0 {
            return ColorRgb::BLACK;
        }
        let u = 0.5 + dir.x.atan2(-dir.z) * INV_TAU;
        let v = dir.y.clamp(-1.0, 1.0).acos() * INV_PI;
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.pixels[(y * self.width + x) as usize]
    }
}

fn cache_path_for(hdr_path: &Path) -> PathBuf {
    let mut cache_path = hdr_path.as_os_str().to_owned();
    cache_path.push(".cache");
    PathBuf::from(cache_path)
}

const INV_TAU: f32 = 1.0 / std::f32::consts::TAU;

#[derive(Debug, thiserror::Error)]
pub enum EnvMapError {
    #[error("no environment map cache found next to {path}, and HDR decoding is not supported")]
    NoDecoder { path: PathBuf },
    #[error("environment map cache is truncated")]
    Truncated,
}
