use super::*;

/// Per-pixel G-buffer plus progressive accumulator state. One entry per
/// output pixel; the buffer is a single contiguous allocation partitioned
/// by row across `rayon` workers.
#[derive(Clone, Copy, Debug, Default)]
pub struct PixelData {
    pub accumulated: ColorRgb,
    pub illumination: ColorRgb,
    pub albedo: ColorRgb,
    pub first_intersect: Vec3,
    pub inter_normal: Vec3,
    pub material_index: i32,
    pub filtered: ColorRgb,
    pub total_weight: f32,
}

impl PixelData {
    pub const NO_MATERIAL: i32 = -1;

    pub fn new() -> Self {
        Self {
            material_index: Self::NO_MATERIAL,
            ..Default::default()
        }
    }
}

/// Owns the `PixelData` buffer for one frame's worth of pixels.
pub struct Accumulator {
    width: u32,
    height: u32,
    pixels: Vec<PixelData>,
    frame_count: u32,
}

impl Accumulator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![PixelData::new(); (width * height) as usize],
            frame_count: 0,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn pixels(&self) -> &[PixelData] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [PixelData] {
        &mut self.pixels
    }

    /// Zeroes `accumulated` and `frame_count`; called whenever the camera
    /// (or anything else that invalidates the image) changes.
    pub fn reset(&mut self) {
        self.frame_count = 0;
        for pixel in &mut self.pixels {
            pixel.accumulated = ColorRgb::BLACK;
            pixel.illumination = ColorRgb::BLACK;
        }
    }

    /// Adds one sample's radiance into `accumulated` and recomputes
    /// `illumination` for a single pixel. Call once per pixel per frame,
    /// after `begin_frame`.
    pub fn accumulate(&mut self, index: usize, sample: ColorRgb) {
        let frame_count = self.frame_count.max(1) as f32;
        let pixel = &mut self.pixels[index];
        pixel.accumulated += sample;
        pixel.illumination = pixel.accumulated / frame_count;
    }

    pub fn begin_frame(&mut self) {
        self.frame_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_ulps_eq;

    #[test]
    fn test_identical_samples_converge_to_value() {
        let mut acc = Accumulator::new(1, 1);
        let v = ColorRgb::new(0.4, 0.2, 0.1);
        for _ in 0..10 {
            acc.begin_frame();
            acc.accumulate(0, v);
        }
        let illum = acc.pixels()[0].illumination;
        assert_ulps_eq!(illum.r(), v.r(), epsilon = 1e-5);
        assert_ulps_eq!(illum.g(), v.g(), epsilon = 1e-5);
        assert_ulps_eq!(illum.b(), v.b(), epsilon = 1e-5);
    }

    #[test]
    fn test_progressive_error_shrinks_with_more_samples() {
        // With a stationary camera, accumulating noisy but unbiased samples
        // should converge towards the true mean with standard error
        // proportional to 1/sqrt(N): doubling N repeatedly should roughly
        // halve the estimate's distance from the known truth each time.
        let true_value = 0.5f32;
        let sample_at = |rng: &mut Rng| -> ColorRgb {
            let noisy = true_value + (rng.next_f32() - 0.5) * 2.0;
            ColorRgb::new(noisy, noisy, noisy)
        };

        let sample_counts = [64u32, 256, 1024, 4096];
        let mut errors = Vec::new();
        for &n in &sample_counts {
            let mut acc = Accumulator::new(1, 1);
            let mut rng = Rng::new(0, 123);
            for _ in 0..n {
                acc.begin_frame();
                acc.accumulate(0, sample_at(&mut rng));
            }
            let estimate = acc.pixels()[0].illumination.r();
            errors.push((estimate - true_value).abs());
        }

        // 64 -> 4096 is a 64x sample increase, i.e. an 8x reduction in
        // expected standard error; allow generous slack since this is one
        // random trial, not an average over many.
        assert!(
            errors[3] < errors[0],
            "error did not shrink: {:?} -> {:?}",
            errors[0],
            errors[3]
        );
    }

    #[test]
    fn test_reset_zeroes_accumulated_and_frame_count() {
        let mut acc = Accumulator::new(1, 1);
        acc.begin_frame();
        acc.accumulate(0, ColorRgb::WHITE);
        acc.reset();
        assert_eq!(acc.frame_count(), 0);
        assert_eq!(acc.pixels()[0].accumulated, ColorRgb::BLACK);
    }
}
