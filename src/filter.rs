use super::*;

/// Sigma widths for the edge-aware filter's feature terms, plus the kernel
/// size. `kernel_size == 0` disables filtering outright.
#[derive(Clone, Copy, Debug)]
pub struct FilterParams {
    pub kernel_size: u32,
    pub sigma_illumination: f32,
    pub sigma_firefly: f32,
    pub sigma_position: f32,
    pub sigma_normal: f32,
}

impl From<&RenderConfig> for FilterParams {
    fn from(config: &RenderConfig) -> Self {
        Self {
            kernel_size: config.kernel_size,
            sigma_illumination: config.sigma_illumination,
            sigma_firefly: config.sigma_firefly,
            sigma_position: config.sigma_position,
            sigma_normal: config.sigma_normal,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Runs the horizontal then the vertical pass, each a separate `rayon`
/// parallel region (a barrier, since pass B reads pass A's output for every
/// pixel in its row/column neighbourhood). G-buffer features (position,
/// normal, material id) are always read from the original buffer; only the
/// illumination values being blurred come from the previous pass.
pub fn denoise(pixels: &[PixelData], width: u32, height: u32, params: &FilterParams) -> Vec<ColorRgb> {
    if params.kernel_size == 0 {
        return pixels.iter().map(|p| p.illumination).collect();
    }

    let pass_a = run_pass(pixels, width, height, params, Axis::Horizontal, |index, _| {
        pixels[index].illumination
    });
    run_pass(pixels, width, height, params, Axis::Vertical, |index, _| pass_a[index])
}

fn run_pass<F>(
    pixels: &[PixelData],
    width: u32,
    height: u32,
    params: &FilterParams,
    axis: Axis,
    source: F,
) -> Vec<ColorRgb>
where
    F: Fn(usize, &PixelData) -> ColorRgb + Sync,
{
    (0..pixels.len())
        .into_par_iter()
        .map(|index| {
            let cx = (index as u32) % width;
            let cy = (index as u32) / width;
            filter_pixel(pixels, width, height, params, cx, cy, axis, &source)
        })
        .collect()
}

#[inline]
fn linear_index(width: u32, x: u32, y: u32) -> usize {
    (y * width + x) as usize
}

#[allow(clippy::too_many_arguments)]
fn filter_pixel<F>(
    pixels: &[PixelData],
    width: u32,
    height: u32,
    params: &FilterParams,
    cx: u32,
    cy: u32,
    axis: Axis,
    source: &F,
) -> ColorRgb
where
    F: Fn(usize, &PixelData) -> ColorRgb,
{
    let center_index = linear_index(width, cx, cy);
    let center = &pixels[center_index];
    let center_illum = source(center_index, center);

    let radius = (params.kernel_size / 2) as i32;
    let spatial_sigma = (params.kernel_size as f32 / 6.0).max(1.0);

    let firefly_threshold = 3.0 * params.sigma_firefly * params.sigma_firefly;
    let self_is_firefly = center_illum.max_component() > firefly_threshold;

    let mut sum = ColorRgb::BLACK;
    let mut total_weight = 0.0f32;

    for i in -radius..=radius {
        let (ox, oy) = match axis {
            Axis::Horizontal => (cx as i32 + i, cy as i32),
            Axis::Vertical => (cx as i32, cy as i32 + i),
        };
        if ox < 0 || oy < 0 || ox >= width as i32 || oy >= height as i32 {
            continue;
        }
        let other_index = linear_index(width, ox as u32, oy as u32);
        let other = &pixels[other_index];
        let other_illum = source(other_index, other);

        if i == 0 && self_is_firefly {
            continue;
        }

        let spatial = gaussian(i as f32, spatial_sigma);

        let illum_dist = (center_illum - other_illum).luminance().powi(2);
        let w_illum = gaussian(illum_dist.sqrt(), params.sigma_illumination);

        let pos_dist = (center.first_intersect - other.first_intersect).norm();
        let w_pos = gaussian(pos_dist, params.sigma_position);

        let cos_normals = center.inter_normal.dot(&other.inter_normal).clamp(-1.0, 1.0);
        let w_normal = gaussian(1.0 - cos_normals, params.sigma_normal);

        let w_material = if center.material_index == other.material_index {
            1.0
        } else {
            (-1.0 / (2.0 * params.sigma_normal * params.sigma_normal)).exp()
        };

        let weight = spatial * w_illum * w_pos * w_normal * w_material;
        sum += other_illum * weight;
        total_weight += weight;
    }

    if total_weight > 0.0 {
        sum / total_weight
    } else {
        center_illum
    }
}

#[inline]
fn gaussian(x: f32, sigma: f32) -> f32 {
    (-(x * x) / (2.0 * sigma * sigma)).exp()
}
