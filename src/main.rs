#![deny(future_incompatible)]
#![deny(nonstandard_style)]
#![deny(clippy::pedantic)]
#![allow(
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::collapsible_if,
    clippy::let_underscore_untyped,
    clippy::many_single_char_names,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::similar_names,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Context, Result};
use bytemuck::{Pod, Zeroable};
use log::{debug, info, warn};
use nalgebra as na;
use rayon::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[cfg(test)]
use approx::assert_ulps_eq;

mod aabb;
mod accumulator;
mod bvh;
mod camera;
mod color;
mod config;
mod envmap;
mod filter;
mod integrator;
mod light;
mod material;
mod math;
mod obj;
mod ray;
mod renderer;
mod rng;
mod sampling;
mod scene;
mod sphere;
mod triangle;

use aabb::*;
use accumulator::*;
use bvh::*;
use camera::*;
use color::*;
use config::*;
use envmap::*;
use filter::*;
use light::*;
use material::*;
use math::*;
use ray::*;
use rng::*;
use sampling::*;
use scene::*;
use sphere::*;
use triangle::*;

const PI: f32 = std::f32::consts::PI;
const TAU: f32 = std::f32::consts::TAU;
const INV_PI: f32 = std::f32::consts::FRAC_1_PI;

//
// CLI
//

/// Traces a scene either hard-coded (default) or loaded from an OBJ/MTL
/// pair, streaming progressive frames until `samples_per_pixel` is reached
/// and writing the final frame out as a PNG.
#[derive(clap::Parser)]
#[clap(author, version)]
struct CliArgs {
    /// Path to an OBJ file. Omitted: renders the built-in Cornell-like room.
    obj_path: Option<PathBuf>,

    /// RON file overriding render-time knobs (samples, depth, denoiser...).
    #[clap(long)]
    render_config: Option<PathBuf>,

    /// RON file selecting an OBJ scene and its material overrides. Ignored
    /// when `obj_path` is given directly.
    #[clap(long)]
    scene_config: Option<PathBuf>,

    #[clap(long, default_value_t = 512)]
    width: u32,

    #[clap(long, default_value_t = 512)]
    height: u32,

    #[clap(long, default_value = "output.png")]
    output: PathBuf,
}

fn main() -> Result<()> {
    use clap::Parser;

    env_logger::init();
    let args = CliArgs::parse();

    let render_config: RenderConfig = match &args.render_config {
        Some(path) => config::read_from_file(path)?,
        None => RenderConfig::default(),
    };

    let scene_config: SceneConfig = match &args.scene_config {
        Some(path) => config::read_from_file(path)?,
        None => SceneConfig::default(),
    };

    let obj_path = args.obj_path.clone().or_else(|| scene_config.obj_path.clone());

    let scene = match &obj_path {
        Some(path) => {
            let (triangles, mut materials, names) = obj::load(path)?;
            obj::apply_material_overrides(&mut materials, &names, &scene_config.material_overrides);
            Scene::create(Vec::new(), triangles, materials, Vec::new(), None, render_config.bvh_bins)
        }
        None => Scene::default_scene(render_config.bvh_bins),
    };

    info!(
        "Rendering {} triangles, {} spheres, {} lights at {}x{}, {} spp",
        scene.triangles.len(),
        scene.spheres.len(),
        scene.lights.len(),
        args.width,
        args.height,
        render_config.samples_per_pixel
    );

    let camera = default_camera(&scene, obj_path.is_some());
    let renderer = renderer::Renderer::create(scene, render_config.clone(), camera, args.width, args.height);

    let mut last_output = None;
    while let Some(output) = renderer.recv_output() {
        let finished = output.frame_count >= output.frame_total;
        last_output = Some(output);
        if finished {
            break;
        }
    }
    renderer.terminate();

    let output = last_output.ok_or_else(|| anyhow!("Renderer terminated before producing a frame"))?;
    write_png(&args.output, &output)?;
    info!("Wrote {}", args.output.display());

    let resolved_dir = args.output.parent().unwrap_or_else(|| Path::new("."));
    config::write_to_file(resolved_dir.join("render_config.ron"), &render_config)?;
    config::write_to_file(resolved_dir.join("scene_config.ron"), &scene_config)?;

    Ok(())
}

/// Frames the hard-coded Cornell-like room head-on; for an imported OBJ
/// scene, pulls back to a generic three-quarter view since the scene's true
/// extents aren't known ahead of time.
fn default_camera(_scene: &Scene, is_imported: bool) -> Camera {
    if is_imported {
        Camera::new(Point3::new(0.0, 2.0, -6.0), normal!(vector![0.0, -0.1, 1.0]), 2.0)
    } else {
        Camera::new(Point3::new(0.0, 2.5, -3.0), normal!(vector![0.0, 0.05, 1.0]), 1.6)
    }
}

fn write_png(path: &Path, output: &renderer::FrameOutput) -> Result<()> {
    let mut image = imagelib::RgbImage::new(output.width, output.height);
    for (index, packed) in output.pixels.iter().enumerate() {
        let x = index as u32 % output.width;
        let y = index as u32 / output.width;
        let r = ((packed >> 16) & 0xff) as u8;
        let g = ((packed >> 8) & 0xff) as u8;
        let b = (packed & 0xff) as u8;
        image.put_pixel(x, y, imagelib::Rgb([r, g, b]));
    }
    image.save(path).with_context(|| format!("Writing PNG to {}", path.display()))
}
