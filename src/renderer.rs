use super::*;

/// One fully processed frame: denoised, tonemapped, and packed into the
/// output surface's BGRA layout.
pub struct FrameOutput {
    pub pixels: Vec<u32>,
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub frame_total: u32,
}

/// Runs the sample+accumulate pass for one frame (one sample per pixel),
/// then the two-pass edge-aware filter, then demodulates albedo back in and
/// tonemaps. This is the unit of work the background renderer repeats until
/// `frame_total` samples have accumulated.
pub fn render_frame(scene: &Scene, camera: &Camera, accumulator: &mut Accumulator, config: &RenderConfig) -> FrameOutput {
    let width = accumulator.width();
    let height = accumulator.height();

    accumulator.begin_frame();
    let frame_count = accumulator.frame_count();

    let samples: Vec<(ColorRgb, PixelData)> = (0..width * height)
        .into_par_iter()
        .map(|index| {
            let x = index % width;
            let y = index / width;
            let mut rng = Rng::new(frame_count, index);

            let (s, t) = if config.use_ssaa {
                ((x as f32 + rng.next_f32()) / width as f32, (y as f32 + rng.next_f32()) / height as f32)
            } else {
                ((x as f32 + 0.5) / width as f32, (y as f32 + 0.5) / height as f32)
            };

            let ray = camera.primary_ray(s, t);
            let mut pixel = PixelData::new();
            let radiance = integrator::sample(scene, ray, config, &mut rng, &mut pixel);
            (radiance, pixel)
        })
        .collect();

    for (index, (radiance, sample_pixel)) in samples.into_iter().enumerate() {
        accumulator.accumulate(index, radiance);
        let pixel = &mut accumulator.pixels_mut()[index];
        if sample_pixel.material_index != PixelData::NO_MATERIAL {
            pixel.albedo = sample_pixel.albedo;
            pixel.first_intersect = sample_pixel.first_intersect;
            pixel.inter_normal = sample_pixel.inter_normal;
            pixel.material_index = sample_pixel.material_index;
        }
    }

    let filter_params = FilterParams::from(config);
    let filtered = filter::denoise(accumulator.pixels(), width, height, &filter_params);

    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let corner_radius = (cx * cx + cy * cy).sqrt();

    let pixels = filtered
        .iter()
        .zip(accumulator.pixels())
        .enumerate()
        .map(|(index, (illumination, gbuffer))| {
            let mut color = *illumination * gbuffer.albedo;
            if config.use_vignette {
                let x = (index as u32 % width) as f32 - cx;
                let y = (index as u32 / width) as f32 - cy;
                let radius = (x * x + y * y).sqrt() / corner_radius;
                color = color.vignette(radius, 0.6);
            }
            color.tonemap().gamma_encode().into_bgra_u32()
        })
        .collect();

    FrameOutput {
        pixels,
        width,
        height,
        frame_count,
        frame_total: config.samples_per_pixel,
    }
}

/// Background-thread renderer: owns the `Scene`/`Accumulator`/`Camera` and
/// streams `FrameOutput`s back over an `mpsc` channel as samples
/// accumulate. The caller never touches renderer-owned state directly; it
/// only sends camera updates and polls for frames.
pub struct Renderer {
    thread: thread::JoinHandle<()>,
    input_send: mpsc::Sender<Camera>,
    output_recv: mpsc::Receiver<FrameOutput>,
    terminate_send: mpsc::Sender<()>,
}

impl Renderer {
    pub fn create(scene: Scene, config: RenderConfig, camera: Camera, width: u32, height: u32) -> Self {
        let (input_send, input_recv) = mpsc::channel::<Camera>();
        let (output_send, output_recv) = mpsc::channel();
        let (terminate_send, terminate_recv) = mpsc::channel();

        let thread = thread::spawn(move || {
            let scene = scene;
            let config = config;
            let mut camera = camera;
            let mut accumulator = Accumulator::new(width, height);
            let mut timer = Instant::now();

            loop {
                if terminate_recv.try_recv().is_ok() {
                    info!("Terminating renderer");
                    break;
                }

                let latest_camera = {
                    let mut latest = None;
                    while let Ok(input) = input_recv.try_recv() {
                        latest = Some(input);
                    }
                    latest
                };
                if let Some(latest_camera) = latest_camera {
                    if latest_camera != camera {
                        camera = latest_camera;
                        accumulator.reset();
                        scene.bvh.reset_stats();
                        timer = Instant::now();
                    }
                }

                if accumulator.frame_count() < config.samples_per_pixel {
                    let output = render_frame(&scene, &camera, &mut accumulator, &config);
                    let finished = output.frame_count == config.samples_per_pixel;
                    if output_send.send(output).is_err() {
                        break;
                    }
                    if finished {
                        let elapsed = timer.elapsed().as_secs_f64();
                        let samples = f64::from(width * height) * f64::from(config.samples_per_pixel);
                        let stats = scene.bvh.stats();
                        info!(
                            "Rendering took {:.03} s, {:.03} samples/s, {:.03} rays/s",
                            elapsed,
                            samples / elapsed,
                            stats.rays as f64 / elapsed
                        );
                        debug!("{stats:?}");
                    }
                } else {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        });

        Self {
            thread,
            input_send,
            output_recv,
            terminate_send,
        }
    }

    pub fn send_camera(&self, camera: Camera) {
        self.input_send.send(camera).unwrap();
    }

    pub fn try_recv_output(&self) -> Option<FrameOutput> {
        match self.output_recv.try_recv() {
            Ok(output) => Some(output),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => panic!("Renderer thread has disconnected"),
        }
    }

    pub fn recv_output(&self) -> Option<FrameOutput> {
        self.output_recv.recv().ok()
    }

    pub fn terminate(self) {
        self.terminate_send.send(()).ok();
        self.thread.join().expect("Renderer thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_scene() -> Scene {
        let material = Material::new(ColorRgb::new(0.6, 0.6, 0.6), 0.0, 0.0, 1.0);
        let lights = vec![Light::new(Point3::new(0.0, 3.0, 2.0), 0.5, ColorRgb::new(20.0, 20.0, 20.0))];
        let spheres = vec![Sphere::new(Point3::new(0.0, 0.0, 3.0), 1.0, 0)];
        Scene::create(spheres, vec![], vec![material], lights, None, DEFAULT_BUCKET_COUNT as u32)
    }

    #[test]
    fn test_render_frame_produces_full_size_buffer() {
        let scene = tiny_scene();
        let camera = Camera::new(Point3::origin(), normal!(vector![0.0, 0.0, 1.0]), 1.0);
        let mut config = RenderConfig::default();
        config.samples_per_pixel = 2;
        let mut accumulator = Accumulator::new(8, 8);
        let output = render_frame(&scene, &camera, &mut accumulator, &config);
        assert_eq!(output.pixels.len(), 64);
        assert_eq!(output.frame_count, 1);
    }

    #[test]
    fn test_renderer_streams_frames_then_terminates() {
        let scene = tiny_scene();
        let camera = Camera::new(Point3::origin(), normal!(vector![0.0, 0.0, 1.0]), 1.0);
        let mut config = RenderConfig::default();
        config.samples_per_pixel = 3;
        let renderer = Renderer::create(scene, config, camera, 4, 4);
        let mut last_frame_count = 0;
        while let Some(output) = renderer.recv_output() {
            last_frame_count = output.frame_count;
            if output.frame_count == output.frame_total {
                break;
            }
        }
        assert_eq!(last_frame_count, 3);
        renderer.terminate();
    }
}
