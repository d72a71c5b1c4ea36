use super::*;

/// Everything the integrator needs to trace a frame. Immutable after
/// construction: no runtime mutation during rendering, so it can be shared
/// across `rayon` workers by plain reference.
pub struct Scene {
    pub spheres: Vec<Sphere>,
    pub triangles: Vec<Triangle>,
    pub materials: Vec<Material>,
    pub lights: Vec<Light>,
    pub bvh: Bvh,
    pub sky: Option<EnvMap>,
}

impl Scene {
    pub fn create(
        spheres: Vec<Sphere>,
        triangles: Vec<Triangle>,
        materials: Vec<Material>,
        lights: Vec<Light>,
        sky: Option<EnvMap>,
        bvh_bins: u32,
    ) -> Self {
        let bvh = Bvh::build(&triangles, bvh_bins as usize);
        info!(
            "Built BVH over {} triangles: {} nodes",
            triangles.len(),
            bvh.nodes.len()
        );
        Self {
            spheres,
            triangles,
            materials,
            lights,
            bvh,
            sky,
        }
    }

    /// The default hard-coded Cornell-like room: a floor, back wall, and
    /// two spheres, lit by a single area light in the ceiling.
    pub fn default_scene(bvh_bins: u32) -> Self {
        let white = Material::new(ColorRgb::new(0.73, 0.73, 0.73), 0.0, 0.0, 1.0);
        let red = Material::new(ColorRgb::new(0.65, 0.05, 0.05), 0.0, 0.0, 1.0);
        let green = Material::new(ColorRgb::new(0.12, 0.45, 0.15), 0.0, 0.0, 1.0);
        let mirror = Material::new(ColorRgb::WHITE, 1.0, 0.0, 1.0);
        let glass = Material::new(ColorRgb::WHITE, 0.0, 1.0, 1.5);
        let materials = vec![white, red, green, mirror, glass];

        let quad = |p0: Point3, p1: Point3, p2: Point3, p3: Point3, material_id: u32| -> [Triangle; 2] {
            let uv = [
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ];
            [
                Triangle::new(p0, p1, p2, uv[0], uv[1], uv[2], material_id),
                Triangle::new(p0, p2, p3, uv[0], uv[2], uv[3], material_id),
            ]
        };

        let mut triangles = Vec::new();
        // Floor.
        triangles.extend(quad(
            Point3::new(-5.0, -2.0, -5.0),
            Point3::new(5.0, -2.0, -5.0),
            Point3::new(5.0, -2.0, 15.0),
            Point3::new(-5.0, -2.0, 15.0),
            0,
        ));
        // Back wall.
        triangles.extend(quad(
            Point3::new(-5.0, -2.0, 15.0),
            Point3::new(5.0, -2.0, 15.0),
            Point3::new(5.0, 8.0, 15.0),
            Point3::new(-5.0, 8.0, 15.0),
            0,
        ));
        // Left wall (red).
        triangles.extend(quad(
            Point3::new(-5.0, -2.0, -5.0),
            Point3::new(-5.0, -2.0, 15.0),
            Point3::new(-5.0, 8.0, 15.0),
            Point3::new(-5.0, 8.0, -5.0),
            1,
        ));
        // Right wall (green).
        triangles.extend(quad(
            Point3::new(5.0, -2.0, 15.0),
            Point3::new(5.0, -2.0, -5.0),
            Point3::new(5.0, 8.0, -5.0),
            Point3::new(5.0, 8.0, 15.0),
            2,
        ));

        let spheres = vec![
            Sphere::new(Point3::new(-2.0, -0.5, 8.0), 1.5, 3),
            Sphere::new(Point3::new(1.8, -0.8, 6.0), 1.2, 4),
        ];

        let lights = vec![Light::new(
            Point3::new(0.0, 7.5, 6.0),
            0.8,
            ColorRgb::new(40.0, 40.0, 40.0),
        )];

        info!("Built default Cornell-like scene: {} triangles, {} spheres, {} lights", triangles.len(), spheres.len(), lights.len());

        Self::create(spheres, triangles, materials, lights, None, bvh_bins)
    }

    /// Intersects spheres, lights, and the triangles, merging by nearest
    /// `t`. `hit_id` namespaces: `[0, spheres.len())` spheres, next
    /// `lights.len()` lights, remainder triangles. `use_bvh=false` walks the
    /// triangle list directly, bypassing acceleration (useful for A/B
    /// comparisons against the BVH path).
    pub fn intersect(&self, ray: &mut Ray, use_bvh: bool) -> bool {
        let mut hit = false;
        for (index, sphere) in self.spheres.iter().enumerate() {
            if sphere.intersect(ray, index as u32) {
                hit = true;
            }
        }
        let light_offset = self.spheres.len() as u32;
        for (index, light) in self.lights.iter().enumerate() {
            if light.intersect(ray, light_offset + index as u32) {
                hit = true;
            }
        }
        let triangle_offset = light_offset + self.lights.len() as u32;
        if use_bvh {
            if self.bvh.intersect(ray, &self.triangles, triangle_offset) {
                hit = true;
            }
        } else {
            for (index, triangle) in self.triangles.iter().enumerate() {
                if triangle.intersect(ray, triangle_offset + index as u32).is_some() {
                    hit = true;
                }
            }
        }
        hit
    }

    pub fn intersect_occlusion(&self, ray: &Ray, use_bvh: bool) -> bool {
        for sphere in &self.spheres {
            if sphere.intersect_occlusion(ray) {
                return true;
            }
        }
        for light in &self.lights {
            if light.intersect_occlusion(ray) {
                return true;
            }
        }
        if use_bvh {
            self.bvh.intersect_occlusion(ray, &self.triangles)
        } else {
            self.triangles.iter().any(|triangle| triangle.intersect_occlusion(ray))
        }
    }

    pub fn is_sphere_hit(&self, hit_id: u32) -> bool {
        (hit_id as usize) < self.spheres.len()
    }

    pub fn is_light_hit(&self, hit_id: u32) -> Option<usize> {
        let offset = self.spheres.len() as u32;
        let end = offset + self.lights.len() as u32;
        if hit_id >= offset && hit_id < end {
            Some((hit_id - offset) as usize)
        } else {
            None
        }
    }

    pub fn triangle_index(&self, hit_id: u32) -> Option<usize> {
        let offset = self.spheres.len() as u32 + self.lights.len() as u32;
        if hit_id >= offset {
            Some((hit_id - offset) as usize)
        } else {
            None
        }
    }
}
