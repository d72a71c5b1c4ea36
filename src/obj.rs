use super::*;

/// Minimal OBJ + MTL importer. Reads `v`/`vt`/`vn`/`f` records and a paired
/// material file; non-triangle faces are rejected rather than triangulated.
/// `names[i]` is the MTL name for `materials[i]` (empty for the synthetic
/// default material at index 0), so callers can apply [`MaterialOverride`]s
/// after loading.
pub fn load(obj_path: &Path) -> Result<(Vec<Triangle>, Vec<Material>, Vec<String>)> {
    let text = std::fs::read_to_string(obj_path)
        .with_context(|| format!("Reading OBJ file: {}", obj_path.display()))?;

    let mut positions: Vec<Point3> = Vec::new();
    let mut tex_coords: Vec<Point2> = Vec::new();
    let mut materials_by_name: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut materials: Vec<Material> = vec![Material::new(ColorRgb::WHITE, 0.0, 0.0, 1.0)];
    let mut names: Vec<String> = vec![String::new()];
    let mut current_material = 0u32;
    let mut triangles: Vec<Triangle> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(tag) = tokens.next() else { continue };

        match tag {
            "mtllib" => {
                if let Some(name) = tokens.next() {
                    let mtl_path = obj_path
                        .parent()
                        .map(|dir| dir.join(name))
                        .unwrap_or_else(|| PathBuf::from(name));
                    if mtl_path.exists() {
                        let loaded = load_mtl(&mtl_path)?;
                        for (name, material) in loaded {
                            materials_by_name.insert(name.clone(), materials.len());
                            names.push(name);
                            materials.push(material);
                        }
                    } else {
                        warn!("Could not find referenced material file: {}", mtl_path.display());
                    }
                }
            }
            "usemtl" => {
                if let Some(name) = tokens.next() {
                    current_material = match materials_by_name.get(name) {
                        Some(&index) => index as u32,
                        None => {
                            warn!("Could not find material called {name}");
                            0
                        }
                    };
                }
            }
            "v" => {
                let (x, y, z) = parse_vec3(tokens, line_no)?;
                positions.push(Point3::new(x, y, z));
            }
            "vt" => {
                let mut values = tokens.map(|t| t.parse::<f32>());
                let u = values
                    .next()
                    .ok_or_else(|| anyhow!("Malformed vt record at line {}", line_no + 1))??;
                let v = values.next().transpose()?.unwrap_or(0.0);
                tex_coords.push(Point2::new(u, v));
            }
            "vn" => {
                // Face normals are recomputed from positions; skip.
            }
            "f" => {
                let indices: Vec<&str> = tokens.collect();
                if indices.len() != 3 {
                    bail!(
                        "Face at line {} has {} vertices; only triangles are supported",
                        line_no + 1,
                        indices.len()
                    );
                }
                let mut verts = [(0usize, None::<usize>); 3];
                for (slot, token) in indices.iter().enumerate() {
                    let mut parts = token.split('/');
                    let p = parts
                        .next()
                        .ok_or_else(|| anyhow!("Malformed face record at line {}", line_no + 1))?
                        .parse::<i64>()?;
                    let t = parts.next().filter(|s| !s.is_empty()).map(str::parse::<i64>).transpose()?;
                    verts[slot] = (
                        resolve_index(p, positions.len()),
                        t.map(|t| resolve_index(t, tex_coords.len())),
                    );
                }

                let p0 = positions[verts[0].0];
                let p1 = positions[verts[1].0];
                let p2 = positions[verts[2].0];
                let default_uv = Point2::origin();
                let t0 = verts[0].1.map(|i| tex_coords[i]).unwrap_or(default_uv);
                let t1 = verts[1].1.map(|i| tex_coords[i]).unwrap_or(default_uv);
                let t2 = verts[2].1.map(|i| tex_coords[i]).unwrap_or(default_uv);

                triangles.push(Triangle::new(p0, p1, p2, t0, t1, t2, current_material));
            }
            _ => {}
        }
    }

    info!(
        "Loaded OBJ {}: {} triangles, {} materials",
        obj_path.display(),
        triangles.len(),
        materials.len()
    );

    Ok((triangles, materials, names))
}

/// Applies [`MaterialOverride`]s, matched by MTL name, in place. Overrides
/// naming a material absent from `names` are logged and skipped rather than
/// treated as an error, since a scene config is expected to outlive edits to
/// the OBJ/MTL it points at.
pub fn apply_material_overrides(materials: &mut [Material], names: &[String], overrides: &[MaterialOverride]) {
    for over in overrides {
        let Some(index) = names.iter().position(|name| name == &over.name) else {
            warn!("Material override for {} did not match any loaded material", over.name);
            continue;
        };
        let material = &mut materials[index];
        if let Some(albedo) = over.albedo {
            material.albedo = albedo;
        }
        if let Some(reflection) = over.reflection {
            material.reflection = reflection;
        }
        if let Some(refraction) = over.refraction {
            material.refraction = refraction;
        }
        if let Some(ior) = over.ior {
            material.ior = ior;
        }
    }
}

fn resolve_index(raw: i64, len: usize) -> usize {
    if raw > 0 {
        (raw - 1) as usize
    } else {
        (len as i64 + raw) as usize
    }
}

fn parse_vec3<'a>(mut tokens: impl Iterator<Item = &'a str>, line_no: usize) -> Result<(f32, f32, f32)> {
    let mut next = || -> Result<f32> {
        tokens
            .next()
            .ok_or_else(|| anyhow!("Malformed vertex record at line {}", line_no + 1))?
            .parse::<f32>()
            .context("Parsing vertex coordinate")
    };
    Ok((next()?, next()?, next()?))
}

/// Reads `Kd` (diffuse), nonstandard `Pr`/`Pf`/`Ni` comment-prefixed
/// extension fields for reflection/refraction/IOR (OBJ/MTL has no native
/// physically-based fields), `Ke` for emission, and `map_Kd` for a diffuse
/// texture loaded relative to the MTL file's own directory.
fn load_mtl(path: &Path) -> Result<Vec<(String, Material)>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Reading MTL file: {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut result = Vec::new();
    let mut name = String::new();
    let mut albedo = ColorRgb::WHITE;
    let mut reflection = 0.0f32;
    let mut refraction = 0.0f32;
    let mut ior = 1.0f32;
    let mut emission = ColorRgb::BLACK;
    let mut map_kd: Option<PathBuf> = None;
    let mut has_current = false;

    let flush = |result: &mut Vec<(String, Material)>, name: &str, albedo, reflection, refraction, ior, emission, map_kd: &Option<PathBuf>| {
        let mut material = Material::new(albedo, reflection, refraction, ior).with_emission(emission);
        if let Some(texture_path) = map_kd {
            match load_texture(texture_path) {
                Ok(texture) => material = material.with_texture(texture),
                Err(err) => warn!("Could not load texture {}: {err}", texture_path.display()),
            }
        }
        result.push((name.to_owned(), material));
    };

    for line in text.lines() {
        let line = line.trim();
        let mut tokens = line.split_whitespace();
        let Some(tag) = tokens.next() else { continue };
        match tag {
            "newmtl" => {
                if has_current {
                    flush(&mut result, &name, albedo, reflection, refraction, ior, emission, &map_kd);
                }
                name = tokens.next().unwrap_or_default().to_owned();
                albedo = ColorRgb::WHITE;
                reflection = 0.0;
                refraction = 0.0;
                ior = 1.0;
                emission = ColorRgb::BLACK;
                map_kd = None;
                has_current = true;
            }
            "Kd" => albedo = parse_color(tokens).unwrap_or(albedo),
            "Ke" => emission = parse_color(tokens).unwrap_or(emission),
            "Pr" => reflection = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(reflection),
            "Pf" => refraction = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(refraction),
            "Ni" => ior = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(ior),
            "map_Kd" => map_kd = tokens.next().map(|name| base_dir.join(name)),
            _ => {}
        }
    }
    if has_current {
        flush(&mut result, &name, albedo, reflection, refraction, ior, emission, &map_kd);
    }

    Ok(result)
}

/// Decodes an image file into a nearest-neighbor-sampled [`Texture`],
/// converting its 8-bit channels out of the output surface's gamma curve
/// and into the linear space shading operates in.
fn load_texture(path: &Path) -> Result<Texture> {
    let image = imagelib::open(path)
        .with_context(|| format!("Reading texture {}", path.display()))?
        .into_rgb8();
    let (width, height) = image.dimensions();
    let pixels = image
        .pixels()
        .map(|p| ColorRgb::new(f32::from(p[0]) / 255.0, f32::from(p[1]) / 255.0, f32::from(p[2]) / 255.0).gamma_decode())
        .collect();
    Ok(Texture::Image {
        width,
        height,
        pixels,
    })
}

fn parse_color<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<ColorRgb> {
    let r = tokens.next()?.parse().ok()?;
    let g = tokens.next()?.parse().ok()?;
    let b = tokens.next()?.parse().ok()?;
    Some(ColorRgb::new(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_triangle_face() {
        let dir = std::env::temp_dir().join(format!("pathtracer-obj-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("quad.obj");
        std::fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
        )
        .unwrap();

        let result = load(&path);
        assert!(result.is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_loads_single_triangle() {
        let dir = std::env::temp_dir().join(format!("pathtracer-obj-test2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tri.obj");
        std::fs::write(
            &path,
            "v -1 -1 0\nv 1 -1 0\nv 0 1 0\nf 1 2 3\n",
        )
        .unwrap();

        let (triangles, _materials, _names) = load(&path).unwrap();
        assert_eq!(triangles.len(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_material_override_matches_by_name() {
        let mut materials = vec![Material::new(ColorRgb::WHITE, 0.0, 0.0, 1.0)];
        let names = vec!["glossy".to_owned()];
        let overrides = vec![MaterialOverride {
            name: "glossy".to_owned(),
            albedo: Some(ColorRgb::new(0.2, 0.3, 0.4)),
            reflection: Some(0.5),
            refraction: None,
            ior: None,
        }];
        apply_material_overrides(&mut materials, &names, &overrides);
        assert_eq!(materials[0].albedo, ColorRgb::new(0.2, 0.3, 0.4));
        assert!((materials[0].reflection - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_material_override_unknown_name_is_skipped() {
        let mut materials = vec![Material::new(ColorRgb::WHITE, 0.0, 0.0, 1.0)];
        let names = vec!["glossy".to_owned()];
        let overrides = vec![MaterialOverride {
            name: "missing".to_owned(),
            albedo: Some(ColorRgb::new(0.2, 0.3, 0.4)),
            reflection: None,
            refraction: None,
            ior: None,
        }];
        apply_material_overrides(&mut materials, &names, &overrides);
        assert_eq!(materials[0].albedo, ColorRgb::WHITE);
    }

    #[test]
    fn test_map_kd_attaches_a_texture_relative_to_the_mtl_file() {
        let dir = std::env::temp_dir().join(format!("pathtracer-obj-test-tex-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let texture_path = dir.join("albedo.png");
        imagelib::RgbImage::from_pixel(2, 2, imagelib::Rgb([255, 0, 0]))
            .save(&texture_path)
            .unwrap();

        let mtl_path = dir.join("tri.mtl");
        std::fs::write(&mtl_path, "newmtl textured\nKd 1 1 1\nmap_Kd albedo.png\n").unwrap();

        let obj_path = dir.join("tri.obj");
        std::fs::write(
            &obj_path,
            "mtllib tri.mtl\nusemtl textured\nv -1 -1 0\nv 1 -1 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1 2/2 3/3\n",
        )
        .unwrap();

        let (_triangles, materials, names) = load(&obj_path).unwrap();
        let index = names.iter().position(|n| n == "textured").unwrap();
        assert!(materials[index].texture.is_some());
        let sampled = materials[index].albedo_at(Point2::new(0.5, 0.5));
        assert!(sampled.r() > sampled.g() && sampled.r() > sampled.b());

        std::fs::remove_dir_all(&dir).ok();
    }
}
