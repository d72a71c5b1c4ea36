use std::sync::atomic::{AtomicU64, Ordering};

use super::*;

/// Running totals of ray/AABB and ray/triangle tests, read back after a
/// frame to report throughput. Counted with `Ordering::Relaxed` atomics
/// since `rayon` workers traverse concurrently and the numbers are a metric,
/// not something downstream logic branches on.
#[derive(Clone, Copy, Default, Debug)]
pub struct RayBvhHitStats {
    pub rays: u64,
    pub ray_aabb_tests: u64,
    pub ray_aabb_hits: u64,
    pub ray_triangle_tests: u64,
    pub ray_triangle_hits: u64,
}

/// `count > 0` marks a leaf spanning `indices[first..first+count)`.
/// `count == 0` marks an interior node: left child lives at `first`, right
/// at `second`. The tree is built in preorder (parent, then the whole left
/// subtree, then the whole right subtree) so the right child is only
/// `first+1` when the left subtree is a single leaf; `second` is stored
/// explicitly rather than assumed. 36 bytes, `repr(C)` so the pool
/// reinterprets cleanly.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, PartialEq)]
pub struct Node {
    pub bounds: Aabb,
    pub first: u32,
    pub count: u32,
    pub second: u32,
}

impl Node {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

const LEAF_THRESHOLD: usize = 3;
pub const DEFAULT_BUCKET_COUNT: usize = 8;

#[derive(Clone, Copy, Debug)]
struct BuildPrimitive {
    index: u32,
    bounds: Aabb,
    centroid: Point3,
}

#[derive(Clone, Copy, Default)]
struct Bucket {
    count: usize,
    bounds: Aabb,
}

/// A binned-SAH BVH over triangle indices. Built once at scene load from a
/// triangle slice; never mutated afterwards. Traversal takes the same
/// triangle slice again rather than storing a borrow, so `Scene` can own
/// its triangles and BVH side by side without a self-referential lifetime.
pub struct Bvh {
    pub indices: Vec<u32>,
    pub nodes: Vec<Node>,
    pub root: u32,
    rays: AtomicU64,
    ray_aabb_tests: AtomicU64,
    ray_aabb_hits: AtomicU64,
    ray_triangle_tests: AtomicU64,
    ray_triangle_hits: AtomicU64,
}

impl Bvh {
    /// Builds over `triangles`, binning centroids into `bins` buckets per
    /// SAH split evaluation (clamped to at least 2; `RenderConfig::bvh_bins`
    /// feeds this from the caller).
    pub fn build(triangles: &[Triangle], bins: usize) -> Self {
        let bins = bins.max(2);
        let n = triangles.len();
        let mut primitives: Vec<BuildPrimitive> = triangles
            .iter()
            .enumerate()
            .map(|(index, triangle)| {
                let bounds = triangle.aabb();
                BuildPrimitive {
                    index: index as u32,
                    bounds,
                    centroid: bounds.center(),
                }
            })
            .collect();

        let mut nodes = Vec::with_capacity(2 * n.max(1) - 1);
        let mut indices = Vec::with_capacity(n);
        let root = if n == 0 {
            nodes.push(Node {
                bounds: Aabb::empty(),
                first: 0,
                count: 0,
                second: 0,
            });
            0
        } else {
            build_recursive(&mut primitives, &mut nodes, &mut indices, bins)
        };

        Self {
            indices,
            nodes,
            root,
            rays: AtomicU64::new(0),
            ray_aabb_tests: AtomicU64::new(0),
            ray_aabb_hits: AtomicU64::new(0),
            ray_triangle_tests: AtomicU64::new(0),
            ray_triangle_hits: AtomicU64::new(0),
        }
    }

    /// Snapshot of the hit-test counters accumulated since the last
    /// `reset_stats`.
    pub fn stats(&self) -> RayBvhHitStats {
        RayBvhHitStats {
            rays: self.rays.load(Ordering::Relaxed),
            ray_aabb_tests: self.ray_aabb_tests.load(Ordering::Relaxed),
            ray_aabb_hits: self.ray_aabb_hits.load(Ordering::Relaxed),
            ray_triangle_tests: self.ray_triangle_tests.load(Ordering::Relaxed),
            ray_triangle_hits: self.ray_triangle_hits.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.rays.store(0, Ordering::Relaxed);
        self.ray_aabb_tests.store(0, Ordering::Relaxed);
        self.ray_aabb_hits.store(0, Ordering::Relaxed);
        self.ray_triangle_tests.store(0, Ordering::Relaxed);
        self.ray_triangle_hits.store(0, Ordering::Relaxed);
    }

    /// Nearest-hit traversal. Updates `ray.t`/`ray.hit_id` in place and
    /// returns whether anything was hit. `id_offset` lets the caller place
    /// triangle hit ids after the scene's sphere/light ids in a shared
    /// `hit_id` namespace.
    pub fn intersect(&self, ray: &mut Ray, triangles: &[Triangle], id_offset: u32) -> bool {
        self.traverse(ray, triangles, id_offset, false)
    }

    pub fn intersect_occlusion(&self, ray: &Ray, triangles: &[Triangle]) -> bool {
        let mut scratch = *ray;
        self.traverse(&mut scratch, triangles, 0, true)
    }

    fn traverse(&self, ray: &mut Ray, triangles: &[Triangle], id_offset: u32, occlusion_only: bool) -> bool {
        if self.nodes.is_empty() || triangles.is_empty() {
            return false;
        }

        self.rays.fetch_add(1, Ordering::Relaxed);
        let mut hit_any = false;
        let mut stack = [0u32; 64];
        let mut stack_len = 0usize;
        stack[stack_len] = self.root;
        stack_len += 1;

        while stack_len > 0 {
            stack_len -= 1;
            let node = &self.nodes[stack[stack_len] as usize];

            self.ray_aabb_tests.fetch_add(1, Ordering::Relaxed);
            match intersect_aabb(ray, &node.bounds) {
                Some((tmin, _)) if tmin <= ray.t => {
                    self.ray_aabb_hits.fetch_add(1, Ordering::Relaxed);
                }
                _ => continue,
            }

            if node.is_leaf() {
                let start = node.first as usize;
                let end = start + node.count as usize;
                for &index in &self.indices[start..end] {
                    let triangle = &triangles[index as usize];
                    self.ray_triangle_tests.fetch_add(1, Ordering::Relaxed);
                    if occlusion_only {
                        if triangle.intersect_occlusion(ray) {
                            self.ray_triangle_hits.fetch_add(1, Ordering::Relaxed);
                            return true;
                        }
                    } else if triangle.intersect(ray, id_offset + index).is_some() {
                        self.ray_triangle_hits.fetch_add(1, Ordering::Relaxed);
                        hit_any = true;
                    }
                }
                continue;
            }

            let left = node.first as usize;
            let right = node.second as usize;
            let left_box = &self.nodes[left].bounds;
            let right_box = &self.nodes[right].bounds;
            self.ray_aabb_tests.fetch_add(2, Ordering::Relaxed);
            let left_hit = intersect_aabb(ray, left_box);
            let right_hit = intersect_aabb(ray, right_box);
            self.ray_aabb_hits.fetch_add(
                left_hit.is_some() as u64 + right_hit.is_some() as u64,
                Ordering::Relaxed,
            );

            match (left_hit, right_hit) {
                (None, None) => {}
                (Some(_), None) => {
                    stack[stack_len] = left as u32;
                    stack_len += 1;
                }
                (None, Some(_)) => {
                    stack[stack_len] = right as u32;
                    stack_len += 1;
                }
                (Some((l_tmin, _)), Some((r_tmin, _))) => {
                    // Push far first so the near child pops (and can prune) first.
                    if l_tmin <= r_tmin {
                        stack[stack_len] = right as u32;
                        stack[stack_len + 1] = left as u32;
                    } else {
                        stack[stack_len] = left as u32;
                        stack[stack_len + 1] = right as u32;
                    }
                    stack_len += 2;
                }
            }
        }

        hit_any
    }
}

fn build_recursive(
    primitives: &mut [BuildPrimitive],
    nodes: &mut Vec<Node>,
    indices: &mut Vec<u32>,
    bins: usize,
) -> u32 {
    let bounds = primitives
        .iter()
        .fold(Aabb::empty(), |acc, p| acc.grown(&p.bounds));

    let make_leaf = |indices: &mut Vec<u32>, primitives: &[BuildPrimitive], bounds: Aabb, nodes: &mut Vec<Node>| -> u32 {
        let first = indices.len() as u32;
        indices.extend(primitives.iter().map(|p| p.index));
        nodes.push(Node {
            bounds,
            first,
            count: primitives.len() as u32,
            second: 0,
        });
        (nodes.len() - 1) as u32
    };

    if primitives.len() <= LEAF_THRESHOLD {
        return make_leaf(indices, primitives, bounds, nodes);
    }

    let centroid_bounds = Aabb::from_points(primitives.iter().map(|p| &p.centroid));
    let axis = centroid_bounds.longest_axis();
    let cmin = centroid_bounds.bmin()[axis];
    let cmax = centroid_bounds.bmax()[axis];

    if (cmax - cmin).abs() < 1e-7 {
        return make_leaf(indices, primitives, bounds, nodes);
    }

    let bin_len = (cmax - cmin) / bins as f32;
    let bucket_of = |p: &BuildPrimitive| -> usize {
        let b = ((p.centroid[axis] - cmin) / bin_len) as usize;
        b.min(bins - 1)
    };

    let mut buckets = vec![Bucket::default(); bins];
    for p in primitives.iter() {
        let b = &mut buckets[bucket_of(p)];
        b.count += 1;
        b.bounds = b.bounds.grown(&p.bounds);
    }

    let mut best_cost = f32::INFINITY;
    let mut best_split = 0usize;
    for split in 0..bins - 1 {
        let left = buckets[0..=split]
            .iter()
            .fold((0usize, Aabb::empty()), |(count, b), bucket| {
                (count + bucket.count, b.grown(&bucket.bounds))
            });
        let right = buckets[(split + 1)..bins]
            .iter()
            .fold((0usize, Aabb::empty()), |(count, b), bucket| {
                (count + bucket.count, b.grown(&bucket.bounds))
            });
        if left.0 == 0 || right.0 == 0 {
            continue;
        }
        let cost = left.1.area() * left.0 as f32 + right.1.area() * right.0 as f32;
        if cost < best_cost {
            best_cost = cost;
            best_split = split;
        }
    }

    let leaf_cost = bounds.area() * primitives.len() as f32;
    if best_cost >= leaf_cost {
        return make_leaf(indices, primitives, bounds, nodes);
    }

    let mid = itertools::partition(primitives.iter_mut(), |p| bucket_of(p) <= best_split);
    if mid == 0 || mid == primitives.len() {
        return make_leaf(indices, primitives, bounds, nodes);
    }

    let curr = nodes.len();
    nodes.push(Node {
        bounds,
        first: 0,
        count: 0,
        second: 0,
    });

    // Preorder: the left subtree is appended directly after `curr`, so its
    // root always lands at `curr+1`; the right subtree's root can be
    // anywhere after that, so its index is recorded explicitly.
    let (left_primitives, right_primitives) = primitives.split_at_mut(mid);
    let left = build_recursive(left_primitives, nodes, indices, bins);
    let right = build_recursive(right_primitives, nodes, indices, bins);

    nodes[curr].first = left;
    nodes[curr].second = right;
    curr as u32
}
