use super::*;

use rand::{Rng as _, SeedableRng};
use rand_xorshift::XorShiftRng;

/// Per-thread xorshift PRNG. Deliberately not `Sync`/shared: every sample
/// creates its own `Rng` seeded from `(frame, pixel_index)` so rendering
/// stays reproducible under `rayon`'s work-stealing without any shared
/// mutable state.
pub struct Rng {
    state: XorShiftRng,
}

impl Rng {
    pub fn new(frame: u32, pixel_index: u32) -> Self {
        let seed = frame.wrapping_mul(0x9e37_79b9) ^ pixel_index.wrapping_mul(0x85eb_ca6b);
        let seed = if seed == 0 { 0x9e37_79b9 } else { seed };
        Self {
            state: XorShiftRng::seed_from_u64(seed as u64),
        }
    }

    /// Uniform float in `[0, 1)`.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.state.gen_range(0.0..1.0)
    }

    #[inline]
    pub fn next_index(&mut self, count: usize) -> usize {
        self.state.gen_range(0..count)
    }
}
