/// White noise from a 64-bit linear congruential generator. Deterministic for
/// a given seed, so renders are reproducible.
#[derive(Debug, Clone, Copy)]
pub struct WhiteNoise {
    seed: u64,
}

impl Default for WhiteNoise {
    fn default() -> Self {
        Self::new(0xDEAD_BEEF_CAFE_BABE)
    }
}

impl WhiteNoise {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Uniform sample in `[-1, 1)`.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        // 64-bit LCG parameters from Numerical Recipes
        self.seed = self.seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bits = (self.seed >> 41) as u32;
        let value = bits as f32 / (1u32 << 23) as f32;
        value * 2.0 - 1.0
    }
}
