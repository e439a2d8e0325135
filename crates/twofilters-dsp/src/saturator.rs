/// Input range of [`soft_clip`]; beyond it the polynomial would turn back.
pub const SOFT_CLIP_LIMIT: f32 = 2.0;

/// Rational `x(27 + x²) / (27 + 9x²)` saturator. Input is clamped to
/// `[-2, 2]` first, which keeps the output inside `[-1, 1]`.
#[inline]
pub fn soft_clip(sample: f32) -> f32 {
    let x = sample.clamp(-SOFT_CLIP_LIMIT, SOFT_CLIP_LIMIT);
    let a = x * x;
    (x * (27.0 + a)) / (27.0 + 9.0 * a)
}
