use core::f32::consts::SQRT_2;

#[inline]
pub fn constant_power(pan: f32) -> (f32, f32) {
    let angle = ((pan.clamp(-1.0, 1.0) + 1.0) * 0.5) * core::f32::consts::FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// Stereo balance built on the constant-power curve: unity on both sides at
/// the center, the far side fading out as the pan moves away from it.
#[inline]
pub fn balance(pan: f32) -> (f32, f32) {
    let (left, right) = constant_power(pan);
    ((left * SQRT_2).min(1.0), (right * SQRT_2).min(1.0))
}
