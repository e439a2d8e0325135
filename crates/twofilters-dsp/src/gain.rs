#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.max(1.0e-9).log10()
}

/// Cubic control law: a linear knob position maps to an amplitude that
/// sounds evenly spaced.
#[inline]
pub fn cubic_amplitude(position: f32) -> f32 {
    let x = position.max(0.0);
    x * x * x
}

/// Knob position giving `db` under [`cubic_amplitude`].
#[inline]
pub fn cubic_position_for_db(db: f32) -> f32 {
    db_to_linear(db).cbrt()
}
