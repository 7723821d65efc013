use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Used for every fractional simulation quantity (seconds, progress,
/// efficiency, storage volume, satisfaction) so that repeated add/subtract
/// of the same values is exact and runs are reproducible.
pub type Fixed64 = I32F32;

/// Discrete step counter.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display, never in sim loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Clamp a value into `[0, 1]`.
#[inline]
pub fn clamp01(v: Fixed64) -> Fixed64 {
    v.clamp(Fixed64::ZERO, Fixed64::ONE)
}

/// `numerator / denominator` as a fixed-point ratio. A zero denominator
/// yields zero; a quotient past the integer range saturates to
/// [`Fixed64::MAX`].
#[inline]
pub fn ratio(numerator: u32, denominator: u32) -> Fixed64 {
    if denominator == 0 {
        return Fixed64::ZERO;
    }
    // Q32.32 bits of the quotient, truncated like fixed-point division.
    let bits = (u64::from(numerator) << 32) / u64::from(denominator);
    i64::try_from(bits).map_or(Fixed64::MAX, Fixed64::from_bits)
}
