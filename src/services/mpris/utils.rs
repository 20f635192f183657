const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Convert hub seconds to MPRIS microseconds.
///
/// Negative and non-finite inputs map to zero.
#[allow(clippy::cast_possible_truncation)]
pub fn to_mpris_micros(seconds: f64) -> i64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * MICROS_PER_SECOND).round() as i64
}

/// Convert MPRIS microseconds to hub seconds
#[allow(clippy::cast_precision_loss)]
pub fn from_mpris_micros(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}
