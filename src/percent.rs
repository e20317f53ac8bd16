/// Clamp a percentage reading into `0.0..=100.0`. NaN collapses to 0.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

pub fn round_to_1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / whole` as a clamped percentage; zero when `whole` is zero.
pub fn ratio_percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    clamp_percent(part as f64 / whole as f64 * 100.0)
}
