/// Default male share when no ratio is supplied.
///
/// An even split is a declared simplification for the chart layer, not a
/// statistical estimate.
pub const DEFAULT_MALE_RATIO: u8 = 50;

/// Split a predicted total into (male, female) counts.
///
/// `male_ratio_percent` must already be clamped to [0, 100] by the caller.
/// No rounding happens here; display precision is the caller's decision,
/// and `male + female` always equals `total` exactly.
pub fn split(total: f64, male_ratio_percent: u8) -> (f64, f64) {
    let male = total * f64::from(male_ratio_percent) / 100.0;
    let female = total - male;
    (male, female)
}
