pub const DEFAULT_MAX_POINTS: u32 = 20_000;
pub const MIN_MAX_POINTS: u32 = 1_000;
pub const MAX_MAX_POINTS: u32 = 100_000;

pub fn clamp_max_points(max_points: Option<u32>) -> u32 {
    max_points
        .unwrap_or(DEFAULT_MAX_POINTS)
        .clamp(MIN_MAX_POINTS, MAX_MAX_POINTS)
}

/// `ceil(total / max_points)`, never below 1.
pub fn sample_step(total: u64, max_points: u32) -> u64 {
    let max_points = u64::from(max_points.max(1));
    if total <= max_points {
        1
    } else {
        total.div_ceil(max_points)
    }
}

/// Number of 1-based ranks in `1..=total` divisible by `step`.
pub fn sampled_count(total: u64, step: u64) -> u64 {
    total / step.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_points_are_clamped() {
        assert_eq!(clamp_max_points(None), 20_000);
        assert_eq!(clamp_max_points(Some(10)), 1_000);
        assert_eq!(clamp_max_points(Some(5_000)), 5_000);
        assert_eq!(clamp_max_points(Some(1_000_000)), 100_000);
    }

    #[test]
    fn step_is_ceiling_of_ratio() {
        assert_eq!(sample_step(0, 2_000), 1);
        assert_eq!(sample_step(2_000, 2_000), 1);
        assert_eq!(sample_step(10_000, 2_000), 5);
        assert_eq!(sample_step(10_001, 2_000), 6);
        assert_eq!(sampled_count(10_000, 5), 2_000);
        assert_eq!(sampled_count(10_001, 6), 1_666);
    }
}
