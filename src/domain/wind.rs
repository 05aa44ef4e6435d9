use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const CARDINALS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Wind direction, normalized into `[0, 360)` degrees at construction
/// (450 → 90, −90 → 270). Unlike the other scalars this never fails to
/// construct — out-of-range input is wrapped, not rejected, because wind
/// direction is inherently circular.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
pub struct WindDirection(f64);

impl WindDirection {
    pub fn new(degrees: f64) -> Self {
        WindDirection(degrees.rem_euclid(360.0))
    }

    pub fn degrees(self) -> f64 {
        self.0
    }

    /// Nearest of 16 compass sectors (22.5° each), e.g. N, NNE, NE, ...
    pub fn cardinal(self) -> &'static str {
        let sector = ((self.0 / 22.5).round() as usize) % 16;
        CARDINALS[sector]
    }

    /// Circular mean of a set of wind directions via vector-sum / atan2,
    /// avoiding the 359°+1° wraparound pathology of a naive scalar mean
    /// (spec.md §4.7, §9). Empty input returns 0°.
    pub fn circular_mean(directions: &[WindDirection]) -> WindDirection {
        if directions.is_empty() {
            return WindDirection(0.0);
        }
        let (mut sin_sum, mut cos_sum) = (0.0, 0.0);
        for d in directions {
            let radians = d.0.to_radians();
            sin_sum += radians.sin();
            cos_sum += radians.cos();
        }
        let mean_radians = sin_sum.atan2(cos_sum);
        WindDirection::new(mean_radians.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_overflow() {
        assert_eq!(WindDirection::new(450.0).degrees(), 90.0);
    }

    #[test]
    fn normalizes_negative() {
        assert_eq!(WindDirection::new(-90.0).degrees(), 270.0);
    }

    #[test]
    fn normalizes_exact_360() {
        assert_eq!(WindDirection::new(360.0).degrees(), 0.0);
    }

    #[test]
    fn cardinal_names_at_sector_centers() {
        assert_eq!(WindDirection::new(0.0).cardinal(), "N");
        assert_eq!(WindDirection::new(90.0).cardinal(), "E");
        assert_eq!(WindDirection::new(180.0).cardinal(), "S");
        assert_eq!(WindDirection::new(270.0).cardinal(), "W");
        assert_eq!(WindDirection::new(22.5).cardinal(), "NNE");
    }

    #[test]
    fn circular_mean_handles_wraparound() {
        // 359 and 1 should average to ~0, not ~180 as a naive mean would.
        let mean = WindDirection::circular_mean(&[WindDirection::new(359.0), WindDirection::new(1.0)]);
        assert!(mean.degrees() < 2.0 || mean.degrees() > 358.0);
    }

    #[test]
    fn circular_mean_of_opposite_cardinals() {
        let mean = WindDirection::circular_mean(&[WindDirection::new(0.0), WindDirection::new(90.0)]);
        assert!((mean.degrees() - 45.0).abs() < 1e-6);
    }

    #[test]
    fn circular_mean_of_empty_is_zero() {
        assert_eq!(WindDirection::circular_mean(&[]).degrees(), 0.0);
    }

    #[test]
    fn property_raw_equals_normalized_mod_360(
    ) {
        for d in [-720.0, -45.0, 0.0, 90.0, 360.0, 450.0, 1080.5] {
            let constructed = WindDirection::new(d).degrees();
            let expected = ((d % 360.0) + 360.0) % 360.0;
            assert!((constructed - expected).abs() < 1e-9, "d={d}");
        }
    }
}
