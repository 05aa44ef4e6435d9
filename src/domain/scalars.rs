use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{InvalidScalar, ScalarKind};

/// Derived from Celsius on demand; never stored directly.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Fahrenheit(f64);

impl Fahrenheit {
    pub fn new(value: f64) -> Self {
        Fahrenheit(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Wind speed in km/h — the unit Open-Meteo's endpoints report. Converted to
/// m/s by the fetcher before it ever reaches the rest of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct KmPerHour(f64);

impl KmPerHour {
    pub fn new(value: f64) -> Self {
        KmPerHour(value)
    }

    pub fn to_meters_per_second(self) -> f64 {
        self.0 / 3.6
    }
}

/// Distance in kilometers, derived from meters on demand.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Kilometers(f64);

impl Kilometers {
    pub fn from_meters(meters: f64) -> Self {
        Kilometers(meters / 1000.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

macro_rules! percent_scalar {
    ($name:ident, $kind:expr) => {
        #[doc = "Percentage scalar constrained to `[0, 100]`."]
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
        pub struct $name(f64);

        impl $name {
            pub fn new(value: f64) -> Result<Self, InvalidScalar> {
                if !(0.0..=100.0).contains(&value) {
                    return Err(InvalidScalar {
                        kind: $kind,
                        value,
                    });
                }
                Ok($name(value))
            }

            pub fn value(self) -> f64 {
                self.0
            }
        }
    };
}

percent_scalar!(Humidity, ScalarKind::Humidity);
percent_scalar!(CloudCover, ScalarKind::CloudCover);

/// Precipitation amount in millimeters. Never negative by construction;
/// the `clamped` constructor is the single sanctioned exception, used only
/// by the aggregator when reducing upstream model noise (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
pub struct Millimeters(f64);

impl Millimeters {
    pub fn new(value: f64) -> Result<Self, InvalidScalar> {
        if value < 0.0 {
            return Err(InvalidScalar {
                kind: ScalarKind::Millimeters,
                value,
            });
        }
        Ok(Millimeters(value))
    }

    /// Maps negative upstream noise to zero instead of failing. Used only
    /// by the aggregator; everywhere else `new` is the validating path.
    pub fn clamped(value: f64) -> Self {
        Millimeters(value.max(0.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// UV index category, per common meteorological convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UvCategory {
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

/// UV index — raw magnitude, unbounded above (can exceed 11 at altitude).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
pub struct UvIndex(f64);

impl UvIndex {
    pub fn new(value: f64) -> Result<Self, InvalidScalar> {
        if value < 0.0 {
            return Err(InvalidScalar {
                kind: ScalarKind::UvIndex,
                value,
            });
        }
        Ok(UvIndex(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn category(self) -> UvCategory {
        match self.0 {
            v if v < 3.0 => UvCategory::Low,
            v if v < 6.0 => UvCategory::Moderate,
            v if v < 8.0 => UvCategory::High,
            v if v < 11.0 => UvCategory::VeryHigh,
            _ => UvCategory::Extreme,
        }
    }
}

/// Visibility category, per common meteorological convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VisibilityCategory {
    VeryPoor,
    Poor,
    Moderate,
    Good,
    Excellent,
}

/// Visibility distance in meters, as reported by Open-Meteo.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
pub struct Visibility(f64);

impl Visibility {
    pub fn new(value: f64) -> Result<Self, InvalidScalar> {
        if value < 0.0 {
            return Err(InvalidScalar {
                kind: ScalarKind::Visibility,
                value,
            });
        }
        Ok(Visibility(value))
    }

    pub fn meters(self) -> f64 {
        self.0
    }

    pub fn kilometers(self) -> Kilometers {
        Kilometers::from_meters(self.0)
    }

    pub fn category(self) -> VisibilityCategory {
        match self.0 {
            v if v < 1_000.0 => VisibilityCategory::VeryPoor,
            v if v < 4_000.0 => VisibilityCategory::Poor,
            v if v < 10_000.0 => VisibilityCategory::Moderate,
            v if v < 20_000.0 => VisibilityCategory::Good,
            _ => VisibilityCategory::Excellent,
        }
    }
}

/// Pressure category, per common meteorological convention (sea-level hPa).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PressureCategory {
    Low,
    Normal,
    High,
}

/// Atmospheric pressure in hPa.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
pub struct Pressure(f64);

impl Pressure {
    pub fn new(value: f64) -> Result<Self, InvalidScalar> {
        if value <= 0.0 {
            return Err(InvalidScalar {
                kind: ScalarKind::Pressure,
                value,
            });
        }
        Ok(Pressure(value))
    }

    pub fn hpa(self) -> f64 {
        self.0
    }

    pub fn category(self) -> PressureCategory {
        match self.0 {
            v if v < 1009.0 => PressureCategory::Low,
            v if v < 1023.0 => PressureCategory::Normal,
            _ => PressureCategory::High,
        }
    }
}

/// An IANA timezone identifier (e.g. `"Europe/Dublin"`). Validity is a
/// query, not a construction precondition (spec.md §3) — a `TimezoneId`
/// can be built from any string and later checked against `chrono-tz`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimezoneId(String);

impl TimezoneId {
    pub fn new(id: impl Into<String>) -> Self {
        TimezoneId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identifier resolves to a known IANA timezone.
    pub fn is_valid(&self) -> bool {
        self.0.parse::<chrono_tz::Tz>().is_ok()
    }

    pub fn to_chrono_tz(&self) -> Option<chrono_tz::Tz> {
        self.0.parse().ok()
    }
}

impl PartialOrd for TimezoneId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimezoneId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humidity_in_range() {
        assert_eq!(Humidity::new(55.0).unwrap().value(), 55.0);
        assert!(Humidity::new(-1.0).is_err());
        assert!(Humidity::new(100.1).is_err());
    }

    #[test]
    fn cloud_cover_boundaries() {
        assert!(CloudCover::new(0.0).is_ok());
        assert!(CloudCover::new(100.0).is_ok());
    }

    #[test]
    fn millimeters_rejects_negative() {
        assert!(Millimeters::new(-0.5).is_err());
        assert_eq!(Millimeters::new(0.0).unwrap().value(), 0.0);
    }

    #[test]
    fn millimeters_clamped_maps_negative_to_zero() {
        assert_eq!(Millimeters::clamped(-3.2).value(), 0.0);
        assert_eq!(Millimeters::clamped(4.1).value(), 4.1);
    }

    #[test]
    fn uv_index_category_bands() {
        assert_eq!(UvIndex::new(1.0).unwrap().category(), UvCategory::Low);
        assert_eq!(UvIndex::new(4.0).unwrap().category(), UvCategory::Moderate);
        assert_eq!(UvIndex::new(7.0).unwrap().category(), UvCategory::High);
        assert_eq!(
            UvIndex::new(9.0).unwrap().category(),
            UvCategory::VeryHigh
        );
        assert_eq!(UvIndex::new(12.0).unwrap().category(), UvCategory::Extreme);
    }

    #[test]
    fn visibility_category_bands() {
        assert_eq!(
            Visibility::new(500.0).unwrap().category(),
            VisibilityCategory::VeryPoor
        );
        assert_eq!(
            Visibility::new(25_000.0).unwrap().category(),
            VisibilityCategory::Excellent
        );
    }

    #[test]
    fn pressure_category_bands() {
        assert_eq!(Pressure::new(1000.0).unwrap().category(), PressureCategory::Low);
        assert_eq!(
            Pressure::new(1013.0).unwrap().category(),
            PressureCategory::Normal
        );
        assert_eq!(
            Pressure::new(1030.0).unwrap().category(),
            PressureCategory::High
        );
    }

    #[test]
    fn pressure_rejects_non_positive() {
        assert!(Pressure::new(0.0).is_err());
        assert!(Pressure::new(-5.0).is_err());
    }

    #[test]
    fn timezone_id_validity_is_a_query() {
        let valid = TimezoneId::new("Europe/Dublin");
        assert!(valid.is_valid());
        let invalid = TimezoneId::new("Not/A_Zone");
        assert!(!invalid.is_valid());
    }

    #[test]
    fn timezone_id_ordering_is_lexicographic() {
        let a = TimezoneId::new("Europe/Dublin");
        let b = TimezoneId::new("Europe/Zurich");
        assert!(a < b);
    }

    #[test]
    fn km_per_hour_to_meters_per_second() {
        let kmh = KmPerHour::new(36.0);
        assert!((kmh.to_meters_per_second() - 10.0).abs() < 1e-9);
    }
}
