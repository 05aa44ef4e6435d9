//! Validated scalar and composite domain types (Unit/Domain Types, C1).
//!
//! Every scalar here is a thin wrapper over a numeric magnitude whose
//! constructor enforces a range invariant and never silently clamps,
//! except for the explicit `clamped` constructors used only by
//! aggregation inputs that originate from upstream noise.

mod error;
mod scalars;
mod wind;

pub use error::{InvalidScalar, ScalarKind};
pub use scalars::{
    CloudCover, Fahrenheit, Humidity, Kilometers, KmPerHour, Millimeters, Pressure,
    PressureCategory, TimezoneId, UvIndex, UvCategory, Visibility, VisibilityCategory,
};
pub use wind::WindDirection;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Temperature in Celsius. Unbounded — extreme readings are still valid data.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
pub struct Celsius(f64);

impl Celsius {
    pub fn new(value: f64) -> Self {
        Celsius(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Derived quantity, computed on demand — never stored.
    pub fn to_fahrenheit(self) -> Fahrenheit {
        Fahrenheit::new(self.0 * 9.0 / 5.0 + 32.0)
    }
}

/// Latitude in degrees, constrained to `[-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
pub struct Latitude(f64);

impl Latitude {
    pub fn new(value: f64) -> Result<Self, InvalidScalar> {
        if !(-90.0..=90.0).contains(&value) {
            return Err(InvalidScalar {
                kind: ScalarKind::Latitude,
                value,
            });
        }
        Ok(Latitude(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Longitude in degrees, constrained to `[-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, ToSchema)]
pub struct Longitude(f64);

impl Longitude {
    pub fn new(value: f64) -> Result<Self, InvalidScalar> {
        if !(-180.0..=180.0).contains(&value) {
            return Err(InvalidScalar {
                kind: ScalarKind::Longitude,
                value,
            });
        }
        Ok(Longitude(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// A validated geographic point. Never mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub latitude: Latitude,
    pub longitude: Longitude,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidScalar> {
        Ok(Coordinates {
            latitude: Latitude::new(latitude)?,
            longitude: Longitude::new(longitude)?,
        })
    }

    /// Rounded to 4 decimal places — used by the cache key (spec.md §4.9)
    /// so that near-identical requests collapse onto one key.
    pub fn rounded_key(&self) -> (i64, i64) {
        (
            (self.latitude.value() * 10_000.0).round() as i64,
            (self.longitude.value() * 10_000.0).round() as i64,
        )
    }
}
