use serde::Serialize;

/// Which scalar type rejected a construction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalarKind {
    Latitude,
    Longitude,
    Humidity,
    CloudCover,
    Millimeters,
    UvIndex,
    Visibility,
    Pressure,
}

/// Out-of-range input rejected at domain-type construction. No silent
/// clamping happens here — see the explicit `clamped` constructors for
/// the one place the spec allows that.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error, Serialize)]
#[error("invalid {kind:?}: {value}")]
pub struct InvalidScalar {
    pub kind: ScalarKind,
    pub value: f64,
}
