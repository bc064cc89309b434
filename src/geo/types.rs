//! Core types for the geocoding subsystem.

use std::fmt;

/// A raw coordinate pair from a shared location.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Cache key for reverse-geocode results: the quantized string form of a
/// coordinate pair. Two events with identical raw coordinates collapse to one
/// entry; equality is exact on the stored string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoordinateKey(String);

impl CoordinateKey {
    pub fn from_coords(coords: Coordinates) -> Self {
        Self(format!("{:.6}_{:.6}", coords.lat, coords.lon))
    }
}

impl fmt::Display for CoordinateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single provider call failure. Never escapes the resolver: the fallback
/// chain consumes these and degrades to "no usable value".
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}
