//! City resolution subsystem.
//!
//! Turns ambiguous user input (shared coordinates or free text) into a
//! canonical city name using two unreliable upstream geocoding providers,
//! with a TTL-bounded cache in front of them.

pub mod cache;
pub mod providers;
pub mod resolver;
pub mod types;

pub use cache::GeocodeCache;
pub use providers::{GeoProvider, GoogleProvider, NominatimProvider};
pub use resolver::CityResolver;
pub use types::{CoordinateKey, Coordinates, GeoError};
