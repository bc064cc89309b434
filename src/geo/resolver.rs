//! City resolver: cache lookup plus the provider fallback chain.
//!
//! Reverse flow:  Cache → primary provider → secondary provider → Unknown
//! Forward flow:  primary provider only (existence check, no similarity)
//!
//! Provider failures are absorbed per provider; only exhaustion of the whole
//! chain yields Unknown, and Unknown never populates the cache.

use tracing::{debug, info, warn};

use super::cache::GeocodeCache;
use super::providers::GeoProvider;
use super::types::{CoordinateKey, Coordinates};

pub struct CityResolver {
    cache: GeocodeCache,
    primary: Box<dyn GeoProvider>,
    secondary: Option<Box<dyn GeoProvider>>,
}

impl CityResolver {
    pub fn new(
        cache: GeocodeCache,
        primary: Box<dyn GeoProvider>,
        secondary: Option<Box<dyn GeoProvider>>,
    ) -> Self {
        Self { cache, primary, secondary }
    }

    /// Resolve coordinates to a canonical city name. `None` means unknown:
    /// every provider either answered without a usable field or failed.
    pub async fn reverse_resolve(&self, coords: Coordinates) -> Option<String> {
        let key = CoordinateKey::from_coords(coords);
        if let Some(city) = self.cache.get(&key) {
            debug!(%key, city, "geocode cache hit");
            return Some(city);
        }

        for provider in self.chain() {
            match provider.reverse(coords).await {
                Ok(Some(city)) => {
                    info!(provider = provider.name(), city, "reverse geocode resolved");
                    self.cache.put(key, city.clone());
                    return Some(city);
                }
                Ok(None) => {
                    debug!(provider = provider.name(), "no usable address field");
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "reverse geocode failed");
                }
            }
        }

        warn!(%key, "all geocode providers exhausted");
        None
    }

    /// Forward-validate a typed city name against the primary provider.
    /// Provider errors count as validation failure.
    pub async fn validate(&self, name: &str) -> bool {
        match self.primary.forward(name).await {
            Ok(found) => {
                debug!(city = name, found, "forward validation");
                found
            }
            Err(e) => {
                warn!(city = name, error = %e, "forward validation failed");
                false
            }
        }
    }

    fn chain(&self) -> impl Iterator<Item = &dyn GeoProvider> {
        std::iter::once(self.primary.as_ref()).chain(self.secondary.as_deref())
    }
}
