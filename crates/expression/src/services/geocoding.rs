//! Address geocoding seam

use indexmap::IndexMap;

use crate::error::ExpressionResult;

/// Latitude and longitude in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

pub trait Geocoder: Send + Sync {
    /// Coordinates of an address; `None` when the provider found nothing
    fn geocode(
        &self,
        street: &str,
        city: &str,
        country: &str,
    ) -> ExpressionResult<Option<GeoCoordinates>>;
}

/// Geocoder answering from a fixed table of addresses
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    addresses: IndexMap<(String, String, String), GeoCoordinates>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(
        mut self,
        street: &str,
        city: &str,
        country: &str,
        coordinates: GeoCoordinates,
    ) -> Self {
        self.addresses
            .insert(key(street, city, country), coordinates);
        self
    }
}

fn key(street: &str, city: &str, country: &str) -> (String, String, String) {
    (
        street.to_lowercase(),
        city.to_lowercase(),
        country.to_lowercase(),
    )
}

impl Geocoder for StaticGeocoder {
    fn geocode(
        &self,
        street: &str,
        city: &str,
        country: &str,
    ) -> ExpressionResult<Option<GeoCoordinates>> {
        Ok(self.addresses.get(&key(street, city, country)).copied())
    }
}
