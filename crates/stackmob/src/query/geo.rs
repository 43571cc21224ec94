//! Geographic points and the earth radii used to turn distances into radians.

use serde::{Deserialize, Serialize};

use crate::error::InvalidInputError;

/// Earth radius in miles, for converting distances to radians.
pub const EARTH_RADIANS_MI: f64 = 3956.6;

/// Earth radius in kilometres.
pub const EARTH_RADIANS_KM: f64 = 6367.5;

/// A validated latitude/longitude pair.
///
/// Serializes as `{"lat": .., "lon": ..}`, the shape geo fields are stored in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = InvalidInputError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lat, raw.lon)
    }
}

impl GeoPoint {
    /// # Errors
    ///
    /// Returns an error if latitude is outside -90..=90 or longitude is
    /// outside -180..=180.
    pub fn new(lat: f64, lon: f64) -> Result<Self, InvalidInputError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(InvalidInputError::Latitude { value: lat });
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(InvalidInputError::Longitude { value: lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}
