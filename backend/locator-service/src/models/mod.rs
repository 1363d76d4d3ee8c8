use crate::error::{LocatorError, Result};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// WGS84 point in degrees. Only constructible through [`Coordinate::new`]
/// (deserialization included), so every instance is finite and in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

/// Unchecked wire form of [`Coordinate`].
#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawCoordinate::deserialize(deserializer)?;
        Coordinate::new(raw.latitude, raw.longitude).map_err(de::Error::custom)
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(LocatorError::NonFiniteCoordinate {
                lat: latitude,
                lon: longitude,
            });
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(LocatorError::InvalidLatitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(LocatorError::InvalidLongitude(longitude));
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude (-90 to 90)
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude (-180 to 180)
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// A restaurant record as handed over by the record provider.
///
/// Everything except `id` and the coordinate is carried through untouched,
/// including fields this crate does not know about (kept in `extra`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestaurantCandidate {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub rating_star: Option<f64>,
    #[serde(default)]
    pub rating_count: Option<u32>,
    #[serde(default)]
    pub is_delivery: Option<bool>,
    #[serde(default)]
    pub is_collection: Option<bool>,
    /// Comma separated cuisine labels, e.g. "hamburguesas, americana"
    #[serde(default)]
    pub cuisines: Option<String>,
    /// Provider fields not modeled above, e.g. `postal_code`, `tags`
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

impl RestaurantCandidate {
    /// Valid coordinate of the record, if it has one.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon).ok(),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// Delivery estimate in whole minutes, serialized as `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtaRange(pub u32, pub u32);

impl EtaRange {
    pub fn low(&self) -> u32 {
        self.0
    }

    pub fn high(&self) -> u32 {
        self.1
    }
}

/// A candidate annotated for the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    #[serde(flatten)]
    pub restaurant: RestaurantCandidate,
    /// Great-circle distance to the user, rounded to the nearest meter
    pub distance_m: Option<u64>,
    pub eta_minutes: Option<EtaRange>,
}

impl RankedResult {
    pub fn unranked(restaurant: RestaurantCandidate) -> Self {
        Self {
            restaurant,
            distance_m: None,
            eta_minutes: None,
        }
    }
}

/// Per-query bookkeeping, logged when a query completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// Partitions (cells or identifiers) requested from the provider
    pub partitions_queried: usize,
    /// Partitions that failed, timed out or were skipped on cancellation
    pub partitions_failed: usize,
    pub candidates_seen: usize,
    pub candidates_without_coordinates: usize,
    pub returned: usize,
    pub cancelled: bool,
}

/// Ranked results plus the stats of the query that produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub results: Vec<RankedResult>,
    pub stats: QueryStats,
}
