//! Geospatial primitives: geohash cells, 3x3 neighborhoods, great-circle
//! distance and the delivery ETA heuristic.
pub mod distance;
pub mod geohash;
pub mod neighbors;

pub use distance::{great_circle_distance, haversine_distance_meters, EtaPolicy, EARTH_RADIUS_METERS};
pub use geohash::{cell_span_degrees, CellBounds, GeohashCodec, DEFAULT_ALPHABET, MAX_PRECISION};
pub use neighbors::neighbors;
