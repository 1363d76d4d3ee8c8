//! Index key schema shared by the write side and the query side.
//!
//! Restaurants are partitioned by the geohash of their coordinate, and each
//! cuisine label gets a secondary index entry keyed by its lower-cased form.

use crate::error::Result;
use crate::models::Coordinate;
use crate::services::geo::GeohashCodec;

/// Partition key for a restaurant at `location`.
/// Format: geohash of `precision` characters, e.g. `ezjmgt`
pub fn partition_key_for(codec: &GeohashCodec, location: &Coordinate, precision: usize) -> Result<String> {
    codec.encode(location, precision)
}

/// Cuisine index keys for a comma separated cuisine list.
/// Format: trimmed, lower-cased label; empties and repeats dropped, order kept
pub fn cuisine_index_keys(cuisines_csv: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for label in cuisines_csv.split(',') {
        let key = label.trim().to_lowercase();
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}
