use super::geo::{haversine_distance_meters, EtaPolicy};
use crate::models::{Coordinate, RankedResult, RestaurantCandidate};

/// Attach distance and ETA relative to `origin`.
///
/// Returns the candidate unranked when it has no usable coordinate.
pub fn annotate(
    restaurant: RestaurantCandidate,
    origin: &Coordinate,
    eta: &EtaPolicy,
) -> Result<RankedResult, RestaurantCandidate> {
    let Some(location) = restaurant.coordinate() else {
        return Err(restaurant);
    };

    let distance = haversine_distance_meters(origin, &location);
    Ok(RankedResult {
        restaurant,
        distance_m: Some(distance.round_ties_even() as u64),
        eta_minutes: Some(eta.estimate(distance)),
    })
}

/// Stable ascending sort on distance; results without a distance go last and
/// keep their relative order.
pub fn sort_by_distance(results: &mut [RankedResult]) {
    results.sort_by_key(|r| (r.distance_m.is_none(), r.distance_m));
}

/// Stable case-insensitive sort on name; unnamed records go last.
pub fn sort_by_name(results: &mut [RankedResult]) {
    results.sort_by_cached_key(|r| {
        let name = r.restaurant.name.as_deref().map(str::to_lowercase);
        (name.is_none(), name)
    });
}
