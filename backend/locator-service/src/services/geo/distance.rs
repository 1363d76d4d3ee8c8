use crate::error::{LocatorError, Result};
use crate::models::{Coordinate, EtaRange};
use serde::{Deserialize, Serialize};

/// Mean Earth radius (spherical model).
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine great-circle distance on a sphere of `radius_m`.
pub fn great_circle_distance(a: &Coordinate, b: &Coordinate, radius_m: f64) -> f64 {
    let phi1 = a.latitude().to_radians();
    let phi2 = b.latitude().to_radians();
    let delta_phi = (b.latitude() - a.latitude()).to_radians();
    let delta_lambda = (b.longitude() - a.longitude()).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    radius_m * c
}

/// Distance in meters between two points on the mean-radius sphere.
pub fn haversine_distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    great_circle_distance(a, b, EARTH_RADIUS_METERS)
}

/// Delivery time heuristic: fixed preparation time plus courier travel time at
/// an optimistic and a pessimistic speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EtaPolicy {
    pub prep_minutes: f64,
    /// Optimistic courier speed (~17 km/h)
    pub fast_meters_per_minute: f64,
    /// Pessimistic courier speed (~11 km/h)
    pub slow_meters_per_minute: f64,
}

impl Default for EtaPolicy {
    fn default() -> Self {
        Self {
            prep_minutes: 10.0,
            fast_meters_per_minute: 280.0,
            slow_meters_per_minute: 190.0,
        }
    }
}

impl EtaPolicy {
    pub fn new(prep_minutes: f64, fast_meters_per_minute: f64, slow_meters_per_minute: f64) -> Result<Self> {
        let policy = Self {
            prep_minutes,
            fast_meters_per_minute,
            slow_meters_per_minute,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// `low <= high` holds for every non-negative distance only when the fast
    /// speed is at least the slow one.
    pub fn validate(&self) -> Result<()> {
        let finite = self.prep_minutes.is_finite()
            && self.fast_meters_per_minute.is_finite()
            && self.slow_meters_per_minute.is_finite();
        if !finite || self.prep_minutes < 0.0 {
            return Err(LocatorError::Config(format!(
                "ETA prep time must be a non-negative number: {:?}",
                self
            )));
        }
        if self.slow_meters_per_minute <= 0.0 || self.fast_meters_per_minute <= 0.0 {
            return Err(LocatorError::Config(format!(
                "ETA courier speeds must be positive: {:?}",
                self
            )));
        }
        if self.fast_meters_per_minute < self.slow_meters_per_minute {
            return Err(LocatorError::Config(format!(
                "ETA fast speed {} is below slow speed {}",
                self.fast_meters_per_minute, self.slow_meters_per_minute
            )));
        }
        Ok(())
    }

    /// `[low, high]` minutes for a trip of `distance_m` meters.
    ///
    /// Halves round to even, so 12.5 minutes reports as 12.
    pub fn estimate(&self, distance_m: f64) -> EtaRange {
        let distance_m = distance_m.max(0.0);
        let low = self.prep_minutes + distance_m / self.fast_meters_per_minute;
        let high = self.prep_minutes + distance_m / self.slow_meters_per_minute;
        EtaRange(to_minutes(low), to_minutes(high))
    }
}

fn to_minutes(value: f64) -> u32 {
    value.round_ties_even().clamp(0.0, u32::MAX as f64) as u32
}
