use crate::position::PositionFix;
use geo::{point, HaversineBearing, HaversineDistance};
use std::fmt;

/// Non-positive elapsed time between two confirmed fixes. This is a clock
/// or ordering defect in the caller, not a transient condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MotionError {
    InvalidInterval { elapsed_ms: i64 },
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::InvalidInterval { elapsed_ms } => {
                write!(f, "non-positive interval between fixes: {} ms", elapsed_ms)
            }
        }
    }
}

impl std::error::Error for MotionError {}

/// Great-circle distance in meters on the spherical Earth approximation.
pub fn distance_m(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let from = point!(x: from_lon, y: from_lat);
    let to = point!(x: to_lon, y: to_lat);
    from.haversine_distance(&to)
}

/// Forward azimuth from the first point to the second, degrees in [0, 360).
pub fn initial_bearing_deg(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let from = point!(x: from_lon, y: from_lat);
    let to = point!(x: to_lon, y: to_lat);
    from.haversine_bearing(to).rem_euclid(360.0)
}

/// Speed (m/s) and initial bearing (degrees) between two confirmed fixes.
pub fn estimate(from: &PositionFix, to: &PositionFix) -> Result<(f64, f64), MotionError> {
    let elapsed_ms = to.timestamp_ms - from.timestamp_ms;
    if elapsed_ms <= 0 {
        return Err(MotionError::InvalidInterval { elapsed_ms });
    }

    let distance = distance_m(from.latitude, from.longitude, to.latitude, to.longitude);
    let speed = distance / (elapsed_ms as f64 / 1000.0);
    let bearing = initial_bearing_deg(from.latitude, from.longitude, to.latitude, to.longitude);

    Ok((speed, bearing))
}
