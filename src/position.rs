use serde::{Deserialize, Serialize};

/// One confirmed positioning sample with quality indicators and motion.
///
/// `store_id` is assigned by the persistence backend; 0 means the fix has
/// not been written yet (a write with id 0 inserts, nonzero updates in place).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    pub hdop: f64,
    pub vdop: f64,
    pub pdop: f64,
    pub speed: f64,        // m/s
    pub bearing: f64,      // degrees, [0, 360)
    pub timestamp_ms: i64, // millisecond resolution
    pub store_id: u64,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        PositionFix {
            latitude,
            longitude,
            hdop: 0.0,
            vdop: 0.0,
            pdop: 0.0,
            speed: 0.0,
            bearing: 0.0,
            timestamp_ms,
            store_id: 0,
        }
    }
}

/// One satellite from a GSV-style snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteInfo {
    pub prn: i32,
    pub elevation: i32, // degrees above horizon
    pub azimuth: i32,   // degrees from true north
    pub snr: i32,       // dB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fix_is_unstored() {
        let fix = PositionFix::new(10.0, 20.0, 1000);
        assert_eq!(fix.store_id, 0);
        assert_eq!(fix.speed, 0.0);
        assert_eq!(fix.bearing, 0.0);
    }
}
