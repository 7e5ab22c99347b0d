use crate::events::GpsEvent;
use crate::position::PositionFix;

/// Latest value per event kind since the previous tick, each with its
/// arrival time. Last write wins within a window; no history is queued.
#[derive(Clone, Debug, Default)]
struct PendingSample {
    position: Option<((f64, f64), i64)>,
    hdop: Option<(f64, i64)>,
    vdop: Option<(f64, i64)>,
    pdop: Option<(f64, i64)>,
    speed: Option<(f64, i64)>,
    bearing: Option<(f64, i64)>,
}

impl PendingSample {
    fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.hdop.is_none()
            && self.vdop.is_none()
            && self.pdop.is_none()
            && self.speed.is_none()
            && self.bearing.is_none()
    }

    fn arrival_times(&self) -> Vec<i64> {
        let mut times = Vec::with_capacity(6);
        if let Some((_, t)) = self.position {
            times.push(t);
        }
        for field in [self.hdop, self.vdop, self.pdop, self.speed, self.bearing] {
            if let Some((_, t)) = field {
                times.push(t);
            }
        }
        times
    }
}

/// Collapses the receiver's event stream into at most one averaged
/// `PositionFix` per tick window.
///
/// The aggregator never persists anything and never touches the pipeline's
/// current/previous fixes; it only produces candidates.
pub struct FixAggregator {
    pending: PendingSample,
    min_tick_interval_ms: i64,
    last_tick_ms: Option<i64>,
}

impl FixAggregator {
    pub fn new(min_tick_interval_ms: i64) -> Self {
        FixAggregator {
            pending: PendingSample::default(),
            min_tick_interval_ms,
            last_tick_ms: None,
        }
    }

    /// Record the latest value for the event's kind. Satellite snapshots
    /// carry no fix fields and are routed around the aggregator.
    pub fn observe(&mut self, event: &GpsEvent, arrival_ms: i64) {
        match *event {
            GpsEvent::Position {
                latitude,
                longitude,
            } => self.pending.position = Some(((latitude, longitude), arrival_ms)),
            GpsEvent::Hdop(v) => self.pending.hdop = Some((v, arrival_ms)),
            GpsEvent::Vdop(v) => self.pending.vdop = Some((v, arrival_ms)),
            GpsEvent::Pdop(v) => self.pending.pdop = Some((v, arrival_ms)),
            GpsEvent::Speed(v) => self.pending.speed = Some((v, arrival_ms)),
            GpsEvent::Bearing(v) => self.pending.bearing = Some((v, arrival_ms)),
            GpsEvent::Satellites { .. } => {}
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Produce one averaged fix from the window, or `None` when the window
    /// is empty, the tick arrives early, or no position is known yet.
    ///
    /// Fields not observed in the window inherit the last confirmed fix's
    /// value instead of zero, so a DOP-less window does not fake a sudden
    /// quality jump. The fix timestamp is the mean arrival time of the
    /// kinds that contributed.
    pub fn tick(&mut self, now_ms: i64, last_confirmed: Option<&PositionFix>) -> Option<PositionFix> {
        if let Some(last) = self.last_tick_ms {
            if now_ms - last < self.min_tick_interval_ms {
                return None;
            }
        }
        self.last_tick_ms = Some(now_ms);

        if self.pending.is_empty() {
            return None;
        }

        // Without a position in the window or a prior confirmed fix there
        // is nothing meaningful to emit; hold the window until one arrives.
        let (latitude, longitude) = match (self.pending.position, last_confirmed) {
            (Some(((lat, lon), _)), _) => (lat, lon),
            (None, Some(prev)) => (prev.latitude, prev.longitude),
            (None, None) => return None,
        };

        let times = self.pending.arrival_times();
        let timestamp_ms = times.iter().sum::<i64>() / times.len() as i64;

        let inherit = |observed: Option<(f64, i64)>, fallback: f64| -> f64 {
            observed.map(|(v, _)| v).unwrap_or(fallback)
        };
        let prev = last_confirmed;

        let fix = PositionFix {
            latitude,
            longitude,
            hdop: inherit(self.pending.hdop, prev.map_or(0.0, |p| p.hdop)),
            vdop: inherit(self.pending.vdop, prev.map_or(0.0, |p| p.vdop)),
            pdop: inherit(self.pending.pdop, prev.map_or(0.0, |p| p.pdop)),
            speed: inherit(self.pending.speed, prev.map_or(0.0, |p| p.speed)),
            bearing: inherit(self.pending.bearing, prev.map_or(0.0, |p| p.bearing)),
            timestamp_ms,
            store_id: 0,
        };

        self.pending = PendingSample::default();
        Some(fix)
    }

    /// Drop any buffered window, e.g. when the transport stops.
    pub fn clear(&mut self) {
        self.pending = PendingSample::default();
        self.last_tick_ms = None;
    }
}
