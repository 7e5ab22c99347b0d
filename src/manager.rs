use crate::aggregator::FixAggregator;
use crate::config::TrackerConfig;
use crate::events::GpsEvent;
use crate::motion::{self, MotionError};
use crate::position::{PositionFix, SatelliteInfo};
use crate::quality::QualityGate;
use crate::scheduler::PersistenceScheduler;
use crate::store::PositionStore;
use crate::transport::{SentenceTransport, TransportError};
use log::{debug, info, warn};
use std::fmt;

/// Connection lifecycle of the receiver session.
///
/// `Recording` is reachable only after a first confirmed fix while
/// `Connected`. `Error` is terminal until an explicit restart via
/// `start_listening`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    NotConnected,
    Connected,
    Recording,
    Error,
}

impl ConnectionState {
    pub fn status_keyword(self) -> &'static str {
        match self {
            ConnectionState::NotConnected => "not connected",
            ConnectionState::Connected => "connected",
            ConnectionState::Recording => "recording",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_keyword())
    }
}

/// Owns the whole pipeline for one receiver: transport lifecycle,
/// aggregation, quality gating, motion estimation, persistence scheduling
/// and the externally visible connection state.
///
/// Not safe for concurrent use; a single driver task must serialize
/// `handle_event` and `tick` calls (channel delivery plus one select loop
/// gives that for free).
pub struct GpsManager<T: SentenceTransport, S: PositionStore> {
    transport: T,
    store: S,
    aggregator: FixAggregator,
    gate: QualityGate,
    scheduler: PersistenceScheduler,
    state: ConnectionState,
    current: Option<PositionFix>,
    previous: Option<PositionFix>,
    last_sentence_ms: Option<i64>,
    satellites: Option<(u32, Vec<SatelliteInfo>)>,
}

impl<T: SentenceTransport, S: PositionStore> GpsManager<T, S> {
    pub fn new(transport: T, store: S, config: TrackerConfig) -> Self {
        GpsManager {
            transport,
            store,
            aggregator: FixAggregator::new(config.tick_interval_ms),
            gate: QualityGate::new(config.pdop_threshold, config.min_distance_m),
            scheduler: PersistenceScheduler::new(
                config.log_interval_ms,
                config.satellite_interval_ms,
            ),
            state: ConnectionState::NotConnected,
            current: None,
            previous: None,
            last_sentence_ms: None,
            satellites: None,
        }
    }

    /// Open the transport. Success also restarts a session that ended in
    /// `Error`; failure lands in `Error` and the cause is re-raised.
    pub fn start_listening(&mut self) -> Result<(), TransportError> {
        self.last_sentence_ms = None;
        match self.transport.start() {
            Ok(()) => {
                self.set_state(ConnectionState::Connected, "");
                Ok(())
            }
            Err(err) => {
                self.set_state(ConnectionState::Error, &err.to_string());
                Err(err)
            }
        }
    }

    /// Close the transport and clear sentence/timing bookkeeping. An
    /// `Error` state survives until the next `start_listening`.
    pub fn stop_listening(&mut self) {
        self.transport.stop();
        self.last_sentence_ms = None;
        self.aggregator.clear();
        self.scheduler.reset();
        if self.state != ConnectionState::Error {
            self.set_state(ConnectionState::NotConnected, "");
        }
    }

    /// Intake one decoded event. Satellite snapshots are retained and
    /// written through their own throttle; everything else lands in the
    /// aggregation window.
    pub fn handle_event(&mut self, event: GpsEvent, now_ms: i64) {
        self.last_sentence_ms = Some(now_ms);
        match event {
            GpsEvent::Satellites { in_view, sats } => {
                if self.scheduler.satellite_write_due(now_ms) {
                    if let Err(err) = self.store.write_satellites(in_view, &sats) {
                        warn!("satellite write failed: {}", err);
                    }
                }
                self.satellites = Some((in_view, sats));
            }
            other => self.aggregator.observe(&other, now_ms),
        }
    }

    /// Aggregation tick: resync against the transport, then promote the
    /// window's averaged sample (if any) through gate, motion estimation
    /// and the persistence scheduler.
    ///
    /// The only error that escapes is `InvalidInterval`, a clock/ordering
    /// defect; store failures are logged and swallowed.
    pub fn tick(&mut self, now_ms: i64) -> Result<(), MotionError> {
        self.resync_transport();

        let candidate = match self.aggregator.tick(now_ms, self.current.as_ref()) {
            Some(fix) => fix,
            None => return Ok(()),
        };
        self.confirm(candidate, now_ms)
    }

    /// A transport that stopped listening without a stop call forces the
    /// state back to `NotConnected`.
    fn resync_transport(&mut self) {
        let connected = matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Recording
        );
        if connected && !self.transport.is_listening() {
            info!("transport no longer listening, resyncing state");
            self.set_state(ConnectionState::NotConnected, "");
        }
    }

    fn confirm(&mut self, mut candidate: PositionFix, now_ms: i64) -> Result<(), MotionError> {
        let first_fix = self.current.is_none();
        let mut advance_previous = false;

        match self.previous.as_ref() {
            None => {
                // Motion is undefined until a second confirmed fix exists
                candidate.speed = 0.0;
                candidate.bearing = 0.0;
                advance_previous = true;
            }
            Some(previous) => {
                let decision = self.gate.admit(&candidate, previous);
                debug!(
                    "gate: displacement {:.1} m, effective {:.1} m, recompute {}",
                    decision.displacement_m, decision.effective_m, decision.recompute_motion
                );
                if decision.recompute_motion {
                    let (speed, bearing) = motion::estimate(previous, &candidate)?;
                    candidate.speed = speed;
                    candidate.bearing = bearing;
                    advance_previous = true;
                }
            }
        }

        let carried_id = self.current.as_ref().map_or(0, |c| c.store_id);
        self.scheduler
            .assign_store_id(&mut candidate, carried_id, now_ms);
        match self.store.write_position(&candidate) {
            Ok(id) => candidate.store_id = id,
            // Transient: in-memory state is kept, the next tick retries
            // with fresh data
            Err(err) => warn!("position write failed: {}", err),
        }

        if advance_previous {
            self.previous = Some(candidate.clone());
        }
        self.current = Some(candidate);

        if first_fix && self.state == ConnectionState::Connected {
            self.set_state(ConnectionState::Recording, "");
        }
        Ok(())
    }

    fn set_state(&mut self, next: ConnectionState, message: &str) {
        if self.state != next {
            info!("connection state {} -> {}", self.state, next);
        }
        self.state = next;
        if let Err(err) = self.store.save_status(next.status_keyword(), message) {
            warn!("status write failed: {}", err);
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn current_position(&self) -> Option<&PositionFix> {
        self.current.as_ref()
    }

    pub fn previous_position(&self) -> Option<&PositionFix> {
        self.previous.as_ref()
    }

    /// Milliseconds since the last delivered event, -1 if none yet.
    pub fn time_since_last_sentence(&self, now_ms: i64) -> i64 {
        self.last_sentence_ms.map_or(-1, |t| now_ms - t)
    }

    pub fn satellites(&self) -> Option<&(u32, Vec<SatelliteInfo>)> {
        self.satellites.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailingStore, MemoryStore};
    use crate::transport::MockTransport;

    fn manager_with(
        transport: MockTransport,
    ) -> GpsManager<MockTransport, MemoryStore> {
        GpsManager::new(transport, MemoryStore::new(), TrackerConfig::default())
    }

    fn started_manager() -> GpsManager<MockTransport, MemoryStore> {
        let mut mgr = manager_with(MockTransport::new("sim"));
        mgr.start_listening().unwrap();
        mgr
    }

    fn feed_fix(
        mgr: &mut GpsManager<MockTransport, MemoryStore>,
        lat: f64,
        pdop: f64,
        now_ms: i64,
    ) {
        mgr.handle_event(
            GpsEvent::Position {
                latitude: lat,
                longitude: 20.0,
            },
            now_ms,
        );
        mgr.handle_event(GpsEvent::Pdop(pdop), now_ms);
        mgr.tick(now_ms + 1).unwrap();
    }

    #[test]
    fn test_start_and_first_fix_reach_recording() {
        let mut mgr = manager_with(MockTransport::new("sim"));
        assert_eq!(mgr.connection_state(), ConnectionState::NotConnected);

        mgr.start_listening().unwrap();
        assert_eq!(mgr.connection_state(), ConnectionState::Connected);
        assert_eq!(mgr.store().status().unwrap().0, "connected");

        feed_fix(&mut mgr, 10.0, 1.0, 1000);
        assert_eq!(mgr.connection_state(), ConnectionState::Recording);
        assert_eq!(mgr.store().status().unwrap().0, "recording");
    }

    #[test]
    fn test_failing_start_is_terminal_error() {
        let mut mgr = manager_with(MockTransport::failing("sim"));
        assert!(mgr.start_listening().is_err());
        assert_eq!(mgr.connection_state(), ConnectionState::Error);

        let (status, message) = mgr.store().status().unwrap().clone();
        assert_eq!(status, "error");
        assert!(message.contains("sim"));

        // stop does not leave the error state
        mgr.stop_listening();
        assert_eq!(mgr.connection_state(), ConnectionState::Error);
    }

    #[test]
    fn test_stop_clears_sentence_bookkeeping() {
        let mut mgr = started_manager();
        mgr.handle_event(GpsEvent::Hdop(1.0), 1000);
        assert_eq!(mgr.time_since_last_sentence(1500), 500);

        mgr.stop_listening();
        assert_eq!(mgr.connection_state(), ConnectionState::NotConnected);
        assert_eq!(mgr.time_since_last_sentence(2000), -1);
    }

    #[test]
    fn test_silent_transport_forces_not_connected() {
        let mut mgr = started_manager();
        mgr.transport_mut().drop_device();

        mgr.tick(1000).unwrap();
        assert_eq!(mgr.connection_state(), ConnectionState::NotConnected);
    }

    #[test]
    fn test_first_fix_establishes_both_positions_with_zero_motion() {
        let mut mgr = started_manager();
        mgr.handle_event(
            GpsEvent::Position {
                latitude: 10.0,
                longitude: 20.0,
            },
            1000,
        );
        mgr.handle_event(GpsEvent::Speed(9.9), 1000);
        mgr.tick(1001).unwrap();

        let current = mgr.current_position().unwrap();
        assert_eq!(current.speed, 0.0);
        assert_eq!(current.bearing, 0.0);
        let previous = mgr.previous_position().unwrap();
        assert_eq!(previous.latitude, current.latitude);
        assert_eq!(previous.timestamp_ms, current.timestamp_ms);
    }

    #[test]
    fn test_large_displacement_recomputes_motion() {
        let mut mgr = started_manager();
        feed_fix(&mut mgr, 10.0, 1.0, 0);
        feed_fix(&mut mgr, 10.0005, 1.0, 5000); // ~55.6 m in 5 s

        let current = mgr.current_position().unwrap();
        assert!((current.speed - 11.1).abs() < 0.2, "speed {}", current.speed);
        assert!(current.bearing < 1.0 || current.bearing > 359.0);
        // Baseline advanced with the motion update
        assert_eq!(mgr.previous_position().unwrap().latitude, 10.0005);
    }

    #[test]
    fn test_jitter_promotes_without_motion_update() {
        let mut mgr = started_manager();
        feed_fix(&mut mgr, 10.0, 1.0, 0);
        feed_fix(&mut mgr, 10.00005, 1.0, 5000); // ~5.6 m, below the gate

        // Promoted: current advanced
        assert_eq!(mgr.current_position().unwrap().latitude, 10.00005);
        // Not trusted as motion: baseline and speed unchanged
        assert_eq!(mgr.previous_position().unwrap().latitude, 10.0);
        assert_eq!(mgr.current_position().unwrap().speed, 0.0);
    }

    #[test]
    fn test_fixes_within_log_interval_share_store_row() {
        let mut mgr = started_manager();
        feed_fix(&mut mgr, 10.0, 1.0, 0);
        feed_fix(&mut mgr, 10.001, 1.0, 5000);
        feed_fix(&mut mgr, 10.002, 1.0, 10_000);

        // One inserted row, overwritten in place
        assert_eq!(mgr.store().row_count(), 1);
        assert_eq!(mgr.current_position().unwrap().store_id, 1);
        assert_eq!(mgr.store().row(1).unwrap().latitude, 10.002);
    }

    #[test]
    fn test_fixes_spanning_log_interval_get_new_rows() {
        let mut mgr = started_manager();
        feed_fix(&mut mgr, 10.0, 1.0, 0);
        feed_fix(&mut mgr, 10.001, 1.0, 31_000);
        feed_fix(&mut mgr, 10.002, 1.0, 62_500);

        assert_eq!(mgr.store().row_count(), 3);
        assert_eq!(mgr.current_position().unwrap().store_id, 3);
    }

    #[test]
    fn test_store_failure_keeps_pipeline_state() {
        let mut mgr = GpsManager::new(
            MockTransport::new("sim"),
            FailingStore,
            TrackerConfig::default(),
        );
        mgr.start_listening().unwrap();

        mgr.handle_event(
            GpsEvent::Position {
                latitude: 10.0,
                longitude: 20.0,
            },
            1000,
        );
        mgr.tick(1001).unwrap();

        let current = mgr.current_position().unwrap();
        assert_eq!(current.latitude, 10.0);
        assert_eq!(current.store_id, 0); // never stored
        assert_eq!(mgr.connection_state(), ConnectionState::Recording);
    }

    #[test]
    fn test_stalled_clock_propagates_invalid_interval() {
        let mut mgr = started_manager();
        feed_fix(&mut mgr, 10.0, 1.0, 1000);

        // Same arrival time as the first fix with a gate-passing move
        mgr.handle_event(
            GpsEvent::Position {
                latitude: 10.01,
                longitude: 20.0,
            },
            1000,
        );
        let err = mgr.tick(2500).unwrap_err();
        assert!(matches!(err, MotionError::InvalidInterval { .. }));
    }

    #[test]
    fn test_satellite_snapshots_are_throttled() {
        let mut mgr = started_manager();
        let sats = vec![SatelliteInfo {
            prn: 3,
            elevation: 45,
            azimuth: 120,
            snr: 33,
        }];

        mgr.handle_event(
            GpsEvent::Satellites {
                in_view: 8,
                sats: sats.clone(),
            },
            1000,
        );
        mgr.handle_event(
            GpsEvent::Satellites {
                in_view: 9,
                sats: sats.clone(),
            },
            5000,
        );
        assert_eq!(mgr.store().satellite_snapshot_count(), 1);

        mgr.handle_event(
            GpsEvent::Satellites {
                in_view: 10,
                sats,
            },
            40_000,
        );
        assert_eq!(mgr.store().satellite_snapshot_count(), 2);
        // The retained snapshot is always the latest one
        assert_eq!(mgr.satellites().unwrap().0, 10);
    }

    #[test]
    fn test_restart_after_error_reconnects() {
        let mut mgr = manager_with(MockTransport::failing("sim"));
        assert!(mgr.start_listening().is_err());
        assert_eq!(mgr.connection_state(), ConnectionState::Error);

        // The same manager with a now-working transport recovers
        mgr.transport_mut().allow_start();
        mgr.start_listening().unwrap();
        assert_eq!(mgr.connection_state(), ConnectionState::Connected);
    }
}
