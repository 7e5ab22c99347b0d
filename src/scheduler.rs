use crate::position::PositionFix;

/// Time-decimates durable history: one inserted row per logging interval,
/// with the latest row kept continuously fresh by update-in-place between
/// inserts. Satellite snapshots get their own independent throttle.
pub struct PersistenceScheduler {
    log_interval_ms: i64,
    satellite_interval_ms: i64,
    last_insert_ms: Option<i64>,
    last_satellite_ms: Option<i64>,
}

impl PersistenceScheduler {
    pub fn new(log_interval_ms: i64, satellite_interval_ms: i64) -> Self {
        PersistenceScheduler {
            log_interval_ms,
            satellite_interval_ms,
            last_insert_ms: None,
            last_satellite_ms: None,
        }
    }

    /// Decide insert vs. overwrite for a confirmed fix.
    ///
    /// If the logging interval has elapsed since the last *inserted* row
    /// (overwrites do not count), the fix's store id is cleared to force an
    /// insert; otherwise it carries the previous fix's id to overwrite that
    /// row. The very first fix always inserts.
    pub fn assign_store_id(&mut self, fix: &mut PositionFix, previous_id: u64, now_ms: i64) {
        let due = self
            .last_insert_ms
            .map_or(true, |t| now_ms - t > self.log_interval_ms);

        if due {
            fix.store_id = 0;
            self.last_insert_ms = Some(now_ms);
        } else {
            fix.store_id = previous_id;
        }
    }

    /// At most one satellite snapshot write per interval.
    pub fn satellite_write_due(&mut self, now_ms: i64) -> bool {
        let due = self
            .last_satellite_ms
            .map_or(true, |t| now_ms - t > self.satellite_interval_ms);
        if due {
            self.last_satellite_ms = Some(now_ms);
        }
        due
    }

    /// Forget interval bookkeeping, e.g. across a stop/start cycle.
    pub fn reset(&mut self) {
        self.last_insert_ms = None;
        self.last_satellite_ms = None;
    }
}
