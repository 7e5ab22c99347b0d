use crate::position::{PositionFix, SatelliteInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Failed write to the persistence backend. Transient from the pipeline's
/// point of view: callers log it and retry with fresh data on a later tick.
#[derive(Clone, Debug)]
pub enum StoreError {
    Io(String),
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "store i/o error: {}", msg),
            StoreError::Backend(msg) => write!(f, "store backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Persistence boundary for the pipeline.
///
/// `write_position` interprets the fix's store id: 0 inserts a new row and
/// nonzero updates that row in place. It returns the effective id for the
/// pipeline to carry forward. Schema management and any bounded-history
/// eviction live entirely behind this trait.
pub trait PositionStore {
    fn write_position(&mut self, fix: &PositionFix) -> Result<u64, StoreError>;
    fn save_status(&mut self, status: &str, message: &str) -> Result<(), StoreError>;
    fn write_satellites(&mut self, in_view: u32, sats: &[SatelliteInfo]) -> Result<(), StoreError>;
}

/// In-memory store for tests and headless runs.
#[derive(Default)]
pub struct MemoryStore {
    rows: BTreeMap<u64, PositionFix>,
    next_id: u64,
    status: Option<(String, String)>,
    satellite_snapshots: Vec<(u32, Vec<SatelliteInfo>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, id: u64) -> Option<&PositionFix> {
        self.rows.get(&id)
    }

    pub fn status(&self) -> Option<&(String, String)> {
        self.status.as_ref()
    }

    pub fn satellite_snapshot_count(&self) -> usize {
        self.satellite_snapshots.len()
    }
}

impl PositionStore for MemoryStore {
    fn write_position(&mut self, fix: &PositionFix) -> Result<u64, StoreError> {
        let id = if fix.store_id == 0 {
            self.next_id += 1;
            self.next_id
        } else {
            fix.store_id
        };
        let mut row = fix.clone();
        row.store_id = id;
        self.rows.insert(id, row);
        Ok(id)
    }

    fn save_status(&mut self, status: &str, message: &str) -> Result<(), StoreError> {
        self.status = Some((status.to_string(), message.to_string()));
        Ok(())
    }

    fn write_satellites(&mut self, in_view: u32, sats: &[SatelliteInfo]) -> Result<(), StoreError> {
        self.satellite_snapshots.push((in_view, sats.to_vec()));
        Ok(())
    }
}

/// Store that always fails, for exercising the swallow-and-retry path.
pub struct FailingStore;

impl PositionStore for FailingStore {
    fn write_position(&mut self, _fix: &PositionFix) -> Result<u64, StoreError> {
        Err(StoreError::Backend("write refused".to_string()))
    }

    fn save_status(&mut self, _status: &str, _message: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("write refused".to_string()))
    }

    fn write_satellites(
        &mut self,
        _in_view: u32,
        _sats: &[SatelliteInfo],
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("write refused".to_string()))
    }
}

/// Everything external readers need from one JSON file.
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct StoreSnapshot {
    pub status: String,
    pub message: String,
    pub fix: Option<PositionFix>,
    pub satellites_in_view: u32,
    pub satellites: Vec<SatelliteInfo>,
}

/// File-backed store: rewrites one JSON snapshot on every write so the
/// latest state is continuously fresh for live read-back.
pub struct JsonFileStore {
    path: PathBuf,
    next_id: u64,
    snapshot: StoreSnapshot,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonFileStore {
            path: path.as_ref().to_path_buf(),
            next_id: 0,
            snapshot: StoreSnapshot::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.snapshot)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<StoreSnapshot, StoreError> {
        let json = fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&json).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl PositionStore for JsonFileStore {
    fn write_position(&mut self, fix: &PositionFix) -> Result<u64, StoreError> {
        let id = if fix.store_id == 0 {
            self.next_id += 1;
            self.next_id
        } else {
            fix.store_id
        };
        let mut row = fix.clone();
        row.store_id = id;
        self.snapshot.fix = Some(row);
        self.save()?;
        Ok(id)
    }

    fn save_status(&mut self, status: &str, message: &str) -> Result<(), StoreError> {
        self.snapshot.status = status.to_string();
        self.snapshot.message = message.to_string();
        self.save()
    }

    fn write_satellites(&mut self, in_view: u32, sats: &[SatelliteInfo]) -> Result<(), StoreError> {
        self.snapshot.satellites_in_view = in_view;
        self.snapshot.satellites = sats.to_vec();
        self.save()
    }
}
