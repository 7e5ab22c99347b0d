//! GPS position pipeline: fix aggregation, DOP/displacement quality
//! gating, great-circle motion estimation, decimated persistence and the
//! connection/recording state machine, fed by a serial-attached receiver.

pub mod aggregator;
pub mod config;
pub mod events;
pub mod manager;
pub mod motion;
pub mod position;
pub mod quality;
pub mod scheduler;
pub mod store;
pub mod transport;

pub use aggregator::FixAggregator;
pub use config::TrackerConfig;
pub use events::GpsEvent;
pub use manager::{ConnectionState, GpsManager};
pub use motion::MotionError;
pub use position::{PositionFix, SatelliteInfo};
pub use quality::{GateDecision, QualityGate};
pub use scheduler::PersistenceScheduler;
pub use store::{JsonFileStore, MemoryStore, PositionStore, StoreError};
pub use transport::{MockTransport, SentenceTransport, TransportError};
