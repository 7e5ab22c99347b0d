use crate::position::SatelliteInfo;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration};

/// One decoded field update from the receiver's sentence decoder.
///
/// The decoder is external; it turns wire-format lines into these typed
/// events in whatever interleaving the receiver produces them (commonly
/// position + DOPs + speed once per second).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GpsEvent {
    Position { latitude: f64, longitude: f64 },
    Hdop(f64),
    Vdop(f64),
    Pdop(f64),
    Speed(f64),   // m/s
    Bearing(f64), // degrees
    Satellites { in_view: u32, sats: Vec<SatelliteInfo> },
}

/// Simulated 1 Hz receiver for demo/soak runs.
///
/// Emits a slowly drifting position with plausible DOP values, a satellite
/// snapshot every 10th cycle. Real deployments replace this task with a
/// serial reader feeding the same channel.
pub async fn receiver_loop(tx: Sender<GpsEvent>) {
    let mut ticker = interval(Duration::from_secs(1));
    let mut cycle = 0u64;

    loop {
        ticker.tick().await;
        cycle += 1;

        for event in mock_cycle(cycle) {
            match tx.try_send(event) {
                Ok(_) => {}
                Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                    eprintln!("[receiver] channel closed after {} cycles", cycle);
                    return;
                }
                Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                    // Channel full, drop this event
                }
            }
        }
    }
}

fn mock_cycle(cycle: u64) -> Vec<GpsEvent> {
    let seq = cycle as f64;

    // Roughly 11 m/s northbound: 0.0001 deg latitude per second
    let mut events = vec![
        GpsEvent::Position {
            latitude: 37.7749 + seq * 0.0001,
            longitude: -122.4194,
        },
        GpsEvent::Hdop(1.0 + (seq * 0.3).sin().abs() * 0.5),
        GpsEvent::Vdop(1.5 + (seq * 0.2).sin().abs() * 0.5),
        GpsEvent::Pdop(1.8 + (seq * 0.25).sin().abs() * 0.7),
        GpsEvent::Speed(11.0 + (seq * 0.5).sin() * 1.5),
        GpsEvent::Bearing(0.0),
    ];

    if cycle % 10 == 0 {
        events.push(GpsEvent::Satellites {
            in_view: 8,
            sats: (0..4)
                .map(|i| SatelliteInfo {
                    prn: 3 + i * 7,
                    elevation: 25 + i * 15,
                    azimuth: (40 + i * 90) % 360,
                    snr: 30 + i * 2,
                })
                .collect(),
        });
    }

    events
}
