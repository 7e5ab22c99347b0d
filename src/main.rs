use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use gps_tracker_rs::{
    events, GpsEvent, GpsManager, JsonFileStore, MockTransport, TrackerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "gps_tracker")]
#[command(about = "GPS position pipeline - aggregation, gating, decimated persistence", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Output directory for the live status snapshot
    #[arg(long, default_value = "gps_tracker_sessions")]
    output_dir: String,

    /// Device description the transport should match
    #[arg(long, default_value = "u-blox 7 GPS")]
    device: String,

    /// Meters of DOP-scaled displacement before motion is recomputed
    #[arg(long, default_value = "20.0")]
    min_distance_m: f64,

    /// PDOP pivot/floor for the quality gate
    #[arg(long, default_value = "3.0")]
    pdop_threshold: f64,

    /// Milliseconds between inserted history rows
    #[arg(long, default_value = "30000")]
    log_interval_ms: i64,

    /// Milliseconds between aggregation ticks
    #[arg(long, default_value = "1000")]
    tick_interval_ms: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("[{}] GPS Tracker Starting", ts_now());
    println!("  Duration: {} seconds (0=continuous)", args.duration);
    println!("  Device: {}", args.device);
    println!("  Output Dir: {}", args.output_dir);
    println!(
        "  Gate: {} m at PDOP threshold {}",
        args.min_distance_m, args.pdop_threshold
    );

    std::fs::create_dir_all(&args.output_dir)?;

    let config = TrackerConfig {
        min_distance_m: args.min_distance_m,
        pdop_threshold: args.pdop_threshold,
        log_interval_ms: args.log_interval_ms,
        tick_interval_ms: args.tick_interval_ms,
        ..TrackerConfig::default()
    };

    let store = JsonFileStore::new(format!("{}/live_status.json", args.output_dir));
    let transport = MockTransport::new(&args.device);
    let mut manager = GpsManager::new(transport, store, config.clone());

    manager.start_listening()?;
    println!("[{}] Listening on {}", ts_now(), args.device);

    // Simulated receiver feeding the pipeline's single driver loop; a real
    // deployment swaps this task for a serial reader on the same channel
    let (event_tx, mut event_rx) = mpsc::channel::<GpsEvent>(100);
    let _receiver_handle = tokio::spawn(events::receiver_loop(event_tx));

    let mut ticker = interval(Duration::from_millis(config.tick_interval_ms as u64));
    let start = Utc::now();
    let mut last_print = Utc::now();

    loop {
        if args.duration > 0 {
            let elapsed = Utc::now().signed_duration_since(start);
            if elapsed.num_seconds() as u64 >= args.duration {
                println!("[{}] Duration reached, stopping...", ts_now());
                break;
            }
        }

        tokio::select! {
            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(event) => manager.handle_event(event, now_ms()),
                    None => {
                        println!("[{}] Receiver channel closed", ts_now());
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                manager.tick(now_ms())?;

                let now = Utc::now();
                if now.signed_duration_since(last_print).num_seconds() >= 5 {
                    print_status(&manager);
                    last_print = now;
                }
            }
        }
    }

    manager.stop_listening();

    println!("\n=== Final State ===");
    print_status(&manager);

    Ok(())
}

fn print_status(manager: &GpsManager<MockTransport, JsonFileStore>) {
    match manager.current_position() {
        Some(fix) => println!(
            "[{}] {} | lat {:.5} lon {:.5} | pdop {:.1} | {:.1} m/s @ {:.0} deg | row {} | last sentence {} ms ago",
            ts_now(),
            manager.connection_state(),
            fix.latitude,
            fix.longitude,
            fix.pdop,
            fix.speed,
            fix.bearing,
            fix.store_id,
            manager.time_since_last_sentence(now_ms()),
        ),
        None => println!(
            "[{}] {} | no confirmed fix yet",
            ts_now(),
            manager.connection_state()
        ),
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
