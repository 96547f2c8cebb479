//! Stream events from the first supported device to stdout.
//!
//! Usage: cargo run --example stream
//! Press Ctrl+C to stop.

use std::sync::Arc;
use std::time::{Duration, Instant};
use vrtrack::{DeviceEvent, SessionConfig, TrackerRegistry, VrError};

fn main() {
    env_logger::init();

    let config = SessionConfig::from_env();
    let tracker = Arc::new(TrackerRegistry::new());

    let mut session = match vrtrack::open_first(&config, tracker.clone()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open device: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = session.start() {
        eprintln!("Failed to start {}: {}", session.name(), e);
        std::process::exit(1);
    }

    println!("Streaming {} (Ctrl+C to stop)...", session.name());
    for geometry in tracker.geometries() {
        println!("Registered LED model with {} LEDs", geometry.len());
    }

    let start = Instant::now();
    let mut imu_count: u64 = 0;
    let mut last_report = Instant::now();

    loop {
        match session.recv_timeout(Duration::from_secs(2)) {
            Ok(DeviceEvent::Imu(sample)) => {
                imu_count += 1;
                // Print every ~500th sample to avoid flooding the terminal
                if imu_count % 500 == 1 {
                    let a = sample.acceleration;
                    let w = sample.angular_velocity;
                    println!(
                        "t={:<14}  accel=[{:+.3}, {:+.3}, {:+.3}]  gyro=[{:+.3}, {:+.3}, {:+.3}]",
                        sample.time, a.x, a.y, a.z, w.x, w.y, w.z,
                    );
                }
            }
            Ok(DeviceEvent::Pulse(_)) => {}
            Ok(DeviceEvent::Diagnostic(d)) => {
                log::debug!("Diagnostic: {:?}", d);
            }
            Ok(event) => println!("{:?}", event),
            Err(VrError::Timeout) => {
                eprintln!("Timeout waiting for events");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }

        let now = Instant::now();
        if now.duration_since(last_report) >= Duration::from_secs(3) {
            let elapsed = start.elapsed().as_secs_f64();
            println!(
                "--- {} IMU samples in {:.1}s ({:.1} Hz) ---",
                imu_count,
                elapsed,
                imu_count as f64 / elapsed
            );
            last_report = now;
        }
    }

    session.stop();
}
