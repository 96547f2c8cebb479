//! # vrtrack - HID drivers for Oculus Rift and HTC Vive tracking hardware
//!
//! Talks to the devices over hidapi and turns their reports into time-ordered
//! events. Provides:
//! - Report codecs for the Rift DK2/CV1 and the Vive controller (USB)
//! - IMU sample de-duplication and 64-bit device time
//! - CV1 radio routing for the remote and Touch controllers
//! - LED geometry hand-off to an optical tracker
//!
//! ## Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use vrtrack::{DeviceEvent, SessionConfig, TrackerRegistry};
//!
//! let tracker = Arc::new(TrackerRegistry::new());
//! let mut session = vrtrack::open_first(&SessionConfig::from_env(), tracker).unwrap();
//! session.start().unwrap();
//! for _ in 0..100 {
//!     if let DeviceEvent::Imu(sample) = session.recv_timeout(Duration::from_secs(1)).unwrap() {
//!         println!("accel: {:?}", sample.acceleration);
//!     }
//! }
//! session.stop();
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod protocol;
pub mod pattern;
pub mod imu;
pub mod buttons;
pub mod hid;
pub mod poller;
pub mod tracker;
pub mod session;
pub mod radio;
pub mod rift;
pub mod vive_controller;
pub mod device;

pub use config::SessionConfig;
pub use device::{list_devices, open, open_first};
pub use error::{ActivationError, DecodeError, IoError, VrError};
pub use session::{Session, SessionState};
pub use tracker::{LedGeometry, Tracker, TrackerRegistry};
pub use types::*;

/// Result type alias for vrtrack operations.
pub type Result<T> = std::result::Result<T, VrError>;
