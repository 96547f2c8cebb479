use crate::error::DecodeError;
use std::ffi::CString;

/// Three-component vector in the device's local frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One decoded inertial sample, ready for pose fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// Acceleration in m/s².
    pub acceleration: Vec3,
    /// Angular velocity in rad/s.
    pub angular_velocity: Vec3,
    /// Magnetic field in gauss, if the device has a magnetometer.
    pub magnetic_field: Option<Vec3>,
    /// Die temperature in °C, if reported.
    pub temperature: Option<f32>,
    /// Monotonic 64-bit device time (µs on the Rift, raw IMU ticks on the Vive).
    pub time: u64,
    /// Hardware sequence number, if the transport tags samples.
    pub sequence: Option<u8>,
}

/// A single IR pulse seen by a Lighthouse photodiode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LighthousePulse {
    pub sensor_id: u8,
    pub duration: u16,
    pub timestamp: u32,
}

/// Logical controller buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Trigger,
    Grip,
    Menu,
    System,
    Thumb,
    ThumbTouch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: Button,
    pub pressed: bool,
}

/// Logical peers behind the CV1 radio receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadioTarget {
    Remote,
    TouchLeft,
    TouchRight,
}

impl RadioTarget {
    pub fn name(self) -> &'static str {
        match self {
            RadioTarget::Remote => "Remote",
            RadioTarget::TouchLeft => "Left Touch Controller",
            RadioTarget::TouchRight => "Right Touch Controller",
        }
    }
}

/// Latched analog and capacitive state of a Touch controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchInput {
    pub buttons: u8,
    pub trigger: u16,
    pub grip: u16,
    pub stick: [u16; 2],
    pub cap_a_x: u16,
    pub cap_b_y: u16,
    pub cap_rest: u16,
    pub cap_stick: u16,
    pub cap_trigger: u16,
}

/// Something the poll loop dropped instead of decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Input report of unexpected length or id on the given interface.
    InvalidReport { interface: usize, len: usize, id: u8 },
    /// Report with the right shape but malformed content.
    Malformed(DecodeError),
    UnknownRadioDevice(u8),
    UnknownRadioMessage { len: usize },
    UnhandledSensorId(u16),
    ActivationFailed { target: RadioTarget, reason: String },
}

/// Everything a session delivers to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Imu(ImuSample),
    Pulse(LighthousePulse),
    Button(ButtonEvent),
    RemoteButtons(u16),
    Touch { target: RadioTarget, input: TouchInput },
    Activated {
        target: RadioTarget,
        serial: String,
        firmware_version: String,
    },
    Diagnostic(Diagnostic),
}

/// Supported hardware families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    RiftDk2,
    RiftCv1,
    ViveControllerUsb,
}

impl DeviceKind {
    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::RiftDk2 => "Rift DK2",
            DeviceKind::RiftCv1 => "Rift CV1",
            DeviceKind::ViveControllerUsb => "Vive Controller USB",
        }
    }
}

/// A physical device found during enumeration, with one path per HID interface.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub kind: DeviceKind,
    pub serial: String,
    /// `(interface number, hidraw path)` sorted by interface number.
    pub interfaces: Vec<(i32, CString)>,
}

impl DeviceInfo {
    pub fn interface_path(&self, number: i32) -> Option<&CString> {
        self.interfaces
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, path)| path)
    }
}

bitflags::bitflags! {
    /// Rift tracking report flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TrackingFlags: u8 {
        const ENABLE         = 1 << 0;
        const AUTO_INCREMENT = 1 << 1;
        const USE_CARRIER    = 1 << 2;
        const SYNC_INPUT     = 1 << 3;
        const VSYNC_LOCK     = 1 << 4;
        const CUSTOM_PATTERN = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Second flag byte of the Rift display report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisplayFlags: u8 {
        const READ_PIXEL     = 1 << 2;
        const DIRECT_PENTILE = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Rift CV1 power-switchable components.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PowerComponents: u8 {
        const DISPLAY = 1 << 0;
        const AUDIO   = 1 << 1;
        const LEDS    = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Button bits of the Vive controller USB button report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ViveButtons: u32 {
        const TRIGGER = 1 << 0;
        const GRIP    = 1 << 2;
        const MENU    = 1 << 12;
        const SYSTEM  = 1 << 13;
        const THUMB   = 1 << 18;
        const TOUCH   = 1 << 20;
    }
}
