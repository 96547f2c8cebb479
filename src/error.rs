use crate::session::SessionState;

/// Transport-level failures reported by a [`Transport`](crate::hid::Transport).
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("HID error: {0}")]
    Hid(hidapi::HidError),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Control transfer stalled")]
    Stalled,

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Timeout waiting for transport")]
    Timeout,
}

impl IoError {
    /// Returns true if the transport is gone and the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IoError::Disconnected)
    }
}

impl From<hidapi::HidError> for IoError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string().to_ascii_lowercase();
        if msg.contains("disconnected")
            || msg.contains("no such device")
            || msg.contains("not found")
            || msg.contains("bad file descriptor")
        {
            IoError::Disconnected
        } else if msg.contains("broken pipe") {
            IoError::Stalled
        } else {
            IoError::Hid(e)
        }
    }
}

/// A single malformed report. Never fatal to a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Report 0x{id:02x} too short: expected {expected} bytes, got {actual}")]
    TooShort {
        id: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Wrong report id: expected 0x{expected:02x}, got 0x{actual:02x}")]
    WrongId { expected: u8, actual: u8 },

    #[error("{field} out of range: {value} (limit {limit})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        limit: u32,
    },

    #[error("Invalid LED pattern 0x{pattern:x} (length {length})")]
    InvalidPattern { length: u8, pattern: u32 },
}

/// Radio sub-device serial/firmware query failures.
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("Radio control transfer failed: {0}")]
    Io(#[from] IoError),

    #[error("Radio control transfer still busy after {0} polls")]
    Busy(usize),

    #[error("Radio control transfer rejected (status 0x{0:02x})")]
    Rejected(u8),

    #[error("Radio data report malformed: {0}")]
    Decode(#[from] DecodeError),
}

/// Errors that can occur when driving a tracking device.
#[derive(Debug, thiserror::Error)]
pub enum VrError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error("No supported tracking device found")]
    DeviceNotFound,

    #[error("Unsupported device VID={vid:04X} PID={pid:04X}")]
    UnsupportedDevice { vid: u16, pid: u16 },

    #[error("Cannot {op} a session in state {from:?}")]
    InvalidState { from: SessionState, op: &'static str },

    #[error("Session thread error: {0}")]
    Thread(String),

    #[error("Event stream stopped")]
    StreamStopped,

    #[error("Timeout waiting for data")]
    Timeout,
}

impl From<hidapi::HidError> for VrError {
    fn from(e: hidapi::HidError) -> Self {
        VrError::Io(IoError::from(e))
    }
}
