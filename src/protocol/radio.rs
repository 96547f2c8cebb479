//! Rift CV1 radio reports: the control/data feature pair used to query wireless
//! peers, and the multiplexed input message carrying their telemetry.

use super::{extract_prefix, le16, le32, put_le16, put_le32, Report};
use crate::error::DecodeError;

// -- Control commands (second byte of the control triple) --
pub const SERIAL_NUMBER_CONTROL: u8 = 0x88;
pub const FIRMWARE_VERSION_CONTROL: u8 = 0x82;

// -- Control status bits (first byte of the control triple, read back) --
pub const STATUS_BUSY: u8 = 0x80;
pub const STATUS_ERROR: u8 = 0x08;

// -- Device type tags --
pub const DEVICE_REMOTE: u8 = 1;
pub const DEVICE_TOUCH_LEFT: u8 = 2;
pub const DEVICE_TOUCH_RIGHT: u8 = 3;

// -- Touch capacitive ADC channels --
pub const ADC_STICK: u8 = 0x01;
pub const ADC_B_Y: u8 = 0x02;
pub const ADC_TRIGGER: u8 = 0x03;
pub const ADC_A_X: u8 = 0x08;
pub const ADC_REST: u8 = 0x09;

/// Starts a radio control transfer (feature report 0x1a).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioControlReport {
    pub echo: u16,
    pub command: [u8; 3],
}

impl RadioControlReport {
    pub fn new(a: u8, b: u8, c: u8) -> Self {
        Self {
            echo: 0,
            command: [a, b, c],
        }
    }

    pub fn is_busy(&self) -> bool {
        self.command[0] & STATUS_BUSY != 0
    }

    pub fn is_error(&self) -> bool {
        self.command[0] & STATUS_ERROR != 0
    }
}

impl Report for RadioControlReport {
    const ID: u8 = 0x1a;
    const SIZE: usize = 6;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            echo: le16(buf, 1),
            command: [buf[3], buf[4], buf[5]],
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        buf[3..6].copy_from_slice(&self.command);
    }
}

/// Result of a completed radio control transfer (feature report 0x1b).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioDataReport {
    pub echo: u16,
    pub payload: [u8; 28],
}

impl RadioDataReport {
    /// Serial number of a wireless peer.
    pub fn serial(&self) -> String {
        extract_prefix(&self.payload[5..19], |b| b.is_ascii_alphanumeric())
    }

    /// Firmware build date of a wireless peer.
    pub fn firmware_date(&self) -> String {
        extract_prefix(&self.payload[3..14], |b| b.is_ascii_graphic() || b == b' ')
    }

    /// Firmware version of a wireless peer or of the headset itself.
    pub fn firmware_version(&self) -> String {
        extract_prefix(&self.payload[14..24], |b| b.is_ascii_alphanumeric())
    }
}

impl Report for RadioDataReport {
    const ID: u8 = 0x1b;
    const SIZE: usize = 31;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut payload = [0u8; 28];
        payload.copy_from_slice(&buf[3..31]);
        Ok(Self {
            echo: le16(buf, 1),
            payload,
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        buf[3..31].copy_from_slice(&self.payload);
    }
}

/// Remote button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteMessage {
    pub buttons: u16,
}

/// Touch controller telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchMessage {
    pub timestamp: u32,
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
    pub buttons: u8,
    /// 10-bit analog values.
    pub trigger: u16,
    pub grip: u16,
    pub stick: [u16; 2],
    pub adc_channel: u8,
    pub adc_value: u16,
}

/// Unpacks trigger, grip and both stick axes (10 bits each) from 5 bytes.
///
/// Bit layout, least significant first: trigger 0..10, grip 10..20,
/// stick x 20..30, stick y 30..40.
pub fn unpack_trigger_grip_stick(tgs: &[u8; 5]) -> (u16, u16, [u16; 2]) {
    let b = tgs.map(|b| b as u16);
    let trigger = b[0] | ((b[1] & 0x03) << 8);
    let grip = ((b[1] & 0xfc) >> 2) | ((b[2] & 0x0f) << 6);
    let stick = [
        ((b[2] & 0xf0) >> 4) | ((b[3] & 0x3f) << 4),
        ((b[3] & 0xc0) >> 6) | (b[4] << 2),
    ];
    (trigger, grip, stick)
}

/// Inverse of [`unpack_trigger_grip_stick`]. Values are truncated to 10 bits.
pub fn pack_trigger_grip_stick(trigger: u16, grip: u16, stick: [u16; 2]) -> [u8; 5] {
    let packed = (trigger as u64 & 0x3ff)
        | ((grip as u64 & 0x3ff) << 10)
        | ((stick[0] as u64 & 0x3ff) << 20)
        | ((stick[1] as u64 & 0x3ff) << 30);
    let bytes = packed.to_le_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioPayload {
    Remote(RemoteMessage),
    Touch(TouchMessage),
    /// Device type without a known payload layout.
    Unknown,
}

/// Multiplexed telemetry from a wireless peer (input report 0x0c).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioMessage {
    pub echo: u16,
    pub device_type: u8,
    pub payload: RadioPayload,
}

impl Report for RadioMessage {
    const ID: u8 = 0x0c;
    const SIZE: usize = 64;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        let device_type = buf[5];
        let payload = match device_type {
            DEVICE_REMOTE => RadioPayload::Remote(RemoteMessage {
                buttons: le16(buf, 8),
            }),
            DEVICE_TOUCH_LEFT | DEVICE_TOUCH_RIGHT => {
                let mut tgs = [0u8; 5];
                tgs.copy_from_slice(&buf[25..30]);
                let (trigger, grip, stick) = unpack_trigger_grip_stick(&tgs);
                RadioPayload::Touch(TouchMessage {
                    timestamp: le32(buf, 8),
                    accel: [
                        le16(buf, 12) as i16,
                        le16(buf, 14) as i16,
                        le16(buf, 16) as i16,
                    ],
                    gyro: [
                        le16(buf, 18) as i16,
                        le16(buf, 20) as i16,
                        le16(buf, 22) as i16,
                    ],
                    buttons: buf[24],
                    trigger,
                    grip,
                    stick,
                    adc_channel: buf[30],
                    adc_value: le16(buf, 31),
                })
            }
            _ => RadioPayload::Unknown,
        };
        Ok(Self {
            echo: le16(buf, 1),
            device_type,
            payload,
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        buf[5] = self.device_type;
        match &self.payload {
            RadioPayload::Remote(remote) => put_le16(buf, 8, remote.buttons),
            RadioPayload::Touch(touch) => {
                put_le32(buf, 8, touch.timestamp);
                for i in 0..3 {
                    put_le16(buf, 12 + 2 * i, touch.accel[i] as u16);
                    put_le16(buf, 18 + 2 * i, touch.gyro[i] as u16);
                }
                buf[24] = touch.buttons;
                buf[25..30].copy_from_slice(&pack_trigger_grip_stick(
                    touch.trigger,
                    touch.grip,
                    touch.stick,
                ));
                buf[30] = touch.adc_channel;
                put_le16(buf, 31, touch.adc_value);
            }
            RadioPayload::Unknown => {}
        }
    }
}

/// True for the radio's out-of-band keepalive: every byte after the first is zero.
pub fn is_radio_heartbeat(buf: &[u8]) -> bool {
    buf.iter().skip(1).all(|&b| b == 0)
}
