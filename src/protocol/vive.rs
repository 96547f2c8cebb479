//! HTC Vive controller (USB) reports.

use super::{extract_prefix, le16, le32, put_le16, put_le32, Report};
use crate::error::DecodeError;

/// Sensor id marking an unused pulse slot.
pub const EMPTY_PULSE: u16 = 0xffff;
/// Highest photodiode id the controller reports.
pub const MAX_SENSOR_ID: u16 = 31;
/// Largest valid range mode index.
pub const MAX_RANGE_MODE: u8 = 4;

/// One round-robin IMU slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViveImuSample {
    pub acc: [i16; 3],
    pub gyro: [i16; 3],
    pub time: u32,
    pub seq: u8,
}

/// Three most recent IMU samples (input report 0x20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImuReport {
    pub samples: [ViveImuSample; 3],
}

impl Report for ImuReport {
    const ID: u8 = 0x20;
    const SIZE: usize = 52;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut samples = [ViveImuSample::default(); 3];
        for (i, sample) in samples.iter_mut().enumerate() {
            let at = 1 + 17 * i;
            for axis in 0..3 {
                sample.acc[axis] = le16(buf, at + 2 * axis) as i16;
                sample.gyro[axis] = le16(buf, at + 6 + 2 * axis) as i16;
            }
            sample.time = le32(buf, at + 12);
            sample.seq = buf[at + 16];
        }
        Ok(Self { samples })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        for (i, sample) in self.samples.iter().enumerate() {
            let at = 1 + 17 * i;
            for axis in 0..3 {
                put_le16(buf, at + 2 * axis, sample.acc[axis] as u16);
                put_le16(buf, at + 6 + 2 * axis, sample.gyro[axis] as u16);
            }
            put_le32(buf, at + 12, sample.time);
            buf[at + 16] = sample.seq;
        }
    }
}

/// Gyro/accelerometer full-scale range selectors (feature report 0x01).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeModesReport {
    pub gyro_range: u8,
    pub accel_range: u8,
}

impl RangeModesReport {
    pub fn is_empty(&self) -> bool {
        self.gyro_range == 0 || self.accel_range == 0
    }
}

impl Report for RangeModesReport {
    const ID: u8 = 0x01;
    const SIZE: usize = 64;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            gyro_range: buf[1],
            accel_range: buf[2],
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        buf[1] = self.gyro_range;
        buf[2] = self.accel_range;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSlot {
    pub sensor_id: u16,
    pub duration: u16,
    pub timestamp: u32,
}

impl Default for PulseSlot {
    fn default() -> Self {
        Self {
            sensor_id: EMPTY_PULSE,
            duration: 0,
            timestamp: 0,
        }
    }
}

/// Lighthouse photodiode pulses, in arbitrary order (input report 0x21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseReport {
    pub pulses: [PulseSlot; 7],
}

impl Report for PulseReport {
    const ID: u8 = 0x21;
    const SIZE: usize = 58;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut pulses = [PulseSlot::default(); 7];
        for (i, pulse) in pulses.iter_mut().enumerate() {
            let at = 1 + 8 * i;
            pulse.sensor_id = le16(buf, at);
            pulse.duration = le16(buf, at + 2);
            pulse.timestamp = le32(buf, at + 4);
        }
        Ok(Self { pulses })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        for (i, pulse) in self.pulses.iter().enumerate() {
            let at = 1 + 8 * i;
            put_le16(buf, at, pulse.sensor_id);
            put_le16(buf, at + 2, pulse.duration);
            put_le32(buf, at + 4, pulse.timestamp);
        }
    }
}

/// Button and touchpad state (input report 0x01 on the button interface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonReport {
    pub maybe_type: u16,
    pub sequence: u32,
    pub buttons: u32,
    pub battery: u16,
    pub touch: [u16; 2],
}

impl ButtonReport {
    /// Battery-only update: a battery reading with an empty button field is not
    /// a release of every button.
    pub fn is_heartbeat(&self) -> bool {
        self.battery != 0 && self.buttons == 0
    }
}

impl Report for ButtonReport {
    const ID: u8 = 0x01;
    const SIZE: usize = 64;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            maybe_type: le16(buf, 2),
            sequence: le32(buf, 4),
            buttons: le32(buf, 8),
            battery: le16(buf, 12),
            touch: [le16(buf, 14), le16(buf, 16)],
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 2, self.maybe_type);
        put_le32(buf, 4, self.sequence);
        put_le32(buf, 8, self.buttons);
        put_le16(buf, 12, self.battery);
        put_le16(buf, 14, self.touch[0]);
        put_le16(buf, 16, self.touch[1]);
    }
}

/// Firmware and hardware revision (feature report 0x05).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersionReport {
    pub firmware_version: u32,
    pub string1: [u8; 16],
    pub string2: [u8; 16],
    pub hardware: [u8; 4],
    pub fpga_version: [u8; 2],
}

impl FirmwareVersionReport {
    /// Hardware revision as `major.minor.micro rev`.
    pub fn hardware_version(&self) -> String {
        format!(
            "{}.{}.{} rev {}",
            self.hardware[2], self.hardware[1], self.hardware[0], self.hardware[3]
        )
    }

    pub fn fpga_version(&self) -> String {
        format!("{}.{}", self.fpga_version[1], self.fpga_version[0])
    }

    pub fn build_string(&self) -> String {
        extract_prefix(&self.string1, |b| b.is_ascii_graphic() || b == b' ')
    }
}

impl Report for FirmwareVersionReport {
    const ID: u8 = 0x05;
    const SIZE: usize = 64;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut string1 = [0u8; 16];
        let mut string2 = [0u8; 16];
        string1.copy_from_slice(&buf[9..25]);
        string2.copy_from_slice(&buf[25..41]);
        Ok(Self {
            firmware_version: le32(buf, 1),
            string1,
            string2,
            hardware: [buf[41], buf[42], buf[43], buf[44]],
            fpga_version: [buf[49], buf[50]],
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le32(buf, 1, self.firmware_version);
        buf[9..25].copy_from_slice(&self.string1);
        buf[25..41].copy_from_slice(&self.string2);
        buf[41..45].copy_from_slice(&self.hardware);
        buf[49..51].copy_from_slice(&self.fpga_version);
    }
}
