//! Oculus Rift DK2/CV1 feature and input reports.

use super::{be64, le16, le32, pack_3x21, put_be64, put_le16, put_le32, unpack_3x21, Report};
use crate::error::DecodeError;
use crate::types::{DisplayFlags, PowerComponents, TrackingFlags};

pub const KEEPALIVE_TYPE: u8 = 0x0b;
pub const KEEPALIVE_TIMEOUT_MS: u16 = 10_000;

pub const TRACKING_EXPOSURE_US: u16 = 350;
pub const TRACKING_PERIOD_US: u16 = 16_666;
pub const TRACKING_VSYNC_OFFSET: u16 = 0;
pub const TRACKING_DUTY_CYCLE: u8 = 0x7f;

/// Lowest report rate the sensor accepts, in Hz.
pub const MIN_REPORT_RATE: u32 = 5;

/// Sensor configuration (feature report 0x02).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigReport {
    pub echo: u16,
    pub flags: u8,
    pub packet_interval: u8,
    pub sample_rate: u16,
}

impl ConfigReport {
    /// Reports per second given the current sample rate and interval.
    pub fn report_rate(&self) -> u32 {
        self.sample_rate as u32 / (self.packet_interval as u32 + 1)
    }

    /// Sets the packet interval for `rate`, clamped to [5 Hz, sample rate].
    /// Returns the rate actually applied.
    pub fn set_report_rate(&mut self, rate: u32) -> u32 {
        let sample_rate = (self.sample_rate as u32).max(MIN_REPORT_RATE);
        let rate = rate.min(sample_rate).max(MIN_REPORT_RATE);
        self.packet_interval = (sample_rate / rate - 1).min(u8::MAX as u32) as u8;
        rate
    }
}

impl Report for ConfigReport {
    const ID: u8 = 0x02;
    const SIZE: usize = 7;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            echo: le16(buf, 1),
            flags: buf[3],
            packet_interval: buf[4],
            sample_rate: le16(buf, 5),
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        buf[3] = self.flags;
        buf[4] = self.packet_interval;
        put_le16(buf, 5, self.sample_rate);
    }
}

/// Kind of entry in the factory position table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    Led,
    Imu,
    Other(u16),
}

impl PositionKind {
    fn from_raw(raw: u16) -> Self {
        match raw {
            0 => PositionKind::Led,
            1 => PositionKind::Imu,
            other => PositionKind::Other(other),
        }
    }

    fn raw(self) -> u16 {
        match self {
            PositionKind::Led => 0,
            PositionKind::Imu => 1,
            PositionKind::Other(other) => other,
        }
    }
}

/// One entry of the factory-calibrated LED/IMU position table (feature report 0x0f).
///
/// Positions are in µm in the headset frame: +x left, +y up, +z forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionReport {
    pub echo: u16,
    pub position: [i32; 3],
    pub direction: [i16; 3],
    pub index: u16,
    pub num: u16,
    pub kind: PositionKind,
}

impl Report for PositionReport {
    const ID: u8 = 0x0f;
    const SIZE: usize = 30;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            echo: le16(buf, 1),
            position: [
                le32(buf, 4) as i32,
                le32(buf, 8) as i32,
                le32(buf, 12) as i32,
            ],
            direction: [
                le16(buf, 16) as i16,
                le16(buf, 18) as i16,
                le16(buf, 20) as i16,
            ],
            index: le16(buf, 24),
            num: le16(buf, 26),
            kind: PositionKind::from_raw(le16(buf, 28)),
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        for (i, p) in self.position.iter().enumerate() {
            put_le32(buf, 4 + 4 * i, *p as u32);
        }
        for (i, d) in self.direction.iter().enumerate() {
            put_le16(buf, 16 + 2 * i, *d as u16);
        }
        put_le16(buf, 24, self.index);
        put_le16(buf, 26, self.num);
        put_le16(buf, 28, self.kind.raw());
    }
}

/// One LED blink pattern (feature report 0x10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedPatternReport {
    pub echo: u16,
    pub pattern_length: u8,
    /// 2-bit-per-symbol packed pattern, see [`crate::pattern`].
    pub pattern: u32,
    pub index: u16,
    pub num: u16,
}

impl Report for LedPatternReport {
    const ID: u8 = 0x10;
    const SIZE: usize = 12;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            echo: le16(buf, 1),
            pattern_length: buf[3],
            pattern: le32(buf, 4),
            index: le16(buf, 8),
            num: le16(buf, 10),
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        buf[3] = self.pattern_length;
        put_le32(buf, 4, self.pattern);
        put_le16(buf, 8, self.index);
        put_le16(buf, 10, self.num);
    }
}

/// Keeps the sensor streaming for `timeout_ms` (feature report 0x11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveReport {
    pub echo: u16,
    pub kind: u8,
    pub timeout_ms: u16,
}

impl Default for KeepaliveReport {
    fn default() -> Self {
        Self {
            echo: 0,
            kind: KEEPALIVE_TYPE,
            timeout_ms: KEEPALIVE_TIMEOUT_MS,
        }
    }
}

impl Report for KeepaliveReport {
    const ID: u8 = 0x11;
    const SIZE: usize = 6;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            echo: le16(buf, 1),
            kind: buf[3],
            timeout_ms: le16(buf, 4),
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        buf[3] = self.kind;
        put_le16(buf, 4, self.timeout_ms);
    }
}

/// IR LED illumination control (feature report 0x0c).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingReport {
    pub echo: u16,
    pub pattern: u8,
    pub flags: TrackingFlags,
    pub exposure_us: u16,
    pub period_us: u16,
    pub vsync_offset: u16,
    pub duty_cycle: u8,
}

impl TrackingReport {
    /// Tracking enabled, either cycling blink patterns or lit steadily.
    pub fn enabled(blink: bool) -> Self {
        let (pattern, flags) = if blink {
            (
                0,
                TrackingFlags::ENABLE | TrackingFlags::USE_CARRIER | TrackingFlags::AUTO_INCREMENT,
            )
        } else {
            (0xff, TrackingFlags::ENABLE | TrackingFlags::USE_CARRIER)
        };
        Self {
            echo: 0,
            pattern,
            flags,
            exposure_us: TRACKING_EXPOSURE_US,
            period_us: TRACKING_PERIOD_US,
            vsync_offset: TRACKING_VSYNC_OFFSET,
            duty_cycle: TRACKING_DUTY_CYCLE,
        }
    }
}

impl Report for TrackingReport {
    const ID: u8 = 0x0c;
    const SIZE: usize = 13;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            echo: le16(buf, 1),
            pattern: buf[3],
            flags: TrackingFlags::from_bits_retain(buf[4]),
            exposure_us: le16(buf, 6),
            period_us: le16(buf, 8),
            vsync_offset: le16(buf, 10),
            duty_cycle: buf[12],
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        buf[3] = self.pattern;
        buf[4] = self.flags.bits();
        put_le16(buf, 6, self.exposure_us);
        put_le16(buf, 8, self.period_us);
        put_le16(buf, 10, self.vsync_offset);
        buf[12] = self.duty_cycle;
    }
}

/// Display timing (feature report 0x0d).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayReport {
    pub echo: u16,
    pub brightness: u8,
    pub flags: u8,
    pub flags2: DisplayFlags,
    pub unknown_6: u16,
    pub persistence: u16,
    pub lighting_offset: u16,
    pub pixel_settle: u16,
    pub total_rows: u16,
}

impl DisplayReport {
    /// Low persistence lights the panel for 18% of the frame at full brightness.
    pub fn configure(&mut self, low_persistence: bool, pixel_readback: bool) {
        if low_persistence {
            self.brightness = 255;
            self.persistence = (self.total_rows as u32 * 18 / 100) as u16;
        } else {
            self.brightness = 0;
            self.persistence = self.total_rows;
        }
        self.flags2.set(DisplayFlags::READ_PIXEL, pixel_readback);
        self.flags2.remove(DisplayFlags::DIRECT_PENTILE);
    }
}

impl Report for DisplayReport {
    const ID: u8 = 0x0d;
    const SIZE: usize = 16;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            echo: le16(buf, 1),
            brightness: buf[3],
            flags: buf[4],
            flags2: DisplayFlags::from_bits_retain(buf[5]),
            unknown_6: le16(buf, 6),
            persistence: le16(buf, 8),
            lighting_offset: le16(buf, 10),
            pixel_settle: le16(buf, 12),
            total_rows: le16(buf, 14),
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        buf[3] = self.brightness;
        buf[4] = self.flags;
        buf[5] = self.flags2.bits();
        put_le16(buf, 6, self.unknown_6);
        put_le16(buf, 8, self.persistence);
        put_le16(buf, 10, self.lighting_offset);
        put_le16(buf, 12, self.pixel_settle);
        put_le16(buf, 14, self.total_rows);
    }
}

/// CV1 component power switches (feature report 0x14).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerReport {
    pub echo: u16,
    pub components: PowerComponents,
}

impl Report for PowerReport {
    const ID: u8 = 0x14;
    const SIZE: usize = 4;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            echo: le16(buf, 1),
            components: PowerComponents::from_bits_retain(buf[3]),
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        buf[3] = self.components.bits();
    }
}

/// Raw accelerometer and gyroscope lanes in 10⁻⁴ m/s² and 10⁻⁴ rad/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawImuSample {
    pub accel: [i32; 3],
    pub gyro: [i32; 3],
}

/// Periodic sensor message (input report 0x0b).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorMessage {
    pub echo: u16,
    pub num_samples: u8,
    pub sample_count: u16,
    /// 10⁻² °C.
    pub temperature: i16,
    /// µs, wraps every ~72 minutes.
    pub timestamp: u32,
    pub samples: [RawImuSample; 2],
    /// 10⁻⁴ gauss.
    pub mag: [i16; 3],
    pub frame_count: u16,
    pub frame_timestamp: u32,
    pub frame_id: u8,
    pub led_pattern_phase: u8,
    pub exposure_count: u16,
    pub exposure_timestamp: u32,
}

impl SensorMessage {
    /// Samples actually carried by this message (one or two).
    pub fn valid_samples(&self) -> &[RawImuSample] {
        let n = if self.num_samples > 1 { 2 } else { 1 };
        &self.samples[..n]
    }
}

impl Report for SensorMessage {
    const ID: u8 = 0x0b;
    const SIZE: usize = 64;

    fn decode_fields(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut samples = [RawImuSample::default(); 2];
        for (i, sample) in samples.iter_mut().enumerate() {
            let at = 12 + 16 * i;
            sample.accel = unpack_3x21(be64(buf, at));
            sample.gyro = unpack_3x21(be64(buf, at + 8));
        }
        Ok(Self {
            echo: le16(buf, 1),
            num_samples: buf[3],
            sample_count: le16(buf, 4),
            temperature: le16(buf, 6) as i16,
            timestamp: le32(buf, 8),
            samples,
            mag: [
                le16(buf, 44) as i16,
                le16(buf, 46) as i16,
                le16(buf, 48) as i16,
            ],
            frame_count: le16(buf, 50),
            frame_timestamp: le32(buf, 52),
            frame_id: buf[56],
            led_pattern_phase: buf[57],
            exposure_count: le16(buf, 58),
            exposure_timestamp: le32(buf, 60),
        })
    }

    fn encode_fields(&self, buf: &mut [u8]) {
        put_le16(buf, 1, self.echo);
        buf[3] = self.num_samples;
        put_le16(buf, 4, self.sample_count);
        put_le16(buf, 6, self.temperature as u16);
        put_le32(buf, 8, self.timestamp);
        for (i, sample) in self.samples.iter().enumerate() {
            let at = 12 + 16 * i;
            put_be64(buf, at, pack_3x21(sample.accel));
            put_be64(buf, at + 8, pack_3x21(sample.gyro));
        }
        for (i, m) in self.mag.iter().enumerate() {
            put_le16(buf, 44 + 2 * i, *m as u16);
        }
        put_le16(buf, 50, self.frame_count);
        put_le32(buf, 52, self.frame_timestamp);
        buf[56] = self.frame_id;
        buf[57] = self.led_pattern_phase;
        put_le16(buf, 58, self.exposure_count);
        put_le32(buf, 60, self.exposure_timestamp);
    }
}
