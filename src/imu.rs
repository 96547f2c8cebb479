//! IMU sample reconciliation: duplicate suppression across round-robin slots and
//! extension of 32-bit hardware clocks to a monotonic 64-bit time base.

use crate::error::DecodeError;
use crate::protocol::vive::{ImuReport, RangeModesReport, MAX_RANGE_MODE};
use crate::types::{ImuSample, Vec3};

/// Index of the oldest of three consecutive round-robin sequence counters.
///
/// Falls back to slot 0 when no slot trails the others by exactly two.
pub fn oldest_slot(seq: [u8; 3]) -> usize {
    let [a, b, c] = seq;
    if a == b.wrapping_add(2) {
        1
    } else if b == c.wrapping_add(2) {
        2
    } else {
        0
    }
}

/// Decides which of three round-robin IMU slots hold samples not yet delivered.
#[derive(Debug, Clone, Default)]
pub struct SequenceReconciler {
    last: u8,
}

impl SequenceReconciler {
    pub fn new(last_delivered: u8) -> Self {
        Self {
            last: last_delivered,
        }
    }

    pub fn last_delivered(&self) -> u8 {
        self.last
    }

    /// Returns the slots to deliver, oldest first, and records them as delivered.
    ///
    /// A slot is skipped if its counter equals the last delivered counter or one
    /// of the two before it.
    pub fn reconcile(&mut self, seq: [u8; 3]) -> Vec<usize> {
        let mut slot = oldest_slot(seq);
        let mut fresh = Vec::with_capacity(3);
        for _ in 0..3 {
            let s = seq[slot];
            if s != self.last && s != self.last.wrapping_sub(1) && s != self.last.wrapping_sub(2) {
                fresh.push(slot);
                self.last = s;
            }
            slot = (slot + 1) % 3;
        }
        fresh
    }
}

/// Extends a wrapping 32-bit tick counter to 64 bits.
///
/// Assumes at most one wrap between consecutive observations.
#[derive(Debug, Clone, Default)]
pub struct TimestampUnwrapper {
    time: u64,
}

impl TimestampUnwrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest unwrapped time.
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn unwrap(&mut self, tick: u32) -> u64 {
        let mut base = self.time & !0xffff_ffff;
        if tick < self.time as u32 {
            base += 1 << 32;
        }
        self.time = base | tick as u64;
        self.time
    }
}

/// Full-scale ranges of the Vive IMU (MPU-6500).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuRange {
    /// Gyro full scale in rad/s (±250°/s ≪ mode).
    pub gyro: f32,
    /// Accelerometer full scale in m/s² (±2 g ≪ mode).
    pub accel: f32,
}

impl ImuRange {
    pub fn from_report(report: &RangeModesReport) -> Result<Self, DecodeError> {
        for (field, value) in [("gyro_range", report.gyro_range), ("accel_range", report.accel_range)] {
            if value > MAX_RANGE_MODE {
                return Err(DecodeError::OutOfRange {
                    field,
                    value: value as u32,
                    limit: MAX_RANGE_MODE as u32,
                });
            }
        }
        Ok(Self {
            gyro: (std::f32::consts::PI / 180.0) * (250u32 << report.gyro_range) as f32,
            accel: 9.80665 * (2u32 << report.accel_range) as f32,
        })
    }

    fn scale(raw: [i16; 3], range: f32) -> Vec3 {
        let k = range / 32768.0;
        Vec3::new(raw[0] as f32 * k, raw[1] as f32 * k, raw[2] as f32 * k)
    }
}

/// Per-device Vive IMU decoder state.
#[derive(Debug, Clone, Default)]
pub struct ViveImu {
    reconciler: SequenceReconciler,
    clock: TimestampUnwrapper,
}

impl ViveImu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sequence(&self) -> u8 {
        self.reconciler.last_delivered()
    }

    /// Decodes the samples of `report` that were not delivered before, in
    /// time order.
    pub fn decode(&mut self, report: &ImuReport, range: &ImuRange) -> Vec<ImuSample> {
        let seq = report.samples.map(|s| s.seq);
        self.reconciler
            .reconcile(seq)
            .into_iter()
            .map(|slot| {
                let raw = &report.samples[slot];
                ImuSample {
                    acceleration: ImuRange::scale(raw.acc, range.accel),
                    angular_velocity: ImuRange::scale(raw.gyro, range.gyro),
                    magnetic_field: None,
                    temperature: None,
                    time: self.clock.unwrap(raw.time),
                    sequence: Some(raw.seq),
                }
            })
            .collect()
    }
}
