//! HTC Vive controller connected over USB.
//!
//! The controller exposes three HID interfaces: IMU samples, Lighthouse pulse
//! timings, and buttons. Feature reports go to the IMU interface.

use crate::buttons::{ButtonState, VIVE_CONTROLLER_BUTTON_MAP};
use crate::config::SessionConfig;
use crate::error::IoError;
use crate::hid::{FeatureExt, Transport};
use crate::imu::{ImuRange, ViveImu};
use crate::poller::InputPoller;
use crate::protocol::vive::{
    ButtonReport, FirmwareVersionReport, ImuReport, PulseReport, RangeModesReport, EMPTY_PULSE, MAX_SENSOR_ID,
};
use crate::protocol::{hex_dump, Report};
use crate::session::{DeviceDriver, SessionContext};
use crate::types::{DeviceEvent, Diagnostic, LighthousePulse};
use crate::{Result, VrError};

const IMU_INTERFACE: usize = 0;
const PULSE_INTERFACE: usize = 1;
const BUTTON_INTERFACE: usize = 2;

/// Reads the gyro and accelerometer full-scale ranges, retrying once if the
/// device reports an unset mode.
pub fn read_range_modes(control: &dyn Transport) -> Result<ImuRange> {
    let mut report = control.get_report::<RangeModesReport>()?;
    if report.is_empty() {
        report = control.get_report::<RangeModesReport>()?;
        if report.is_empty() {
            log::warn!("Unexpected range mode report: {}", hex_dump(&report.encode()));
        }
    }
    Ok(ImuRange::from_report(&report)?)
}

fn is_disconnect(e: &VrError) -> bool {
    matches!(e, VrError::Io(io) if io.is_fatal())
}

/// A device that is gone or stalls its first control transfer cannot be started.
fn is_unusable(e: &VrError) -> bool {
    matches!(e, VrError::Io(IoError::Disconnected | IoError::Stalled))
}

pub struct ViveControllerDriver {
    name: String,
    config: SessionConfig,
    control: Box<dyn Transport>,
    inputs: Vec<Box<dyn Transport>>,
    poller: Option<InputPoller>,
    imu: ViveImu,
    range: Option<ImuRange>,
    buttons: ButtonState,
}

impl ViveControllerDriver {
    /// `inputs` are the IMU, pulse and button interfaces, in that order.
    pub fn new(serial: &str, control: Box<dyn Transport>, inputs: Vec<Box<dyn Transport>>, config: SessionConfig) -> Self {
        ViveControllerDriver {
            name: format!("Vive Controller {} USB", serial),
            config,
            control,
            inputs,
            poller: None,
            imu: ViveImu::new(),
            range: None,
            buttons: ButtonState::new(&VIVE_CONTROLLER_BUTTON_MAP),
        }
    }

    fn invalid_report(&self, interface: usize, buf: &[u8], ctx: &SessionContext) {
        let id = buf.first().copied().unwrap_or(0);
        log::warn!("{}: Error, invalid {}-byte report 0x{:02x}", self.name, buf.len(), id);
        ctx.events.diagnostic(Diagnostic::InvalidReport {
            interface,
            len: buf.len(),
            id,
        });
    }

    fn decode_imu(&mut self, buf: &[u8], ctx: &SessionContext) {
        if buf.len() != ImuReport::SIZE || buf[0] != ImuReport::ID {
            return self.invalid_report(IMU_INTERFACE, buf, ctx);
        }
        let Some(range) = self.range else {
            log::trace!("{}: IMU range unknown, dropping sample", self.name);
            return;
        };
        match ImuReport::decode(buf) {
            Ok(report) => {
                for sample in self.imu.decode(&report, &range) {
                    ctx.events.emit(DeviceEvent::Imu(sample));
                }
            }
            Err(e) => ctx.events.diagnostic(Diagnostic::Malformed(e)),
        }
    }

    /// Pulses may appear in any slot order.
    fn decode_pulses(&mut self, buf: &[u8], ctx: &SessionContext) {
        if buf.len() != PulseReport::SIZE || buf[0] != PulseReport::ID {
            return self.invalid_report(PULSE_INTERFACE, buf, ctx);
        }
        let report = match PulseReport::decode(buf) {
            Ok(report) => report,
            Err(e) => return ctx.events.diagnostic(Diagnostic::Malformed(e)),
        };
        for pulse in report.pulses {
            if pulse.sensor_id == EMPTY_PULSE {
                continue;
            }
            if pulse.sensor_id > MAX_SENSOR_ID {
                log::warn!(
                    "{}: unhandled sensor id: {:04x}: {}",
                    self.name,
                    pulse.sensor_id,
                    hex_dump(buf)
                );
                ctx.events.diagnostic(Diagnostic::UnhandledSensorId(pulse.sensor_id));
                return;
            }
            ctx.events.emit(DeviceEvent::Pulse(LighthousePulse {
                sensor_id: pulse.sensor_id as u8,
                duration: pulse.duration,
                timestamp: pulse.timestamp,
            }));
        }
    }

    fn decode_buttons(&mut self, buf: &[u8], ctx: &SessionContext) {
        if buf.len() != ButtonReport::SIZE || buf[0] != ButtonReport::ID {
            return self.invalid_report(BUTTON_INTERFACE, buf, ctx);
        }
        let report = match ButtonReport::decode(buf) {
            Ok(report) => report,
            Err(e) => return ctx.events.diagnostic(Diagnostic::Malformed(e)),
        };
        if report.is_heartbeat() {
            return;
        }
        for event in self.buttons.update(report.buttons) {
            ctx.events.emit(DeviceEvent::Button(event));
        }
    }
}

impl DeviceDriver for ViveControllerDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, _ctx: &SessionContext) -> Result<()> {
        match self.control.get_report::<FirmwareVersionReport>() {
            Ok(firmware) => log::info!(
                "{}: Firmware version {} {}, hardware {}, FPGA {}",
                self.name,
                firmware.firmware_version,
                firmware.build_string(),
                firmware.hardware_version(),
                firmware.fpga_version()
            ),
            Err(e) if is_unusable(&e) => {
                log::warn!("{}: Failed to get firmware version: {}", self.name, e);
                return Err(e);
            }
            Err(e) => log::warn!("{}: Failed to get firmware version: {}", self.name, e),
        }

        let inputs = std::mem::take(&mut self.inputs);
        self.poller = Some(InputPoller::spawn(&self.name, inputs)?);
        Ok(())
    }

    fn poll(&mut self, ctx: &SessionContext) -> Result<()> {
        let ready = match &self.poller {
            Some(poller) => poller.wait(self.config.poll_timeout)?,
            None => return Err(VrError::StreamStopped),
        };
        if ready.is_empty() {
            log::debug!("{}: Poll timeout", self.name);
            return Ok(());
        }

        if self.range.is_none() {
            match read_range_modes(self.control.as_ref()) {
                Ok(range) => self.range = Some(range),
                Err(e) if is_disconnect(&e) => return Err(e),
                Err(e) => log::warn!("{}: Failed to get gyro/accelerometer range modes: {}", self.name, e),
            }
        }

        for (interface, buf) in ready {
            match interface {
                IMU_INTERFACE => self.decode_imu(&buf, ctx),
                PULSE_INTERFACE => self.decode_pulses(&buf, ctx),
                BUTTON_INTERFACE => self.decode_buttons(&buf, ctx),
                _ => {}
            }
        }
        Ok(())
    }

    fn stop(&mut self, _ctx: &SessionContext) {
        if let Some(mut poller) = self.poller.take() {
            poller.shutdown();
        }
    }
}
