//! Demultiplexing of the Rift CV1 radio receiver into its wireless peers.
//!
//! The remote and both Touch controllers share one input interface. Each
//! message carries a device type tag; the first message from a peer triggers a
//! serial and firmware query over the headset's feature report channel.

use crate::error::ActivationError;
use crate::hid::{FeatureExt, Transport};
use crate::protocol::radio::{
    is_radio_heartbeat, RadioControlReport, RadioDataReport, RadioMessage, RadioPayload, TouchMessage,
    ADC_A_X, ADC_B_Y, ADC_REST, ADC_STICK, ADC_TRIGGER, DEVICE_REMOTE, DEVICE_TOUCH_LEFT, DEVICE_TOUCH_RIGHT,
    FIRMWARE_VERSION_CONTROL, SERIAL_NUMBER_CONTROL,
};
use crate::protocol::{hex_dump, Report};
use crate::session::EventSink;
use crate::types::{DeviceEvent, Diagnostic, RadioTarget, TouchInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Unknown,
    Activating,
    Active,
}

/// A logical peer behind the radio and its latched input state.
#[derive(Debug, Clone)]
pub struct SubDevice {
    pub target: RadioTarget,
    pub device_type: u8,
    pub activation: Activation,
    pub serial: String,
    pub firmware_date: String,
    pub firmware_version: String,
    pub remote_buttons: u16,
    pub touch: TouchInput,
}

impl SubDevice {
    fn new(target: RadioTarget, device_type: u8) -> Self {
        Self {
            target,
            device_type,
            activation: Activation::Unknown,
            serial: String::new(),
            firmware_date: String::new(),
            firmware_version: String::new(),
            remote_buttons: 0,
            touch: TouchInput::default(),
        }
    }

    /// Queries serial number and firmware version.
    fn activate(&mut self, control: &dyn Transport, poll_limit: usize) -> Result<(), ActivationError> {
        let serial = radio_read(control, [0x03, SERIAL_NUMBER_CONTROL, self.device_type], poll_limit)?;
        self.serial = serial.serial();
        log::info!("Rift: {}: Serial {}", self.target.name(), self.serial);

        let firmware = radio_read(control, [0x03, FIRMWARE_VERSION_CONTROL, self.device_type], poll_limit)?;
        self.firmware_date = firmware.firmware_date();
        self.firmware_version = firmware.firmware_version();
        log::info!(
            "Rift: {}: Firmware version {} ({})",
            self.target.name(),
            self.firmware_version,
            self.firmware_date
        );
        Ok(())
    }

    /// Latches a Touch payload. Returns true if the visible state changed.
    fn latch_touch(&mut self, message: &TouchMessage) -> bool {
        let before = self.touch;
        let touch = &mut self.touch;
        touch.buttons = message.buttons;
        touch.trigger = message.trigger;
        touch.grip = message.grip;
        touch.stick = message.stick;
        match message.adc_channel {
            ADC_A_X => touch.cap_a_x = message.adc_value,
            ADC_B_Y => touch.cap_b_y = message.adc_value,
            ADC_REST => touch.cap_rest = message.adc_value,
            ADC_STICK => touch.cap_stick = message.adc_value,
            ADC_TRIGGER => touch.cap_trigger = message.adc_value,
            _ => {}
        }
        self.touch != before
    }
}

/// Runs one radio control transfer and waits for it to complete.
fn radio_transfer(control: &dyn Transport, command: [u8; 3], poll_limit: usize) -> Result<(), ActivationError> {
    let [a, b, c] = command;
    control.send_report(&RadioControlReport::new(a, b, c))?;

    for _ in 0..poll_limit {
        let mut buf = RadioControlReport::request();
        let len = control.get_feature(&mut buf)?;
        let status = RadioControlReport::decode(&buf[..len.min(buf.len())])?;
        if status.is_busy() {
            continue;
        }
        if status.is_error() {
            return Err(ActivationError::Rejected(status.command[0]));
        }
        return Ok(());
    }
    Err(ActivationError::Busy(poll_limit))
}

/// Runs a control transfer and fetches its result.
pub fn radio_read(
    control: &dyn Transport,
    command: [u8; 3],
    poll_limit: usize,
) -> Result<RadioDataReport, ActivationError> {
    radio_transfer(control, command, poll_limit)?;
    let mut buf = RadioDataReport::request();
    let len = control.get_feature(&mut buf)?;
    Ok(RadioDataReport::decode(&buf[..len.min(buf.len())])?)
}

/// Firmware version of the headset itself.
pub fn hmd_firmware_version(control: &dyn Transport, poll_limit: usize) -> Result<String, ActivationError> {
    let report = radio_read(control, [0x05, FIRMWARE_VERSION_CONTROL, 0x05], poll_limit)?;
    Ok(report.firmware_version())
}

pub struct RadioRouter {
    name: String,
    devices: [SubDevice; 3],
    poll_limit: usize,
}

impl RadioRouter {
    pub fn new(name: &str, poll_limit: usize) -> Self {
        Self {
            name: name.to_string(),
            devices: [
                SubDevice::new(RadioTarget::Remote, DEVICE_REMOTE),
                SubDevice::new(RadioTarget::TouchLeft, DEVICE_TOUCH_LEFT),
                SubDevice::new(RadioTarget::TouchRight, DEVICE_TOUCH_RIGHT),
            ],
            poll_limit,
        }
    }

    pub fn device(&self, target: RadioTarget) -> &SubDevice {
        &self.devices[Self::slot(target)]
    }

    fn slot(target: RadioTarget) -> usize {
        match target {
            RadioTarget::Remote => 0,
            RadioTarget::TouchLeft => 1,
            RadioTarget::TouchRight => 2,
        }
    }

    fn lookup(device_type: u8) -> Option<RadioTarget> {
        match device_type {
            DEVICE_REMOTE => Some(RadioTarget::Remote),
            DEVICE_TOUCH_LEFT => Some(RadioTarget::TouchLeft),
            DEVICE_TOUCH_RIGHT => Some(RadioTarget::TouchRight),
            _ => None,
        }
    }

    /// Handles one raw report from the radio interface.
    pub fn route(&mut self, control: &dyn Transport, buf: &[u8], events: &EventSink) {
        let message = match buf.first() {
            Some(&id) if id == RadioMessage::ID && buf.len() >= RadioMessage::SIZE => RadioMessage::decode(buf),
            _ => {
                if !is_radio_heartbeat(buf) {
                    log::warn!("{}: unknown message: {}", self.name, hex_dump(buf));
                    events.diagnostic(Diagnostic::UnknownRadioMessage { len: buf.len() });
                }
                return;
            }
        };
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                log::warn!("{}: {}", self.name, e);
                events.diagnostic(Diagnostic::Malformed(e));
                return;
            }
        };

        let Some(target) = Self::lookup(message.device_type) else {
            log::warn!(
                "{}: unknown device {:02x}: {}",
                self.name,
                message.device_type,
                hex_dump(buf)
            );
            events.diagnostic(Diagnostic::UnknownRadioDevice(message.device_type));
            return;
        };

        let poll_limit = self.poll_limit;
        let device = &mut self.devices[Self::slot(target)];
        if device.activation == Activation::Unknown {
            device.activation = Activation::Activating;
            match device.activate(control, poll_limit) {
                Ok(()) => {
                    device.activation = Activation::Active;
                    events.emit(DeviceEvent::Activated {
                        target,
                        serial: device.serial.clone(),
                        firmware_version: device.firmware_version.clone(),
                    });
                }
                Err(e) => {
                    log::warn!("{}: Failed to activate {}: {}", self.name, target.name(), e);
                    device.activation = Activation::Unknown;
                    events.diagnostic(Diagnostic::ActivationFailed {
                        target,
                        reason: e.to_string(),
                    });
                }
            }
        }

        match message.payload {
            RadioPayload::Remote(remote) => {
                if device.remote_buttons != remote.buttons {
                    device.remote_buttons = remote.buttons;
                    events.emit(DeviceEvent::RemoteButtons(remote.buttons));
                }
            }
            RadioPayload::Touch(touch) => {
                if device.latch_touch(&touch) {
                    events.emit(DeviceEvent::Touch {
                        target,
                        input: device.touch,
                    });
                }
            }
            RadioPayload::Unknown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::mock::MockTransport;
    use crate::protocol::radio::{RemoteMessage, STATUS_BUSY, STATUS_ERROR};
    use crossbeam_channel::Receiver;

    fn sink() -> (EventSink, Receiver<DeviceEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(64);
        (EventSink::new(sender), receiver)
    }

    fn data_report(at: usize, text: &[u8]) -> Vec<u8> {
        let mut payload = [0u8; 28];
        payload[at..at + text.len()].copy_from_slice(text);
        RadioDataReport { echo: 0, payload }.encode()
    }

    fn ready_control() -> MockTransport {
        let control = MockTransport::new();
        control.set_feature(RadioControlReport::new(0, 0, 0).encode());
        control
    }

    fn touch_message(device_type: u8, adc_channel: u8, adc_value: u16) -> Vec<u8> {
        RadioMessage {
            echo: 0,
            device_type,
            payload: RadioPayload::Touch(TouchMessage {
                timestamp: 1,
                accel: [0; 3],
                gyro: [0; 3],
                buttons: 0x01,
                trigger: 512,
                grip: 3,
                stick: [10, 1000],
                adc_channel,
                adc_value,
            }),
        }
        .encode()
    }

    #[test]
    fn test_first_message_activates_once() {
        let control = ready_control();
        control.queue_feature(data_report(5, b"WMTL12345678"));
        control.queue_feature(data_report(14, b"1234abcd"));
        let (events, rx) = sink();
        let mut router = RadioRouter::new("Rift CV1 Radio", 8);

        router.route(&control, &touch_message(DEVICE_TOUCH_LEFT, ADC_A_X, 77), &events);
        router.route(&control, &touch_message(DEVICE_TOUCH_LEFT, ADC_TRIGGER, 99), &events);

        let left = router.device(RadioTarget::TouchLeft);
        assert_eq!(left.activation, Activation::Active);
        assert_eq!(left.serial, "WMTL12345678");
        assert_eq!(left.firmware_version, "1234abcd");
        assert_eq!(left.touch.cap_a_x, 77);
        assert_eq!(left.touch.cap_trigger, 99);
        assert_eq!(left.touch.stick, [10, 1000]);
        assert_eq!(router.device(RadioTarget::TouchRight).activation, Activation::Unknown);

        // one serial and one firmware transfer
        let commands: Vec<_> = control
            .sent_with_id(RadioControlReport::ID)
            .iter()
            .map(|r| [r[3], r[4], r[5]])
            .collect();
        assert_eq!(
            commands,
            vec![
                [0x03, SERIAL_NUMBER_CONTROL, DEVICE_TOUCH_LEFT],
                [0x03, FIRMWARE_VERSION_CONTROL, DEVICE_TOUCH_LEFT]
            ]
        );

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(
            &events[0],
            DeviceEvent::Activated { target: RadioTarget::TouchLeft, serial, .. } if serial == "WMTL12345678"
        ));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_failed_activation_is_retried_and_payload_still_decoded() {
        let control = MockTransport::new();
        control.queue_feature(RadioControlReport::new(STATUS_ERROR, 0, 0).encode());
        control.set_feature(RadioControlReport::new(0, 0, 0).encode());
        control.set_feature(data_report(5, b"WMR1"));
        let (events, rx) = sink();
        let mut router = RadioRouter::new("radio", 8);

        let remote = RadioMessage {
            echo: 0,
            device_type: DEVICE_REMOTE,
            payload: RadioPayload::Remote(RemoteMessage { buttons: 0x0004 }),
        }
        .encode();
        router.route(&control, &remote, &events);
        assert_eq!(router.device(RadioTarget::Remote).activation, Activation::Unknown);
        assert_eq!(router.device(RadioTarget::Remote).remote_buttons, 0x0004);

        let first: Vec<_> = rx.try_iter().collect();
        assert!(matches!(
            &first[0],
            DeviceEvent::Diagnostic(Diagnostic::ActivationFailed {
                target: RadioTarget::Remote,
                ..
            })
        ));
        assert_eq!(first[1], DeviceEvent::RemoteButtons(0x0004));

        // retried on the next message; unchanged buttons emit nothing
        router.route(&control, &remote, &events);
        assert_eq!(router.device(RadioTarget::Remote).activation, Activation::Active);
        let second: Vec<_> = rx.try_iter().collect();
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_busy_transfer_gives_up() {
        let control = MockTransport::new();
        control.set_feature(RadioControlReport::new(STATUS_BUSY, 0, 0).encode());
        assert!(matches!(
            radio_read(&control, [0x03, SERIAL_NUMBER_CONTROL, 1], 4),
            Err(ActivationError::Busy(4))
        ));
    }

    #[test]
    fn test_heartbeat_and_unknown_messages() {
        let control = ready_control();
        let (events, rx) = sink();
        let mut router = RadioRouter::new("radio", 8);

        let mut heartbeat = vec![0u8; 64];
        heartbeat[0] = 0x0d;
        router.route(&control, &heartbeat, &events);
        assert!(rx.try_recv().is_err());

        let mut junk = heartbeat.clone();
        junk[7] = 1;
        router.route(&control, &junk, &events);
        assert_eq!(
            rx.try_recv().unwrap(),
            DeviceEvent::Diagnostic(Diagnostic::UnknownRadioMessage { len: 64 })
        );

        let mut stranger = vec![0u8; 64];
        stranger[0] = RadioMessage::ID;
        stranger[5] = 9;
        router.route(&control, &stranger, &events);
        assert_eq!(
            rx.try_recv().unwrap(),
            DeviceEvent::Diagnostic(Diagnostic::UnknownRadioDevice(9))
        );
        assert!(control.sent().is_empty());
    }

    #[test]
    fn test_hmd_firmware_version() {
        let control = ready_control();
        control.queue_feature(data_report(14, b"0708\0"));
        assert_eq!(hmd_firmware_version(&control, 4).unwrap(), "0708");
        assert_eq!(
            control.sent_with_id(RadioControlReport::ID)[0][3..6],
            [0x05, FIRMWARE_VERSION_CONTROL, 0x05]
        );
    }
}
