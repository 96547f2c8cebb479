//! Oculus Rift DK2/CV1 headset driver.

use crate::config::SessionConfig;
use crate::error::{DecodeError, IoError};
use crate::hid::{FeatureExt, Transport};
use crate::imu::TimestampUnwrapper;
use crate::pattern::decode_pattern;
use crate::poller::InputPoller;
use crate::protocol::rift::{
    ConfigReport, DisplayReport, KeepaliveReport, LedPatternReport, PositionKind, PositionReport, PowerReport,
    SensorMessage, TrackingReport,
};
use crate::protocol::Report;
use crate::radio::{hmd_firmware_version, RadioRouter};
use crate::session::{DeviceDriver, SessionContext};
use crate::tracker::{GeometryHandle, LedGeometry, Tracker};
use crate::types::{DeviceEvent, DeviceKind, Diagnostic, ImuSample, PowerComponents, TrackingFlags, Vec3};
use crate::{Result, VrError};
use std::sync::Arc;

/// Capacity of the factory position table (LEDs plus the IMU).
pub const MAX_POSITIONS: u16 = 65;
/// Capacity of the LED pattern table.
pub const MAX_LEDS: u16 = 64;

const SENSOR_INTERFACE: usize = 0;
const RADIO_INTERFACE: usize = 1;

fn interval_us(rate: u32) -> u32 {
    1_000_000 / rate.max(1)
}

fn scale(v: [i32; 3], k: f32) -> Vec3 {
    Vec3::new(v[0] as f32 * k, v[1] as f32 * k, v[2] as f32 * k)
}

/// Reads the factory-calibrated LED and IMU positions.
///
/// The table is read one entry per GET_FEATURE, stopping before the device
/// wraps around to the first entry again.
pub fn read_positions(control: &dyn Transport) -> Result<LedGeometry> {
    let mut report = control.get_report::<PositionReport>()?;
    let num = report.num;
    if num > MAX_POSITIONS {
        return Err(DecodeError::OutOfRange {
            field: "position count",
            value: num as u32,
            limit: MAX_POSITIONS as u32,
        }
        .into());
    }

    let mut positions = vec![Vec3::default(); num as usize];
    let mut directions = vec![Vec3::default(); num as usize];
    let mut imu_position = None;
    let mut i = 0;
    loop {
        if report.index >= num {
            return Err(DecodeError::OutOfRange {
                field: "position index",
                value: report.index as u32,
                limit: num as u32,
            }
            .into());
        }

        let position = scale(report.position, 1e-6);
        match report.kind {
            PositionKind::Led => {
                positions[report.index as usize] = position;
                directions[report.index as usize] =
                    scale(report.direction.map(|d| d as i32), 1e-6);
            }
            PositionKind::Imu => imu_position = Some(position),
            PositionKind::Other(kind) => log::debug!("Rift: Ignoring position entry of type {}", kind),
        }

        i += 1;
        if i == num {
            break;
        }
        report = control.get_report::<PositionReport>()?;
    }

    // The IMU entry is the last one of the table.
    let leds = num.saturating_sub(1) as usize;
    positions.truncate(leds);
    directions.truncate(leds);

    Ok(LedGeometry {
        positions,
        directions,
        patterns: Vec::new(),
        imu_position,
    })
}

/// Reads and decodes the blink pattern of every LED.
pub fn read_led_patterns(control: &dyn Transport) -> Result<Vec<u16>> {
    let mut report = control.get_report::<LedPatternReport>()?;
    let num = report.num;
    if num > MAX_LEDS {
        return Err(DecodeError::OutOfRange {
            field: "LED count",
            value: num as u32,
            limit: MAX_LEDS as u32,
        }
        .into());
    }

    let mut patterns = vec![0u16; num as usize];
    let mut i = 0;
    loop {
        if report.index >= num {
            return Err(DecodeError::OutOfRange {
                field: "LED index",
                value: report.index as u32,
                limit: num as u32,
            }
            .into());
        }
        patterns[report.index as usize] = decode_pattern(report.pattern_length, report.pattern)?;

        i += 1;
        if i == num {
            break;
        }
        report = control.get_report::<LedPatternReport>()?;
    }
    Ok(patterns)
}

/// Current sensor configuration.
pub fn get_config(control: &dyn Transport) -> Result<ConfigReport> {
    let config = control.get_report::<ConfigReport>()?;
    log::info!(
        "Rift: Got sample rate {} Hz, report rate {} Hz, flags: 0x{:x}",
        config.sample_rate,
        config.report_rate(),
        config.flags
    );
    Ok(config)
}

/// Sets the sensor report rate. Returns the rate applied after clamping.
pub fn set_report_rate(control: &dyn Transport, rate: u32) -> Result<u32> {
    let mut config = control.get_report::<ConfigReport>()?;
    let rate = config.set_report_rate(rate);
    log::info!("Rift: Set sample rate {} Hz, report rate {} Hz", config.sample_rate, rate);
    control.send_report(&config)?;
    Ok(rate)
}

/// Keeps the sensor streaming for another ten seconds.
pub fn send_keepalive(control: &dyn Transport) -> std::result::Result<(), IoError> {
    control.send_report(&KeepaliveReport::default())
}

/// Enables the IR LEDs, blinking or steady.
pub fn send_tracking(control: &dyn Transport, blink: bool) -> std::result::Result<(), IoError> {
    control.send_report(&TrackingReport::enabled(blink))
}

/// Turns the IR LEDs off, keeping the rest of the tracking configuration.
pub fn disable_tracking(control: &dyn Transport) -> Result<()> {
    let mut report = control.get_report::<TrackingReport>()?;
    report.flags.remove(TrackingFlags::ENABLE);
    control.send_report(&report)?;
    Ok(())
}

/// Sets up low persistence and pixel readback for latency measurement.
pub fn send_display(control: &dyn Transport, low_persistence: bool, pixel_readback: bool) -> Result<()> {
    let mut report = control.get_report::<DisplayReport>()?;
    report.configure(low_persistence, pixel_readback);
    control.send_report(&report)?;
    Ok(())
}

/// Powers up components of a CV1.
pub fn power_up(control: &dyn Transport, components: PowerComponents) -> Result<()> {
    let mut report = control.get_report::<PowerReport>()?;
    report.components.insert(components);
    control.send_report(&report)?;
    Ok(())
}

/// Powers down components of a CV1.
pub fn power_down(control: &dyn Transport, components: PowerComponents) -> Result<()> {
    let mut report = control.get_report::<PowerReport>()?;
    report.components.remove(components);
    control.send_report(&report)?;
    Ok(())
}

/// Rift headset session driver.
///
/// Interface 0 carries sensor messages; on the CV1, interface 1 carries the
/// radio. All feature reports go through `control`.
pub struct RiftDriver {
    kind: DeviceKind,
    name: String,
    config: SessionConfig,
    control: Box<dyn Transport>,
    inputs: Vec<Box<dyn Transport>>,
    poller: Option<InputPoller>,
    tracker: Arc<dyn Tracker>,
    geometry: Option<GeometryHandle>,
    radio: Option<RadioRouter>,
    report_rate: u32,
    /// µs between sensor messages at the current report rate.
    report_interval: u32,
    /// Sensor messages since the last keepalive.
    count: u32,
    /// LED mode last written to the device.
    flicker: bool,
    clock: TimestampUnwrapper,
    last_sample_timestamp: u32,
}

impl RiftDriver {
    pub fn new(
        kind: DeviceKind,
        control: Box<dyn Transport>,
        inputs: Vec<Box<dyn Transport>>,
        config: SessionConfig,
        tracker: Arc<dyn Tracker>,
    ) -> Self {
        let radio = (kind == DeviceKind::RiftCv1 && inputs.len() > RADIO_INTERFACE)
            .then(|| RadioRouter::new("Rift CV1 Radio", config.activation_poll_limit));
        RiftDriver {
            kind,
            name: kind.name().to_string(),
            config,
            control,
            inputs,
            poller: None,
            tracker,
            geometry: None,
            radio,
            report_rate: 0,
            report_interval: 0,
            count: 0,
            flicker: false,
            clock: TimestampUnwrapper::new(),
            last_sample_timestamp: 0,
        }
    }

    /// LED count of a stock headset, if this driver knows the model.
    fn expected_leds(&self) -> Option<usize> {
        match self.kind {
            DeviceKind::RiftDk2 => Some(40),
            DeviceKind::RiftCv1 => Some(44),
            DeviceKind::ViveControllerUsb => None,
        }
    }

    /// Fatal transport errors end the session; anything else is logged.
    fn check_io(&self, what: &str, result: std::result::Result<(), IoError>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                log::warn!("{}: Failed to send {}: {}", self.name, what, e);
                Ok(())
            }
        }
    }

    fn decode_sensor_message(&mut self, buf: &[u8], ctx: &SessionContext) {
        if buf.len() < SensorMessage::SIZE || buf[0] != SensorMessage::ID {
            log::warn!(
                "{}: Error, invalid {}-byte report 0x{:02x}",
                self.name,
                buf.len(),
                buf.first().copied().unwrap_or(0)
            );
            ctx.events.diagnostic(Diagnostic::InvalidReport {
                interface: SENSOR_INTERFACE,
                len: buf.len(),
                id: buf.first().copied().unwrap_or(0),
            });
            return;
        }
        let message = match SensorMessage::decode(buf) {
            Ok(message) => message,
            Err(e) => {
                ctx.events.diagnostic(Diagnostic::Malformed(e));
                return;
            }
        };
        self.count += 1;

        let dt = message.timestamp.wrapping_sub(self.last_sample_timestamp) as i32;
        self.last_sample_timestamp = message.timestamp;
        let interval = self.report_interval as i32;
        if dt < interval - 1 || dt > interval + 1 || 1000 * message.num_samples as i32 != interval {
            log::debug!("{}: got {} samples after {} µs", self.name, message.num_samples, dt);
        }

        let time = self.clock.unwrap(message.timestamp);
        let temperature = message.temperature as f32 / 100.0;
        let magnetic_field = scale(message.mag.map(|m| m as i32), 1e-4);
        for sample in message.valid_samples() {
            ctx.events.emit(DeviceEvent::Imu(ImuSample {
                acceleration: scale(sample.accel, 1e-4),
                angular_velocity: scale(sample.gyro, 1e-4),
                magnetic_field: Some(magnetic_field),
                temperature: Some(temperature),
                time,
                sequence: None,
            }));
        }
    }
}

impl DeviceDriver for RiftDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, ctx: &SessionContext) -> Result<()> {
        let control = self.control.as_ref();

        let mut geometry = read_positions(control).inspect_err(|e| {
            log::warn!("{}: Error reading factory calibrated positions: {}", self.name, e)
        })?;
        geometry.patterns = read_led_patterns(control)
            .inspect_err(|e| log::warn!("{}: Error reading IR LED blinking patterns: {}", self.name, e))?;
        if self.expected_leds() != Some(geometry.len()) {
            log::info!("{}: Reported {} IR LEDs", self.name, geometry.len());
        }

        get_config(control)?;
        let rate = set_report_rate(control, self.config.report_rate)?;
        self.report_rate = rate;
        self.report_interval = interval_us(rate);

        self.flicker = ctx.flicker();
        send_tracking(control, self.flicker)?;
        send_display(control, self.config.low_persistence, self.config.pixel_readback)?;

        if self.kind == DeviceKind::RiftCv1 {
            match hmd_firmware_version(control, self.config.activation_poll_limit) {
                Ok(version) => log::info!("{}: Firmware version {}", self.name, version),
                Err(e) => log::warn!("{}: Failed to read firmware version: {}", self.name, e),
            }
        }

        let inputs = std::mem::take(&mut self.inputs);
        self.poller = Some(InputPoller::spawn(&self.name, inputs)?);

        log::info!("{}: Sending keepalive", self.name);
        send_keepalive(self.control.as_ref())?;
        self.count = 0;

        self.geometry = Some(self.tracker.register_geometry(Arc::new(geometry)));
        Ok(())
    }

    fn poll(&mut self, ctx: &SessionContext) -> Result<()> {
        let flicker = ctx.flicker();
        if flicker != self.flicker {
            let sent = send_tracking(self.control.as_ref(), flicker);
            self.check_io("tracking report", sent)?;
            self.flicker = flicker;
        }

        let ready = match &self.poller {
            Some(poller) => poller.wait(self.config.poll_timeout)?,
            None => return Err(VrError::StreamStopped),
        };

        if ready.is_empty() {
            log::info!("{}: Resending keepalive", self.name);
            let sent = send_keepalive(self.control.as_ref());
            self.count = 0;
            return self.check_io("keepalive", sent);
        }
        if self.count > self.config.keepalive_factor * self.report_rate {
            let sent = send_keepalive(self.control.as_ref());
            self.count = 0;
            self.check_io("keepalive", sent)?;
        }

        for (interface, buf) in ready {
            match interface {
                SENSOR_INTERFACE => self.decode_sensor_message(&buf, ctx),
                RADIO_INTERFACE => {
                    if let Some(radio) = self.radio.as_mut() {
                        radio.route(self.control.as_ref(), &buf, &ctx.events);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn stop(&mut self, _ctx: &SessionContext) {
        if let Some(handle) = self.geometry.take() {
            self.tracker.unregister_geometry(handle);
        }
        if let Some(mut poller) = self.poller.take() {
            poller.shutdown();
        }

        let control = self.control.as_ref();
        if let Err(e) = disable_tracking(control) {
            log::warn!("{}: Failed to disable tracking LEDs: {}", self.name, e);
        }
        match set_report_rate(control, self.config.idle_report_rate) {
            Ok(rate) => {
                self.report_rate = rate;
                self.report_interval = interval_us(rate);
            }
            Err(e) => log::warn!("{}: Failed to restore report rate: {}", self.name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::mock::MockTransport;
    use crate::pattern::encode_pattern;
    use crate::protocol::pack_3x21;
    use crate::protocol::radio::{
        RadioControlReport, RadioDataReport, RadioMessage, RadioPayload, TouchMessage, ADC_TRIGGER,
        DEVICE_TOUCH_RIGHT,
    };
    use crate::protocol::rift::RawImuSample;
    use crate::radio::Activation;
    use crate::session::EventSink;
    use crate::tracker::TrackerRegistry;
    use crate::types::{DisplayFlags, RadioTarget, TouchInput};
    use crossbeam_channel::Receiver;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn context(flicker: bool) -> (SessionContext, Receiver<DeviceEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(256);
        (
            SessionContext {
                events: EventSink::new(sender),
                flicker: Arc::new(AtomicBool::new(flicker)),
            },
            receiver,
        )
    }

    fn position(index: u16, num: u16, kind: PositionKind, x: i32) -> Vec<u8> {
        PositionReport {
            echo: 0,
            position: [x, -x, 1000],
            direction: [0, 0, 1000],
            index,
            num,
            kind,
        }
        .encode()
    }

    fn led_pattern(index: u16, num: u16, bits: u16) -> Vec<u8> {
        LedPatternReport {
            echo: 0,
            pattern_length: 10,
            pattern: encode_pattern(bits),
            index,
            num,
        }
        .encode()
    }

    /// A headset with two LEDs plus the IMU entry.
    fn scripted_control() -> MockTransport {
        let control = MockTransport::new();
        control.queue_feature(position(0, 3, PositionKind::Led, 1_000));
        control.queue_feature(position(1, 3, PositionKind::Led, 2_000));
        control.queue_feature(position(2, 3, PositionKind::Imu, 3_000));
        control.queue_feature(led_pattern(0, 2, 0x155));
        control.queue_feature(led_pattern(1, 2, 0x2aa));
        control.set_feature(
            ConfigReport {
                echo: 0,
                flags: 0x20,
                packet_interval: 0,
                sample_rate: 1000,
            }
            .encode(),
        );
        control.set_feature(
            DisplayReport {
                echo: 0,
                brightness: 0,
                flags: 0,
                flags2: DisplayFlags::DIRECT_PENTILE,
                unknown_6: 0,
                persistence: 0,
                lighting_offset: 0,
                pixel_settle: 0,
                total_rows: 1000,
            }
            .encode(),
        );
        control.set_feature(TrackingReport::enabled(true).encode());
        control
    }

    fn sensor_message(timestamp: u32, num_samples: u8) -> Vec<u8> {
        let mut message = SensorMessage {
            num_samples,
            temperature: 2500,
            timestamp,
            mag: [10_000, 0, -10_000],
            ..Default::default()
        };
        message.samples[0] = RawImuSample {
            accel: [0, 98_066, 0],
            gyro: [10_000, 0, 0],
        };
        message.samples[1] = message.samples[0];
        message.encode()
    }

    fn driver(control: &MockTransport, input: &MockTransport, tracker: Arc<TrackerRegistry>) -> RiftDriver {
        let config = SessionConfig {
            poll_timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        RiftDriver::new(
            DeviceKind::RiftDk2,
            Box::new(control.clone()),
            vec![Box::new(input.clone())],
            config,
            tracker,
        )
    }

    #[test]
    fn test_read_positions() {
        let control = scripted_control();
        let geometry = read_positions(&control).unwrap();
        assert_eq!(geometry.len(), 2);
        assert!((geometry.positions[1].x - 0.002).abs() < 1e-9);
        assert!((geometry.directions[0].z - 0.001).abs() < 1e-9);
        assert!(geometry.imu_position.is_some());
    }

    #[test]
    fn test_positions_capacity_checked() {
        let control = MockTransport::new();
        control.queue_feature(position(0, MAX_POSITIONS + 1, PositionKind::Led, 0));
        assert!(matches!(
            read_positions(&control),
            Err(VrError::Decode(DecodeError::OutOfRange {
                field: "position count",
                ..
            }))
        ));

        let control = MockTransport::new();
        control.queue_feature(position(0, 2, PositionKind::Led, 0));
        control.queue_feature(position(2, 2, PositionKind::Led, 0));
        assert!(matches!(
            read_positions(&control),
            Err(VrError::Decode(DecodeError::OutOfRange {
                field: "position index",
                ..
            }))
        ));
    }

    #[test]
    fn test_invalid_pattern_aborts_start() {
        let control = scripted_control();
        // replace the second pattern with a corrupt one
        let mut bad = led_pattern(1, 2, 0);
        bad[4] = 0;
        let patterns = MockTransport::new();
        patterns.queue_feature(led_pattern(0, 2, 0x155));
        patterns.queue_feature(bad);
        assert!(matches!(
            read_led_patterns(&patterns),
            Err(VrError::Decode(DecodeError::InvalidPattern { .. }))
        ));
        assert_eq!(read_led_patterns(&control).unwrap(), vec![0x155, 0x2aa]);
    }

    #[test]
    fn test_start_poll_stop() {
        let control = scripted_control();
        let input = MockTransport::new();
        let tracker = Arc::new(TrackerRegistry::new());
        let mut rift = driver(&control, &input, tracker.clone());
        let (ctx, events) = context(true);

        rift.start(&ctx).unwrap();
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.geometries()[0].patterns, vec![0x155, 0x2aa]);
        assert_eq!(rift.report_rate, 500);

        // report rate 500 Hz out of 1000 Hz
        let config = ConfigReport::decode(&control.sent_with_id(ConfigReport::ID)[0]).unwrap();
        assert_eq!(config.packet_interval, 1);
        let tracking = control.sent_with_id(TrackingReport::ID);
        assert_eq!(tracking, vec![TrackingReport::enabled(true).encode()]);
        let display = DisplayReport::decode(&control.sent_with_id(DisplayReport::ID)[0]).unwrap();
        assert_eq!(display.brightness, 255);
        assert_eq!(display.persistence, 180);
        assert_eq!(display.flags2, DisplayFlags::READ_PIXEL);
        assert_eq!(control.sent_with_id(KeepaliveReport::ID).len(), 1);

        input.queue_input(sensor_message(2000, 2));
        input.queue_input(vec![0x0b, 1, 2]);
        let mut imu = Vec::new();
        let mut diagnostics = Vec::new();
        while imu.len() < 2 || diagnostics.is_empty() {
            rift.poll(&ctx).unwrap();
            for event in events.try_iter() {
                match event {
                    DeviceEvent::Imu(sample) => imu.push(sample),
                    DeviceEvent::Diagnostic(d) => diagnostics.push(d),
                    _ => {}
                }
            }
        }
        assert_eq!(imu[0].time, 2000);
        assert_eq!(imu[1].time, 2000);
        assert!((imu[0].acceleration.y - 9.8066).abs() < 1e-3);
        assert!((imu[0].angular_velocity.x - 1.0).abs() < 1e-6);
        assert_eq!(imu[0].temperature, Some(25.0));
        let mag = imu[0].magnetic_field.unwrap();
        assert!((mag.x - 1.0).abs() < 1e-6 && mag.y == 0.0 && (mag.z + 1.0).abs() < 1e-6);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::InvalidReport {
                interface: 0,
                len: 3,
                id: 0x0b
            }]
        );

        rift.stop(&ctx);
        assert!(tracker.is_empty());
        let tracking = control.sent_with_id(TrackingReport::ID);
        let disabled = TrackingReport::decode(tracking.last().unwrap()).unwrap();
        assert!(!disabled.flags.contains(TrackingFlags::ENABLE));
        assert!(disabled.flags.contains(TrackingFlags::USE_CARRIER));
        let config = ConfigReport::decode(control.sent_with_id(ConfigReport::ID).last().unwrap()).unwrap();
        assert_eq!(config.packet_interval, 19);
    }

    #[test]
    fn test_keepalive_on_timeout_and_flicker_change() {
        let control = scripted_control();
        let input = MockTransport::new();
        let mut rift = driver(&control, &input, Arc::new(TrackerRegistry::new()));
        let (ctx, _events) = context(true);
        rift.start(&ctx).unwrap();

        // nothing arrives within the poll timeout
        rift.poll(&ctx).unwrap();
        assert_eq!(control.sent_with_id(KeepaliveReport::ID).len(), 2);

        ctx.flicker.store(false, std::sync::atomic::Ordering::Relaxed);
        rift.poll(&ctx).unwrap();
        let tracking = control.sent_with_id(TrackingReport::ID);
        assert_eq!(tracking.last(), Some(&TrackingReport::enabled(false).encode()));
        rift.stop(&ctx);
    }

    #[test]
    fn test_keepalive_after_report_budget() {
        let control = scripted_control();
        let input = MockTransport::new();
        for i in 0..7 {
            input.queue_input(sensor_message(1000 * (i + 1), 1));
        }
        let config = SessionConfig {
            poll_timeout: Duration::from_secs(2),
            report_rate: 5,
            keepalive_factor: 1,
            ..SessionConfig::default()
        };
        let mut rift = RiftDriver::new(
            DeviceKind::RiftDk2,
            Box::new(control.clone()),
            vec![Box::new(input.clone())],
            config,
            Arc::new(TrackerRegistry::new()),
        );
        let (ctx, events) = context(true);
        rift.start(&ctx).unwrap();
        assert_eq!(rift.report_rate, 5);
        assert_eq!(control.sent_with_id(KeepaliveReport::ID).len(), 1);

        // one report per poll; the budget is keepalive_factor * report_rate
        for _ in 0..6 {
            rift.poll(&ctx).unwrap();
        }
        assert_eq!(rift.count, 6);
        assert_eq!(control.sent_with_id(KeepaliveReport::ID).len(), 1);

        rift.poll(&ctx).unwrap();
        assert_eq!(control.sent_with_id(KeepaliveReport::ID).len(), 2);
        assert_eq!(rift.count, 1);
        assert_eq!(
            events
                .try_iter()
                .filter(|e| matches!(e, DeviceEvent::Imu(_)))
                .count(),
            7
        );
        rift.stop(&ctx);
    }

    #[test]
    fn test_cv1_routes_radio_interface() {
        let control = scripted_control();
        control.set_feature(RadioControlReport::new(0, 0, 0).encode());
        let mut payload = [0u8; 28];
        payload[5..13].copy_from_slice(b"WMTR1234");
        payload[14..18].copy_from_slice(b"0708");
        control.set_feature(RadioDataReport { echo: 0, payload }.encode());

        let sensor = MockTransport::new();
        let radio = MockTransport::new();
        radio.queue_input(
            RadioMessage {
                echo: 0,
                device_type: DEVICE_TOUCH_RIGHT,
                payload: RadioPayload::Touch(TouchMessage {
                    timestamp: 1,
                    accel: [0; 3],
                    gyro: [0; 3],
                    buttons: 0x01,
                    trigger: 512,
                    grip: 3,
                    stick: [10, 1000],
                    adc_channel: ADC_TRIGGER,
                    adc_value: 99,
                }),
            }
            .encode(),
        );
        let config = SessionConfig {
            poll_timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        let mut rift = RiftDriver::new(
            DeviceKind::RiftCv1,
            Box::new(control.clone()),
            vec![Box::new(sensor.clone()), Box::new(radio.clone())],
            config,
            Arc::new(TrackerRegistry::new()),
        );
        assert!(rift.radio.is_some());
        let (ctx, events) = context(true);
        rift.start(&ctx).unwrap();

        let mut received = Vec::new();
        for _ in 0..40 {
            rift.poll(&ctx).unwrap();
            received.extend(events.try_iter());
            if received.len() >= 2 {
                break;
            }
        }
        assert_eq!(
            received,
            vec![
                DeviceEvent::Activated {
                    target: RadioTarget::TouchRight,
                    serial: "WMTR1234".to_string(),
                    firmware_version: "0708".to_string(),
                },
                DeviceEvent::Touch {
                    target: RadioTarget::TouchRight,
                    input: TouchInput {
                        buttons: 0x01,
                        trigger: 512,
                        grip: 3,
                        stick: [10, 1000],
                        cap_trigger: 99,
                        ..Default::default()
                    },
                },
            ]
        );
        let router = rift.radio.as_ref().unwrap();
        assert_eq!(router.device(RadioTarget::TouchRight).activation, Activation::Active);
        assert_eq!(router.device(RadioTarget::TouchLeft).activation, Activation::Unknown);
        rift.stop(&ctx);
    }

    #[test]
    fn test_model_defaults() {
        let two_inputs = || -> Vec<Box<dyn Transport>> {
            vec![Box::new(MockTransport::new()), Box::new(MockTransport::new())]
        };
        let dk2 = RiftDriver::new(
            DeviceKind::RiftDk2,
            Box::new(MockTransport::new()),
            two_inputs(),
            SessionConfig::default(),
            Arc::new(TrackerRegistry::new()),
        );
        assert!(dk2.radio.is_none());
        assert_eq!(dk2.expected_leds(), Some(40));

        let cv1 = RiftDriver::new(
            DeviceKind::RiftCv1,
            Box::new(MockTransport::new()),
            two_inputs(),
            SessionConfig::default(),
            Arc::new(TrackerRegistry::new()),
        );
        assert!(cv1.radio.is_some());
        assert_eq!(cv1.expected_leds(), Some(44));

        let cv1_without_radio = RiftDriver::new(
            DeviceKind::RiftCv1,
            Box::new(MockTransport::new()),
            vec![Box::new(MockTransport::new())],
            SessionConfig::default(),
            Arc::new(TrackerRegistry::new()),
        );
        assert!(cv1_without_radio.radio.is_none());
    }

    #[test]
    fn test_disconnect_ends_poll() {
        let control = scripted_control();
        let input = MockTransport::new();
        input.disconnect_when_drained();
        let mut rift = driver(&control, &input, Arc::new(TrackerRegistry::new()));
        let (ctx, _events) = context(true);
        rift.start(&ctx).unwrap();

        let mut result = rift.poll(&ctx);
        for _ in 0..100 {
            if result.is_err() {
                break;
            }
            result = rift.poll(&ctx);
        }
        assert!(matches!(result, Err(VrError::Io(IoError::Disconnected))));
        rift.stop(&ctx);
    }

    #[test]
    fn test_power_read_modify_write() {
        let control = MockTransport::new();
        control.queue_feature(
            PowerReport {
                echo: 0,
                components: PowerComponents::AUDIO,
            }
            .encode(),
        );
        power_up(&control, PowerComponents::DISPLAY | PowerComponents::LEDS).unwrap();
        let sent = PowerReport::decode(&control.sent()[0]).unwrap();
        assert_eq!(sent.components, PowerComponents::all());

        control.queue_feature(sent.encode());
        power_down(&control, PowerComponents::AUDIO).unwrap();
        let sent = PowerReport::decode(&control.sent()[1]).unwrap();
        assert_eq!(sent.components, PowerComponents::DISPLAY | PowerComponents::LEDS);
    }

    #[test]
    fn test_sensor_lanes_are_big_endian() {
        let bytes = sensor_message(1, 1);
        let word = u64::from_be_bytes(bytes[12..20].try_into().unwrap());
        assert_eq!(word, pack_3x21([0, 98_066, 0]));
    }
}
