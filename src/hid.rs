use crate::error::IoError;
use crate::protocol::{hex_dump, Report};
use hidapi::HidDevice;
use std::time::Duration;

/// Byte-oriented HID channel: feature request/response plus an input stream.
pub trait Transport: Send {
    fn send_feature(&self, data: &[u8]) -> Result<(), IoError>;

    /// Fills `buf` with the feature report whose ID is `buf[0]`.
    fn get_feature(&self, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Reads one input report. Returns `Ok(0)` on timeout.
    fn read_input(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, IoError>;
}

/// Typed feature report helpers on top of any [`Transport`].
pub trait FeatureExt: Transport {
    /// GET_FEATURE and decode as `R`.
    fn get_report<R: Report>(&self) -> Result<R, crate::VrError> {
        let mut buf = R::request();
        let len = self.get_feature(&mut buf)?;
        Ok(R::decode(&buf[..len.min(buf.len())])?)
    }

    /// Encode `report` and SET_FEATURE it.
    fn send_report<R: Report>(&self, report: &R) -> Result<(), IoError> {
        let buf = report.encode();
        log::trace!("SET_FEATURE {}", hex_dump(&buf));
        self.send_feature(&buf)
    }
}

impl<T: Transport + ?Sized> FeatureExt for T {}

/// hidapi-backed transport for one hidraw interface.
///
/// hidapi expects byte 0 of every feature buffer to be the report ID, which is
/// also the first byte of every report in this crate, so encoded reports pass
/// through unchanged.
pub struct HidTransport {
    device: HidDevice,
}

impl HidTransport {
    pub fn new(device: HidDevice) -> Self {
        Self { device }
    }
}

impl Transport for HidTransport {
    fn send_feature(&self, data: &[u8]) -> Result<(), IoError> {
        self.device.send_feature_report(data)?;
        Ok(())
    }

    fn get_feature(&self, buf: &mut [u8]) -> Result<usize, IoError> {
        Ok(self.device.get_feature_report(buf)?)
    }

    fn read_input(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, IoError> {
        let ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        Ok(self.device.read_timeout(buf, ms)?)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_feature(&self, data: &[u8]) -> Result<(), IoError> {
        (**self).send_feature(data)
    }

    fn get_feature(&self, buf: &mut [u8]) -> Result<usize, IoError> {
        (**self).get_feature(buf)
    }

    fn read_input(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, IoError> {
        (**self).read_input(buf, timeout)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport for driver tests.

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    pub enum Input {
        Report(Vec<u8>),
        Fail(IoError),
    }

    #[derive(Default)]
    struct Script {
        features: HashMap<u8, VecDeque<Vec<u8>>>,
        sticky: HashMap<u8, Vec<u8>>,
        inputs: VecDeque<Input>,
        sent: Vec<Vec<u8>>,
        disconnect_when_drained: bool,
    }

    /// Cloneable handle; clones share the same script and write log.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        script: Arc<Mutex<Script>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues a one-shot GET_FEATURE reply for the report's ID.
        pub fn queue_feature(&self, reply: Vec<u8>) {
            let mut s = self.script.lock().unwrap();
            s.features.entry(reply[0]).or_default().push_back(reply);
        }

        /// Reply returned for the ID whenever no one-shot reply is queued.
        pub fn set_feature(&self, reply: Vec<u8>) {
            let mut s = self.script.lock().unwrap();
            s.sticky.insert(reply[0], reply);
        }

        pub fn queue_input(&self, report: Vec<u8>) {
            self.script.lock().unwrap().inputs.push_back(Input::Report(report));
        }

        pub fn queue_input_error(&self, error: IoError) {
            self.script.lock().unwrap().inputs.push_back(Input::Fail(error));
        }

        /// After the queued inputs run out, reads fail with `Disconnected`.
        pub fn disconnect_when_drained(&self) {
            self.script.lock().unwrap().disconnect_when_drained = true;
        }

        pub fn sent(&self) -> Vec<Vec<u8>> {
            self.script.lock().unwrap().sent.clone()
        }

        pub fn sent_with_id(&self, id: u8) -> Vec<Vec<u8>> {
            self.sent().into_iter().filter(|r| r[0] == id).collect()
        }
    }

    impl Transport for MockTransport {
        fn send_feature(&self, data: &[u8]) -> Result<(), IoError> {
            self.script.lock().unwrap().sent.push(data.to_vec());
            Ok(())
        }

        fn get_feature(&self, buf: &mut [u8]) -> Result<usize, IoError> {
            let mut s = self.script.lock().unwrap();
            let id = buf[0];
            let reply = match s.features.get_mut(&id).and_then(|q| q.pop_front()) {
                Some(reply) => reply,
                None => s
                    .sticky
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| IoError::Transfer(format!("no reply for 0x{:02x}", id)))?,
            };
            let len = reply.len().min(buf.len());
            buf[..len].copy_from_slice(&reply[..len]);
            Ok(len)
        }

        fn read_input(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, IoError> {
            let next = {
                let mut s = self.script.lock().unwrap();
                match s.inputs.pop_front() {
                    Some(input) => Some(input),
                    None if s.disconnect_when_drained => Some(Input::Fail(IoError::Disconnected)),
                    None => None,
                }
            };
            match next {
                Some(Input::Report(report)) => {
                    let len = report.len().min(buf.len());
                    buf[..len].copy_from_slice(&report[..len]);
                    Ok(len)
                }
                Some(Input::Fail(e)) => Err(e),
                None => {
                    std::thread::sleep(timeout.min(Duration::from_millis(5)));
                    Ok(0)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use crate::protocol::rift::ConfigReport;

    #[test]
    fn test_typed_feature_roundtrip() {
        let mock = MockTransport::new();
        let config = ConfigReport {
            echo: 0,
            flags: 0x20,
            packet_interval: 0,
            sample_rate: 1000,
        };
        mock.queue_feature(config.encode());
        assert_eq!(mock.get_report::<ConfigReport>().unwrap(), config);

        mock.send_report(&config).unwrap();
        assert_eq!(mock.sent(), vec![config.encode()]);
    }

    #[test]
    fn test_short_feature_reply_is_decode_error() {
        let mock = MockTransport::new();
        mock.queue_feature(vec![ConfigReport::ID, 0, 0]);
        assert!(matches!(
            mock.get_report::<ConfigReport>(),
            Err(crate::VrError::Decode(crate::DecodeError::TooShort { .. }))
        ));
    }
}
