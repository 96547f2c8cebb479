use crate::config::SessionConfig;
use crate::hid::{HidTransport, Transport};
use crate::protocol::{PID_RIFT_CV1, PID_RIFT_DK2, PID_VIVE_CONTROLLER_USB, VID_OCULUS, VID_VALVE};
use crate::rift::RiftDriver;
use crate::session::{DeviceDriver, Session};
use crate::tracker::Tracker;
use crate::types::{DeviceInfo, DeviceKind};
use crate::vive_controller::ViveControllerDriver;
use crate::{Result, VrError};
use hidapi::HidApi;
use std::sync::Arc;

/// Maps a USB VID/PID pair to a supported device family.
pub fn device_kind(vid: u16, pid: u16) -> Result<DeviceKind> {
    match (vid, pid) {
        (VID_OCULUS, PID_RIFT_DK2) => Ok(DeviceKind::RiftDk2),
        (VID_OCULUS, PID_RIFT_CV1) => Ok(DeviceKind::RiftCv1),
        (VID_VALVE, PID_VIVE_CONTROLLER_USB) => Ok(DeviceKind::ViveControllerUsb),
        _ => Err(VrError::UnsupportedDevice { vid, pid }),
    }
}

fn create_hid_api() -> Result<HidApi> {
    let api = HidApi::new()?;
    #[cfg(target_os = "macos")]
    {
        // Keep HID opens shared on macOS to avoid seizing the interface.
        api.set_open_exclusive(false);
    }
    Ok(api)
}

/// Groups hidapi entries into physical devices.
///
/// Interfaces of one device share kind and serial number; macOS may list an
/// interface once per usage page, so duplicates are collapsed.
fn collect_devices<'a>(entries: impl Iterator<Item = &'a hidapi::DeviceInfo>) -> Vec<DeviceInfo> {
    let mut devices: Vec<DeviceInfo> = Vec::new();

    for entry in entries {
        let Ok(kind) = device_kind(entry.vendor_id(), entry.product_id()) else {
            continue;
        };
        let serial = entry.serial_number().unwrap_or("").to_string();
        // -1 when the platform does not report interface numbers
        let interface = entry.interface_number().max(0);
        let path = entry.path().to_owned();

        match devices.iter_mut().find(|d| d.kind == kind && d.serial == serial) {
            Some(device) => {
                if device.interface_path(interface).is_none() {
                    device.interfaces.push((interface, path));
                }
            }
            None => devices.push(DeviceInfo {
                kind,
                serial,
                interfaces: vec![(interface, path)],
            }),
        }
    }

    for device in &mut devices {
        device.interfaces.sort_by_key(|(n, _)| *n);
    }
    devices
}

/// List all connected supported devices.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let api = create_hid_api()?;
    let devices = collect_devices(api.device_list());
    for device in &devices {
        log::debug!(
            "Found {} {} with {} interface(s)",
            device.kind.name(),
            device.serial,
            device.interfaces.len()
        );
    }
    Ok(devices)
}

fn open_interface(api: &HidApi, info: &DeviceInfo, number: i32) -> Result<Box<dyn Transport>> {
    let path = info.interface_path(number).ok_or(VrError::DeviceNotFound)?;
    let device = api.open_path(path)?;
    Ok(Box::new(HidTransport::new(device)))
}

/// Builds the driver for `info`, opening every interface it needs.
///
/// Interfaces that carry input get their own handle for the reader thread; the
/// control handle stays with the driver.
fn open_driver(info: &DeviceInfo, config: &SessionConfig, tracker: Arc<dyn Tracker>) -> Result<Box<dyn DeviceDriver>> {
    let api = create_hid_api()?;

    let driver: Box<dyn DeviceDriver> = match info.kind {
        DeviceKind::RiftDk2 | DeviceKind::RiftCv1 => {
            let control = open_interface(&api, info, 0)?;
            let mut inputs = vec![open_interface(&api, info, 0)?];
            if info.kind == DeviceKind::RiftCv1 {
                match open_interface(&api, info, 1) {
                    Ok(radio) => inputs.push(radio),
                    Err(e) => log::warn!("{}: Radio interface unavailable: {}", info.kind.name(), e),
                }
            }
            Box::new(RiftDriver::new(info.kind, control, inputs, config.clone(), tracker))
        }
        DeviceKind::ViveControllerUsb => {
            let control = open_interface(&api, info, 0)?;
            let inputs = (0..3)
                .map(|n| open_interface(&api, info, n))
                .collect::<Result<Vec<_>>>()?;
            Box::new(ViveControllerDriver::new(&info.serial, control, inputs, config.clone()))
        }
    };

    log::info!("Opened {} {}", info.kind.name(), info.serial);
    Ok(driver)
}

/// Open a device and wrap it in an idle [`Session`].
pub fn open(info: &DeviceInfo, config: &SessionConfig, tracker: Arc<dyn Tracker>) -> Result<Session> {
    let driver = open_driver(info, config, tracker)?;
    Ok(Session::new(driver, config))
}

/// Open the first supported device found.
pub fn open_first(config: &SessionConfig, tracker: Arc<dyn Tracker>) -> Result<Session> {
    let info = list_devices()?
        .into_iter()
        .next()
        .ok_or(VrError::DeviceNotFound)?;
    open(&info, config, tracker)
}
