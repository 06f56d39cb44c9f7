//! The USB HID transport boundary.
//!
//! The protocol engine only needs four primitives from the transport:
//! enumerate, open-by-path, blocking report write, and timeout-bounded
//! report read. They are expressed as the [`Backend`] and [`Transport`]
//! traits so the rest of the crate never talks to `hidapi` directly and
//! tests can substitute a scripted device.

use hidapi::{HidApi, HidDevice};
use log::{debug, trace};
use std::ffi::{CStr, CString};

use crate::error::Result;

/// Information about one discovered bridge HID interface.
#[derive(Debug, Clone)]
pub struct SioDeviceInfo {
    pub vid: u16,
    pub pid: u16,
    /// Platform-specific path used to open the device.
    pub path: CString,
    pub serial_number: Option<String>,
    pub manufacturer_string: Option<String>,
    pub product_string: Option<String>,
    pub interface_number: i32,
}

/// Device discovery and opening.
pub trait Backend: Send {
    /// Enumerates HID devices matching `vid`/`pid`; zero matches any.
    /// The returned order is OS-defined but stable for one call.
    fn enumerate(&mut self, vid: u16, pid: u16) -> Result<Vec<SioDeviceInfo>>;

    /// Opens the device at `path` for report I/O.
    fn open(&mut self, path: &CStr) -> Result<Box<dyn Transport>>;
}

/// Report-level I/O on one opened device.
pub trait Transport: Send {
    /// Writes one fixed-size report (report id included). Returns the
    /// number of bytes accepted.
    fn write_report(&mut self, report: &[u8]) -> Result<usize>;

    /// Reads one report with a bounded wait. Returns 0 if the timeout
    /// elapsed without data.
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;
}

/// `hidapi`-backed implementation used outside of tests.
pub struct HidBackend {
    api: HidApi,
}

impl HidBackend {
    pub fn new() -> Result<Self> {
        Ok(Self {
            api: HidApi::new()?,
        })
    }
}

impl Backend for HidBackend {
    fn enumerate(&mut self, vid: u16, pid: u16) -> Result<Vec<SioDeviceInfo>> {
        self.api.refresh_devices()?;
        let mut devices = Vec::new();
        for info in self.api.device_list() {
            if (vid != 0 && info.vendor_id() != vid) || (pid != 0 && info.product_id() != pid) {
                continue;
            }
            debug!(
                "Found HID device: VID={:04X}, PID={:04X}, Path={:?}, Interface={}",
                info.vendor_id(),
                info.product_id(),
                info.path(),
                info.interface_number()
            );
            devices.push(SioDeviceInfo {
                vid: info.vendor_id(),
                pid: info.product_id(),
                path: info.path().to_owned(),
                serial_number: info.serial_number().map(String::from),
                manufacturer_string: info.manufacturer_string().map(String::from),
                product_string: info.product_string().map(String::from),
                interface_number: info.interface_number(),
            });
        }
        Ok(devices)
    }

    fn open(&mut self, path: &CStr) -> Result<Box<dyn Transport>> {
        let device = self.api.open_path(path)?;
        debug!("Opened HID device at {:?}", path);
        Ok(Box::new(HidTransport { device }))
    }
}

struct HidTransport {
    device: HidDevice,
}

impl Transport for HidTransport {
    fn write_report(&mut self, report: &[u8]) -> Result<usize> {
        let written = self.device.write(report)?;
        trace!("HID write: {} bytes {:02X?}", written, report);
        Ok(written)
    }

    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        let read = self.device.read_timeout(buf, timeout_ms)?;
        trace!("HID read: {} bytes {:02X?}", read, &buf[..read]);
        Ok(read)
    }
}
