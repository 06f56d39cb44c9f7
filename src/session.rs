//! Per-device session state: capabilities, firmware identity and the
//! fixed-size sub-port slot tables.

use log::{debug, warn};
use std::sync::Mutex;

use crate::consts::req;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::transport::{SioDeviceInfo, Transport};

/// Capability counts reported by the device-info query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Number of I2C ports the firmware exposes.
    pub max_i2c_ports: u8,
    /// Number of SPI ports the firmware exposes.
    pub max_spi_ports: u8,
    /// Number of GPIO ports the firmware exposes.
    pub max_gpio_ports: u8,
    /// Largest single I2C/SPI transfer the firmware accepts, in bytes.
    pub max_data_size: u32,
    /// Firmware version, major in the high 16 bits.
    pub firmware_version: u32,
}

/// The two kinds of sub-ports a session can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusKind {
    I2c,
    Spi,
}

pub(crate) const FW_UNAVAILABLE: &str = "FW Ver Unavailable";

/// One open connection to a physical bridge device. Owns the transport
/// (through the engine) and the sub-port slot tables; the registry keeps
/// only a shared reference.
pub(crate) struct DeviceSession {
    pub(crate) engine: Engine,
    pub(crate) info: SioDeviceInfo,
    pub(crate) caps: Capabilities,
    pub(crate) fw_build: String,
    ports: Mutex<PortTables>,
}

/// Slot tables are sized once from the capability counts, so claiming a
/// slot never allocates; a slot is open iff its flag is set.
struct PortTables {
    i2c: Box<[bool]>,
    spi: Box<[bool]>,
}

impl DeviceSession {
    /// Wraps an opened transport and queries capabilities. A failed info
    /// query still yields a usable session: capabilities stay zeroed and
    /// the firmware version reads as unavailable.
    pub(crate) fn open(transport: Box<dyn Transport>, info: SioDeviceInfo) -> Self {
        let engine = Engine::new(transport);
        let (caps, fw_build) = match engine.execute(0, req::DEV_INFO, &[]) {
            Ok(data) if data.len() >= 12 => {
                let caps = Capabilities {
                    max_i2c_ports: data[0],
                    max_spi_ports: data[1],
                    max_gpio_ports: data[2],
                    max_data_size: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
                    firmware_version: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
                };
                let build = data[12..]
                    .split(|&b| b == 0)
                    .next()
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .unwrap_or_default();
                let fw_build = format!(
                    "FW {}.{} {}",
                    caps.firmware_version >> 16,
                    caps.firmware_version & 0xFFFF,
                    build
                );
                debug!("Device info: {:?}, {}", caps, fw_build);
                (caps, fw_build)
            }
            Ok(data) => {
                warn!("Short device-info response ({} bytes)", data.len());
                (Capabilities::default(), FW_UNAVAILABLE.to_string())
            }
            Err(e) => {
                warn!("Device-info query failed, session degraded: {}", e);
                (Capabilities::default(), FW_UNAVAILABLE.to_string())
            }
        };
        let ports = PortTables {
            i2c: vec![false; caps.max_i2c_ports as usize].into_boxed_slice(),
            spi: vec![false; caps.max_spi_ports as usize].into_boxed_slice(),
        };
        Self {
            engine,
            info,
            caps,
            fw_build,
            ports: Mutex::new(ports),
        }
    }

    fn with_table<T>(
        &self,
        bus: BusKind,
        f: impl FnOnce(&mut Box<[bool]>) -> T,
    ) -> Result<T> {
        let mut tables = self.ports.lock().map_err(|_| Error::Synchronization)?;
        Ok(match bus {
            BusKind::I2c => f(&mut tables.i2c),
            BusKind::Spi => f(&mut tables.spi),
        })
    }

    /// Marks a slot open. Fails before any I/O if the port number is
    /// outside the capability count.
    pub(crate) fn claim_port(&self, bus: BusKind, port: u8) -> Result<()> {
        self.with_table(bus, |table| {
            if let Some(slot) = table.get_mut(port as usize) {
                *slot = true;
                Ok(())
            } else {
                Err(Error::InvalidParameter(format!(
                    "{:?} port {} out of range (0-{})",
                    bus,
                    port,
                    table.len().saturating_sub(1)
                )))
            }
        })?
    }

    /// Clears a slot's open flag; the host-side resource is reclaimed even
    /// when the device did not acknowledge the deinit cleanly.
    pub(crate) fn release_port(&self, bus: BusKind, port: u8) -> Result<()> {
        self.with_table(bus, |table| {
            if let Some(slot) = table.get_mut(port as usize) {
                *slot = false;
            }
        })
    }

    pub(crate) fn port_is_open(&self, bus: BusKind, port: u8) -> Result<bool> {
        self.with_table(bus, |table| {
            table.get(port as usize).copied().unwrap_or(false)
        })
    }

    /// Port numbers currently open on `bus`, used by the close cascade.
    pub(crate) fn open_ports(&self, bus: BusKind) -> Result<Vec<u8>> {
        self.with_table(bus, |table| {
            table
                .iter()
                .enumerate()
                .filter(|(_, open)| **open)
                .map(|(i, _)| i as u8)
                .collect()
        })
    }
}
