//! Session registry: the top-level [`UsbSio`] object.
//!
//! Tracks every open device session plus the cached discovery list, hands
//! out opaque [`SessionHandle`]s and [`PortHandle`]s, and validates them on
//! every call. The registry lock guards only the session map and the
//! discovery cache; it is never held across a protocol exchange, so
//! opening or closing one device cannot block another device's in-flight
//! transaction.

use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::consts::PRODUCT_PREFIXES;
use crate::error::{Error, Result};
use crate::session::{BusKind, Capabilities, DeviceSession};
use crate::transport::{Backend, HidBackend, SioDeviceInfo};
use crate::LIB_VERSION;

/// Opaque handle to an open device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u32);

/// Opaque handle to an open I2C or SPI sub-port: the owning session plus
/// the slot index. The slot index is also the port number carried in every
/// request sent through this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortHandle {
    session: SessionHandle,
    bus: BusKind,
    port: u8,
}

impl PortHandle {
    /// The session this port belongs to.
    pub fn session(&self) -> SessionHandle {
        self.session
    }

    /// The bus kind of this port.
    pub fn bus(&self) -> BusKind {
        self.bus
    }

    /// The port number on its bus.
    pub fn port(&self) -> u8 {
        self.port
    }
}

/// Rewindable cursor over one raw enumeration pass. Owns a snapshot of the
/// discovery results, independent of any session.
pub struct Enumeration {
    devices: Vec<SioDeviceInfo>,
    pos: usize,
}

impl Enumeration {
    /// Number of devices in the snapshot.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Restarts the cursor at the first device.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}

impl Iterator for Enumeration {
    type Item = SioDeviceInfo;

    fn next(&mut self) -> Option<SioDeviceInfo> {
        let item = self.devices.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }
}

struct RegistryState {
    discovered: Vec<SioDeviceInfo>,
    sessions: HashMap<u32, Arc<DeviceSession>>,
    next_session: u32,
}

/// Entry point of the library: discovers bridge devices and manages their
/// sessions. All bus operations (`i2c_*`, `spi_*`, `gpio_*`) live on this
/// type as well; see the `i2c`, `spi` and `gpio` modules.
pub struct UsbSio {
    backend: Mutex<Box<dyn Backend>>,
    state: Mutex<RegistryState>,
}

impl UsbSio {
    /// Creates a registry backed by the system HID stack.
    pub fn new() -> Result<Self> {
        Ok(Self::with_backend(Box::new(HidBackend::new()?)))
    }

    /// Creates a registry over a custom transport backend (used by tests).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend: Mutex::new(backend),
            state: Mutex::new(RegistryState {
                discovered: Vec::new(),
                sessions: HashMap::new(),
                next_session: 0,
            }),
        }
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, RegistryState>> {
        self.state.lock().map_err(|_| Error::Synchronization)
    }

    /// Re-enumerates bridge devices matching `vid`/`pid` (zero matches
    /// any), caches the result and returns how many were found. Interfaces
    /// that do not identify as serial I/O bridges are skipped.
    pub fn num_ports(&self, vid: u16, pid: u16) -> Result<usize> {
        let devices = {
            let mut backend = self.backend.lock().map_err(|_| Error::Synchronization)?;
            backend.enumerate(vid, pid)?
        };
        let filtered: Vec<SioDeviceInfo> = devices
            .into_iter()
            .filter(|d| {
                d.product_string
                    .as_deref()
                    .is_some_and(|p| PRODUCT_PREFIXES.iter().any(|pre| p.starts_with(pre)))
            })
            .collect();
        debug!("Enumeration found {} bridge interface(s)", filtered.len());
        let mut state = self.lock_state()?;
        state.discovered = filtered;
        Ok(state.discovered.len())
    }

    /// Discovery info for the device at `index` in the cached list.
    pub fn device_info(&self, index: usize) -> Result<SioDeviceInfo> {
        let state = self.lock_state()?;
        state
            .discovered
            .get(index)
            .cloned()
            .ok_or_else(|| Error::InvalidParameter(format!("device index {} out of range", index)))
    }

    /// Raw enumeration pass without the bridge-interface filter, as a
    /// rewindable cursor. The cursor owns its snapshot and stays valid
    /// across later enumerations and session changes.
    pub fn enumerate_raw(&self, vid: u16, pid: u16) -> Result<Enumeration> {
        let mut backend = self.backend.lock().map_err(|_| Error::Synchronization)?;
        Ok(Enumeration {
            devices: backend.enumerate(vid, pid)?,
            pos: 0,
        })
    }

    /// Opens the cached device at `index` and queries its capabilities.
    /// A failed capability query still yields an open session with zeroed
    /// capabilities; its version string reports the firmware as
    /// unavailable.
    pub fn open(&self, index: usize) -> Result<SessionHandle> {
        let info = self.device_info(index)?;
        let transport = {
            let mut backend = self.backend.lock().map_err(|_| Error::Synchronization)?;
            backend.open(&info.path)?
        };
        let session = Arc::new(DeviceSession::open(transport, info));
        let mut state = self.lock_state()?;
        let id = state.next_session;
        state.next_session += 1;
        state.sessions.insert(id, session);
        debug!("Opened session {}", id);
        Ok(SessionHandle(id))
    }

    /// Closes a session: every still-open sub-port is deinitialized
    /// best-effort, then the session is removed and its transport released.
    /// When the last session goes away the cached discovery list is
    /// dropped too.
    pub fn close(&self, handle: SessionHandle) -> Result<()> {
        let session = self.session(handle)?;

        for bus in [BusKind::I2c, BusKind::Spi] {
            let deinit = match bus {
                BusKind::I2c => crate::consts::req::i2c::DEINIT_PORT,
                BusKind::Spi => crate::consts::req::spi::DEINIT_PORT,
            };
            for port in session.open_ports(bus)? {
                if let Err(e) = session.engine.execute(port, deinit, &[]) {
                    warn!("Deinit of {:?} port {} failed during close: {}", bus, port, e);
                }
                session.release_port(bus, port)?;
            }
        }

        let mut state = self.lock_state()?;
        state.sessions.remove(&handle.0);
        if state.sessions.is_empty() {
            state.discovered.clear();
        }
        debug!("Closed session {} ({:?})", handle.0, session.info.path);
        Ok(())
    }

    /// Library version plus, for a valid handle, the device firmware
    /// version string.
    pub fn version(&self, handle: SessionHandle) -> Result<String> {
        let session = self.session(handle)?;
        Ok(format!("{} / {}", LIB_VERSION, session.fw_build))
    }

    /// Capability counts learned from the device-info query.
    pub fn capabilities(&self, handle: SessionHandle) -> Result<Capabilities> {
        Ok(self.session(handle)?.caps)
    }

    /// Number of I2C ports on the device.
    pub fn num_i2c_ports(&self, handle: SessionHandle) -> Result<u8> {
        Ok(self.session(handle)?.caps.max_i2c_ports)
    }

    /// Number of SPI ports on the device.
    pub fn num_spi_ports(&self, handle: SessionHandle) -> Result<u8> {
        Ok(self.session(handle)?.caps.max_spi_ports)
    }

    /// Number of GPIO ports on the device.
    pub fn num_gpio_ports(&self, handle: SessionHandle) -> Result<u8> {
        Ok(self.session(handle)?.caps.max_gpio_ports)
    }

    /// Largest single transfer the firmware accepts, in bytes.
    pub fn max_data_size(&self, handle: SessionHandle) -> Result<u32> {
        Ok(self.session(handle)?.caps.max_data_size)
    }

    /// Overrides the bounded wait applied to each response report.
    pub fn set_read_timeout(&self, handle: SessionHandle, timeout_ms: i32) -> Result<()> {
        self.session(handle)?.engine.set_read_timeout(timeout_ms)
    }

    /// Handle validation: a session handle is valid iff it is in the live
    /// map.
    pub(crate) fn session(&self, handle: SessionHandle) -> Result<Arc<DeviceSession>> {
        let state = self.lock_state()?;
        state.sessions.get(&handle.0).cloned().ok_or(Error::BadHandle)
    }

    /// Port-handle validation: the session must be live and the slot open.
    pub(crate) fn port_session(&self, port: PortHandle) -> Result<Arc<DeviceSession>> {
        let session = self.session(port.session)?;
        if !session.port_is_open(port.bus, port.port)? {
            return Err(Error::BadHandle);
        }
        Ok(session)
    }

    /// Shared init-port path: validates the port number against the
    /// capability count, runs the init exchange and claims the slot.
    pub(crate) fn open_port(
        &self,
        handle: SessionHandle,
        bus: BusKind,
        port: u8,
        init_req: u8,
        config: &[u8],
    ) -> Result<PortHandle> {
        let session = self.session(handle)?;
        let max = match bus {
            BusKind::I2c => session.caps.max_i2c_ports,
            BusKind::Spi => session.caps.max_spi_ports,
        };
        if port >= max {
            return Err(Error::InvalidParameter(format!(
                "{:?} port {} out of range (device has {})",
                bus, port, max
            )));
        }
        session.engine.execute(port, init_req, config)?;
        session.claim_port(bus, port)?;
        Ok(PortHandle {
            session: handle,
            bus,
            port,
        })
    }

    /// Shared deinit-port path. A port that is not open fails with
    /// [`Error::BadHandle`] before any I/O; the slot is released even when
    /// the device does not acknowledge cleanly.
    pub(crate) fn close_port(&self, port: PortHandle, deinit_req: u8) -> Result<()> {
        let session = self.port_session(port)?;
        let result = session.engine.execute(port.port, deinit_req, &[]);
        session.release_port(port.bus, port.port)?;
        result.map(|_| ())
    }
}
