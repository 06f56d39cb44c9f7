//! Host-side driver for NXP serial I/O bridge devices (LPC-Link2,
//! MCU-Link) that expose I2C, SPI and GPIO controllers over a single USB
//! HID interface.
//!
//! The driver speaks the HID-SIO framing protocol: every operation is one
//! request/response transaction carried in fixed 64-byte reports, large
//! payloads fragmented across frames and reassembled on the way back.
//! Transactions on one device are serialized; independent devices run in
//! parallel.
//!
//! # Usage
//!
//! Discover devices, open a session, then open bus ports on it:
//!
//! ```no_run
//! use usbsio_hid::{UsbSio, I2cConfig, NXP_VID, LPCLINK2_PID};
//!
//! # fn main() -> usbsio_hid::Result<()> {
//! let sio = UsbSio::new()?;
//! let n = sio.num_ports(NXP_VID, LPCLINK2_PID)?;
//! assert!(n > 0, "no bridge device attached");
//!
//! let session = sio.open(0)?;
//! println!("{}", sio.version(session)?);
//!
//! let i2c = sio.i2c_open(session, 0, &I2cConfig::default())?;
//! let mut id = [0u8; 2];
//! sio.i2c_read(i2c, 0x50, &mut id, usbsio_hid::consts::i2c_options::START_BIT
//!     | usbsio_hid::consts::i2c_options::STOP_BIT)?;
//!
//! sio.i2c_close(i2c)?;
//! sio.close(session)?;
//! # Ok(())
//! # }
//! ```
//!
//! All fallible calls return [`Result`]. Device-reported failures carry
//! the firmware's error taxonomy; [`Error::code`](Error::code) exposes the
//! stable numeric contract for bindings that need it.
//!
//! # Concurrency
//!
//! [`UsbSio`] is `Send + Sync` and all methods take `&self`; handles are
//! small `Copy` values. Two threads may freely share one session: their
//! transactions are serialized per device, never interleaved on the wire.

pub mod consts;
mod engine;
mod error;
mod frame;
mod gpio;
mod i2c;
mod registry;
mod session;
mod spi;
mod transport;

pub use consts::{DEFAULT_READ_TIMEOUT_MS, LPCLINK2_PID, MCULINK_PID, NXP_VID};
pub use error::{Error, ErrorClass, Result};
pub use i2c::{I2cClockRate, I2cConfig};
pub use registry::{Enumeration, PortHandle, SessionHandle, UsbSio};
pub use session::{BusKind, Capabilities};
pub use spi::{spi_device_num, SpiConfig};
pub use transport::{Backend, HidBackend, SioDeviceInfo, Transport};

/// Library name and version reported by [`UsbSio::version`].
pub const LIB_VERSION: &str = concat!("usbsio-hid v", env!("CARGO_PKG_VERSION"));
