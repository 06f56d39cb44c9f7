//! SPI master operations.
//!
//! SPI transfers are always full duplex: every clocked byte shifts one
//! byte out and one byte in, so the transmit and receive buffers must be
//! the same length. The slave-select line is picked per transfer through
//! [`spi_device_num`].

use log::warn;

use crate::consts::req;
use crate::error::{Error, Result};
use crate::registry::{PortHandle, SessionHandle, UsbSio};
use crate::session::BusKind;

/// Configuration applied when an SPI port is initialized.
///
/// `options` combines the bits and helpers in
/// [`crate::consts::spi_options`]: data size, clock polarity and phase,
/// and the optional pre/post slave-select delays.
#[derive(Debug, Clone, Copy)]
pub struct SpiConfig {
    /// SPI clock rate in Hz.
    pub clock_rate: u32,
    pub options: u32,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            clock_rate: 1_000_000,
            options: crate::consts::spi_options::DATA_SIZE_8,
        }
    }
}

impl SpiConfig {
    fn to_wire(self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.clock_rate.to_le_bytes());
        buf[4..8].copy_from_slice(&self.options.to_le_bytes());
        buf
    }
}

/// Encodes a GPIO port/pin pair as the slave-select device number carried
/// in each SPI transfer request.
pub const fn spi_device_num(gpio_port: u8, gpio_pin: u8) -> u8 {
    ((gpio_port & 0x07) << 5) | (gpio_pin & 0x1F)
}

impl UsbSio {
    /// Initializes an SPI port and returns a handle for transfers on it.
    pub fn spi_open(
        &self,
        handle: SessionHandle,
        port: u8,
        config: &SpiConfig,
    ) -> Result<PortHandle> {
        self.open_port(
            handle,
            BusKind::Spi,
            port,
            req::spi::INIT_PORT,
            &config.to_wire(),
        )
    }

    /// Deinitializes an SPI port. The handle is invalid afterwards even
    /// when the device does not acknowledge the request.
    pub fn spi_close(&self, port: PortHandle) -> Result<()> {
        if port.bus() != BusKind::Spi {
            return Err(Error::BadHandle);
        }
        self.close_port(port, req::spi::DEINIT_PORT)
    }

    /// Full-duplex transfer: shifts `tx` out while filling `rx`, with the
    /// slave select given by `device` (see [`spi_device_num`]) asserted for
    /// the whole transfer. `options` is passed through to the firmware
    /// per transfer; zero for default behavior. Returns the number of
    /// bytes exchanged.
    pub fn spi_transfer(
        &self,
        port: PortHandle,
        device: u8,
        tx: &[u8],
        rx: &mut [u8],
        options: u8,
    ) -> Result<usize> {
        if port.bus() != BusKind::Spi {
            return Err(Error::BadHandle);
        }
        let session = self.port_session(port)?;
        if tx.len() != rx.len() {
            return Err(Error::InvalidParameter(format!(
                "SPI is full duplex: tx is {} bytes but rx is {}",
                tx.len(),
                rx.len()
            )));
        }
        if tx.len() > session.caps.max_data_size as usize {
            return Err(Error::InvalidParameter(format!(
                "transfer of {} bytes exceeds device maximum of {}",
                tx.len(),
                session.caps.max_data_size
            )));
        }

        let mut payload = Vec::with_capacity(4 + tx.len());
        payload.extend_from_slice(&(tx.len() as u16).to_le_bytes());
        payload.push(options);
        payload.push(device);
        payload.extend_from_slice(tx);
        let response = session.engine.execute(port.port(), req::spi::DEVICE_XFER, &payload)?;

        if response.len() != rx.len() {
            warn!(
                "SPI transfer returned {} bytes for a {}-byte exchange",
                response.len(),
                rx.len()
            );
        }
        let count = response.len().min(rx.len());
        rx[..count].copy_from_slice(&response[..count]);
        Ok(count)
    }

    /// Resets the SPI controller of the port.
    pub fn spi_reset(&self, port: PortHandle) -> Result<()> {
        if port.bus() != BusKind::Spi {
            return Err(Error::BadHandle);
        }
        let session = self.port_session(port)?;
        session.engine.execute(port.port(), req::spi::RESET, &[])?;
        Ok(())
    }
}
