//! I2C master operations.
//!
//! All functions take a [`PortHandle`] obtained from [`UsbSio::i2c_open`]
//! and run one protocol exchange each. Per-transfer behavior (start/stop
//! generation, NACK handling, addressing) is controlled through the flags
//! in [`crate::consts::i2c_options`] and [`crate::consts::i2c_xfer_options`].

use log::warn;

use crate::consts::req;
use crate::error::{Error, Result};
use crate::registry::{PortHandle, SessionHandle, UsbSio};
use crate::session::BusKind;

/// I2C bus clock rates supported by the bridge firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum I2cClockRate {
    /// Standard mode, 100 kHz.
    #[default]
    Standard,
    /// Fast mode, 400 kHz.
    Fast,
    /// Fast mode plus, 1 MHz.
    FastPlus,
}

impl I2cClockRate {
    fn hz(self) -> u32 {
        match self {
            I2cClockRate::Standard => 100_000,
            I2cClockRate::Fast => 400_000,
            I2cClockRate::FastPlus => 1_000_000,
        }
    }
}

/// Configuration applied when an I2C port is initialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct I2cConfig {
    pub clock_rate: I2cClockRate,
    /// Reserved option bits, sent to the firmware as-is.
    pub options: u32,
}

impl I2cConfig {
    fn to_wire(self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(&self.clock_rate.hz().to_le_bytes());
        buf[4..8].copy_from_slice(&self.options.to_le_bytes());
        buf
    }
}

/// Largest 7-bit slave address.
const MAX_I2C_ADDRESS: u8 = 0x7F;

fn check_address(addr: u8) -> Result<()> {
    if addr > MAX_I2C_ADDRESS {
        return Err(Error::InvalidParameter(format!(
            "I2C address 0x{:02X} exceeds 7-bit range",
            addr
        )));
    }
    Ok(())
}

fn check_length(len: usize, max_data_size: u32) -> Result<()> {
    if len > max_data_size as usize {
        return Err(Error::InvalidParameter(format!(
            "transfer of {} bytes exceeds device maximum of {}",
            len, max_data_size
        )));
    }
    Ok(())
}

impl UsbSio {
    /// Initializes an I2C port and returns a handle for transfers on it.
    pub fn i2c_open(
        &self,
        handle: SessionHandle,
        port: u8,
        config: &I2cConfig,
    ) -> Result<PortHandle> {
        self.open_port(
            handle,
            BusKind::I2c,
            port,
            req::i2c::INIT_PORT,
            &config.to_wire(),
        )
    }

    /// Deinitializes an I2C port. The handle is invalid afterwards even
    /// when the device does not acknowledge the request.
    pub fn i2c_close(&self, port: PortHandle) -> Result<()> {
        if port.bus() != BusKind::I2c {
            return Err(Error::BadHandle);
        }
        self.close_port(port, req::i2c::DEINIT_PORT)
    }

    /// Reads up to `buf.len()` bytes from the slave at `addr`. Returns the
    /// number of bytes actually received.
    pub fn i2c_read(
        &self,
        port: PortHandle,
        addr: u8,
        buf: &mut [u8],
        options: u8,
    ) -> Result<usize> {
        if port.bus() != BusKind::I2c {
            return Err(Error::BadHandle);
        }
        let session = self.port_session(port)?;
        check_address(addr)?;
        check_length(buf.len(), session.caps.max_data_size)?;

        let params = rw_params(buf.len() as u16, options, addr);
        let response = session.engine.execute(port.port(), req::i2c::DEVICE_READ, &params)?;
        if response.len() > buf.len() {
            warn!(
                "I2C read returned {} bytes for a {}-byte request, truncating",
                response.len(),
                buf.len()
            );
        }
        let count = response.len().min(buf.len());
        buf[..count].copy_from_slice(&response[..count]);
        Ok(count)
    }

    /// Writes `data` to the slave at `addr`. Returns the number of bytes
    /// transmitted.
    pub fn i2c_write(
        &self,
        port: PortHandle,
        addr: u8,
        data: &[u8],
        options: u8,
    ) -> Result<usize> {
        if port.bus() != BusKind::I2c {
            return Err(Error::BadHandle);
        }
        let session = self.port_session(port)?;
        check_address(addr)?;
        check_length(data.len(), session.caps.max_data_size)?;

        let mut payload = Vec::with_capacity(4 + data.len());
        payload.extend_from_slice(&rw_params(data.len() as u16, options, addr));
        payload.extend_from_slice(data);
        session.engine.execute(port.port(), req::i2c::DEVICE_WRITE, &payload)?;
        Ok(data.len())
    }

    /// Combined write-then-read in one bus transaction (repeated start, no
    /// intervening stop). Either direction may be empty. Returns the number
    /// of bytes received, or the number transmitted when the device answers
    /// with no data bytes.
    pub fn i2c_transfer(
        &self,
        port: PortHandle,
        addr: u8,
        tx: &[u8],
        rx: &mut [u8],
        options: u16,
    ) -> Result<usize> {
        if port.bus() != BusKind::I2c {
            return Err(Error::BadHandle);
        }
        let session = self.port_session(port)?;
        check_address(addr)?;
        check_length(tx.len(), session.caps.max_data_size)?;
        check_length(rx.len(), session.caps.max_data_size)?;

        let mut payload = Vec::with_capacity(8 + tx.len());
        payload.extend_from_slice(&(tx.len() as u16).to_le_bytes());
        payload.extend_from_slice(&(rx.len() as u16).to_le_bytes());
        payload.extend_from_slice(&options.to_le_bytes());
        payload.extend_from_slice(&(addr as u16).to_le_bytes());
        payload.extend_from_slice(tx);
        let response = session.engine.execute(port.port(), req::i2c::DEVICE_XFER, &payload)?;

        // A status-only reply with no data bytes means the firmware treated
        // the exchange as write-only; report the transmitted length.
        if response.is_empty() {
            return Ok(tx.len());
        }
        if response.len() > rx.len() {
            warn!(
                "I2C transfer returned {} bytes for a {}-byte read, truncating",
                response.len(),
                rx.len()
            );
        }
        let count = response.len().min(rx.len());
        rx[..count].copy_from_slice(&response[..count]);
        Ok(count)
    }

    /// Resets the I2C controller of the port. This is the recovery path
    /// after a timed-out transaction left the channel in an undefined
    /// state.
    pub fn i2c_reset(&self, port: PortHandle) -> Result<()> {
        if port.bus() != BusKind::I2c {
            return Err(Error::BadHandle);
        }
        let session = self.port_session(port)?;
        session.engine.execute(port.port(), req::i2c::RESET, &[])?;
        Ok(())
    }
}

/// Parameter block shared by the plain read and write requests.
fn rw_params(len: u16, options: u8, addr: u8) -> [u8; 4] {
    let mut params = [0u8; 4];
    params[0..2].copy_from_slice(&len.to_le_bytes());
    params[2] = options;
    params[3] = addr;
    params
}
