//! GPIO operations.
//!
//! GPIO ports need no init/deinit handshake, so these functions take the
//! session handle and a port number directly. Each port is a bank of up to
//! 32 pins addressed through set/clear masks; the value and direction
//! requests share one wire shape and atomically apply a set mask and a
//! clear mask, then report the resulting register.

use crate::consts::req;
use crate::error::{Error, Result};
use crate::registry::{SessionHandle, UsbSio};
use crate::session::DeviceSession;
use std::sync::Arc;

fn check_pin(pin: u8) -> Result<()> {
    if pin > 31 {
        return Err(Error::InvalidParameter(format!(
            "GPIO pin {} out of range (0-31)",
            pin
        )));
    }
    Ok(())
}

impl UsbSio {
    fn gpio_session(&self, handle: SessionHandle, port: u8) -> Result<Arc<DeviceSession>> {
        let session = self.session(handle)?;
        if port >= session.caps.max_gpio_ports {
            return Err(Error::InvalidParameter(format!(
                "GPIO port {} out of range (device has {})",
                port, session.caps.max_gpio_ports
            )));
        }
        Ok(session)
    }

    /// One set/clear exchange; the response carries the resulting register.
    fn gpio_masks(
        &self,
        handle: SessionHandle,
        port: u8,
        code: u8,
        set: u32,
        clear: u32,
    ) -> Result<u32> {
        let session = self.gpio_session(handle, port)?;
        let mut payload = [0u8; 8];
        payload[0..4].copy_from_slice(&set.to_le_bytes());
        payload[4..8].copy_from_slice(&clear.to_le_bytes());
        let response = session.engine.execute(port, code, &payload)?;
        if response.len() < 4 {
            return Err(Error::InvalidReport(response.len()));
        }
        Ok(u32::from_le_bytes([
            response[0],
            response[1],
            response[2],
            response[3],
        ]))
    }

    /// Reads the current pin values of a port.
    pub fn gpio_read_port(&self, handle: SessionHandle, port: u8) -> Result<u32> {
        self.gpio_masks(handle, port, req::gpio::PORT_VALUE, 0, 0)
    }

    /// Drives every pin of the port: bits set in `value` go high, the rest
    /// go low. Returns the resulting pin values.
    pub fn gpio_write_port(&self, handle: SessionHandle, port: u8, value: u32) -> Result<u32> {
        self.gpio_masks(handle, port, req::gpio::PORT_VALUE, value, !value)
    }

    /// Drives the pins in `bits` high, leaving the others untouched.
    pub fn gpio_set_port(&self, handle: SessionHandle, port: u8, bits: u32) -> Result<u32> {
        self.gpio_masks(handle, port, req::gpio::PORT_VALUE, bits, 0)
    }

    /// Drives the pins in `bits` low, leaving the others untouched.
    pub fn gpio_clear_port(&self, handle: SessionHandle, port: u8, bits: u32) -> Result<u32> {
        self.gpio_masks(handle, port, req::gpio::PORT_VALUE, 0, bits)
    }

    /// Reads the direction register: a set bit means output.
    pub fn gpio_get_port_dir(&self, handle: SessionHandle, port: u8) -> Result<u32> {
        self.gpio_masks(handle, port, req::gpio::PORT_DIR, 0, 0)
    }

    /// Switches the pins in `bits` to outputs. Returns the resulting
    /// direction register.
    pub fn gpio_set_port_out_dir(&self, handle: SessionHandle, port: u8, bits: u32) -> Result<u32> {
        self.gpio_masks(handle, port, req::gpio::PORT_DIR, bits, 0)
    }

    /// Switches the pins in `bits` to inputs. Returns the resulting
    /// direction register.
    pub fn gpio_set_port_in_dir(&self, handle: SessionHandle, port: u8, bits: u32) -> Result<u32> {
        self.gpio_masks(handle, port, req::gpio::PORT_DIR, 0, bits)
    }

    /// Drives a single pin high.
    pub fn gpio_set_pin(&self, handle: SessionHandle, port: u8, pin: u8) -> Result<()> {
        check_pin(pin)?;
        self.gpio_set_port(handle, port, 1 << pin)?;
        Ok(())
    }

    /// Drives a single pin low.
    pub fn gpio_clear_pin(&self, handle: SessionHandle, port: u8, pin: u8) -> Result<()> {
        check_pin(pin)?;
        self.gpio_clear_port(handle, port, 1 << pin)?;
        Ok(())
    }

    /// Reads a single pin.
    pub fn gpio_get_pin(&self, handle: SessionHandle, port: u8, pin: u8) -> Result<bool> {
        check_pin(pin)?;
        let value = self.gpio_read_port(handle, port)?;
        Ok(value & (1 << pin) != 0)
    }

    /// Inverts a single output pin in the device, without a
    /// read-modify-write round trip from the host.
    pub fn gpio_toggle_pin(&self, handle: SessionHandle, port: u8, pin: u8) -> Result<()> {
        check_pin(pin)?;
        let session = self.gpio_session(handle, port)?;
        session.engine.execute(port, req::gpio::TOGGLE_PIN, &[pin])?;
        Ok(())
    }

    /// Applies a pad configuration word to a pin (pull resistors, open
    /// drain and similar electrical settings; values are firmware
    /// specific).
    pub fn gpio_config_io_pin(
        &self,
        handle: SessionHandle,
        port: u8,
        pin: u8,
        mode: u32,
    ) -> Result<()> {
        check_pin(pin)?;
        let session = self.gpio_session(handle, port)?;
        let mut payload = [0u8; 5];
        payload[0..4].copy_from_slice(&mode.to_le_bytes());
        payload[4] = pin;
        session.engine.execute(port, req::gpio::IOCONFIG, &payload)?;
        Ok(())
    }
}
