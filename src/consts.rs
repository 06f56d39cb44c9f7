//! Protocol constants: frame geometry, request codes and option flags.
//!
//! The values in this module are the firmware contract of the HID-SIO
//! bridge and must match the device side exactly.

/// NXP vendor ID.
pub const NXP_VID: u16 = 0x1FC9;
/// Product ID of the LPC-Link2 serial I/O interface.
pub const LPCLINK2_PID: u16 = 0x0090;
/// Product ID of the MCU-Link serial I/O interface.
pub const MCULINK_PID: u16 = 0x0143;

/// Default bounded wait for one response report, in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: i32 = 500;

/// Bridge interfaces are recognized by these product-string prefixes.
pub(crate) const PRODUCT_PREFIXES: [&str; 2] = ["LPCSIO", "MCUSIO"];

// --- Frame geometry ---
// Each exchange is carried in fixed 64-byte reports. Outbound reports are
// prefixed with a zero report-id byte; inbound reports arrive without it.

/// Size of one protocol frame (the HID report excluding the report id).
pub const FRAME_SIZE: usize = 64;
/// Frame header size in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;
/// Payload capacity of a single frame.
pub const FRAME_DATA_SIZE: usize = FRAME_SIZE - FRAME_HEADER_SIZE;
/// Outbound report buffer size: report id + frame.
pub(crate) const OUT_REPORT_SIZE: usize = FRAME_SIZE + 1;
/// Report id carried by every outbound report.
pub(crate) const REPORT_ID: u8 = 0;

/// Response status byte indicating success.
pub(crate) const STATUS_OK: u8 = 0;

// --- Request codes ---
pub(crate) mod req {
    /// Capability/firmware-version query.
    pub const DEV_INFO: u8 = 0x01;

    pub mod i2c {
        pub const INIT_PORT: u8 = 0x10;
        pub const DEINIT_PORT: u8 = 0x11;
        pub const DEVICE_WRITE: u8 = 0x12;
        pub const DEVICE_READ: u8 = 0x13;
        pub const DEVICE_XFER: u8 = 0x14;
        pub const RESET: u8 = 0x15;
    }

    pub mod spi {
        pub const INIT_PORT: u8 = 0x20;
        pub const DEINIT_PORT: u8 = 0x21;
        pub const DEVICE_XFER: u8 = 0x22;
        pub const RESET: u8 = 0x23;
    }

    pub mod gpio {
        pub const PORT_VALUE: u8 = 0x30;
        pub const PORT_DIR: u8 = 0x31;
        pub const TOGGLE_PIN: u8 = 0x32;
        pub const IOCONFIG: u8 = 0x33;
    }
}

// --- I2C transfer option flags ---
pub mod i2c_options {
    /// Generate a START condition before transmitting.
    pub const START_BIT: u8 = 0x01;
    /// Generate a STOP condition at the end of the transfer.
    pub const STOP_BIT: u8 = 0x02;
    /// Stop transmitting when the slave NACKs a byte.
    pub const BREAK_ON_NACK: u8 = 0x04;
    /// NACK the last byte read (some slaves require this).
    pub const NACK_LAST_BYTE: u8 = 0x08;
    /// Omit the address field; it is part of the data or the frame needs none.
    pub const NO_ADDRESS: u8 = 0x40;
}

// --- I2C fast-transfer option flags ---
pub mod i2c_xfer_options {
    /// Ignore NACK during data transfer (default aborts).
    pub const IGNORE_NACK: u16 = 0x01;
    /// ACK the last byte received (default NACKs per I2C spec).
    pub const LAST_RX_ACK: u16 = 0x02;
}

// --- SPI port configuration option bits ---
pub mod spi_options {
    /// 8-bit data frames.
    pub const DATA_SIZE_8: u32 = 0x07;
    /// 16-bit data frames, transferred little-endian.
    pub const DATA_SIZE_16: u32 = 0x0F;
    /// Clock idles low.
    pub const POL_0: u32 = 0 << 6;
    /// Clock idles high.
    pub const POL_1: u32 = 1 << 6;
    /// Data captured on the first clock transition.
    pub const PHA_0: u32 = 0 << 7;
    /// Data captured on the second clock transition.
    pub const PHA_1: u32 = 1 << 7;

    /// Delay between slave select assertion and the first clock, in µs (max 255).
    pub const fn pre_delay(us: u32) -> u32 {
        (us & 0xFF) << 8
    }

    /// Delay between the last clock and slave select release, in µs (max 255).
    pub const fn post_delay(us: u32) -> u32 {
        (us & 0xFF) << 16
    }
}
