//! Error types and the translation of device status codes.
//!
//! The bridge reports errors as small negative codes in three disjoint
//! ranges, which callers (and language bindings built on top of this crate)
//! may branch on: `-0x01..=-0x0F` local/library errors, `-0x11..=-0x1F`
//! firmware/bus errors, `-0x20..=-0x2F` bridge protocol errors.
//! [`Error::code`] exposes that stable contract; [`Error::class`] gives the
//! containing range.

use thiserror::Error;

/// Errors returned by serial I/O bridge operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the underlying HID API layer, with its own message.
    #[error("HID API error: {0}")]
    Hid(#[from] hidapi::HidError),
    /// The session or port handle does not refer to anything open.
    #[error("Handle passed to the function is invalid")]
    BadHandle,
    /// General I/O failure during report transfer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A session guard was poisoned by a panicking thread.
    #[error("Thread synchronization error")]
    Synchronization,
    /// A parameter failed local validation, or the device rejected the
    /// request parameters.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// A response report was too short or structurally malformed.
    #[error("Invalid HID report received ({0} bytes)")]
    InvalidReport(usize),

    /// Fatal error reported by the device's bus controller.
    #[error("Fatal error reported by bridge firmware")]
    Fatal,
    /// Transfer aborted because a byte was NACKed.
    #[error("Transfer aborted due to NACK")]
    Nack,
    /// Transfer aborted due to a bus error.
    #[error("Transfer aborted due to bus error")]
    BusError,
    /// No acknowledgement after the slave address was sent.
    #[error("No acknowledgement received from slave address")]
    SlaveNack,
    /// Bus arbitration lost to another master.
    #[error("Bus arbitration lost to another master")]
    ArbitrationLost,

    /// No complete response arrived within the configured read timeout.
    /// The channel framing is undefined afterwards; issue a bus reset
    /// before reusing the port.
    #[error("Transaction timed out")]
    Timeout,
    /// The firmware does not support this request code.
    #[error("Invalid request or request not supported by this firmware")]
    InvalidCommand,
    /// The firmware completed only part of the transfer.
    #[error("Partial transfer completed")]
    PartialData,
    /// Status code outside the ranges this library knows about.
    #[error("Unsupported error code 0x{0:02X} reported by device")]
    UnsupportedStatus(u8),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The three disjoint error ranges of the numeric contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Detected on the host before or around device I/O.
    Local,
    /// Reported by the device's hardware bus controller.
    Bus,
    /// Reported by the firmware's HID-SIO bridge module, or a timeout.
    Bridge,
}

impl Error {
    /// Stable negative error code matching the contract existing language
    /// bindings branch on.
    pub fn code(&self) -> i32 {
        match self {
            Error::Hid(_) | Error::Io(_) | Error::InvalidReport(_) => -0x01,
            Error::BadHandle => -0x02,
            Error::Synchronization => -0x03,
            Error::InvalidParameter(_) => -0x22,
            Error::Fatal => -0x11,
            Error::Nack => -0x12,
            Error::BusError => -0x13,
            Error::SlaveNack => -0x14,
            Error::ArbitrationLost => -0x15,
            Error::Timeout => -0x20,
            Error::InvalidCommand => -0x21,
            Error::PartialData => -0x23,
            Error::UnsupportedStatus(raw) => -(*raw as i32 + 0x10),
        }
    }

    /// The range [`Error::code`] falls in.
    pub fn class(&self) -> ErrorClass {
        match -self.code() {
            0x01..=0x0F => ErrorClass::Local,
            0x10..=0x1F => ErrorClass::Bus,
            _ => ErrorClass::Bridge,
        }
    }

    /// Maps a non-OK response status byte to an error. The device encodes
    /// status `s` as caller code `-(s + 0x10)`.
    pub(crate) fn from_status(status: u8) -> Error {
        match status as i32 + 0x10 {
            0x11 => Error::Fatal,
            0x12 => Error::Nack,
            0x13 => Error::BusError,
            0x14 => Error::SlaveNack,
            0x15 => Error::ArbitrationLost,
            0x20 => Error::Timeout,
            0x21 => Error::InvalidCommand,
            0x22 => Error::InvalidParameter("rejected by device".to_string()),
            0x23 => Error::PartialData,
            _ => Error::UnsupportedStatus(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_translation_covers_known_ranges() {
        assert!(matches!(Error::from_status(0x01), Error::Fatal));
        assert!(matches!(Error::from_status(0x02), Error::Nack));
        assert!(matches!(Error::from_status(0x05), Error::ArbitrationLost));
        assert!(matches!(Error::from_status(0x10), Error::Timeout));
        assert!(matches!(Error::from_status(0x11), Error::InvalidCommand));
        assert!(matches!(
            Error::from_status(0x12),
            Error::InvalidParameter(_)
        ));
        assert!(matches!(Error::from_status(0x13), Error::PartialData));
    }

    #[test]
    fn unknown_status_keeps_its_range() {
        let err = Error::from_status(0x0A);
        assert!(matches!(err, Error::UnsupportedStatus(0x0A)));
        assert_eq!(err.code(), -0x1A);
        assert_eq!(err.class(), ErrorClass::Bus);

        let err = Error::from_status(0x1F);
        assert_eq!(err.code(), -0x2F);
        assert_eq!(err.class(), ErrorClass::Bridge);
    }

    #[test]
    fn codes_match_numeric_contract() {
        assert_eq!(Error::BadHandle.code(), -2);
        assert_eq!(Error::Synchronization.code(), -3);
        assert_eq!(Error::Nack.code(), -0x12);
        assert_eq!(Error::Timeout.code(), -0x20);
        assert_eq!(Error::InvalidParameter(String::new()).code(), -0x22);
        assert_eq!(Error::BadHandle.class(), ErrorClass::Local);
        assert_eq!(Error::SlaveNack.class(), ErrorClass::Bus);
        assert_eq!(Error::PartialData.class(), ErrorClass::Bridge);
    }
}
