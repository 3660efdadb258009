//! Error types for Modbus RTU transactions
//!
//! Every failure a transaction can produce is a distinct variant so callers
//! can pick a recovery policy (log-and-continue for polling, surface to the
//! operator for commands) without string matching.

use thiserror::Error;

use crate::protocol::ExceptionCode;

/// Result type used throughout the crate
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Errors produced by the frame codec, transaction engine and client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModbusError {
    /// Caller-supplied request is outside the protocol range; no I/O happened
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The line accepted fewer bytes than the frame length
    #[error("Incomplete frame write: {written} of {expected} bytes")]
    TransportWriteIncomplete { written: usize, expected: usize },

    /// The device stayed silent for the whole timeout
    #[error("No response within {timeout_ms} ms ({received} bytes received)")]
    NoResponse { timeout_ms: u64, received: usize },

    /// Fewer bytes than the smallest parseable frame
    #[error("Response too short: {len} bytes")]
    ShortResponse { len: usize },

    /// Trailer does not match the checksum of the frame body
    #[error("CRC mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    CrcMismatch { computed: u16, received: u16 },

    /// Reply came from another slave address
    #[error("Response slave address mismatch: expected {expected}, got {actual}")]
    UnexpectedSlave { expected: u8, actual: u8 },

    /// Reply function code does not match the request
    #[error("Function code mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedFunction { expected: u8, actual: u8 },

    /// Declared byte count disagrees with the request or the payload
    #[error("Byte count mismatch: expected {expected}, got {actual}")]
    ByteCountMismatch { expected: usize, actual: usize },

    /// The device rejected the request with an exception response
    #[error("Device exception on function 0x{function:02X}: {code}")]
    DeviceException { function: u8, code: ExceptionCode },

    /// The transport failed while querying, reading or writing
    #[error("Transport I/O error: {message}")]
    Io { message: String },

    /// Invalid client, line or application configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ModbusError {
    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a transport I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a device exception error from the raw reply bytes
    pub fn device_exception(function: u8, code: u8) -> Self {
        Self::DeviceException {
            function,
            code: ExceptionCode::from_u8(code),
        }
    }

    /// The device did not answer in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::NoResponse { .. })
    }

    /// The device answered with an exception
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::DeviceException { .. })
    }

    /// The reply arrived but was malformed or corrupted
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Self::ShortResponse { .. }
                | Self::CrcMismatch { .. }
                | Self::UnexpectedSlave { .. }
                | Self::UnexpectedFunction { .. }
                | Self::ByteCountMismatch { .. }
        )
    }

    /// Exception code carried by a [`ModbusError::DeviceException`]
    pub fn exception_code(&self) -> Option<ExceptionCode> {
        match self {
            Self::DeviceException { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModbusError::CrcMismatch {
            computed: 0x1234,
            received: 0xABCD,
        };
        assert_eq!(
            err.to_string(),
            "CRC mismatch: computed 0x1234, received 0xABCD"
        );

        let err = ModbusError::device_exception(0x06, 0x07);
        assert_eq!(
            err.to_string(),
            "Device exception on function 0x06: Write not allowed (0x07)"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(ModbusError::NoResponse {
            timeout_ms: 500,
            received: 0
        }
        .is_timeout());
        assert!(ModbusError::device_exception(0x03, 0x02).is_exception());
        assert!(ModbusError::ShortResponse { len: 2 }.is_frame_error());
        assert!(!ModbusError::invalid_argument("count").is_frame_error());
    }

    #[test]
    fn test_exception_code_accessor() {
        let err = ModbusError::device_exception(0x03, 0x42);
        assert_eq!(err.exception_code(), Some(ExceptionCode::Unknown(0x42)));
        assert_eq!(ModbusError::io("gone").exception_code(), None);
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "port unplugged");
        let err: ModbusError = io.into();
        assert_eq!(err, ModbusError::io("port unplugged"));
    }
}
