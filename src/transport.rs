//! Byte-level transport abstraction
//!
//! The transaction engine only needs three things from a line: how many
//! bytes are waiting, a best-effort read of them, and a write that returns
//! once the bytes are queued. Opening the port and choosing baud rate,
//! parity and stop bits stay with the application.
//!
//! With the `rtu` feature, [`SerialPortLine`] adapts a `tokio_serial`
//! port to this interface.

use std::io;

/// Duplex byte channel with non-blocking read semantics
///
/// ## Contract
///
/// - [`bytes_available`](SerialLine::bytes_available) never blocks.
/// - [`read_bytes`](SerialLine::read_bytes) returns at most `buf.len()` bytes
///   and may return fewer than were reported available; `Ok(0)` means
///   nothing was read.
/// - [`write_bytes`](SerialLine::write_bytes) returns once the bytes are
///   handed to the driver and reports how many were accepted.
pub trait SerialLine: Send {
    /// Queue `buf` for transmission and return the number of bytes accepted
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Number of received bytes waiting to be read
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` waiting bytes
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<L: SerialLine + ?Sized> SerialLine for Box<L> {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write_bytes(buf)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_bytes(buf)
    }
}

/// Transport layer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Frames fully written to the line
    pub requests_sent: u64,
    /// Transactions that decoded successfully
    pub responses_received: u64,
    /// Failed transactions, timeouts included
    pub errors: u64,
    /// Transactions that ended in `NoResponse`
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[cfg(feature = "rtu")]
pub use serial::{SerialPortLine, SerialSettings};

#[cfg(feature = "rtu")]
mod serial {
    use std::io::{self, Read, Write};
    use std::time::Duration;

    use tokio_serial::{DataBits, Parity, SerialPort, StopBits};
    use tracing::debug;

    use super::SerialLine;
    use crate::error::{ModbusError, ModbusResult};

    /// Line parameters for opening a serial port
    #[derive(Debug, Clone, PartialEq)]
    pub struct SerialSettings {
        /// Serial port path (e.g., "/dev/ttyUSB0", "COM1")
        pub port: String,
        pub baud_rate: u32,
        /// Data bits (5, 6, 7, 8)
        pub data_bits: u8,
        pub parity: Parity,
        /// Stop bits (1, 2)
        pub stop_bits: u8,
    }

    impl Default for SerialSettings {
        fn default() -> Self {
            Self {
                port: "/dev/ttyUSB0".to_string(),
                baud_rate: 9600,
                data_bits: 8,
                parity: Parity::Even,
                stop_bits: 1,
            }
        }
    }

    impl SerialSettings {
        /// Default settings for `port`
        pub fn new(port: impl Into<String>) -> Self {
            Self {
                port: port.into(),
                ..Self::default()
            }
        }

        pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
            self.baud_rate = baud_rate;
            self
        }

        pub fn with_data_bits(mut self, data_bits: u8) -> Self {
            self.data_bits = data_bits;
            self
        }

        pub fn with_parity(mut self, parity: Parity) -> Self {
            self.parity = parity;
            self
        }

        pub fn with_stop_bits(mut self, stop_bits: u8) -> Self {
            self.stop_bits = stop_bits;
            self
        }

        /// Parse a parity letter: `N`, `E` or `O` (case-insensitive)
        pub fn parse_parity(letter: &str) -> ModbusResult<Parity> {
            match letter.trim().to_ascii_uppercase().as_str() {
                "N" | "NONE" => Ok(Parity::None),
                "E" | "EVEN" => Ok(Parity::Even),
                "O" | "ODD" => Ok(Parity::Odd),
                other => Err(ModbusError::configuration(format!(
                    "Unknown parity '{}' (expected N, E or O)",
                    other
                ))),
            }
        }

        /// Check the settings before opening
        pub fn validate(&self) -> ModbusResult<()> {
            if self.port.is_empty() {
                return Err(ModbusError::configuration("Port path cannot be empty"));
            }
            if self.baud_rate == 0 {
                return Err(ModbusError::configuration(
                    "Baud rate must be greater than zero",
                ));
            }
            self.data_bits()?;
            self.stop_bits()?;
            Ok(())
        }

        fn data_bits(&self) -> ModbusResult<DataBits> {
            match self.data_bits {
                5 => Ok(DataBits::Five),
                6 => Ok(DataBits::Six),
                7 => Ok(DataBits::Seven),
                8 => Ok(DataBits::Eight),
                other => Err(ModbusError::configuration(format!(
                    "Unsupported data bits: {}",
                    other
                ))),
            }
        }

        fn stop_bits(&self) -> ModbusResult<StopBits> {
            match self.stop_bits {
                1 => Ok(StopBits::One),
                2 => Ok(StopBits::Two),
                other => Err(ModbusError::configuration(format!(
                    "Unsupported stop bits: {}",
                    other
                ))),
            }
        }
    }

    /// [`SerialLine`] over a `tokio_serial` port handle
    pub struct SerialPortLine {
        port: Box<dyn SerialPort>,
    }

    impl SerialPortLine {
        /// Open and configure a serial port
        pub fn open(settings: &SerialSettings) -> ModbusResult<Self> {
            settings.validate()?;

            // Short read timeout: the engine only reads what is already waiting
            let port = tokio_serial::new(settings.port.as_str(), settings.baud_rate)
                .data_bits(settings.data_bits()?)
                .parity(settings.parity)
                .stop_bits(settings.stop_bits()?)
                .timeout(Duration::from_millis(1))
                .open()
                .map_err(|e| {
                    ModbusError::io(format!(
                        "Failed to open serial port {}: {}",
                        settings.port, e
                    ))
                })?;

            debug!(
                "Opened {} at {} baud ({}{:?}{})",
                settings.port,
                settings.baud_rate,
                settings.data_bits,
                settings.parity,
                settings.stop_bits
            );
            Ok(Self { port })
        }

        /// Wrap an already configured port
        pub fn from_port(port: Box<dyn SerialPort>) -> Self {
            Self { port }
        }

        /// Port name as reported by the driver
        pub fn name(&self) -> Option<String> {
            self.port.name()
        }
    }

    /// Hand `buf` to the driver without waiting for transmission
    ///
    /// `flush` on a tty is `tcdrain`, which would park the runtime thread
    /// until the last bit is on the wire.
    fn queue_frame<W: Write + ?Sized>(port: &mut W, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            match port.write(&buf[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    impl SerialLine for SerialPortLine {
        fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
            queue_frame(&mut self.port, buf)
        }

        fn bytes_available(&mut self) -> io::Result<usize> {
            self.port
                .bytes_to_read()
                .map(|n| n as usize)
                .map_err(io::Error::from)
        }

        fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.port.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
                Err(e) => Err(e),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_default_settings() {
            let settings = SerialSettings::default();
            assert_eq!(settings.baud_rate, 9600);
            assert_eq!(settings.parity, Parity::Even);
            assert!(settings.validate().is_ok());
        }

        #[test]
        fn test_parse_parity() {
            assert_eq!(SerialSettings::parse_parity("n").unwrap(), Parity::None);
            assert_eq!(SerialSettings::parse_parity("E").unwrap(), Parity::Even);
            assert_eq!(SerialSettings::parse_parity("odd").unwrap(), Parity::Odd);
            assert!(SerialSettings::parse_parity("M").is_err());
        }

        #[test]
        fn test_validate_rejects_bad_settings() {
            assert!(SerialSettings::new("").validate().is_err());
            assert!(SerialSettings::new("/dev/ttyUSB0")
                .with_baud_rate(0)
                .validate()
                .is_err());
            assert!(SerialSettings::new("/dev/ttyUSB0")
                .with_data_bits(9)
                .validate()
                .is_err());
            assert!(SerialSettings::new("/dev/ttyUSB0")
                .with_stop_bits(3)
                .validate()
                .is_err());
        }

        /// Writer that accepts a few bytes per call and records flushes
        #[derive(Default)]
        struct ChunkedWriter {
            data: Vec<u8>,
            per_call: usize,
            flushes: usize,
        }

        impl Write for ChunkedWriter {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                let n = buf.len().min(self.per_call);
                self.data.extend_from_slice(&buf[..n]);
                Ok(n)
            }

            fn flush(&mut self) -> io::Result<()> {
                self.flushes += 1;
                Ok(())
            }
        }

        #[test]
        fn test_queue_frame_does_not_drain() {
            let frame = [0x01, 0x03, 0x30, 0x02, 0x00, 0x04, 0xEA, 0xC9];
            let mut writer = ChunkedWriter {
                per_call: 3,
                ..Default::default()
            };

            assert_eq!(queue_frame(&mut writer, &frame).unwrap(), frame.len());
            assert_eq!(writer.data, frame);
            assert_eq!(writer.flushes, 0);
        }

        #[test]
        fn test_queue_frame_reports_short_write() {
            let mut writer = ChunkedWriter::default();
            assert_eq!(queue_frame(&mut writer, &[0x01, 0x06]).unwrap(), 0);
        }

        #[test]
        fn test_open_missing_port() {
            let result = SerialPortLine::open(&SerialSettings::new("/dev/does-not-exist-vfd"));
            assert!(matches!(result, Err(ModbusError::Io { .. })));
        }
    }
}
