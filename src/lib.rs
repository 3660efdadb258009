//! # VFD RTU - Modbus RTU Master Core
//!
//! A small Modbus RTU master for talking to a variable frequency drive over
//! an RS-485 serial line. It covers the two function codes the drive needs
//! and does them carefully: every transaction flushes stale input, frames
//! the reply by line silence, checks CRC and addressing, and turns device
//! exceptions into typed errors.
//!
//! ## Features
//!
//! - **Mutually exclusive transactions**: one request/response cycle at a
//!   time per line, shared safely between tasks
//! - **Silence-based framing**: reply ends after a quiet interval, no
//!   length prediction needed
//! - **Bounded waiting**: the response timeout is never overshot by a poll
//! - **Typed errors**: timeouts, frame errors and device exceptions are
//!   distinct variants
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Client |
//! |------|----------|--------|
//! | 0x03 | Read Holding Registers | ✅ |
//! | 0x06 | Write Single Register | ✅ |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "rtu")]
//! # async fn example() -> vfd_rtu::ModbusResult<()> {
//! use vfd_rtu::{RtuClient, SerialSettings};
//! use vfd_rtu::vfd::{ControlCommand, VfdDrive};
//!
//! let settings = SerialSettings::new("/dev/ttyUSB0").with_baud_rate(9600);
//! let drive = VfdDrive::new(RtuClient::open(&settings, 1)?);
//!
//! let status = drive.read_status().await?;
//! println!("Running at {:.2} Hz", status.frequency_hz());
//!
//! drive.send_command(ControlCommand::Stop).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Without the `rtu` feature the crate has no serial dependency; bring your
//! own [`SerialLine`] implementation.

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus RTU constants: frame sizes, function codes, timing defaults
pub mod constants;

/// CRC-16/MODBUS
pub mod crc;

/// Modbus protocol definitions
pub mod protocol;

/// RTU frame encoding and decoding
pub mod frame;

/// Serial line abstraction
pub mod transport;

/// Request/response transaction engine
pub mod transaction;

/// Modbus client implementation
pub mod client;

/// Packet logging helpers
pub mod logging;

// ============================================================================
// Device profile
// ============================================================================

/// Variable frequency drive registers and commands
pub mod vfd;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use vfd_rtu::tokio) ===
pub use tokio;

// === Core client API ===
pub use client::{ModbusClient, RtuClient};

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Core types ===
pub use protocol::{
    ExceptionCode, ModbusFunction, ModbusRequest, ModbusResponse, RegisterWrite, SlaveId,
};

// === Transaction engine ===
pub use transaction::{Phase, TransactionConfig, Transactor};

// === Transport ===
pub use transport::{SerialLine, TransportStats};

#[cfg(feature = "rtu")]
pub use transport::{SerialPortLine, SerialSettings};

// === Frame helpers ===
pub use crc::crc16;

// === Protocol limits ===
pub use constants::{DEFAULT_TIMEOUT_MS, MAX_READ_REGISTERS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("VFD RTU v{} - Modbus RTU master core", VERSION)
}
