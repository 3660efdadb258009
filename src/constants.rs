//! Modbus RTU protocol constants
//!
//! Frame sizes and register limits are derived from the Modbus application
//! protocol specification; timing defaults follow the usual inter-frame
//! silence conventions for RS-485 drives.

use std::time::Duration;

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Maximum RTU ADU size on RS-485
/// Slave Address(1) + PDU(253) + CRC(2) = 256 bytes
pub const MAX_RTU_FRAME_SIZE: usize = 256;

/// Receive accumulation buffer size
///
/// Twice the largest legal ADU, so a frame followed by line noise still fits
/// and can be rejected by CRC instead of being truncated.
pub const RTU_RX_BUFFER_SIZE: usize = 512;

/// Length of every request this crate sends
/// Slave(1) + FC(1) + Address(2) + Quantity/Value(2) + CRC(2) = 8 bytes
pub const RTU_REQUEST_LEN: usize = 8;

/// Fewest bytes a decoder can inspect: slave, function, one payload byte
pub const MIN_PARSEABLE_LEN: usize = 3;

/// Fewest bytes before the silence timer may close a frame
///
/// The shortest valid reply (an exception) is 5 bytes.
pub const MIN_FRAME_LEN: usize = 5;

/// Length of the CRC trailer
pub const CRC_LEN: usize = 2;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03 (Read Holding Registers)
///
/// Calculation for response PDU:
/// - Function Code: 1 byte
/// - Byte Count: 1 byte
/// - Register Data: N × 2 bytes
/// - Total: 1 + 1 + (N × 2) ≤ 253
/// - Therefore: N ≤ (253 - 2) / 2 = 125.5 → 125 registers
pub const MAX_READ_REGISTERS: u16 = 125;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Bit set in the function byte of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Transaction Timing Defaults
// ============================================================================

/// Overall response timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Inter-frame silence that closes a response
pub const DEFAULT_QUIET_INTERVAL_MS: u64 = 30;

/// Sleep between empty polls of the line
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Settling delay before flushing stale input
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 5;

/// [`DEFAULT_TIMEOUT_MS`] as a `Duration`
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_TIMEOUT_MS);
