//! Modbus request, response and exception types
//!
//! Requests are validated when they are built, so a [`ModbusRequest`] that
//! exists is always encodable.

use std::fmt;

use crate::constants::{FC_READ_HOLDING_REGISTERS, FC_WRITE_SINGLE_REGISTER, MAX_READ_REGISTERS};
use crate::error::{ModbusError, ModbusResult};

/// Modbus slave (unit) address
pub type SlaveId = u8;

/// Function codes supported by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModbusFunction {
    /// FC03
    ReadHoldingRegisters,
    /// FC06
    WriteSingleRegister,
}

impl ModbusFunction {
    /// Wire value of the function code
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ReadHoldingRegisters => FC_READ_HOLDING_REGISTERS,
            Self::WriteSingleRegister => FC_WRITE_SINGLE_REGISTER,
        }
    }

    /// Parse a wire function code, ignoring the exception flag
    pub fn from_u8(code: u8) -> Option<Self> {
        match code & 0x7F {
            FC_READ_HOLDING_REGISTERS => Some(Self::ReadHoldingRegisters),
            FC_WRITE_SINGLE_REGISTER => Some(Self::WriteSingleRegister),
            _ => None,
        }
    }

    /// Human-readable name
    pub fn description(self) -> &'static str {
        match self {
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::WriteSingleRegister => "Write Single Register",
        }
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.to_u8())
    }
}

/// A single transaction request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModbusRequest {
    /// Read `count` holding registers starting at `start`
    ReadHoldingRegisters { start: u16, count: u16 },
    /// Write `value` into the holding register at `address`
    WriteSingleRegister { address: u16, value: u16 },
}

impl ModbusRequest {
    /// Build a read request, rejecting counts outside `1..=125`
    pub fn read_holding_registers(start: u16, count: u16) -> ModbusResult<Self> {
        validate_read_count(count)?;
        Ok(Self::ReadHoldingRegisters { start, count })
    }

    /// Build a write request
    pub fn write_single_register(address: u16, value: u16) -> Self {
        Self::WriteSingleRegister { address, value }
    }

    /// Function code this request is sent with
    pub fn function(&self) -> ModbusFunction {
        match self {
            Self::ReadHoldingRegisters { .. } => ModbusFunction::ReadHoldingRegisters,
            Self::WriteSingleRegister { .. } => ModbusFunction::WriteSingleRegister,
        }
    }

    /// Register address the request starts at
    pub fn address(&self) -> u16 {
        match *self {
            Self::ReadHoldingRegisters { start, .. } => start,
            Self::WriteSingleRegister { address, .. } => address,
        }
    }
}

/// Reject register counts the protocol cannot carry
pub(crate) fn validate_read_count(count: u16) -> ModbusResult<()> {
    if count == 0 || count > MAX_READ_REGISTERS {
        return Err(ModbusError::invalid_argument(format!(
            "register count {} out of range 1..={}",
            count, MAX_READ_REGISTERS
        )));
    }
    Ok(())
}

/// Address/value pair echoed back by a write response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub address: u16,
    pub value: u16,
}

/// Decoded, validated response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusResponse {
    /// Register values in request order
    Registers(Vec<u16>),
    /// Write acknowledged; `echo` is present when the reply carried it in full
    Written { echo: Option<RegisterWrite> },
}

impl ModbusResponse {
    /// Register values, if this is a read response
    pub fn registers(&self) -> Option<&[u16]> {
        match self {
            Self::Registers(values) => Some(values),
            Self::Written { .. } => None,
        }
    }

    /// Consume the response and take the register values
    pub fn into_registers(self) -> ModbusResult<Vec<u16>> {
        match self {
            Self::Registers(values) => Ok(values),
            Self::Written { .. } => Err(ModbusError::UnexpectedFunction {
                expected: FC_READ_HOLDING_REGISTERS,
                actual: FC_WRITE_SINGLE_REGISTER,
            }),
        }
    }
}

/// Exception codes documented for the drive, in code order
static EXCEPTION_TABLE: &[(u8, &str)] = &[
    (0x01, "Illegal command"),
    (0x02, "Illegal data address"),
    (0x03, "Illegal value (bad frame)"),
    (0x04, "Operation failed"),
    (0x05, "Password error"),
    (0x06, "Data frame error (CRC/format)"),
    (0x07, "Write not allowed"),
    (0x08, "Parameter cannot be changed during running"),
    (0x09, "Password protection active"),
];

/// Exception code from a device's exception response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    /// Code present in the device's documented table
    Known { code: u8, description: &'static str },
    /// Code the table does not describe
    Unknown(u8),
}

impl ExceptionCode {
    /// Look up the description for a raw code
    pub fn from_u8(code: u8) -> Self {
        EXCEPTION_TABLE
            .binary_search_by_key(&code, |&(c, _)| c)
            .map(|idx| Self::Known {
                code,
                description: EXCEPTION_TABLE[idx].1,
            })
            .unwrap_or(Self::Unknown(code))
    }

    /// Raw code as received
    pub fn code(&self) -> u8 {
        match *self {
            Self::Known { code, .. } => code,
            Self::Unknown(code) => code,
        }
    }

    /// Table description, `None` for unknown codes
    pub fn description(&self) -> Option<&'static str> {
        match *self {
            Self::Known { description, .. } => Some(description),
            Self::Unknown(_) => None,
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Known { code, description } => write!(f, "{} (0x{:02X})", description, code),
            Self::Unknown(code) => write!(f, "Unknown exception code 0x{:02X}", code),
        }
    }
}
