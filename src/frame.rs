//! RTU frame codec
//!
//! Wire layout: `[slave, function, payload..., crc_lo, crc_hi]`.
//!
//! | Frame | Bytes |
//! |-------|-------|
//! | FC03 request | `addr 03 startHi startLo cntHi cntLo crcLo crcHi` |
//! | FC03 response | `addr 03 byteCount data[byteCount] crcLo crcHi` |
//! | FC06 request/response | `addr 06 regHi regLo valHi valLo crcLo crcHi` |
//! | Exception | `addr (fc\|80) code crcLo crcHi` |

use tracing::debug;

use crate::constants::{
    EXCEPTION_FLAG, FC_READ_HOLDING_REGISTERS, FC_WRITE_SINGLE_REGISTER, MIN_PARSEABLE_LEN,
    RTU_REQUEST_LEN,
};
use crate::crc::{append_crc, verify_crc};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{
    validate_read_count, ModbusFunction, ModbusRequest, ModbusResponse, RegisterWrite, SlaveId,
};

// ============================================================================
// Encoding
// ============================================================================

/// Encode an FC03 request
///
/// ```rust
/// use vfd_rtu::frame::encode_read_holding_registers;
///
/// let frame = encode_read_holding_registers(1, 0x3002, 4).unwrap();
/// assert_eq!(frame, [0x01, 0x03, 0x30, 0x02, 0x00, 0x04, 0xEA, 0xC9]);
/// ```
pub fn encode_read_holding_registers(
    slave: SlaveId,
    start: u16,
    count: u16,
) -> ModbusResult<Vec<u8>> {
    validate_read_count(count)?;
    Ok(encode_fixed(slave, FC_READ_HOLDING_REGISTERS, start, count))
}

/// Encode an FC06 request
pub fn encode_write_single_register(slave: SlaveId, address: u16, value: u16) -> Vec<u8> {
    encode_fixed(slave, FC_WRITE_SINGLE_REGISTER, address, value)
}

/// Encode any supported request
pub fn encode(slave: SlaveId, request: &ModbusRequest) -> ModbusResult<Vec<u8>> {
    match *request {
        ModbusRequest::ReadHoldingRegisters { start, count } => {
            encode_read_holding_registers(slave, start, count)
        }
        ModbusRequest::WriteSingleRegister { address, value } => {
            Ok(encode_write_single_register(slave, address, value))
        }
    }
}

/// Both supported requests share the `fc, u16, u16` layout
fn encode_fixed(slave: SlaveId, function: u8, first: u16, second: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(RTU_REQUEST_LEN);
    frame.push(slave);
    frame.push(function);
    frame.extend_from_slice(&first.to_be_bytes());
    frame.extend_from_slice(&second.to_be_bytes());
    append_crc(&mut frame);
    frame
}

// ============================================================================
// Decoding
// ============================================================================

/// Validate a raw response to `request` and decode it
///
/// Checks run in wire order: length, CRC, slave address, exception flag,
/// function code, then the function-specific payload.
pub fn decode(
    frame: &[u8],
    slave: SlaveId,
    request: &ModbusRequest,
) -> ModbusResult<ModbusResponse> {
    match *request {
        ModbusRequest::ReadHoldingRegisters { count, .. } => {
            decode_read_holding_registers(frame, slave, count).map(ModbusResponse::Registers)
        }
        ModbusRequest::WriteSingleRegister { .. } => {
            decode_write_single_register(frame, slave).map(|echo| ModbusResponse::Written { echo })
        }
    }
}

/// Decode an FC03 response carrying `count` registers
pub fn decode_read_holding_registers(
    frame: &[u8],
    slave: SlaveId,
    count: u16,
) -> ModbusResult<Vec<u16>> {
    let payload = check_header(frame, slave, ModbusFunction::ReadHoldingRegisters)?;

    let (&byte_count, data) = payload
        .split_first()
        .ok_or(ModbusError::ShortResponse { len: frame.len() })?;

    let expected = usize::from(count) * 2;
    if usize::from(byte_count) != expected {
        return Err(ModbusError::ByteCountMismatch {
            expected,
            actual: usize::from(byte_count),
        });
    }
    if data.len() != expected {
        return Err(ModbusError::ByteCountMismatch {
            expected,
            actual: data.len(),
        });
    }

    let registers: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    debug!(
        "FC03 response decoded: slave={}, registers={}",
        slave,
        registers.len()
    );
    Ok(registers)
}

/// Decode an FC06 response
///
/// Only the function code is enforced. The address/value echo is returned
/// when the reply carries all four bytes of it.
pub fn decode_write_single_register(
    frame: &[u8],
    slave: SlaveId,
) -> ModbusResult<Option<RegisterWrite>> {
    let payload = check_header(frame, slave, ModbusFunction::WriteSingleRegister)?;

    let echo = match payload {
        [a_hi, a_lo, v_hi, v_lo, ..] => Some(RegisterWrite {
            address: u16::from_be_bytes([*a_hi, *a_lo]),
            value: u16::from_be_bytes([*v_hi, *v_lo]),
        }),
        _ => None,
    };

    debug!("FC06 response decoded: slave={}, echo={:?}", slave, echo);
    Ok(echo)
}

/// Run the checks shared by every response and return the payload after the
/// function byte
fn check_header(frame: &[u8], slave: SlaveId, function: ModbusFunction) -> ModbusResult<&[u8]> {
    if frame.len() < MIN_PARSEABLE_LEN {
        return Err(ModbusError::ShortResponse { len: frame.len() });
    }

    let body = verify_crc(frame)?;

    let (actual_slave, actual_fc, payload) = match body {
        [s, fc, rest @ ..] => (*s, *fc, rest),
        _ => return Err(ModbusError::ShortResponse { len: frame.len() }),
    };

    if actual_slave != slave {
        return Err(ModbusError::UnexpectedSlave {
            expected: slave,
            actual: actual_slave,
        });
    }

    if actual_fc & EXCEPTION_FLAG != 0 {
        let code = payload
            .first()
            .copied()
            .ok_or(ModbusError::ShortResponse { len: frame.len() })?;
        debug!(
            "Exception response: FC={:02X}, exception_code={:02X}",
            actual_fc, code
        );
        return Err(ModbusError::device_exception(actual_fc & !EXCEPTION_FLAG, code));
    }

    if actual_fc != function.to_u8() {
        return Err(ModbusError::UnexpectedFunction {
            expected: function.to_u8(),
            actual: actual_fc,
        });
    }

    Ok(payload)
}
