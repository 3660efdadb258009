//! Modbus CRC-16
//!
//! Initial value `0xFFFF`, reflected polynomial `0xA001`, no final XOR.
//! The checksum is transmitted low byte first. Outgoing frames and incoming
//! frames go through the same [`crc16`] so the two sides cannot drift apart.

use crc::{Crc, CRC_16_MODBUS};

use crate::constants::CRC_LEN;
use crate::error::{ModbusError, ModbusResult};

const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the Modbus CRC-16 of `data`
///
/// ```rust
/// use vfd_rtu::crc::crc16;
///
/// assert_eq!(crc16(&[]), 0xFFFF);
/// assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
/// ```
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    CRC_MODBUS.checksum(data)
}

/// Append the CRC of everything already in `frame`, low byte first
#[inline]
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Check the trailing CRC of a complete frame and return the body without it
///
/// Frames shorter than the trailer are reported as [`ModbusError::ShortResponse`].
pub fn verify_crc(frame: &[u8]) -> ModbusResult<&[u8]> {
    if frame.len() < CRC_LEN {
        return Err(ModbusError::ShortResponse { len: frame.len() });
    }

    let (body, trailer) = frame.split_at(frame.len() - CRC_LEN);
    let received = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = crc16(body);

    if computed != received {
        return Err(ModbusError::CrcMismatch { computed, received });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Bit-by-bit reference: XOR the byte in, then shift eight times
    fn crc16_bitwise(data: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for &byte in data {
            crc ^= u16::from(byte);
            for _ in 0..8 {
                if crc & 0x0001 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
        }
        crc
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(crc16(&[]), 0xFFFF);
        assert_eq!(crc16_bitwise(&[]), 0xFFFF);
    }

    #[test]
    fn test_known_vectors() {
        // Read 1 holding register at 0 from slave 1: 01 03 00 00 00 01 84 0A
        assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
        // Catalogue check value over "123456789"
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_append_then_verify() {
        let mut frame = vec![0x01, 0x06, 0x20, 0x00, 0x00, 0x01];
        append_crc(&mut frame);
        assert_eq!(frame.len(), 8);
        assert_eq!(verify_crc(&frame).unwrap(), &frame[..6]);
    }

    #[test]
    fn test_verify_rejects_corruption() {
        let mut frame = vec![0x01, 0x03, 0x02, 0x12, 0x34];
        append_crc(&mut frame);
        frame[3] ^= 0x01;

        match verify_crc(&frame) {
            Err(ModbusError::CrcMismatch { computed, received }) => {
                assert_ne!(computed, received);
                assert_eq!(received, u16::from_le_bytes([frame[5], frame[6]]));
            }
            other => panic!("expected CrcMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_too_short() {
        assert_eq!(
            verify_crc(&[0x01]),
            Err(ModbusError::ShortResponse { len: 1 })
        );
    }

    proptest! {
        #[test]
        fn prop_matches_bitwise_reference(data in proptest::collection::vec(any::<u8>(), 0..300)) {
            prop_assert_eq!(crc16(&data), crc16_bitwise(&data));
        }

        #[test]
        fn prop_deterministic(data in proptest::collection::vec(any::<u8>(), 0..300)) {
            prop_assert_eq!(crc16(&data), crc16(&data));
        }
    }
}
