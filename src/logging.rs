//! Packet logging helpers
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application.

use tracing::info;

use crate::protocol::SlaveId;

/// Direction of a logged frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Send,
    Receive,
}

impl PacketDirection {
    fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Receive => "receive",
        }
    }
}

/// Format raw bytes as space-separated upper-case hex
pub fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log a frame at `info` level, e.g. `[MODBUS-RTU] send slave:1 01 03 30 02 00 04 EA C9`
pub fn log_packet(direction: PacketDirection, data: &[u8], slave: SlaveId) {
    info!(
        "[MODBUS-RTU] {} slave:{} {}",
        direction.as_str(),
        slave,
        format_hex_packet(data)
    );
}
