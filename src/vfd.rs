//! Variable frequency drive profile (FC01 series)
//!
//! ## Register Map
//!
//! | Address | Access | Description |
//! |---------|--------|-------------|
//! | 0x2000  | W | Control word ([`ControlCommand`]) |
//! | 0x2001  | W | Frequency setpoint (0.01 Hz) |
//! | 0x3001  | R | Running frequency (0.01 Hz) |
//! | 0x3002  | R | DC bus voltage |
//! | 0x3003  | R | Output voltage |
//! | 0x3004  | R | Output current |
//! | 0x3005  | R | Motor speed |
//!
//! Only the frequency registers have a documented scale. Voltage, current
//! and speed are handed back exactly as the drive reports them.

use std::fmt;
use std::str::FromStr;

use crate::client::ModbusClient;
use crate::error::{ModbusError, ModbusResult};

/// Control word register
pub const REG_CONTROL: u16 = 0x2000;
/// Frequency setpoint register
pub const REG_SET_FREQUENCY: u16 = 0x2001;
/// Running frequency register, first of the status block
pub const REG_FREQUENCY: u16 = 0x3001;
pub const REG_BUS_VOLTAGE: u16 = 0x3002;
pub const REG_OUTPUT_VOLTAGE: u16 = 0x3003;
pub const REG_OUTPUT_CURRENT: u16 = 0x3004;
pub const REG_SPEED: u16 = 0x3005;

/// Registers in the status block starting at [`REG_FREQUENCY`]
pub const STATUS_REGISTER_COUNT: u16 = 5;

/// Frequency registers count in hundredths of a hertz
pub const FREQUENCY_SCALE: f64 = 100.0;

/// Commands accepted by the control word register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    Forward,
    Reverse,
    Stop,
    EmergencyStop,
    FaultReset,
}

impl ControlCommand {
    /// All commands, in control-word order
    pub const ALL: [ControlCommand; 5] = [
        Self::Forward,
        Self::Reverse,
        Self::Stop,
        Self::EmergencyStop,
        Self::FaultReset,
    ];

    /// Control word value
    pub fn code(self) -> u16 {
        match self {
            Self::Forward => 0x0001,
            Self::Reverse => 0x0002,
            Self::Stop => 0x0005,
            Self::EmergencyStop => 0x0006,
            Self::FaultReset => 0x0007,
        }
    }

    /// Short name used on the command line
    pub fn name(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
            Self::Stop => "stop",
            Self::EmergencyStop => "estop",
            Self::FaultReset => "reset",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), self.code())
    }
}

impl FromStr for ControlCommand {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "forward" | "fwd" => Ok(Self::Forward),
            "reverse" | "rev" => Ok(Self::Reverse),
            "stop" => Ok(Self::Stop),
            "estop" | "e-stop" | "emergency-stop" => Ok(Self::EmergencyStop),
            "reset" | "fault-reset" => Ok(Self::FaultReset),
            other => Err(ModbusError::invalid_argument(format!(
                "unknown control command '{}'",
                other
            ))),
        }
    }
}

/// One snapshot of the status block, raw register values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriveStatus {
    /// Running frequency in 0.01 Hz
    pub frequency_raw: u16,
    pub bus_voltage: u16,
    pub output_voltage: u16,
    pub output_current: u16,
    pub speed: u16,
}

impl DriveStatus {
    /// Build from the five status registers
    pub fn from_registers(registers: &[u16]) -> ModbusResult<Self> {
        match *registers {
            [frequency_raw, bus_voltage, output_voltage, output_current, speed] => Ok(Self {
                frequency_raw,
                bus_voltage,
                output_voltage,
                output_current,
                speed,
            }),
            _ => Err(ModbusError::ByteCountMismatch {
                expected: usize::from(STATUS_REGISTER_COUNT) * 2,
                actual: registers.len() * 2,
            }),
        }
    }

    /// Running frequency in hertz
    pub fn frequency_hz(&self) -> f64 {
        f64::from(self.frequency_raw) / FREQUENCY_SCALE
    }
}

impl fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "freq={:.2} Hz bus={} out_v={} out_i={} speed={}",
            self.frequency_hz(),
            self.bus_voltage,
            self.output_voltage,
            self.output_current,
            self.speed
        )
    }
}

/// Convert a setpoint in hertz to the register value
pub fn frequency_to_raw(hz: f64) -> ModbusResult<u16> {
    let raw = (hz * FREQUENCY_SCALE).round();
    if !raw.is_finite() || raw < 0.0 || raw > f64::from(u16::MAX) {
        return Err(ModbusError::invalid_argument(format!(
            "frequency {} Hz out of range",
            hz
        )));
    }
    Ok(raw as u16)
}

/// Drive operations on top of a register client
pub struct VfdDrive<C: ModbusClient> {
    client: C,
}

impl<C: ModbusClient> VfdDrive<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Underlying client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Read the whole status block in one transaction
    pub async fn read_status(&self) -> ModbusResult<DriveStatus> {
        let registers = self
            .client
            .read_03(REG_FREQUENCY, STATUS_REGISTER_COUNT)
            .await?;
        DriveStatus::from_registers(&registers)
    }

    /// Write a control word
    pub async fn send_command(&self, command: ControlCommand) -> ModbusResult<()> {
        self.client.write_06(REG_CONTROL, command.code()).await
    }

    /// Write the frequency setpoint in 0.01 Hz
    pub async fn set_frequency_raw(&self, raw: u16) -> ModbusResult<()> {
        self.client.write_06(REG_SET_FREQUENCY, raw).await
    }

    /// Write the frequency setpoint in hertz
    pub async fn set_frequency_hz(&self, hz: f64) -> ModbusResult<()> {
        self.set_frequency_raw(frequency_to_raw(hz)?).await
    }
}
