//! Application-facing Modbus RTU client
//!
//! An [`RtuClient`] is bound to one serial line and one slave address for
//! its whole lifetime. Clones share the same line and lock, so a poller task
//! and an interactive command can use the client at the same time; their
//! transactions are serialized on the wire.
//!
//! # API Naming Convention
//!
//! | Function Code | Primary Name | Semantic Name |
//! |---------------|--------------|---------------|
//! | 0x03 | `read_03()` | `read_holding_registers()` |
//! | 0x06 | `write_06()` | `write_single_register()` |
//!
//! The function-code names live on the [`ModbusClient`] trait, the semantic
//! names are inherent methods of [`RtuClient`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "rtu")]
//! # async fn example() -> vfd_rtu::ModbusResult<()> {
//! use std::time::Duration;
//! use vfd_rtu::{RtuClient, SerialSettings};
//!
//! let client = RtuClient::open(&SerialSettings::new("/dev/ttyUSB0"), 1)?;
//! client.set_timeout(Duration::from_millis(800))?;
//!
//! let registers = client.read_holding_registers(0x3001, 5).await?;
//! println!("Registers: {:?}", registers);
//!
//! client.write_single_register(0x2000, 0x0001).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ModbusResult;
use crate::protocol::{validate_read_count, ModbusRequest, ModbusResponse, SlaveId};
use crate::transaction::{TransactionConfig, Transactor};
use crate::transport::{SerialLine, TransportStats};

#[cfg(feature = "rtu")]
use crate::transport::{SerialPortLine, SerialSettings};

/// Register operations against one fixed slave
///
/// Implemented by [`RtuClient`]; device profiles are written against this
/// trait so they can be exercised without a line.
pub trait ModbusClient: Send + Sync {
    /// Slave address every request goes to
    fn slave_id(&self) -> SlaveId;

    /// Read holding registers (function code 0x03).
    ///
    /// # Arguments
    ///
    /// * `address` - Starting register address (0-65535)
    /// * `quantity` - Number of registers to read (1-125)
    ///
    /// # Returns
    ///
    /// Raw 16-bit register values in address order.
    fn read_03(
        &self,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Write single register (function code 0x06).
    ///
    /// # Arguments
    ///
    /// * `address` - Register address (0-65535)
    /// * `value` - 16-bit value to write
    fn write_06(&self, address: u16, value: u16) -> impl Future<Output = ModbusResult<()>> + Send;
}

/// Modbus RTU client for one slave on one serial line
pub struct RtuClient<L: SerialLine> {
    transactor: Arc<Transactor<L>>,
    slave_id: SlaveId,
}

impl<L: SerialLine> Clone for RtuClient<L> {
    fn clone(&self) -> Self {
        Self {
            transactor: Arc::clone(&self.transactor),
            slave_id: self.slave_id,
        }
    }
}

impl<L: SerialLine> RtuClient<L> {
    /// Create a client with default timing
    pub fn new(line: L, slave_id: SlaveId) -> Self {
        Self {
            transactor: Arc::new(Transactor::new(line)),
            slave_id,
        }
    }

    /// Create a client with custom timing
    pub fn with_config(line: L, slave_id: SlaveId, config: TransactionConfig) -> ModbusResult<Self> {
        Ok(Self {
            transactor: Arc::new(Transactor::with_config(line, config)?),
            slave_id,
        })
    }

    /// Slave address this client talks to
    pub fn slave_id(&self) -> SlaveId {
        self.slave_id
    }

    /// Current response timeout
    pub fn timeout(&self) -> Duration {
        self.transactor.timeout()
    }

    /// Change the response timeout for this client and all its clones
    pub fn set_timeout(&self, timeout: Duration) -> ModbusResult<()> {
        self.transactor.set_timeout(timeout)
    }

    /// Enable or disable packet logging
    pub fn set_packet_logging(&self, enabled: bool) {
        self.transactor.set_packet_logging(enabled);
    }

    /// Line statistics shared by all clones
    pub async fn stats(&self) -> TransportStats {
        self.transactor.stats().await
    }

    /// Execute a raw request
    pub async fn execute(&self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        self.transactor.execute(self.slave_id, request).await
    }

    /// Read `count` holding registers starting at `start`
    pub async fn read_holding_registers(&self, start: u16, count: u16) -> ModbusResult<Vec<u16>> {
        validate_read_count(count)?;
        let request = ModbusRequest::ReadHoldingRegisters { start, count };
        self.execute(&request).await?.into_registers()
    }

    /// Write `value` into the holding register at `address`
    pub async fn write_single_register(&self, address: u16, value: u16) -> ModbusResult<()> {
        let request = ModbusRequest::write_single_register(address, value);
        self.execute(&request).await?;
        Ok(())
    }
}

#[cfg(feature = "rtu")]
impl RtuClient<SerialPortLine> {
    /// Open a serial port and bind a client to `slave_id`
    pub fn open(settings: &SerialSettings, slave_id: SlaveId) -> ModbusResult<Self> {
        Ok(Self::new(SerialPortLine::open(settings)?, slave_id))
    }
}

impl<L: SerialLine> ModbusClient for RtuClient<L> {
    fn slave_id(&self) -> SlaveId {
        self.slave_id
    }

    async fn read_03(&self, address: u16, quantity: u16) -> ModbusResult<Vec<u16>> {
        self.read_holding_registers(address, quantity).await
    }

    async fn write_06(&self, address: u16, value: u16) -> ModbusResult<()> {
        self.write_single_register(address, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModbusError;
    use std::io;

    /// Line where nothing ever arrives
    struct SilentLine;

    impl SerialLine for SilentLine {
        fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn bytes_available(&mut self) -> io::Result<usize> {
            Ok(0)
        }

        fn read_bytes(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn test_clones_share_timeout() {
        let client = RtuClient::new(SilentLine, 7);
        let clone = client.clone();
        client.set_timeout(Duration::from_millis(750)).unwrap();

        assert_eq!(clone.timeout(), Duration::from_millis(750));
        assert_eq!(clone.slave_id(), 7);
        assert_eq!(ModbusClient::slave_id(&clone), 7);
    }

    #[test]
    fn test_with_config_validates() {
        let config = TransactionConfig::new().with_poll_interval(Duration::ZERO);
        assert!(matches!(
            RtuClient::with_config(SilentLine, 1, config),
            Err(ModbusError::Configuration { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_rejected_before_io() {
        let client = RtuClient::new(SilentLine, 1);
        for count in [0u16, 126] {
            assert!(matches!(
                client.read_holding_registers(0, count).await,
                Err(ModbusError::InvalidArgument { .. })
            ));
        }
        assert_eq!(client.stats().await.requests_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_device_times_out() {
        let client = RtuClient::new(SilentLine, 1);
        client.set_timeout(Duration::from_millis(100)).unwrap();

        let err = client.write_06(0x2000, 1).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(client.stats().await.timeouts, 1);
    }
}
