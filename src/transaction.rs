//! RTU transaction engine
//!
//! One call to [`Transactor::execute`] runs a full request/response cycle:
//!
//! ```text
//! Idle -> Flushing -> Sending -> Receiving -> Validating -> Done | Failed
//! ```
//!
//! The whole cycle runs while holding the line mutex, so a second caller
//! waits for the first to finish instead of interleaving bytes on the wire.
//! The guard is released on every exit path, early failures included.
//!
//! ## End of frame
//!
//! RTU has no length prefix or terminator. A response is considered
//! complete once at least [`MIN_FRAME_LEN`] bytes are buffered and the line
//! has been quiet for the configured interval. The [`SilenceTimer`] is reset
//! on every successful read.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::constants::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUIET_INTERVAL_MS, DEFAULT_SETTLE_DELAY_MS,
    DEFAULT_TIMEOUT_MS, MIN_FRAME_LEN, MIN_PARSEABLE_LEN, RTU_RX_BUFFER_SIZE,
};
use crate::error::{ModbusError, ModbusResult};
use crate::frame;
use crate::logging::{log_packet, PacketDirection};
use crate::protocol::{ModbusRequest, ModbusResponse, SlaveId};
use crate::transport::{SerialLine, TransportStats};

/// Timing configuration for the transaction engine
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use vfd_rtu::TransactionConfig;
///
/// let config = TransactionConfig::new()
///     .with_timeout(Duration::from_millis(800))
///     .with_quiet_interval(Duration::from_millis(40));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Overall bound on the receive phase
    pub timeout: Duration,
    /// Silence after the last read that closes a frame
    pub quiet_interval: Duration,
    /// Sleep between polls of an empty line
    pub poll_interval: Duration,
    /// Delay before stale input is flushed
    pub settle_delay: Duration,
    /// Log every sent and received frame at `info`
    pub packet_logging: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            quiet_interval: Duration::from_millis(DEFAULT_QUIET_INTERVAL_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            packet_logging: false,
        }
    }
}

impl TransactionConfig {
    /// Create a config with default timing
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overall response timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the inter-frame silence interval
    pub fn with_quiet_interval(mut self, quiet_interval: Duration) -> Self {
        self.quiet_interval = quiet_interval;
        self
    }

    /// Set the empty-line poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the pre-flush settling delay
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Enable or disable packet logging
    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    /// Reject timings the receive loop cannot work with
    pub fn validate(&self) -> ModbusResult<()> {
        if self.timeout.is_zero() {
            return Err(ModbusError::configuration("Timeout must be greater than zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(ModbusError::configuration(
                "Poll interval must be greater than zero",
            ));
        }
        check_quiet_interval(self.quiet_interval, self.timeout)?;
        if self.settle_delay > self.poll_interval {
            return Err(ModbusError::configuration(format!(
                "Settle delay {:?} must not exceed poll interval {:?}",
                self.settle_delay, self.poll_interval
            )));
        }
        Ok(())
    }
}

fn check_quiet_interval(quiet_interval: Duration, timeout: Duration) -> ModbusResult<()> {
    if quiet_interval >= timeout {
        return Err(ModbusError::configuration(format!(
            "Quiet interval {:?} must be shorter than timeout {:?}",
            quiet_interval, timeout
        )));
    }
    Ok(())
}

/// Step of a transaction cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Flushing,
    Sending,
    Receiving,
    Validating,
    Done,
    Failed,
}

impl Phase {
    /// `Done` or `Failed`
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Tracks the current phase of one transaction for diagnostics
struct Cycle {
    slave: SlaveId,
    function: u8,
    phase: Phase,
}

impl Cycle {
    fn new(slave: SlaveId, request: &ModbusRequest) -> Self {
        Self {
            slave,
            function: request.function().to_u8(),
            phase: Phase::Idle,
        }
    }

    fn advance(&mut self, next: Phase) {
        trace!(
            "RTU slave={} FC={:02X}: {:?} -> {:?}",
            self.slave,
            self.function,
            self.phase,
            next
        );
        self.phase = next;
    }
}

/// Inter-frame silence detector, restarted by every successful read
#[derive(Debug)]
pub struct SilenceTimer {
    quiet: Duration,
    last_activity: Instant,
}

impl SilenceTimer {
    /// Start the timer now
    pub fn start(quiet: Duration) -> Self {
        Self {
            quiet,
            last_activity: Instant::now(),
        }
    }

    /// Record line activity
    pub fn reset(&mut self) {
        self.last_activity = Instant::now();
    }

    /// The line has been quiet for at least the configured interval
    pub fn is_silent(&self) -> bool {
        self.last_activity.elapsed() >= self.quiet
    }
}

/// Line handle and counters, guarded together
struct LineState<L> {
    line: L,
    stats: TransportStats,
}

/// Owns a serial line and serializes transactions on it
///
/// Ownership of the line moves into the transactor, so no other engine can
/// drive the same line concurrently.
pub struct Transactor<L: SerialLine> {
    state: Mutex<LineState<L>>,
    config: TransactionConfig,
    timeout_ms: AtomicU64,
    packet_logging: AtomicBool,
}

impl<L: SerialLine> Transactor<L> {
    /// Wrap `line` with default timing
    pub fn new(line: L) -> Self {
        Self::build(line, TransactionConfig::default())
    }

    /// Wrap `line` with custom timing
    pub fn with_config(line: L, config: TransactionConfig) -> ModbusResult<Self> {
        config.validate()?;
        Ok(Self::build(line, config))
    }

    fn build(line: L, config: TransactionConfig) -> Self {
        Self {
            state: Mutex::new(LineState {
                line,
                stats: TransportStats::default(),
            }),
            timeout_ms: AtomicU64::new(duration_to_ms(config.timeout)),
            packet_logging: AtomicBool::new(config.packet_logging),
            config,
        }
    }

    /// Current response timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    /// Change the response timeout; applies to transactions started afterwards
    pub fn set_timeout(&self, timeout: Duration) -> ModbusResult<()> {
        let ms = duration_to_ms(timeout);
        if ms == 0 {
            return Err(ModbusError::invalid_argument(
                "timeout must be at least 1 ms",
            ));
        }
        check_quiet_interval(self.config.quiet_interval, Duration::from_millis(ms))?;
        self.timeout_ms.store(ms, Ordering::Relaxed);
        Ok(())
    }

    /// Enable or disable packet logging
    pub fn set_packet_logging(&self, enabled: bool) {
        self.packet_logging.store(enabled, Ordering::Relaxed);
    }

    /// Timing configuration this engine was built with
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Snapshot of the counters; waits for an in-flight transaction
    pub async fn stats(&self) -> TransportStats {
        self.state.lock().await.stats
    }

    /// Run one request/response cycle against `slave`
    ///
    /// Invalid requests fail before the line is touched. Every other failure
    /// is returned as-is; nothing is retried.
    pub async fn execute(
        &self,
        slave: SlaveId,
        request: &ModbusRequest,
    ) -> ModbusResult<ModbusResponse> {
        let frame = frame::encode(slave, request)?;

        let mut state = self.state.lock().await;
        let mut cycle = Cycle::new(slave, request);
        let result = self.transact(&mut state, &mut cycle, &frame, request).await;

        match &result {
            Ok(_) => {
                state.stats.responses_received += 1;
                cycle.advance(Phase::Done);
            }
            Err(err) => {
                state.stats.errors += 1;
                if err.is_timeout() {
                    state.stats.timeouts += 1;
                }
                debug!(
                    "RTU transaction to slave {} failed during {:?}: {}",
                    slave, cycle.phase, err
                );
                cycle.advance(Phase::Failed);
            }
        }

        result
    }

    async fn transact(
        &self,
        state: &mut LineState<L>,
        cycle: &mut Cycle,
        frame: &[u8],
        request: &ModbusRequest,
    ) -> ModbusResult<ModbusResponse> {
        let packet_logging = self.packet_logging.load(Ordering::Relaxed);
        // The settle delay counts against the response timeout
        let timeout = self.timeout();
        let deadline = Instant::now() + timeout;

        cycle.advance(Phase::Flushing);
        self.flush(&mut state.line).await?;

        cycle.advance(Phase::Sending);
        let written = state.line.write_bytes(frame)?;
        if written < frame.len() {
            return Err(ModbusError::TransportWriteIncomplete {
                written,
                expected: frame.len(),
            });
        }
        state.stats.requests_sent += 1;
        state.stats.bytes_sent += frame.len() as u64;
        if packet_logging {
            log_packet(PacketDirection::Send, frame, cycle.slave);
        }

        cycle.advance(Phase::Receiving);
        let response = self.receive(&mut state.line, timeout, deadline).await?;
        state.stats.bytes_received += response.len() as u64;
        if packet_logging {
            log_packet(PacketDirection::Receive, &response, cycle.slave);
        }

        cycle.advance(Phase::Validating);
        frame::decode(&response, cycle.slave, request)
    }

    /// Discard whatever is waiting on the line after a short settling delay
    async fn flush(&self, line: &mut L) -> ModbusResult<()> {
        if !self.config.settle_delay.is_zero() {
            sleep(self.config.settle_delay).await;
        }

        let mut pending = line.bytes_available()?;
        let mut scratch = [0u8; RTU_RX_BUFFER_SIZE];
        let mut discarded = 0usize;

        while pending > 0 {
            let len = pending.min(scratch.len());
            let n = line.read_bytes(&mut scratch[..len])?;
            if n == 0 {
                break;
            }
            discarded += n;
            pending = pending.saturating_sub(n);
        }

        if discarded > 0 {
            debug!("Flushed {} stale bytes before request", discarded);
        }
        Ok(())
    }

    /// Accumulate one response until inter-frame silence or timeout
    async fn receive(
        &self,
        line: &mut L,
        timeout: Duration,
        deadline: Instant,
    ) -> ModbusResult<BytesMut> {
        let mut buffer = BytesMut::with_capacity(RTU_RX_BUFFER_SIZE);
        let mut chunk = [0u8; RTU_RX_BUFFER_SIZE];
        let mut silence = SilenceTimer::start(self.config.quiet_interval);

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let available = line.bytes_available()?;
            let mut read = 0;
            if available > 0 {
                let room = RTU_RX_BUFFER_SIZE - buffer.len();
                read = line.read_bytes(&mut chunk[..available.min(room)])?;
                if read > 0 {
                    buffer.extend_from_slice(&chunk[..read]);
                    silence.reset();
                }
                if buffer.len() >= RTU_RX_BUFFER_SIZE {
                    debug!("Receive buffer full, closing frame");
                    break;
                }
            }

            if read == 0 {
                sleep(self.config.poll_interval.min(deadline - now)).await;
            }

            if buffer.len() >= MIN_FRAME_LEN && silence.is_silent() {
                break;
            }
        }

        if buffer.len() < MIN_PARSEABLE_LEN {
            return Err(ModbusError::NoResponse {
                timeout_ms: duration_to_ms(timeout),
                received: buffer.len(),
            });
        }

        trace!("Received {} byte frame", buffer.len());
        Ok(buffer)
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
