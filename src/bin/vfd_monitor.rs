//! VFD Monitor
//!
//! Headless drive monitor over Modbus RTU. Polls the drive status block,
//! keeps a fault log, and sends control commands on demand.
//!
//! Usage: cargo run --features monitor --bin vfd-monitor -- [OPTIONS] <COMMAND>
//! Example: cargo run --features monitor --bin vfd-monitor -- --port /dev/ttyUSB0 poll

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vfd_rtu::logging::format_hex_packet;
use vfd_rtu::vfd::{ControlCommand, VfdDrive};
use vfd_rtu::{ModbusError, RtuClient, SerialPortLine, SerialSettings};

/// Fault log entries kept in memory
const FAULT_LOG_CAPACITY: usize = 100;

#[derive(Debug, Parser)]
#[clap(author, version, about = "Modbus RTU monitor for variable frequency drives")]
struct Args {
    /// Serial port path
    #[clap(short, long, default_value = "/dev/ttyUSB0", env = "VFD_PORT")]
    port: String,

    #[clap(short, long, default_value_t = 9600)]
    baud: u32,

    /// Data bits (5-8)
    #[clap(long, default_value_t = 8)]
    data_bits: u8,

    /// Parity: N, E or O
    #[clap(long, default_value = "E")]
    parity: String,

    /// Stop bits (1 or 2)
    #[clap(long, default_value_t = 1)]
    stop_bits: u8,

    /// Slave address of the drive
    #[clap(short, long, default_value_t = 1)]
    slave: u8,

    /// Response timeout in milliseconds
    #[clap(short, long, default_value_t = vfd_rtu::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[clap(short = 'l', long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Log every frame sent and received
    #[clap(long)]
    packets: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll the status block until interrupted
    ///
    /// Lines typed on stdin are sent as control commands while polling
    /// (`stop`, `forward`, `freq 5000`, ...).
    Poll {
        /// Poll period in milliseconds
        #[clap(short, long, default_value_t = 500)]
        interval_ms: u64,

        /// Stop after this many polls
        #[clap(short, long)]
        count: Option<u64>,
    },
    /// Send one control command (forward, reverse, stop, estop, reset)
    Command { name: String },
    /// Write the frequency setpoint in 0.01 Hz
    SetFreq { raw: u16 },
    /// Dump raw holding registers
    Read {
        /// Start address, decimal or 0x-prefixed hex
        #[clap(value_parser = parse_address)]
        start: u16,
        #[clap(default_value_t = 1)]
        count: u16,
    },
}

fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

/// One recorded fault
#[derive(Debug, Clone)]
struct FaultEntry {
    at: DateTime<Local>,
    message: String,
}

/// Bounded fault log that drops immediate repeats
#[derive(Debug, Default)]
struct FaultLog {
    entries: VecDeque<FaultEntry>,
    last: Option<String>,
}

impl FaultLog {
    /// Record `message`, returning false when it repeats the previous entry
    fn record(&mut self, message: String) -> bool {
        if self.last.as_ref() == Some(&message) {
            return false;
        }
        self.last = Some(message.clone());
        if self.entries.len() == FAULT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(FaultEntry {
            at: Local::now(),
            message,
        });
        true
    }

    /// Forget the last message so the next fault is always logged
    fn clear_last(&mut self) {
        self.last = None;
    }

    fn dump(&self) {
        for entry in &self.entries {
            info!(
                "fault {} {}",
                entry.at.format("%Y-%m-%d %H:%M:%S%.3f"),
                entry.message
            );
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn serial_settings(args: &Args) -> Result<SerialSettings, ModbusError> {
    let settings = SerialSettings::new(args.port.as_str())
        .with_baud_rate(args.baud)
        .with_data_bits(args.data_bits)
        .with_parity(SerialSettings::parse_parity(&args.parity)?)
        .with_stop_bits(args.stop_bits);
    settings.validate()?;
    Ok(settings)
}

/// Parse one stdin line into a drive action
async fn run_line(drive: &VfdDrive<RtuClient<SerialPortLine>>, line: &str) {
    let mut words = line.split_whitespace();
    let result = match (words.next(), words.next()) {
        (None, _) => return,
        (Some("freq"), Some(raw)) => match raw.parse::<u16>() {
            Ok(raw) => drive.set_frequency_raw(raw).await,
            Err(e) => Err(ModbusError::invalid_argument(format!(
                "invalid frequency '{}': {}",
                raw, e
            ))),
        },
        (Some(name), _) => match name.parse::<ControlCommand>() {
            Ok(command) => drive.send_command(command).await,
            Err(e) => Err(e),
        },
    };
    match result {
        Ok(()) => info!("'{}' acknowledged", line.trim()),
        Err(e) => warn!("'{}' failed: {}", line.trim(), e),
    }
}

async fn poll(
    client: RtuClient<SerialPortLine>,
    interval_ms: u64,
    count: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let drive = VfdDrive::new(client.clone());
    let commands = VfdDrive::new(client.clone());

    // Commands share the poller's line; the client serializes them
    let stdin_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            run_line(&commands, &line).await;
        }
    });

    let mut ticker = interval(Duration::from_millis(interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut faults = FaultLog::default();
    let mut polls = 0u64;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Polling slave {} every {} ms (Ctrl-C to stop)",
        drive.client().slave_id(),
        interval_ms
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => break,
        }

        match drive.read_status().await {
            Ok(status) => {
                faults.clear_last();
                info!("{}", status);
            }
            Err(e) => {
                if faults.record(e.to_string()) {
                    error!("Poll failed: {}", e);
                }
            }
        }

        polls += 1;
        if count.is_some_and(|limit| polls >= limit) {
            break;
        }
    }

    stdin_task.abort();
    let stats = client.stats().await;
    info!(
        "Stopped after {} polls: {} sent, {} ok, {} errors ({} timeouts)",
        polls, stats.requests_sent, stats.responses_received, stats.errors, stats.timeouts
    );
    faults.dump();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let settings = serial_settings(&args)?;
    let client = RtuClient::open(&settings, args.slave)?;
    client.set_timeout(Duration::from_millis(args.timeout_ms))?;
    client.set_packet_logging(args.packets);

    info!(
        "{} on {} at {} baud, slave {}",
        vfd_rtu::info(),
        settings.port,
        settings.baud_rate,
        args.slave
    );

    match args.command {
        Command::Poll { interval_ms, count } => poll(client, interval_ms, count).await?,
        Command::Command { name } => {
            let command: ControlCommand = name.parse()?;
            VfdDrive::new(client).send_command(command).await?;
            info!("Sent {}", command);
        }
        Command::SetFreq { raw } => {
            VfdDrive::new(client).set_frequency_raw(raw).await?;
            info!("Frequency setpoint {} ({:.2} Hz)", raw, f64::from(raw) / vfd_rtu::vfd::FREQUENCY_SCALE);
        }
        Command::Read { start, count } => {
            let registers = client.read_holding_registers(start, count).await?;
            for (offset, value) in registers.iter().enumerate() {
                println!(
                    "0x{:04X}: {:5} (0x{:04X})",
                    usize::from(start) + offset,
                    value,
                    value
                );
            }
            let bytes: Vec<u8> = registers.iter().flat_map(|r| r.to_be_bytes()).collect();
            info!("Raw: {}", format_hex_packet(&bytes));
        }
    }

    Ok(())
}
