//! Simulated VFD slave for integration tests
//!
//! [`SimulatedVfd`] implements [`SerialLine`] directly: a request written to
//! it is answered by queuing reply bytes that become readable according to
//! the tokio clock, so tests run with paused time.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use vfd_rtu::crc::{append_crc, crc16};
use vfd_rtu::vfd::{
    REG_BUS_VOLTAGE, REG_CONTROL, REG_FREQUENCY, REG_OUTPUT_CURRENT, REG_OUTPUT_VOLTAGE,
    REG_SET_FREQUENCY, REG_SPEED,
};
use vfd_rtu::SerialLine;

/// How the next replies are damaged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    /// Receive the request, never answer
    Silent,
    /// Flip a bit in the CRC trailer
    CorruptCrc,
    /// Answer with another slave address
    WrongSlave(u8),
    /// Answer every request with this exception code
    Exception(u8),
    /// Send only the first `n` bytes of the reply
    Truncate(usize),
}

#[derive(Debug)]
struct SimState {
    slave: u8,
    registers: BTreeMap<u16, u16>,
    writable: BTreeSet<u16>,
    fault: Fault,
    response_delay: Duration,
    byte_gap: Duration,
    rx: VecDeque<(Instant, u8)>,
    requests: Vec<Vec<u8>>,
    overlaps: usize,
}

impl SimState {
    fn ready(&self) -> usize {
        let now = Instant::now();
        self.rx.iter().take_while(|(at, _)| *at <= now).count()
    }

    fn answer(&mut self, request: &[u8]) -> Option<Vec<u8>> {
        if request.len() != 8 || crc16(&request[..6]).to_le_bytes() != [request[6], request[7]] {
            return None;
        }
        if request[0] != self.slave {
            return None;
        }

        let function = request[1];
        let first = u16::from_be_bytes([request[2], request[3]]);
        let second = u16::from_be_bytes([request[4], request[5]]);

        let mut reply = vec![self.slave];
        let outcome = match self.fault {
            Fault::Exception(code) => Err(code),
            _ => match function {
                0x03 => self.read(first, second),
                0x06 => self.write(first, second).map(|()| request[2..6].to_vec()),
                _ => Err(0x01),
            },
        };
        match outcome {
            Ok(payload) => {
                reply.push(function);
                reply.extend_from_slice(&payload);
            }
            Err(code) => {
                reply.push(function | 0x80);
                reply.push(code);
            }
        }
        append_crc(&mut reply);

        match self.fault {
            Fault::Silent => return None,
            Fault::CorruptCrc => {
                let last = reply.len() - 1;
                reply[last] ^= 0x01;
            }
            Fault::WrongSlave(other) => {
                reply[0] = other;
                reply.truncate(reply.len() - 2);
                append_crc(&mut reply);
            }
            Fault::Truncate(n) => reply.truncate(n),
            Fault::None | Fault::Exception(_) => {}
        }
        Some(reply)
    }

    fn read(&self, start: u16, count: u16) -> Result<Vec<u8>, u8> {
        if count == 0 || count > 125 {
            return Err(0x03);
        }
        let mut payload = vec![(count * 2) as u8];
        for offset in 0..count {
            let address = start.checked_add(offset).ok_or(0x02u8)?;
            let value = self.registers.get(&address).ok_or(0x02u8)?;
            payload.extend_from_slice(&value.to_be_bytes());
        }
        Ok(payload)
    }

    fn write(&mut self, address: u16, value: u16) -> Result<(), u8> {
        if !self.registers.contains_key(&address) {
            return Err(0x02);
        }
        if !self.writable.contains(&address) {
            return Err(0x07);
        }
        self.registers.insert(address, value);

        if address == REG_CONTROL {
            let running = match value {
                0x0001 | 0x0002 => self.registers.get(&REG_SET_FREQUENCY).copied().unwrap_or(0),
                0x0005 | 0x0006 => 0,
                _ => return Ok(()),
            };
            self.registers.insert(REG_FREQUENCY, running);
        }
        Ok(())
    }
}

/// In-memory drive with the standard register map
///
/// Clones share state, so a test keeps one handle for inspection after
/// moving another into a client.
#[derive(Debug, Clone)]
pub struct SimulatedVfd {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedVfd {
    pub fn new(slave: u8) -> Self {
        let registers = BTreeMap::from([
            (REG_CONTROL, 0),
            (REG_SET_FREQUENCY, 0),
            (REG_FREQUENCY, 5000),
            (REG_BUS_VOLTAGE, 540),
            (REG_OUTPUT_VOLTAGE, 380),
            (REG_OUTPUT_CURRENT, 12),
            (REG_SPEED, 1450),
        ]);
        let writable = BTreeSet::from([REG_CONTROL, REG_SET_FREQUENCY]);

        Self {
            state: Arc::new(Mutex::new(SimState {
                slave,
                registers,
                writable,
                fault: Fault::None,
                response_delay: Duration::from_millis(2),
                byte_gap: Duration::ZERO,
                rx: VecDeque::new(),
                requests: Vec::new(),
                overlaps: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    pub fn set_fault(&self, fault: Fault) {
        self.lock().fault = fault;
    }

    /// Delay before the first reply byte
    pub fn set_response_delay(&self, delay: Duration) {
        self.lock().response_delay = delay;
    }

    /// Delay between consecutive reply bytes
    pub fn set_byte_gap(&self, gap: Duration) {
        self.lock().byte_gap = gap;
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.lock().registers.insert(address, value);
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        self.lock().registers.get(&address).copied()
    }

    /// Queue bytes that are readable right away, as line noise would be
    pub fn inject_noise(&self, bytes: &[u8]) {
        let now = Instant::now();
        self.lock().rx.extend(bytes.iter().map(|&b| (now, b)));
    }

    /// Every request frame written so far
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.lock().requests.clone()
    }

    /// Requests that arrived while a previous reply was still unread
    pub fn overlaps(&self) -> usize {
        self.lock().overlaps
    }

    pub fn pending(&self) -> usize {
        self.lock().rx.len()
    }
}

impl SerialLine for SimulatedVfd {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if !state.rx.is_empty() {
            state.overlaps += 1;
        }
        state.requests.push(buf.to_vec());

        if let Some(reply) = state.answer(buf) {
            let mut at = Instant::now() + state.response_delay;
            for byte in reply {
                state.rx.push_back((at, byte));
                at += state.byte_gap;
            }
        }
        Ok(buf.len())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.lock().ready())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        let n = state.ready().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            if let Some((_, byte)) = state.rx.pop_front() {
                *slot = byte;
            }
        }
        Ok(n)
    }
}
