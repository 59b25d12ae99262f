//! Built-in self test.
//!
//! Runs against a loop-back bitstream where every input endpoint is wired to
//! its output twin (see [`SimulatedPanel`](crate::transport::SimulatedPanel)
//! for the in-process equivalent). Each of the 32 endpoints per category is
//! exercised once with a fresh pattern.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info};

use crate::channel::WireValue;
use crate::config::BoardModel;
use crate::codec::encode_hex;
use crate::device::FpgaDevice;
use crate::endpoint::{
    BANK_SIZE, DEFAULT_RESET_TIME_MS, DEFAULT_TRIGGER_TIMEOUT_MS, PIPE_IN_START, PIPE_OUT_START,
    TRIGGER_IN_START, TRIGGER_OUT_START, WIRE_IN_START, WIRE_OUT_START,
};
use crate::error::{FpgaError, Result};
use crate::events::{FpgaEvent, FpgaObserver};
use crate::transport::PanelTransport;

#[derive(Debug, Clone)]
pub struct BistOptions {
    /// Seed for the test patterns.
    pub seed: u32,
    /// Bytes per pipe round trip.
    pub payload_len: usize,
    pub reset_address: u8,
    pub reset_time: Duration,
    pub trigger_timeout: Duration,
    /// Directory holding the boardtest bitstreams. When set, the board is
    /// programmed with its own test design before the stages run.
    pub bitstream_dir: Option<PathBuf>,
}

impl Default for BistOptions {
    fn default() -> Self {
        Self {
            seed: 0x1234_5678,
            payload_len: 16,
            reset_address: WIRE_IN_START,
            reset_time: Duration::from_millis(DEFAULT_RESET_TIME_MS),
            trigger_timeout: Duration::from_millis(DEFAULT_TRIGGER_TIMEOUT_MS),
            bitstream_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BistResult {
    pub name: &'static str,
    pub passed: usize,
    pub total: usize,
}

impl BistResult {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            passed: 0,
            total: BANK_SIZE,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.passed == self.total
    }
}

impl fmt::Display for BistResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.is_pass() { "Passed" } else { "Failed" };
        write!(f, "{} {}/{}", verdict, self.passed, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BistReport {
    pub wires: BistResult,
    pub pipes: BistResult,
    pub block_pipes: BistResult,
    pub triggers: BistResult,
}

impl BistReport {
    pub fn results(&self) -> [&BistResult; 4] {
        [&self.wires, &self.pipes, &self.block_pipes, &self.triggers]
    }

    pub fn passed(&self) -> bool {
        self.results().iter().all(|r| r.is_pass())
    }
}

/// Xorshift pattern source. Reproducible for a given seed.
struct Pattern(u32);

impl Pattern {
    fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    fn bytes(&mut self, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len + 4);
        while out.len() < len {
            out.extend_from_slice(&self.next_u32().to_le_bytes());
        }
        out.truncate(len);
        out
    }
}

fn progress<O: FpgaObserver>(observer: &O, stage: &str, current: usize) {
    observer.on_event(&FpgaEvent::SelfTest {
        stage: stage.to_string(),
        current,
        total: BANK_SIZE,
    });
}

/// Run every stage and count passing endpoints.
///
/// A mismatch or trigger timeout fails that endpoint only; any other error
/// aborts the run.
/// Boardtest bitstream for `model` inside `dir`.
pub fn boardtest_bitstream(dir: &Path, model: BoardModel) -> PathBuf {
    dir.join(model.boardtest_bitstream())
}

pub fn run<T, O>(device: &mut FpgaDevice<T, O>, options: &BistOptions) -> Result<BistReport>
where
    T: PanelTransport,
    O: FpgaObserver + 'static,
{
    if let Some(dir) = &options.bitstream_dir {
        let model = device.board().map(|b| b.model).ok_or_else(|| FpgaError::Configuration {
            reason: format!(
                "no boardtest bitstream for {}",
                device.device_info().product_name
            ),
        })?;
        let path = boardtest_bitstream(dir, model);
        info!(bitstream = %path.display(), "Programming boardtest design");
        device.configure(&path)?;
    }

    let mut pattern = Pattern::new(options.seed);
    let observer = std::sync::Arc::clone(device.observer());
    let mut report = BistReport {
        wires: BistResult::new("Wires"),
        pipes: BistResult::new("Pipes"),
        block_pipes: BistResult::new("BTPipes"),
        triggers: BistResult::new("Triggers"),
    };
    info!(product = %device.device_info().product_name, "Running self test");

    for i in 0..BANK_SIZE {
        let offset = i as u8;
        let data = pattern.next_u32();
        device.set_wire_in_with(WIRE_IN_START + offset, WireValue::new(data), Some(true))?;
        let read = device.wire_out_with(WIRE_OUT_START + offset, Some(true))?;
        if read == data {
            report.wires.passed += 1;
        } else {
            error!(wire = i, expected = %format!("0x{:08X}", data), got = %format!("0x{:08X}", read), "Wire mismatch");
        }
        progress(observer.as_ref(), report.wires.name, i + 1);
    }

    device.reset(options.reset_address, options.reset_time, true)?;

    for i in 0..BANK_SIZE {
        let offset = i as u8;
        let data = encode_hex(&pattern.bytes(options.payload_len));
        device.write_to_pipe_in(PIPE_IN_START + offset, &data, true)?;
        let read = device.read_from_pipe_out(PIPE_OUT_START + offset, options.payload_len, true)?;
        if read == data.as_str() {
            report.pipes.passed += 1;
        } else {
            error!(pipe = i, expected = %data, got = %read, "Pipe mismatch");
        }
        progress(observer.as_ref(), report.pipes.name, i + 1);
    }

    for i in 0..BANK_SIZE {
        let offset = i as u8;
        let len = options.payload_len;
        let data = encode_hex(&pattern.bytes(len));
        device.write_to_block_pipe_in(PIPE_IN_START + offset, &data, Some(len), true)?;
        let read = device.read_from_block_pipe_out(PIPE_OUT_START + offset, len, Some(len), true)?;
        if read == data.as_str() {
            report.block_pipes.passed += 1;
        } else {
            error!(pipe = i, expected = %data, got = %read, "Block pipe mismatch");
        }
        progress(observer.as_ref(), report.block_pipes.name, i + 1);
    }

    for i in 0..BANK_SIZE {
        let offset = i as u8;
        device.activate_trigger_in(TRIGGER_IN_START + offset, 0)?;
        match device.check_triggered(TRIGGER_OUT_START + offset, 0x1, options.trigger_timeout) {
            Ok(_) => report.triggers.passed += 1,
            Err(FpgaError::Timeout { .. }) => error!(trigger = i, "Trigger did not fire"),
            Err(e) => return Err(e),
        }
        progress(observer.as_ref(), report.triggers.name, i + 1);
    }

    for result in report.results() {
        info!(stage = result.name, "{}", result);
    }
    Ok(report)
}
