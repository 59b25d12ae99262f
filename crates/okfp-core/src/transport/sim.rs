//! In-process loop-back board.
//!
//! Behaves like a bitstream that wires each input endpoint to its output
//! twin: wire-in `n` is visible on wire-out `0x20 + n`, a trigger-in on
//! `0x40 + n` fires trigger-out `0x60 + n`, and bytes written to pipe-in
//! `0x80 + n` queue up for pipe-out `0xA0 + n`.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use tracing::{debug, trace};

use super::traits::{PanelTransport, TransportError};
use crate::endpoint::constants::BANK_SIZE;
use crate::info::{DeviceInfo, DeviceInterface, UsbSpeed};

pub const SIM_SERIAL: &str = "SIM00001";

fn slot(addr: u8) -> usize {
    addr as usize % BANK_SIZE
}

#[derive(Debug)]
pub struct SimulatedPanel {
    info: DeviceInfo,
    open: bool,
    front_panel_enabled: bool,
    staged: HashMap<usize, u32>,
    wire_ins: [u32; BANK_SIZE],
    wire_outs: [u32; BANK_SIZE],
    pending_triggers: [u32; BANK_SIZE],
    latched_triggers: [u32; BANK_SIZE],
    fifos: Vec<VecDeque<u8>>,
    registers: HashMap<u32, u32>,
}

impl SimulatedPanel {
    pub fn new() -> Self {
        Self::with_product("XEM7310-A75")
    }

    /// A USB 3 loop-back board reporting `product_name`.
    pub fn with_product(product_name: &str) -> Self {
        Self::with_info(DeviceInfo {
            product_name: product_name.into(),
            serial_number: SIM_SERIAL.into(),
            product_id: 0x0B,
            interface: DeviceInterface::Usb3,
            usb_speed: UsbSpeed::Super,
            ..Default::default()
        })
    }

    pub fn with_info(info: DeviceInfo) -> Self {
        Self {
            info,
            open: false,
            front_panel_enabled: true,
            staged: HashMap::new(),
            wire_ins: [0; BANK_SIZE],
            wire_outs: [0; BANK_SIZE],
            pending_triggers: [0; BANK_SIZE],
            latched_triggers: [0; BANK_SIZE],
            fifos: vec![VecDeque::new(); BANK_SIZE],
            registers: HashMap::new(),
        }
    }

    fn require_open(&self) -> Result<(), TransportError> {
        if self.open {
            Ok(())
        } else {
            Err(TransportError::NotOpen)
        }
    }

    fn drain_fifo(&mut self, addr: u8, buf: &mut [u8]) -> usize {
        let fifo = &mut self.fifos[slot(addr)];
        let count = buf.len().min(fifo.len());
        for (dst, src) in buf.iter_mut().zip(fifo.drain(..count)) {
            *dst = src;
        }
        trace!(addr, requested = buf.len(), count, "Loop-back FIFO read");
        count
    }
}

impl Default for SimulatedPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelTransport for SimulatedPanel {
    fn open(&mut self, serial: &str) -> Result<(), TransportError> {
        if !serial.is_empty() && serial != self.info.serial_number {
            return Err(TransportError::DeviceNotFound {
                serial: serial.to_string(),
            });
        }
        debug!(serial = %self.info.serial_number, "Simulated board opened");
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn device_info(&self) -> Result<DeviceInfo, TransportError> {
        self.require_open()?;
        Ok(self.info.clone())
    }

    fn configure(&mut self, bitstream: &Path) -> Result<(), TransportError> {
        self.require_open()?;
        let bits = std::fs::read(bitstream)?;
        if bits.is_empty() {
            return Err(TransportError::Configuration(format!(
                "empty bitstream: {}",
                bitstream.display()
            )));
        }
        debug!(path = %bitstream.display(), bytes = bits.len(), "Simulated board configured");
        self.front_panel_enabled = true;
        Ok(())
    }

    fn is_front_panel_enabled(&self) -> bool {
        self.front_panel_enabled
    }

    fn set_wire_in(&mut self, addr: u8, value: u32, mask: u32) -> Result<(), TransportError> {
        self.require_open()?;
        let n = slot(addr);
        let current = self.staged.get(&n).copied().unwrap_or(self.wire_ins[n]);
        self.staged.insert(n, (current & !mask) | (value & mask));
        Ok(())
    }

    fn update_wire_ins(&mut self) -> Result<(), TransportError> {
        self.require_open()?;
        for (n, value) in self.staged.drain() {
            self.wire_ins[n] = value;
        }
        Ok(())
    }

    fn update_wire_outs(&mut self) -> Result<(), TransportError> {
        self.require_open()?;
        self.wire_outs = self.wire_ins;
        Ok(())
    }

    fn wire_out(&mut self, addr: u8) -> Result<u32, TransportError> {
        self.require_open()?;
        Ok(self.wire_outs[slot(addr)])
    }

    fn activate_trigger_in(&mut self, addr: u8, bit: u8) -> Result<(), TransportError> {
        self.require_open()?;
        self.pending_triggers[slot(addr)] |= 1u32 << (bit % 32);
        Ok(())
    }

    fn update_trigger_outs(&mut self) -> Result<(), TransportError> {
        self.require_open()?;
        self.latched_triggers = std::mem::take(&mut self.pending_triggers);
        Ok(())
    }

    fn trigger_out(&mut self, addr: u8) -> Result<u32, TransportError> {
        self.require_open()?;
        Ok(self.latched_triggers[slot(addr)])
    }

    fn write_pipe_in(&mut self, addr: u8, data: &[u8]) -> Result<usize, TransportError> {
        self.require_open()?;
        self.fifos[slot(addr)].extend(data.iter().copied());
        Ok(data.len())
    }

    fn read_pipe_out(&mut self, addr: u8, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.require_open()?;
        Ok(self.drain_fifo(addr, buf))
    }

    fn write_block_pipe_in(
        &mut self,
        addr: u8,
        _block_size: usize,
        data: &[u8],
    ) -> Result<usize, TransportError> {
        self.write_pipe_in(addr, data)
    }

    fn read_block_pipe_out(
        &mut self,
        addr: u8,
        _block_size: usize,
        buf: &mut [u8],
    ) -> Result<usize, TransportError> {
        self.read_pipe_out(addr, buf)
    }

    fn write_register(&mut self, addr: u32, value: u32) -> Result<(), TransportError> {
        self.require_open()?;
        self.registers.insert(addr, value);
        Ok(())
    }

    fn read_register(&mut self, addr: u32) -> Result<u32, TransportError> {
        self.require_open()?;
        Ok(self.registers.get(&addr).copied().unwrap_or(0))
    }

    fn close(&mut self) {
        self.open = false;
    }
}
