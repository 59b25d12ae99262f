//! Mock device-interface transport for testing.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::code::PanelErrorCode;
use super::traits::{PanelTransport, TransportError};
use crate::info::{DeviceInfo, DeviceInterface, DeviceSettings, UsbSpeed};

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCall {
    Open { serial: String },
    Configure { path: PathBuf },
    SetWireIn { addr: u8, value: u32, mask: u32 },
    UpdateWireIns,
    UpdateWireOuts,
    WireOut { addr: u8 },
    ActivateTriggerIn { addr: u8, bit: u8 },
    UpdateTriggerOuts,
    TriggerOut { addr: u8 },
    WritePipeIn { addr: u8, data: Vec<u8> },
    ReadPipeOut { addr: u8, len: usize },
    WriteBlockPipeIn { addr: u8, block_size: usize, data: Vec<u8> },
    ReadBlockPipeOut { addr: u8, block_size: usize, len: usize },
    WriteRegister { addr: u32, value: u32 },
    ReadRegister { addr: u32 },
    Close,
}

/// Operation selector for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Open,
    Configure,
    SetWireIn,
    UpdateWireIns,
    UpdateWireOuts,
    WireOut,
    ActivateTriggerIn,
    UpdateTriggerOuts,
    TriggerOut,
    WritePipeIn,
    ReadPipeOut,
    WriteBlockPipeIn,
    ReadBlockPipeOut,
    WriteRegister,
    ReadRegister,
    Close,
}

impl MockOp {
    pub fn name(self) -> &'static str {
        match self {
            MockOp::Open => "OpenBySerial",
            MockOp::Configure => "ConfigureFPGA",
            MockOp::SetWireIn => "SetWireInValue",
            MockOp::UpdateWireIns => "UpdateWireIns",
            MockOp::UpdateWireOuts => "UpdateWireOuts",
            MockOp::WireOut => "GetWireOutValue",
            MockOp::ActivateTriggerIn => "ActivateTriggerIn",
            MockOp::UpdateTriggerOuts => "UpdateTriggerOuts",
            MockOp::TriggerOut => "GetTriggerOutVector",
            MockOp::WritePipeIn => "WriteToPipeIn",
            MockOp::ReadPipeOut => "ReadFromPipeOut",
            MockOp::WriteBlockPipeIn => "WriteToBlockPipeIn",
            MockOp::ReadBlockPipeOut => "ReadFromBlockPipeOut",
            MockOp::WriteRegister => "WriteRegister",
            MockOp::ReadRegister => "ReadRegister",
            MockOp::Close => "Close",
        }
    }
}

impl PanelCall {
    pub fn op(&self) -> MockOp {
        match self {
            PanelCall::Open { .. } => MockOp::Open,
            PanelCall::Configure { .. } => MockOp::Configure,
            PanelCall::SetWireIn { .. } => MockOp::SetWireIn,
            PanelCall::UpdateWireIns => MockOp::UpdateWireIns,
            PanelCall::UpdateWireOuts => MockOp::UpdateWireOuts,
            PanelCall::WireOut { .. } => MockOp::WireOut,
            PanelCall::ActivateTriggerIn { .. } => MockOp::ActivateTriggerIn,
            PanelCall::UpdateTriggerOuts => MockOp::UpdateTriggerOuts,
            PanelCall::TriggerOut { .. } => MockOp::TriggerOut,
            PanelCall::WritePipeIn { .. } => MockOp::WritePipeIn,
            PanelCall::ReadPipeOut { .. } => MockOp::ReadPipeOut,
            PanelCall::WriteBlockPipeIn { .. } => MockOp::WriteBlockPipeIn,
            PanelCall::ReadBlockPipeOut { .. } => MockOp::ReadBlockPipeOut,
            PanelCall::WriteRegister { .. } => MockOp::WriteRegister,
            PanelCall::ReadRegister { .. } => MockOp::ReadRegister,
            PanelCall::Close => MockOp::Close,
        }
    }
}

#[derive(Debug)]
struct InjectedFailure {
    op: MockOp,
    /// Successful calls of `op` still allowed before the failure fires.
    remaining: usize,
    code: PanelErrorCode,
}

#[derive(Debug)]
struct MockState {
    calls: Vec<PanelCall>,
    info: DeviceInfo,
    settings: Option<DeviceSettings>,
    present: bool,
    open: bool,
    front_panel_enabled: bool,
    staged_wire_ins: HashMap<u8, u32>,
    wire_ins: HashMap<u8, u32>,
    wire_outs: HashMap<u8, u32>,
    trigger_queue: HashMap<u8, VecDeque<u32>>,
    trigger_latched: HashMap<u8, u32>,
    pipe_out: HashMap<u8, VecDeque<u8>>,
    registers: HashMap<u32, u32>,
    failures: Vec<InjectedFailure>,
    transfer_limit: Option<usize>,
}

impl MockState {
    /// Record `call` and fire any failure injected for its operation.
    fn record(&mut self, call: PanelCall) -> Result<(), TransportError> {
        let op = call.op();
        self.calls.push(call);

        if let Some(pos) = self.failures.iter().position(|f| f.op == op) {
            if self.failures[pos].remaining == 0 {
                let failure = self.failures.remove(pos);
                return Err(TransportError::Failed {
                    op: op.name(),
                    code: failure.code,
                });
            }
            self.failures[pos].remaining -= 1;
        }
        Ok(())
    }

    fn require_open(&self) -> Result<(), TransportError> {
        match (self.open, self.present) {
            (false, _) => Err(TransportError::NotOpen),
            (true, false) => Err(TransportError::Disconnected),
            (true, true) => Ok(()),
        }
    }

    fn limit(&self, len: usize) -> usize {
        self.transfer_limit.map_or(len, |limit| len.min(limit))
    }

    fn fill_from_pipe(&mut self, addr: u8, buf: &mut [u8]) -> usize {
        let count = self.limit(buf.len());
        let queue = self.pipe_out.entry(addr).or_default();
        for slot in buf.iter_mut().take(count) {
            *slot = queue.pop_front().unwrap_or(0);
        }
        count
    }
}

/// Mock transport for unit testing endpoint logic.
///
/// Clones share state, so a test can keep one handle for inspection while the
/// device owns another.
#[derive(Debug, Clone)]
pub struct MockPanel {
    state: Arc<Mutex<MockState>>,
}

impl MockPanel {
    pub fn new() -> Self {
        Self::with_info(DeviceInfo {
            product_name: "XEM7310-A75".into(),
            serial_number: "MOCK0001".into(),
            product_id: 0x0B,
            interface: DeviceInterface::Usb3,
            usb_speed: UsbSpeed::Super,
            ..Default::default()
        })
    }

    pub fn with_info(info: DeviceInfo) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                info,
                settings: None,
                present: true,
                open: false,
                front_panel_enabled: true,
                staged_wire_ins: HashMap::new(),
                wire_ins: HashMap::new(),
                wire_outs: HashMap::new(),
                trigger_queue: HashMap::new(),
                trigger_latched: HashMap::new(),
                pipe_out: HashMap::new(),
                registers: HashMap::new(),
                failures: Vec::new(),
                transfer_limit: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<PanelCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of recorded calls of `op`.
    pub fn count(&self, op: MockOp) -> usize {
        self.state().calls.iter().filter(|c| c.op() == op).count()
    }

    /// Value committed to a wire-in by the last `update_wire_ins`.
    pub fn wire_in(&self, addr: u8) -> Option<u32> {
        self.state().wire_ins.get(&addr).copied()
    }

    pub fn set_wire_out(&self, addr: u8, value: u32) {
        self.state().wire_outs.insert(addr, value);
    }

    /// Queue trigger-out values; each `update_trigger_outs` latches the next one.
    pub fn queue_trigger_out(&self, addr: u8, values: &[u32]) {
        self.state()
            .trigger_queue
            .entry(addr)
            .or_default()
            .extend(values.iter().copied());
    }

    /// Queue bytes to be returned by pipe-out reads on `addr`.
    pub fn queue_pipe_out(&self, addr: u8, data: &[u8]) {
        self.state()
            .pipe_out
            .entry(addr)
            .or_default()
            .extend(data.iter().copied());
    }

    pub fn set_register(&self, addr: u32, value: u32) {
        self.state().registers.insert(addr, value);
    }

    pub fn register(&self, addr: u32) -> Option<u32> {
        self.state().registers.get(&addr).copied()
    }

    /// Make the call after `successes` successful calls of `op` fail with `code`.
    pub fn fail_after(&self, op: MockOp, successes: usize, code: PanelErrorCode) {
        self.state().failures.push(InjectedFailure {
            op,
            remaining: successes,
            code,
        });
    }

    /// Cap every pipe transfer at `limit` bytes (short transfers).
    pub fn limit_transfers(&self, limit: usize) {
        self.state().transfer_limit = Some(limit);
    }

    /// Simulate an absent device. An open device that goes absent reports
    /// `Disconnected` on every call.
    pub fn set_present(&self, present: bool) {
        self.state().present = present;
    }

    pub fn set_front_panel_enabled(&self, enabled: bool) {
        self.state().front_panel_enabled = enabled;
    }

    /// Expose board settings. Without this the mock reports them unsupported.
    pub fn set_device_settings(&self, settings: DeviceSettings) {
        self.state().settings = Some(settings);
    }
}

impl Default for MockPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelTransport for MockPanel {
    fn open(&mut self, serial: &str) -> Result<(), TransportError> {
        let mut state = self.state();
        state.record(PanelCall::Open {
            serial: serial.to_string(),
        })?;
        if !state.present || (!serial.is_empty() && serial != state.info.serial_number) {
            return Err(TransportError::DeviceNotFound {
                serial: serial.to_string(),
            });
        }
        state.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    fn device_info(&self) -> Result<DeviceInfo, TransportError> {
        let state = self.state();
        state.require_open()?;
        Ok(state.info.clone())
    }

    fn device_settings(&self) -> Result<DeviceSettings, TransportError> {
        let state = self.state();
        state.require_open()?;
        state.settings.clone().ok_or(TransportError::Failed {
            op: "GetDeviceSettings",
            code: PanelErrorCode::UNSUPPORTED_FEATURE,
        })
    }

    fn configure(&mut self, bitstream: &Path) -> Result<(), TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::Configure {
            path: bitstream.to_path_buf(),
        })
    }

    fn is_front_panel_enabled(&self) -> bool {
        self.state().front_panel_enabled
    }

    fn set_wire_in(&mut self, addr: u8, value: u32, mask: u32) -> Result<(), TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::SetWireIn { addr, value, mask })?;
        let current = state
            .staged_wire_ins
            .get(&addr)
            .or(state.wire_ins.get(&addr))
            .copied()
            .unwrap_or(0);
        state
            .staged_wire_ins
            .insert(addr, (current & !mask) | (value & mask));
        Ok(())
    }

    fn update_wire_ins(&mut self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::UpdateWireIns)?;
        let staged: Vec<_> = state.staged_wire_ins.drain().collect();
        state.wire_ins.extend(staged);
        Ok(())
    }

    fn update_wire_outs(&mut self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::UpdateWireOuts)
    }

    fn wire_out(&mut self, addr: u8) -> Result<u32, TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::WireOut { addr })?;
        Ok(state.wire_outs.get(&addr).copied().unwrap_or(0))
    }

    fn activate_trigger_in(&mut self, addr: u8, bit: u8) -> Result<(), TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::ActivateTriggerIn { addr, bit })
    }

    fn update_trigger_outs(&mut self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::UpdateTriggerOuts)?;
        let state = &mut *state;
        for (addr, queue) in state.trigger_queue.iter_mut() {
            let value = queue.pop_front().unwrap_or(0);
            state.trigger_latched.insert(*addr, value);
        }
        Ok(())
    }

    fn trigger_out(&mut self, addr: u8) -> Result<u32, TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::TriggerOut { addr })?;
        Ok(state.trigger_latched.get(&addr).copied().unwrap_or(0))
    }

    fn write_pipe_in(&mut self, addr: u8, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::WritePipeIn {
            addr,
            data: data.to_vec(),
        })?;
        Ok(state.limit(data.len()))
    }

    fn read_pipe_out(&mut self, addr: u8, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::ReadPipeOut {
            addr,
            len: buf.len(),
        })?;
        Ok(state.fill_from_pipe(addr, buf))
    }

    fn write_block_pipe_in(
        &mut self,
        addr: u8,
        block_size: usize,
        data: &[u8],
    ) -> Result<usize, TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::WriteBlockPipeIn {
            addr,
            block_size,
            data: data.to_vec(),
        })?;
        Ok(state.limit(data.len()))
    }

    fn read_block_pipe_out(
        &mut self,
        addr: u8,
        block_size: usize,
        buf: &mut [u8],
    ) -> Result<usize, TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::ReadBlockPipeOut {
            addr,
            block_size,
            len: buf.len(),
        })?;
        Ok(state.fill_from_pipe(addr, buf))
    }

    fn write_register(&mut self, addr: u32, value: u32) -> Result<(), TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::WriteRegister { addr, value })?;
        state.registers.insert(addr, value);
        Ok(())
    }

    fn read_register(&mut self, addr: u32) -> Result<u32, TransportError> {
        let mut state = self.state();
        state.require_open()?;
        state.record(PanelCall::ReadRegister { addr })?;
        Ok(state.registers.get(&addr).copied().unwrap_or(0))
    }

    fn close(&mut self) {
        let mut state = self.state();
        // Close is infallible; injected failures are ignored here.
        let _ = state.record(PanelCall::Close);
        state.open = false;
    }
}
