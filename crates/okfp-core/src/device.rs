//! FPGA device handle.
//!
//! `FpgaDevice` owns the collaborator connection and exposes the endpoint
//! operations. Auto-update flags live here; the channels below only see the
//! resolved per-call decision.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::channel::{BlockPipeChannel, PipeChannel, TriggerChannel, WireChannel, WireValue};
use crate::codec::PipeInput;
use crate::config::{BoardConfig, BoardModel, DeviceConfig, validate_bitstream};
use crate::endpoint::{EndpointAddress, EndpointKind};
use crate::error::{FpgaError, Result};
use crate::events::{FpgaEvent, FpgaObserver, PipeDirection, TracingObserver};
use crate::info::{DeviceInfo, DeviceSettings};
use crate::policy::{AutoUpdateCategory, AutoUpdatePolicy};
use crate::poll::PollReport;
use crate::transfer::{PipeOutData, TransferOutcome};
use crate::transport::{PanelTransport, TransportError};

/// An open FPGA board.
///
/// Dropping the handle discards queued wire-ins, turns off LEDs that were
/// used, and closes the connection. [`close`](Self::close) does the same and
/// reports an LED write failure.
pub struct FpgaDevice<T: PanelTransport, O: FpgaObserver + 'static = TracingObserver> {
    transport: ObservedPanel<T, O>,
    observer: Arc<O>,
    config: DeviceConfig,
    info: DeviceInfo,
    board: Option<BoardConfig>,
    settings_warnings: Vec<String>,
    policy: AutoUpdatePolicy,
    wires: WireChannel,
    triggers: TriggerChannel,
    pipes: PipeChannel,
    blocks: BlockPipeChannel,
    leds_used: bool,
    closed: bool,
}

impl<T: PanelTransport> FpgaDevice<T, TracingObserver> {
    /// Open a device with the default tracing observer.
    pub fn open(transport: T, config: DeviceConfig) -> Result<Self> {
        Self::open_with_observer(transport, config, Arc::new(TracingObserver))
    }
}

impl<T: PanelTransport, O: FpgaObserver + 'static> FpgaDevice<T, O> {
    /// Open, identify, and optionally program a device.
    pub fn open_with_observer(transport: T, config: DeviceConfig, observer: Arc<O>) -> Result<Self> {
        if let Some(path) = &config.bitstream {
            validate_bitstream(path)?;
        }

        let mut transport = ObservedPanel {
            inner: transport,
            observer: Arc::clone(&observer),
        };
        transport
            .open(&config.serial)
            .map_err(|e| FpgaError::io("OpenBySerial", e))?;

        let (info, board, settings_warnings) = match identify(&transport, &config) {
            Ok(found) => found,
            Err(e) => {
                transport.close();
                return Err(e);
            }
        };

        let pipes = PipeChannel::new(config.reorder_word_size);
        let mut device = Self {
            blocks: BlockPipeChannel::new(pipes.clone(), info.max_block_size()),
            pipes,
            triggers: TriggerChannel::new(Duration::from_millis(config.poll_interval_ms)),
            wires: WireChannel::new(),
            policy: AutoUpdatePolicy::new(),
            transport,
            observer,
            config,
            info,
            board,
            settings_warnings,
            leds_used: false,
            closed: false,
        };
        device.observer.on_event(&FpgaEvent::DeviceOpened {
            product: device.info.product_name.clone(),
            serial: device.info.serial_number.clone(),
        });

        match device.config.bitstream.clone() {
            Some(path) => device.configure(&path)?,
            None => device.require_front_panel()?,
        }
        Ok(device)
    }

    /// Program a bitstream and confirm the endpoint interface came up.
    #[instrument(skip(self))]
    pub fn configure(&mut self, bitstream: &Path) -> Result<()> {
        validate_bitstream(bitstream)?;
        self.transport
            .configure(bitstream)
            .map_err(|e| FpgaError::io("ConfigureFPGA", e))?;
        self.observer.on_event(&FpgaEvent::Programmed {
            path: bitstream.to_path_buf(),
        });
        self.require_front_panel()
    }

    fn require_front_panel(&self) -> Result<()> {
        if self.transport.is_front_panel_enabled() {
            debug!("FrontPanel is enabled");
            Ok(())
        } else {
            Err(FpgaError::Configuration {
                reason: "FrontPanel is not enabled".into(),
            })
        }
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn board(&self) -> Option<&BoardConfig> {
        self.board.as_ref()
    }

    /// Interface, endpoint width, and board setting warnings found at open.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.info.validate();
        warnings.extend(self.settings_warnings.iter().cloned());
        warnings
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn observer(&self) -> &Arc<O> {
        &self.observer
    }

    // ---------------------------------------------------------------------
    // Auto-update
    // ---------------------------------------------------------------------

    pub fn auto_update(&self) -> AutoUpdatePolicy {
        self.policy
    }

    pub fn set_auto_update(&mut self, category: AutoUpdateCategory, enabled: bool) {
        self.policy.set(category, enabled);
        self.observer
            .on_event(&FpgaEvent::AutoUpdateChanged { category, enabled });
    }

    pub fn set_wire_in_auto_update(&mut self, enabled: bool) {
        self.set_auto_update(AutoUpdateCategory::WireIn, enabled);
    }

    pub fn set_wire_out_auto_update(&mut self, enabled: bool) {
        self.set_auto_update(AutoUpdateCategory::WireOut, enabled);
    }

    pub fn set_trigger_out_auto_update(&mut self, enabled: bool) {
        self.set_auto_update(AutoUpdateCategory::TriggerOut, enabled);
    }

    // ---------------------------------------------------------------------
    // Wires
    // ---------------------------------------------------------------------

    pub fn set_wire_in(&mut self, addr: u8, value: u32) -> Result<()> {
        self.set_wire_in_with(addr, WireValue::new(value), None)
    }

    /// Queue a wire-in; `auto_update` overrides the stored flag for this call.
    #[instrument(level = "debug", skip_all, fields(addr = %format!("0x{:02X}", addr)))]
    pub fn set_wire_in_with(
        &mut self,
        addr: u8,
        value: WireValue,
        auto_update: Option<bool>,
    ) -> Result<()> {
        let flush = self.policy.effective(AutoUpdateCategory::WireIn, auto_update);
        let flushed = self
            .wires
            .set_wire_in(&mut self.transport, addr, value, flush)?;
        if let Some(count) = flushed {
            self.observer.on_event(&FpgaEvent::WireInsFlushed { count });
        }
        Ok(())
    }

    /// Commit all queued wire-ins in one update.
    pub fn update_wire_ins(&mut self) -> Result<usize> {
        let count = self.wires.update_wire_ins(&mut self.transport)?;
        self.observer
            .on_event(&FpgaEvent::WireInsFlushed { count });
        Ok(count)
    }

    pub fn pending_wire_ins(&self) -> impl Iterator<Item = (u8, WireValue)> + '_ {
        self.wires.pending()
    }

    pub fn update_wire_outs(&mut self) -> Result<()> {
        self.wires.update_wire_outs(&mut self.transport)
    }

    pub fn wire_out(&mut self, addr: u8) -> Result<u32> {
        self.wire_out_with(addr, None)
    }

    #[instrument(level = "debug", skip_all, fields(addr = %format!("0x{:02X}", addr)))]
    pub fn wire_out_with(&mut self, addr: u8, auto_update: Option<bool>) -> Result<u32> {
        let refresh = self
            .policy
            .effective(AutoUpdateCategory::WireOut, auto_update);
        self.wires.wire_out(&mut self.transport, addr, refresh)
    }

    // ---------------------------------------------------------------------
    // Triggers
    // ---------------------------------------------------------------------

    pub fn activate_trigger_in(&mut self, addr: u8, bit: u32) -> Result<()> {
        self.triggers
            .activate_trigger_in(&mut self.transport, addr, bit)
    }

    pub fn update_trigger_outs(&mut self) -> Result<()> {
        self.triggers.update_trigger_outs(&mut self.transport)
    }

    pub fn is_triggered(&mut self, addr: u8, mask: u32) -> Result<bool> {
        self.is_triggered_with(addr, mask, None)
    }

    #[instrument(level = "debug", skip_all, fields(addr = %format!("0x{:02X}", addr)))]
    pub fn is_triggered_with(
        &mut self,
        addr: u8,
        mask: u32,
        auto_update: Option<bool>,
    ) -> Result<bool> {
        let refresh = self
            .policy
            .effective(AutoUpdateCategory::TriggerOut, auto_update);
        self.triggers
            .is_triggered(&mut self.transport, addr, mask, refresh)
    }

    /// Poll a trigger-out until a masked bit is set or `timeout` runs out.
    ///
    /// Always refreshes, regardless of the trigger-out auto-update flag.
    #[instrument(skip_all, fields(addr = %format!("0x{:02X}", addr), mask = %format!("0x{:08X}", mask)))]
    pub fn check_triggered(&mut self, addr: u8, mask: u32, timeout: Duration) -> Result<PollReport> {
        let result = self
            .triggers
            .check_triggered(&mut self.transport, addr, mask, timeout);
        self.report_wait(addr, mask, &result);
        result
    }

    /// [`check_triggered`](Self::check_triggered) that stops once `cancel` is set.
    pub fn check_triggered_cancellable(
        &mut self,
        addr: u8,
        mask: u32,
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> Result<PollReport> {
        let result = self.triggers.check_triggered_cancellable(
            &mut self.transport,
            addr,
            mask,
            timeout,
            cancel,
        );
        self.report_wait(addr, mask, &result);
        result
    }

    fn report_wait(&self, addr: u8, mask: u32, result: &Result<PollReport>) {
        let (attempts, satisfied) = match result {
            Ok(report) => (report.attempts, true),
            Err(err) => match err.attempts() {
                Some(attempts) => (attempts, false),
                None => return,
            },
        };
        self.observer.on_event(&FpgaEvent::TriggerWait {
            address: addr,
            mask,
            attempts,
            satisfied,
        });
    }

    // ---------------------------------------------------------------------
    // Pipes
    // ---------------------------------------------------------------------

    #[instrument(level = "debug", skip_all, fields(addr = %format!("0x{:02X}", addr)))]
    pub fn write_to_pipe_in<'a>(
        &mut self,
        addr: u8,
        input: impl Into<PipeInput<'a>>,
        reorder: bool,
    ) -> Result<TransferOutcome> {
        self.pipes
            .write_to_pipe_in(&mut self.transport, addr, &input.into(), reorder)
    }

    #[instrument(level = "debug", skip_all, fields(addr = %format!("0x{:02X}", addr), length = length))]
    pub fn read_from_pipe_out(
        &mut self,
        addr: u8,
        length: usize,
        reorder: bool,
    ) -> Result<PipeOutData> {
        self.pipes
            .read_from_pipe_out(&mut self.transport, addr, length, reorder)
    }

    /// Block size used when a block transfer does not name one.
    pub fn default_block_size(&self) -> Option<usize> {
        self.config.block_size.or(self.info.max_block_size())
    }

    fn block_size(&self, block_size: Option<usize>) -> Result<usize> {
        block_size
            .or(self.default_block_size())
            .ok_or(FpgaError::InvalidLength {
                what: "block size",
                length: 0,
            })
    }

    #[instrument(level = "debug", skip_all, fields(addr = %format!("0x{:02X}", addr)))]
    pub fn write_to_block_pipe_in<'a>(
        &mut self,
        addr: u8,
        input: impl Into<PipeInput<'a>>,
        block_size: Option<usize>,
        reorder: bool,
    ) -> Result<TransferOutcome> {
        let block_size = self.block_size(block_size)?;
        let observer = &self.observer;
        self.blocks.write_to_block_pipe_in(
            &mut self.transport,
            addr,
            &input.into(),
            block_size,
            reorder,
            |current, total| {
                observer.on_event(&FpgaEvent::BlockProgress {
                    address: addr,
                    current,
                    total,
                })
            },
        )
    }

    #[instrument(level = "debug", skip_all, fields(addr = %format!("0x{:02X}", addr), length = length))]
    pub fn read_from_block_pipe_out(
        &mut self,
        addr: u8,
        length: usize,
        block_size: Option<usize>,
        reorder: bool,
    ) -> Result<PipeOutData> {
        let block_size = self.block_size(block_size)?;
        let observer = &self.observer;
        self.blocks.read_from_block_pipe_out(
            &mut self.transport,
            addr,
            length,
            block_size,
            reorder,
            |current, total| {
                observer.on_event(&FpgaEvent::BlockProgress {
                    address: addr,
                    current,
                    total,
                })
            },
        )
    }

    // ---------------------------------------------------------------------
    // Board helpers
    // ---------------------------------------------------------------------

    /// Hold a wire-in reset line active for `hold`, then release it.
    ///
    /// Each edge flushes every queued wire-in along with the reset wire.
    #[instrument(skip(self))]
    pub fn reset(&mut self, addr: u8, hold: Duration, active_low: bool) -> Result<()> {
        EndpointAddress::expect(addr, EndpointKind::WireIn)?;
        let (active, nominal) = if active_low { (0, 1) } else { (1, 0) };

        info!(hold_ms = hold.as_millis() as u64, "Reset start");
        self.wires
            .set_wire_in(&mut self.transport, addr, WireValue::new(active), false)?;
        self.update_wire_ins()?;

        thread::sleep(hold);

        self.wires
            .set_wire_in(&mut self.transport, addr, WireValue::new(nominal), false)?;
        self.update_wire_ins()?;
        info!("Reset end");
        Ok(())
    }

    fn require_board(&self) -> Result<BoardConfig> {
        self.board.ok_or_else(|| FpgaError::Configuration {
            reason: format!("no LED map for board '{}'", self.info.product_name),
        })
    }

    /// Drive the user LEDs. `value` must fit the board's LED count.
    pub fn set_led(&mut self, value: u32) -> Result<()> {
        let board = self.require_board()?;
        if value & !board.led_mask() != 0 {
            return Err(FpgaError::InvalidValue {
                value,
                bits: board.led_count,
            });
        }
        info!(value = %format!("{:0width$b}", value, width = board.led_count as usize), "Setting LEDs");
        self.set_wire_in_with(
            board.led_address,
            WireValue::masked(value, board.led_mask()),
            Some(true),
        )?;
        self.leds_used = true;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Register bridge
    // ---------------------------------------------------------------------

    pub fn write_register(&mut self, addr: u32, value: u32) -> Result<()> {
        debug!(addr = %format!("0x{:08X}", addr), value = %format!("0x{:08X}", value), "Register write");
        self.transport
            .write_register(addr, value)
            .map_err(|e| FpgaError::io("WriteRegister", e))
    }

    pub fn read_register(&mut self, addr: u32) -> Result<u32> {
        let value = self
            .transport
            .read_register(addr)
            .map_err(|e| FpgaError::io("ReadRegister", e))?;
        debug!(addr = %format!("0x{:08X}", addr), value = %format!("0x{:08X}", value), "Register read");
        Ok(value)
    }

    // ---------------------------------------------------------------------
    // Teardown
    // ---------------------------------------------------------------------

    /// Close the device. Queued wire-ins are discarded, not flushed.
    pub fn close(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let discarded = self.wires.discard();
        if discarded > 0 {
            warn!(discarded, "Discarding queued wire-ins on close");
        }

        let leds = match (self.leds_used, self.board) {
            (true, Some(board)) => {
                info!("Turning off the LEDs before closing the device");
                self.transport
                    .set_wire_in(board.led_address, 0, board.led_mask())
                    .and_then(|()| self.transport.update_wire_ins())
                    .map_err(|e| FpgaError::io("SetLED", e))
            }
            _ => Ok(()),
        };

        self.transport.close();
        self.observer.on_event(&FpgaEvent::Closed);
        leds
    }
}

impl<T: PanelTransport, O: FpgaObserver + 'static> Drop for FpgaDevice<T, O> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!(error = %e, "Teardown failed");
        }
    }
}

/// Read device info and settle which board this is.
fn identify<T: PanelTransport>(
    transport: &T,
    config: &DeviceConfig,
) -> Result<(DeviceInfo, Option<BoardConfig>, Vec<String>)> {
    let info = transport
        .device_info()
        .map_err(|e| FpgaError::io("GetDeviceInfo", e))?;
    info!(
        model = %info.product_name,
        serial = %info.serial_number,
        interface = %info.interface,
        usb_speed = %info.usb_speed,
        max_block = ?info.max_block_size(),
        "Device identified"
    );
    info.validate();

    let detected = BoardModel::from_product_name(&info.product_name);
    let model = match (config.board, detected) {
        (Some(expected), found) if found != Some(expected) => {
            return Err(FpgaError::BoardMismatch {
                expected: expected.to_string(),
                found: info.product_name.clone(),
            });
        }
        (expected, detected) => expected.or(detected),
    };

    let board = model.map(|model| {
        let mut board = BoardConfig::for_model(model);
        if let Some(addr) = config.led_address {
            board.led_address = addr;
        }
        board
    });

    let settings_warnings = match &board {
        Some(board) => match transport.device_settings() {
            Ok(settings) => board.check_settings(&settings),
            Err(e) => {
                warn!(error = %e, "Device settings unavailable");
                Vec::new()
            }
        },
        None => Vec::new(),
    };
    Ok((info, board, settings_warnings))
}

/// Transport wrapper that emits transfer events.
struct ObservedPanel<T: PanelTransport, O: FpgaObserver> {
    inner: T,
    observer: Arc<O>,
}

impl<T: PanelTransport, O: FpgaObserver> ObservedPanel<T, O> {
    fn emit(
        &self,
        direction: PipeDirection,
        address: u8,
        res: &std::result::Result<usize, TransportError>,
    ) {
        if let Ok(length) = res {
            self.observer.on_event(&FpgaEvent::Transfer {
                direction,
                address,
                length: *length,
            });
        }
    }
}

impl<T: PanelTransport, O: FpgaObserver> PanelTransport for ObservedPanel<T, O> {
    fn open(&mut self, serial: &str) -> std::result::Result<(), TransportError> {
        self.inner.open(serial)
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn device_info(&self) -> std::result::Result<DeviceInfo, TransportError> {
        self.inner.device_info()
    }

    fn device_settings(&self) -> std::result::Result<DeviceSettings, TransportError> {
        self.inner.device_settings()
    }

    fn configure(&mut self, bitstream: &Path) -> std::result::Result<(), TransportError> {
        self.inner.configure(bitstream)
    }

    fn is_front_panel_enabled(&self) -> bool {
        self.inner.is_front_panel_enabled()
    }

    fn set_wire_in(
        &mut self,
        addr: u8,
        value: u32,
        mask: u32,
    ) -> std::result::Result<(), TransportError> {
        self.inner.set_wire_in(addr, value, mask)
    }

    fn update_wire_ins(&mut self) -> std::result::Result<(), TransportError> {
        self.inner.update_wire_ins()
    }

    fn update_wire_outs(&mut self) -> std::result::Result<(), TransportError> {
        self.inner.update_wire_outs()
    }

    fn wire_out(&mut self, addr: u8) -> std::result::Result<u32, TransportError> {
        self.inner.wire_out(addr)
    }

    fn activate_trigger_in(&mut self, addr: u8, bit: u8) -> std::result::Result<(), TransportError> {
        self.inner.activate_trigger_in(addr, bit)
    }

    fn update_trigger_outs(&mut self) -> std::result::Result<(), TransportError> {
        self.inner.update_trigger_outs()
    }

    fn trigger_out(&mut self, addr: u8) -> std::result::Result<u32, TransportError> {
        self.inner.trigger_out(addr)
    }

    fn is_triggered(&mut self, addr: u8, mask: u32) -> std::result::Result<bool, TransportError> {
        self.inner.is_triggered(addr, mask)
    }

    fn write_pipe_in(&mut self, addr: u8, data: &[u8]) -> std::result::Result<usize, TransportError> {
        let res = self.inner.write_pipe_in(addr, data);
        self.emit(PipeDirection::In, addr, &res);
        res
    }

    fn read_pipe_out(
        &mut self,
        addr: u8,
        buf: &mut [u8],
    ) -> std::result::Result<usize, TransportError> {
        let res = self.inner.read_pipe_out(addr, buf);
        self.emit(PipeDirection::Out, addr, &res);
        res
    }

    fn write_block_pipe_in(
        &mut self,
        addr: u8,
        block_size: usize,
        data: &[u8],
    ) -> std::result::Result<usize, TransportError> {
        let res = self.inner.write_block_pipe_in(addr, block_size, data);
        self.emit(PipeDirection::In, addr, &res);
        res
    }

    fn read_block_pipe_out(
        &mut self,
        addr: u8,
        block_size: usize,
        buf: &mut [u8],
    ) -> std::result::Result<usize, TransportError> {
        let res = self.inner.read_block_pipe_out(addr, block_size, buf);
        self.emit(PipeDirection::Out, addr, &res);
        res
    }

    fn write_register(&mut self, addr: u32, value: u32) -> std::result::Result<(), TransportError> {
        self.inner.write_register(addr, value)
    }

    fn read_register(&mut self, addr: u32) -> std::result::Result<u32, TransportError> {
        self.inner.read_register(addr)
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::events::NullObserver;
    use crate::info::DeviceInterface;
    use crate::transport::{MockOp, MockPanel, PanelCall, PanelErrorCode, SimulatedPanel};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<FpgaEvent>>,
    }

    impl FpgaObserver for Recorder {
        fn on_event(&self, event: &FpgaEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn open_mock() -> (FpgaDevice<MockPanel, NullObserver>, MockPanel) {
        let mock = MockPanel::new();
        let handle = mock.clone();
        let device =
            FpgaDevice::open_with_observer(mock, DeviceConfig::default(), Arc::new(NullObserver))
                .unwrap();
        handle.clear_calls();
        (device, handle)
    }

    fn fast_config() -> DeviceConfig {
        DeviceConfig {
            poll_interval_ms: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_open_reads_info_and_board() {
        let (device, _mock) = open_mock();
        assert_eq!(device.device_info().interface, DeviceInterface::Usb3);
        let board = device.board().unwrap();
        assert_eq!(board.model, BoardModel::Xem7310A75);
        assert_eq!(board.led_count, 8);
        assert_eq!(device.default_block_size(), Some(16384));
        assert_eq!(device.auto_update(), AutoUpdatePolicy::new());
    }

    #[test]
    fn test_open_not_found() {
        let mock = MockPanel::new();
        mock.set_present(false);
        let err = FpgaDevice::open(mock, DeviceConfig::default()).err().unwrap();
        assert!(matches!(err, FpgaError::DeviceNotFound { .. }));
    }

    #[test]
    fn test_open_board_mismatch_closes() {
        let mock = MockPanel::new();
        let handle = mock.clone();
        let config = DeviceConfig {
            board: Some(BoardModel::Xem7360K160T),
            ..Default::default()
        };
        let err = FpgaDevice::open(mock, config).err().unwrap();
        assert!(matches!(err, FpgaError::BoardMismatch { .. }));
        assert!(!handle.is_open());
    }

    #[test]
    fn test_open_front_panel_disabled() {
        let mock = MockPanel::new();
        mock.set_front_panel_enabled(false);
        let handle = mock.clone();
        let err = FpgaDevice::open(mock, DeviceConfig::default()).err().unwrap();
        assert!(matches!(err, FpgaError::Configuration { .. }));
        assert_eq!(handle.count(MockOp::Close), 1);
    }

    #[test]
    fn test_open_rejects_bad_bitstream_before_io() {
        let mock = MockPanel::new();
        let handle = mock.clone();
        let config = DeviceConfig {
            bitstream: Some("design.bin".into()),
            ..Default::default()
        };
        let err = FpgaDevice::open(mock, config).err().unwrap();
        assert!(matches!(err, FpgaError::Configuration { .. }));
        assert!(handle.calls().is_empty());
    }

    #[test]
    fn test_open_programs_bitstream() {
        let path = std::env::temp_dir().join(format!("okfp-dev-{}.bit", std::process::id()));
        std::fs::write(&path, b"bits").unwrap();
        let mock = MockPanel::new();
        let handle = mock.clone();
        let config = DeviceConfig {
            bitstream: Some(path.clone()),
            ..Default::default()
        };
        let device = FpgaDevice::open(mock, config);
        std::fs::remove_file(&path).ok();

        assert!(device.is_ok());
        assert!(handle.calls().contains(&PanelCall::Configure { path }));
    }

    #[test]
    fn test_program_failure_is_device_io() {
        let path = std::env::temp_dir().join(format!("okfp-fail-{}.bit", std::process::id()));
        std::fs::write(&path, b"bits").unwrap();
        let mock = MockPanel::new();
        mock.fail_after(MockOp::Configure, 0, PanelErrorCode::DONE_NOT_HIGH);
        let config = DeviceConfig {
            bitstream: Some(path.clone()),
            ..Default::default()
        };
        let err = FpgaDevice::open(mock, config).err().unwrap();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, FpgaError::DeviceIo { op: "ConfigureFPGA", .. }));
    }

    #[test]
    fn test_set_wire_in_then_update() {
        let (mut device, mock) = open_mock();
        device.set_wire_in(0x00, 0x1234_5678).unwrap();
        assert!(mock.calls().is_empty());

        device.update_wire_ins().unwrap();
        assert_eq!(
            mock.calls(),
            vec![
                PanelCall::SetWireIn {
                    addr: 0x00,
                    value: 0x1234_5678,
                    mask: 0xFFFF_FFFF
                },
                PanelCall::UpdateWireIns
            ]
        );
        assert_eq!(device.pending_wire_ins().count(), 0);
    }

    #[test]
    fn test_wire_in_auto_update_and_override() {
        let (mut device, mock) = open_mock();
        device.set_wire_in_auto_update(true);
        device.set_wire_in(0x01, 5).unwrap();
        assert_eq!(mock.count(MockOp::UpdateWireIns), 1);

        device
            .set_wire_in_with(0x02, WireValue::masked(6, 0xF), Some(false))
            .unwrap();
        assert_eq!(mock.count(MockOp::UpdateWireIns), 1);
        assert!(device.auto_update().get(AutoUpdateCategory::WireIn));
        assert_eq!(device.pending_wire_ins().count(), 1);
    }

    #[test]
    fn test_wire_out_uses_policy() {
        let (mut device, mock) = open_mock();
        mock.set_wire_out(0x20, 42);

        assert_eq!(device.wire_out(0x20).unwrap(), 42);
        assert_eq!(mock.count(MockOp::UpdateWireOuts), 0);

        device.wire_out_with(0x20, Some(true)).unwrap();
        assert_eq!(mock.count(MockOp::UpdateWireOuts), 1);

        device.set_wire_out_auto_update(true);
        device.wire_out(0x20).unwrap();
        assert_eq!(mock.count(MockOp::UpdateWireOuts), 2);
    }

    #[test]
    fn test_wire_in_rejects_wire_out_address() {
        let (mut device, mock) = open_mock();
        let err = device.set_wire_in(0x25, 1).unwrap_err();
        assert!(matches!(err, FpgaError::InvalidAddress(_)));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_trigger_policy_and_check() {
        let (mut device, mock) = open_mock();
        mock.queue_trigger_out(0x60, &[0x1]);

        assert!(!device.is_triggered(0x60, 0x1).unwrap());
        device.set_trigger_out_auto_update(true);
        assert!(device.is_triggered(0x60, 0x1).unwrap());

        let err = device.check_triggered(0x60, 0x1, Duration::ZERO).unwrap_err();
        assert!(matches!(err, FpgaError::Timeout { .. }));
    }

    #[test]
    fn test_trigger_timeout_event_counts_checks() {
        let recorder = Arc::new(Recorder::default());
        let mut device =
            FpgaDevice::open_with_observer(MockPanel::new(), fast_config(), Arc::clone(&recorder))
                .unwrap();

        let err = device.check_triggered(0x61, 0x2, Duration::ZERO).unwrap_err();
        assert_eq!(err.attempts(), Some(1));

        let events = recorder.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            FpgaEvent::TriggerWait {
                address: 0x61,
                mask: 0x2,
                attempts: 1,
                satisfied: false,
            }
        )));
    }

    #[test]
    fn test_unplugged_device_is_device_io() {
        let (mut device, mock) = open_mock();
        mock.set_present(false);
        let err = device.wire_out_with(0x20, Some(true)).unwrap_err();
        assert!(matches!(
            err,
            FpgaError::DeviceIo {
                op: "UpdateWireOuts",
                source: TransportError::Disconnected,
                ..
            }
        ));
    }

    #[test]
    fn test_pipe_write_reorder_scenario() {
        let (mut device, mock) = open_mock();
        device.write_to_pipe_in(0x80, "AABBCCDD", true).unwrap();
        assert_eq!(
            mock.calls(),
            vec![PanelCall::WritePipeIn {
                addr: 0x80,
                data: vec![0xBB, 0xAA, 0xDD, 0xCC]
            }]
        );
    }

    #[test]
    fn test_block_read_failure_scenario() {
        let (mut device, mock) = open_mock();
        mock.fail_after(MockOp::ReadBlockPipeOut, 2, PanelErrorCode::TRANSFER_ERROR);

        let err = device
            .read_from_block_pipe_out(0xA0, 4096, Some(1024), false)
            .unwrap_err();
        assert_eq!(err.transferred(), Some(2048));
        assert_eq!(mock.count(MockOp::ReadBlockPipeOut), 3);
    }

    #[test]
    fn test_block_size_above_interface_limit() {
        let (mut device, mock) = open_mock();
        let err = device
            .read_from_block_pipe_out(0xA0, 64, Some(32768), false)
            .unwrap_err();
        assert!(matches!(err, FpgaError::InvalidLength { what: "block size", .. }));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_reset_active_low() {
        let (mut device, mock) = open_mock();
        device.reset(0x00, Duration::from_millis(1), true).unwrap();
        let writes: Vec<_> = mock
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                PanelCall::SetWireIn { addr, value, .. } => Some((addr, value)),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![(0x00, 0), (0x00, 1)]);
        assert_eq!(mock.count(MockOp::UpdateWireIns), 2);

        assert!(device.reset(0x40, Duration::ZERO, true).is_err());
    }

    #[test]
    fn test_set_led_validates_and_turns_off_on_close() {
        let (mut device, mock) = open_mock();
        assert!(matches!(
            device.set_led(0x100),
            Err(FpgaError::InvalidValue { bits: 8, .. })
        ));
        device.set_led(0xA5).unwrap();
        assert_eq!(mock.wire_in(0x00), Some(0xA5));

        device.set_wire_in(0x05, 9).unwrap();
        mock.clear_calls();
        device.close().unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                PanelCall::SetWireIn {
                    addr: 0x00,
                    value: 0,
                    mask: 0xFF
                },
                PanelCall::UpdateWireIns,
                PanelCall::Close
            ]
        );
        assert_eq!(mock.wire_in(0x05), None);
    }

    #[test]
    fn test_drop_closes_without_leds() {
        let (mut device, mock) = open_mock();
        device.set_wire_in(0x03, 3).unwrap();
        drop(device);
        assert_eq!(mock.calls(), vec![PanelCall::Close]);
        assert!(!mock.is_open());
    }

    #[test]
    fn test_register_bridge_passthrough() {
        let (mut device, mock) = open_mock();
        device.write_register(0x1000_0000, 0xDEAD_BEEF).unwrap();
        assert_eq!(mock.register(0x1000_0000), Some(0xDEAD_BEEF));
        mock.set_register(0x4, 7);
        assert_eq!(device.read_register(0x4).unwrap(), 7);
    }

    #[test]
    fn test_observer_sees_transfers_and_progress() {
        let recorder = Arc::new(Recorder::default());
        let mut device = FpgaDevice::open_with_observer(
            SimulatedPanel::new(),
            fast_config(),
            Arc::clone(&recorder),
        )
        .unwrap();

        device
            .write_to_block_pipe_in(0x80, &[7u8; 32], Some(16), false)
            .unwrap();
        let data = device
            .read_from_block_pipe_out(0xA0, 32, Some(16), false)
            .unwrap();
        assert_eq!(data.as_bytes(), &[7u8; 32]);
        device.close().unwrap();

        let events = recorder.events.lock().unwrap();
        let transfers = events
            .iter()
            .filter(|e| matches!(e, FpgaEvent::Transfer { .. }))
            .count();
        let progress = events
            .iter()
            .filter(|e| matches!(e, FpgaEvent::BlockProgress { .. }))
            .count();
        assert_eq!(transfers, 4);
        assert_eq!(progress, 4);
        assert!(matches!(events.first(), Some(FpgaEvent::DeviceOpened { .. })));
        assert!(matches!(events.last(), Some(FpgaEvent::Closed)));
    }

    #[test]
    fn test_loopback_round_trips() {
        let mut device =
            FpgaDevice::open_with_observer(SimulatedPanel::new(), fast_config(), Arc::new(NullObserver))
                .unwrap();

        device
            .set_wire_in_with(0x04, WireValue::new(0xFEED_F00D), Some(true))
            .unwrap();
        assert_eq!(device.wire_out_with(0x24, Some(true)).unwrap(), 0xFEED_F00D);

        device.write_to_pipe_in(0x83, "00112233", false).unwrap();
        let data = device.read_from_pipe_out(0xA3, 4, false).unwrap();
        assert_eq!(data, "00112233");

        device.activate_trigger_in(0x45, 0).unwrap();
        let report = device
            .check_triggered(0x65, 0x1, Duration::from_millis(100))
            .unwrap();
        assert_eq!(report.attempts, 1);
    }

    #[test]
    fn test_vadj_settings_reported_by_validate() {
        let mock = MockPanel::with_info(DeviceInfo {
            product_name: "XEM7360-K160T".into(),
            interface: DeviceInterface::Usb3,
            ..Default::default()
        });
        let mut settings = DeviceSettings::new();
        for n in 1..=3 {
            settings.set_int(crate::config::vadj_voltage_key(n), 1800);
        }
        // Rail 1 in mode 1, rails 2 and 3 in mode 2.
        settings.set_int(crate::config::VADJ_MODE_KEY, 0b10_10_01);
        mock.set_device_settings(settings);

        let device =
            FpgaDevice::open_with_observer(mock, DeviceConfig::default(), Arc::new(NullObserver))
                .unwrap();
        let warnings = device.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("VADJ1 will be set to 120 mV"));
    }

    #[test]
    fn test_validate_without_settings_support() {
        let mock = MockPanel::with_info(DeviceInfo {
            product_name: "XEM7360-K160T".into(),
            interface: DeviceInterface::Usb2,
            ..Default::default()
        });
        let device =
            FpgaDevice::open_with_observer(mock, DeviceConfig::default(), Arc::new(NullObserver))
                .unwrap();
        assert_eq!(device.validate(), vec!["Device interface is USB 2, not USB 3".to_string()]);
    }

    #[test]
    fn test_unknown_board_has_no_leds() {
        let mock = MockPanel::with_info(DeviceInfo {
            product_name: "XEM6010-LX45".into(),
            interface: DeviceInterface::Usb2,
            ..Default::default()
        });
        let mut device =
            FpgaDevice::open_with_observer(mock, DeviceConfig::default(), Arc::new(NullObserver))
                .unwrap();
        assert!(device.board().is_none());
        assert!(matches!(device.set_led(1), Err(FpgaError::Configuration { .. })));
        assert_eq!(device.default_block_size(), Some(64));
    }
}
