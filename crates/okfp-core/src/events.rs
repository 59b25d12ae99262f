//! Event system for UI decoupling.
//!
//! Lets the CLI (or any other front end) follow device activity without
//! tight coupling to the endpoint logic.

use std::fmt;
use std::path::PathBuf;

use crate::policy::AutoUpdateCategory;

/// Direction of a pipe transfer, named from the device's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeDirection {
    /// Host to device.
    In,
    /// Device to host.
    Out,
}

impl fmt::Display for PipeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeDirection::In => write!(f, "IN"),
            PipeDirection::Out => write!(f, "OUT"),
        }
    }
}

/// Events emitted by an `FpgaDevice`.
#[derive(Debug, Clone)]
pub enum FpgaEvent {
    DeviceOpened {
        product: String,
        serial: String,
    },
    /// Bitstream programmed.
    Programmed { path: PathBuf },
    AutoUpdateChanged {
        category: AutoUpdateCategory,
        enabled: bool,
    },
    /// Pending wire-ins committed in one update.
    WireInsFlushed { count: usize },
    /// A `check_triggered` wait finished, either way.
    TriggerWait {
        address: u8,
        mask: u32,
        attempts: u32,
        satisfied: bool,
    },
    /// A pipe primitive moved data.
    Transfer {
        direction: PipeDirection,
        address: u8,
        length: usize,
    },
    /// Block transfer progress, in blocks.
    BlockProgress {
        address: u8,
        current: usize,
        total: usize,
    },
    /// Self-test progress.
    SelfTest {
        stage: String,
        current: usize,
        total: usize,
    },
    Closed,
}

/// Observer trait for receiving device events.
pub trait FpgaObserver: Send + Sync {
    fn on_event(&self, event: &FpgaEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl FpgaObserver for NullObserver {
    fn on_event(&self, _event: &FpgaEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl FpgaObserver for TracingObserver {
    fn on_event(&self, event: &FpgaEvent) {
        match event {
            FpgaEvent::DeviceOpened { product, serial } => {
                tracing::info!(product = %product, serial = %serial, "Device opened");
            }
            FpgaEvent::Programmed { path } => {
                tracing::info!(path = %path.display(), "FPGA configured");
            }
            FpgaEvent::AutoUpdateChanged { category, enabled } => {
                tracing::info!(category = %category, enabled, "Auto-update changed");
            }
            FpgaEvent::WireInsFlushed { count } => {
                tracing::debug!(count, "Wire-ins flushed");
            }
            FpgaEvent::TriggerWait {
                address,
                mask,
                attempts,
                satisfied,
            } => {
                tracing::debug!(
                    addr = %format!("0x{:02X}", address),
                    mask = %format!("0x{:08X}", mask),
                    attempts,
                    satisfied,
                    "Trigger wait finished"
                );
            }
            FpgaEvent::Transfer {
                direction,
                address,
                length,
            } => {
                tracing::trace!(
                    dir = %direction,
                    addr = %format!("0x{:02X}", address),
                    len = length,
                    "Pipe transfer"
                );
            }
            FpgaEvent::BlockProgress {
                address,
                current,
                total,
            } => {
                let pct = if *total > 0 {
                    (*current * 100) / *total
                } else {
                    0
                };
                tracing::trace!(
                    addr = %format!("0x{:02X}", address),
                    progress = %format!("{}%", pct),
                    "Block progress"
                );
            }
            FpgaEvent::SelfTest {
                stage,
                current,
                total,
            } => {
                tracing::debug!(stage = %stage, "Self test {}/{}", current, total);
            }
            FpgaEvent::Closed => {
                tracing::info!("Device closed");
            }
        }
    }
}
