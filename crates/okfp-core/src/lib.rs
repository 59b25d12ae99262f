//! okfp-core: endpoint operations and data marshalling for FrontPanel-style
//! FPGA boards.
//!
//! The board is reached through a vendor device-interface library that
//! exposes wires, triggers, pipes, and a register bridge keyed by endpoint
//! address. This crate sits on top of that library: it validates addresses,
//! decides when wire and trigger state is flushed or refreshed, polls
//! triggers with a timeout, and converts pipe payloads between hex strings,
//! numeric arrays, and raw bytes.
//!
//! # Architecture
//!
//! - **Endpoint**: address map and classification
//! - **Codec**: hex, byte reordering, numeric arrays, block chunking
//! - **Policy**: auto-update flags and their per-call resolution
//! - **Channel**: wire, trigger, pipe, and block-pipe operations
//! - **Transport**: the device-interface boundary (mock, simulated)
//! - **Device**: the `FpgaDevice` handle tying it all together
//! - **Events**: observer pattern for UI decoupling
//! - **Bist**: loop-back self test
//!
//! # Example
//!
//! ```no_run
//! use okfp_core::{DeviceConfig, FpgaDevice, SimulatedPanel};
//!
//! let mut fpga = FpgaDevice::open(SimulatedPanel::new(), DeviceConfig::default())?;
//! fpga.set_wire_in_auto_update(true);
//! fpga.set_wire_in(0x00, 0x1234_5678)?;
//! fpga.write_to_pipe_in(0x80, "AABBCCDD", true)?;
//! let data = fpga.read_from_pipe_out(0xA0, 4, true)?;
//! println!("{}", data);
//! fpga.close()?;
//! # Ok::<(), okfp_core::FpgaError>(())
//! ```

pub mod bist;
pub mod channel;
pub mod codec;
pub mod config;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod info;
pub mod policy;
pub mod poll;
pub mod transfer;
pub mod transport;

// Re-exports for convenience
pub use bist::{BistOptions, BistReport, BistResult};
pub use channel::WireValue;
pub use codec::{CodecError, PipeElement, PipeInput};
pub use config::{BoardConfig, BoardModel, DeviceConfig};
pub use device::FpgaDevice;
pub use endpoint::{EndpointAddress, EndpointKind, InvalidAddress, classify};
pub use error::{FpgaError, Result};
pub use events::{FpgaEvent, FpgaObserver, NullObserver, PipeDirection, TracingObserver};
pub use info::{DeviceInfo, DeviceInterface, DeviceSettings, UsbSpeed};
pub use policy::{AutoUpdateCategory, AutoUpdatePolicy};
pub use poll::{PollReport, PollStatus};
pub use transfer::{PipeOutData, TransferOutcome, TransferStatus};
pub use transport::{
    MockPanel, PanelErrorCode, PanelTransport, SimulatedPanel, TransportError,
};
