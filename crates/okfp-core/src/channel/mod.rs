//! Endpoint channels.
//!
//! Each channel validates addresses and inputs before touching the
//! transport, then forwards to the collaborator. Auto-update decisions are
//! made by the caller and passed in as plain booleans.

pub mod block;
pub mod pipe;
pub mod trigger;
pub mod wire;

pub use block::BlockPipeChannel;
pub use pipe::PipeChannel;
pub use trigger::TriggerChannel;
pub use wire::{WireChannel, WireValue};
