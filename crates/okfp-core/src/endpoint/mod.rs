//! Endpoint definitions: address map and classification.

pub mod address;
pub mod constants;

pub use address::{EndpointAddress, EndpointKind, InvalidAddress, classify};
pub use constants::*;
