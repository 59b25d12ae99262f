//! Wire endpoints: level-held 32-bit registers.

use std::collections::BTreeMap;

use tracing::debug;

use crate::endpoint::{EndpointAddress, EndpointKind, FULL_MASK};
use crate::error::{FpgaError, Result};
use crate::transport::PanelTransport;

/// A wire-in value and the bits of it to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireValue {
    pub value: u32,
    pub mask: u32,
}

impl WireValue {
    pub fn new(value: u32) -> Self {
        Self::masked(value, FULL_MASK)
    }

    pub fn masked(value: u32, mask: u32) -> Self {
        Self { value, mask }
    }
}

impl From<u32> for WireValue {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

/// Pending wire-in set plus wire-out reads.
///
/// Setting the same address twice before a flush keeps only the later value.
#[derive(Debug, Default)]
pub struct WireChannel {
    pending: BTreeMap<u8, WireValue>,
}

impl WireChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a wire-in write, flushing the whole set when `flush` is true.
    ///
    /// Returns the number of values committed if a flush happened.
    pub fn set_wire_in<T: PanelTransport>(
        &mut self,
        transport: &mut T,
        addr: u8,
        value: WireValue,
        flush: bool,
    ) -> Result<Option<usize>> {
        let addr = EndpointAddress::expect(addr, EndpointKind::WireIn)?;
        debug!(addr = %addr, value = %format!("0x{:08X}", value.value), mask = %format!("0x{:08X}", value.mask), "Wire-in queued");
        self.pending.insert(addr.value(), value);
        if flush {
            return self.update_wire_ins(transport).map(Some);
        }
        Ok(None)
    }

    /// Write every pending value and commit them with one update.
    ///
    /// The pending set survives a failure so the caller can retry.
    pub fn update_wire_ins<T: PanelTransport>(&mut self, transport: &mut T) -> Result<usize> {
        for (&addr, wire) in &self.pending {
            transport
                .set_wire_in(addr, wire.value, wire.mask)
                .map_err(|e| FpgaError::io("SetWireInValue", e))?;
        }
        transport
            .update_wire_ins()
            .map_err(|e| FpgaError::io("UpdateWireIns", e))?;

        let count = self.pending.len();
        self.pending.clear();
        Ok(count)
    }

    /// Read a wire-out, refreshing all wire-outs first when `refresh` is true.
    pub fn wire_out<T: PanelTransport>(
        &self,
        transport: &mut T,
        addr: u8,
        refresh: bool,
    ) -> Result<u32> {
        let addr = EndpointAddress::expect(addr, EndpointKind::WireOut)?;
        if refresh {
            self.update_wire_outs(transport)?;
        }
        let value = transport
            .wire_out(addr.value())
            .map_err(|e| FpgaError::io("GetWireOutValue", e))?;
        debug!(addr = %addr, value = %format!("0x{:08X}", value), "Wire-out read");
        Ok(value)
    }

    pub fn update_wire_outs<T: PanelTransport>(&self, transport: &mut T) -> Result<()> {
        transport
            .update_wire_outs()
            .map_err(|e| FpgaError::io("UpdateWireOuts", e))
    }

    pub fn pending(&self) -> impl Iterator<Item = (u8, WireValue)> + '_ {
        self.pending.iter().map(|(&addr, &value)| (addr, value))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop queued writes without sending them.
    pub fn discard(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::InvalidAddress;
    use crate::transport::{MockOp, MockPanel, PanelCall, PanelErrorCode};

    fn opened() -> MockPanel {
        let mut mock = MockPanel::new();
        mock.open("").unwrap();
        mock.clear_calls();
        mock
    }

    #[test]
    fn test_single_write_then_flush() {
        let mut mock = opened();
        let mut wires = WireChannel::new();

        wires
            .set_wire_in(&mut mock, 0x00, WireValue::new(0x1234_5678), false)
            .unwrap();
        assert!(mock.calls().is_empty());

        assert_eq!(wires.update_wire_ins(&mut mock).unwrap(), 1);
        assert_eq!(
            mock.calls(),
            vec![
                PanelCall::SetWireIn {
                    addr: 0x00,
                    value: 0x1234_5678,
                    mask: 0xFFFF_FFFF
                },
                PanelCall::UpdateWireIns,
            ]
        );
        assert_eq!(wires.pending_len(), 0);
    }

    #[test]
    fn test_last_write_wins() {
        let mut mock = opened();
        let mut wires = WireChannel::new();

        wires.set_wire_in(&mut mock, 0x03, WireValue::new(0xAAAA), false).unwrap();
        wires.set_wire_in(&mut mock, 0x03, WireValue::new(0x5555), false).unwrap();
        wires.update_wire_ins(&mut mock).unwrap();

        let writes: Vec<_> = mock
            .calls()
            .into_iter()
            .filter(|c| c.op() == MockOp::SetWireIn)
            .collect();
        assert_eq!(
            writes,
            vec![PanelCall::SetWireIn {
                addr: 0x03,
                value: 0x5555,
                mask: 0xFFFF_FFFF
            }]
        );
        assert_eq!(mock.wire_in(0x03), Some(0x5555));
    }

    #[test]
    fn test_auto_flush_sends_whole_set() {
        let mut mock = opened();
        let mut wires = WireChannel::new();

        wires.set_wire_in(&mut mock, 0x01, WireValue::new(1), false).unwrap();
        let flushed = wires
            .set_wire_in(&mut mock, 0x02, WireValue::masked(2, 0xF), true)
            .unwrap();
        assert_eq!(flushed, Some(2));

        assert_eq!(mock.count(MockOp::SetWireIn), 2);
        assert_eq!(mock.count(MockOp::UpdateWireIns), 1);
        assert_eq!(wires.pending_len(), 0);
    }

    #[test]
    fn test_wrong_range_rejected_before_io() {
        let mut mock = opened();
        let mut wires = WireChannel::new();

        let err = wires
            .set_wire_in(&mut mock, 0x25, WireValue::new(1), true)
            .unwrap_err();
        assert!(matches!(
            err,
            FpgaError::InvalidAddress(InvalidAddress::WrongKind { address: 0x25, .. })
        ));
        assert!(wires.wire_out(&mut mock, 0x05, true).is_err());
        assert!(mock.calls().is_empty());
        assert_eq!(wires.pending_len(), 0);
    }

    #[test]
    fn test_failed_flush_keeps_pending() {
        let mut mock = opened();
        let mut wires = WireChannel::new();
        mock.fail_after(MockOp::UpdateWireIns, 0, PanelErrorCode::COMMUNICATION_ERROR);

        wires.set_wire_in(&mut mock, 0x07, WireValue::new(7), false).unwrap();
        let err = wires.update_wire_ins(&mut mock).unwrap_err();
        assert!(matches!(err, FpgaError::DeviceIo { op: "UpdateWireIns", .. }));
        assert_eq!(wires.pending_len(), 1);

        // Retry succeeds with the same set.
        assert_eq!(wires.update_wire_ins(&mut mock).unwrap(), 1);
        assert_eq!(mock.wire_in(0x07), Some(7));
    }

    #[test]
    fn test_wire_out_refresh_is_optional() {
        let mut mock = opened();
        let wires = WireChannel::new();
        mock.set_wire_out(0x21, 0xCAFE);

        assert_eq!(wires.wire_out(&mut mock, 0x21, false).unwrap(), 0xCAFE);
        assert_eq!(mock.count(MockOp::UpdateWireOuts), 0);

        wires.wire_out(&mut mock, 0x21, true).unwrap();
        assert_eq!(
            mock.calls()[1..],
            [PanelCall::UpdateWireOuts, PanelCall::WireOut { addr: 0x21 }]
        );
    }

    #[test]
    fn test_discard() {
        let mut mock = opened();
        let mut wires = WireChannel::new();
        wires.set_wire_in(&mut mock, 0x00, WireValue::new(1), false).unwrap();
        wires.set_wire_in(&mut mock, 0x1F, WireValue::new(2), false).unwrap();
        assert_eq!(wires.pending().map(|(a, _)| a).collect::<Vec<_>>(), vec![0x00, 0x1F]);
        assert_eq!(wires.discard(), 2);
        assert!(mock.calls().is_empty());
    }
}
