//! Single-transaction pipe transfers.

use tracing::debug;

use crate::codec::{self, CodecError, PipeInput};
use crate::endpoint::{DEFAULT_REORDER_WORD_SIZE, EndpointAddress, EndpointKind};
use crate::error::{FpgaError, Result};
use crate::transfer::{PipeOutData, TransferOutcome};
use crate::transport::PanelTransport;

/// Validate, convert, and optionally reorder a pipe-in payload.
///
/// Reordering applies to hex input only; raw and numeric payloads are
/// already in device order.
pub(crate) fn prepare_payload(
    addr: u8,
    input: &PipeInput<'_>,
    reorder: bool,
    word_size: usize,
) -> Result<(EndpointAddress, Vec<u8>)> {
    let addr = EndpointAddress::expect(addr, EndpointKind::PipeIn)?;
    let mut bytes = codec::to_bytes(input)?;
    if reorder && input.is_hex() {
        codec::reorder_in_place(&mut bytes, word_size)?;
    }
    if bytes.is_empty() {
        return Err(FpgaError::InvalidLength {
            what: "pipe payload length",
            length: 0,
        });
    }
    Ok((addr, bytes))
}

/// Validate a pipe-out read. A reordered read must ask for whole words.
pub(crate) fn check_read_length(
    addr: u8,
    length: usize,
    reorder_word_size: Option<usize>,
) -> Result<EndpointAddress> {
    let addr = EndpointAddress::expect(addr, EndpointKind::PipeOut)?;
    if length == 0 {
        return Err(FpgaError::InvalidLength {
            what: "pipe read length",
            length,
        });
    }
    match reorder_word_size {
        Some(0) => Err(CodecError::InvalidWordSize { word_size: 0 }.into()),
        Some(word_size) if length % word_size != 0 => Err(CodecError::OddLength {
            len: length,
            word_size,
        }
        .into()),
        _ => Ok(addr),
    }
}

#[derive(Debug, Clone)]
pub struct PipeChannel {
    word_size: usize,
}

impl Default for PipeChannel {
    fn default() -> Self {
        Self::new(DEFAULT_REORDER_WORD_SIZE)
    }
}

impl PipeChannel {
    /// `word_size` is the reorder granularity in bytes.
    pub fn new(word_size: usize) -> Self {
        Self { word_size }
    }

    pub fn word_size(&self) -> usize {
        self.word_size
    }

    /// Write a payload in one transaction. A short write is `PartialTransfer`.
    pub fn write_to_pipe_in<T: PanelTransport>(
        &self,
        transport: &mut T,
        addr: u8,
        input: &PipeInput<'_>,
        reorder: bool,
    ) -> Result<TransferOutcome> {
        let (addr, bytes) = prepare_payload(addr, input, reorder, self.word_size)?;

        let written = transport
            .write_pipe_in(addr.value(), &bytes)
            .map_err(|e| FpgaError::io("WriteToPipeIn", e))?;
        debug!(addr = %addr, requested = bytes.len(), written, "Pipe-in write");

        TransferOutcome::new(bytes.len(), written).require_complete()
    }

    /// Read `length` bytes in one transaction.
    ///
    /// A short read is returned with a `Partial` outcome.
    pub fn read_from_pipe_out<T: PanelTransport>(
        &self,
        transport: &mut T,
        addr: u8,
        length: usize,
        reorder: bool,
    ) -> Result<PipeOutData> {
        let word_size = reorder.then_some(self.word_size);
        let addr = check_read_length(addr, length, word_size)?;

        let mut buf = vec![0u8; length];
        let read = transport
            .read_pipe_out(addr.value(), &mut buf)
            .map_err(|e| FpgaError::io("ReadFromPipeOut", e))?;
        debug!(addr = %addr, requested = length, read, "Pipe-out read");

        buf.truncate(read);
        PipeOutData::new(buf, length, word_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockOp, MockPanel, PanelCall, PanelErrorCode};

    fn opened() -> MockPanel {
        let mut mock = MockPanel::new();
        mock.open("").unwrap();
        mock.clear_calls();
        mock
    }

    #[test]
    fn test_write_hex_with_reorder() {
        let mut mock = opened();
        let pipes = PipeChannel::default();

        let outcome = pipes
            .write_to_pipe_in(&mut mock, 0x80, &"AABBCCDD".into(), true)
            .unwrap();
        assert_eq!(outcome, TransferOutcome::new(4, 4));
        assert_eq!(
            mock.calls(),
            vec![PanelCall::WritePipeIn {
                addr: 0x80,
                data: vec![0xBB, 0xAA, 0xDD, 0xCC]
            }]
        );
    }

    #[test]
    fn test_write_raw_ignores_reorder() {
        let mut mock = opened();
        let pipes = PipeChannel::default();
        pipes
            .write_to_pipe_in(&mut mock, 0x81, &PipeInput::from(&[1u8, 2, 3, 4]), true)
            .unwrap();
        assert_eq!(
            mock.calls(),
            vec![PanelCall::WritePipeIn {
                addr: 0x81,
                data: vec![1, 2, 3, 4]
            }]
        );
    }

    #[test]
    fn test_write_numeric_little_endian() {
        let mut mock = opened();
        let pipes = PipeChannel::default();
        pipes
            .write_to_pipe_in(&mut mock, 0x80, &PipeInput::numeric(&[1u32, 0x0A0B0C0D]), false)
            .unwrap();
        assert_eq!(
            mock.calls(),
            vec![PanelCall::WritePipeIn {
                addr: 0x80,
                data: vec![1, 0, 0, 0, 0x0D, 0x0C, 0x0B, 0x0A]
            }]
        );
    }

    #[test]
    fn test_write_shape_errors_before_io() {
        let mut mock = opened();
        let pipes = PipeChannel::default();

        assert!(matches!(
            pipes.write_to_pipe_in(&mut mock, 0x80, &"ABC".into(), false),
            Err(FpgaError::Codec(CodecError::MalformedHexString { .. }))
        ));
        assert!(matches!(
            pipes.write_to_pipe_in(&mut mock, 0x80, &"AABBCC".into(), true),
            Err(FpgaError::Codec(CodecError::OddLength { len: 3, word_size: 2 }))
        ));
        assert!(matches!(
            pipes.write_to_pipe_in(&mut mock, 0xA0, &"AABB".into(), false),
            Err(FpgaError::InvalidAddress(_))
        ));
        assert!(matches!(
            pipes.write_to_pipe_in(&mut mock, 0x80, &"".into(), false),
            Err(FpgaError::InvalidLength { length: 0, .. })
        ));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_short_write_is_partial_transfer() {
        let mut mock = opened();
        mock.limit_transfers(2);
        let err = PipeChannel::default()
            .write_to_pipe_in(&mut mock, 0x80, &"01020304".into(), false)
            .unwrap_err();
        assert!(matches!(
            err,
            FpgaError::PartialTransfer {
                requested: 4,
                transferred: 2
            }
        ));
    }

    #[test]
    fn test_transport_error_is_distinct_from_partial() {
        let mut mock = opened();
        mock.fail_after(MockOp::WritePipeIn, 0, PanelErrorCode::FIFO_OVERFLOW);
        let err = PipeChannel::default()
            .write_to_pipe_in(&mut mock, 0x80, &"0102".into(), false)
            .unwrap_err();
        assert!(matches!(err, FpgaError::DeviceIo { transferred: 0, .. }));
    }

    #[test]
    fn test_read_with_reorder() {
        let mut mock = opened();
        mock.queue_pipe_out(0xA0, &[0xBB, 0xAA, 0xDD, 0xCC]);

        let data = PipeChannel::default()
            .read_from_pipe_out(&mut mock, 0xA0, 4, true)
            .unwrap();
        assert_eq!(data, "AABBCCDD");
        assert_eq!(data.as_bytes(), &[0xBB, 0xAA, 0xDD, 0xCC]);
        assert_eq!(mock.calls(), vec![PanelCall::ReadPipeOut { addr: 0xA0, len: 4 }]);
    }

    #[test]
    fn test_read_validation() {
        let mut mock = opened();
        let pipes = PipeChannel::default();
        assert!(matches!(
            pipes.read_from_pipe_out(&mut mock, 0xA0, 0, false),
            Err(FpgaError::InvalidLength { .. })
        ));
        assert!(matches!(
            pipes.read_from_pipe_out(&mut mock, 0x80, 4, false),
            Err(FpgaError::InvalidAddress(_))
        ));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_reordered_read_rejects_ragged_length_before_io() {
        let mut mock = opened();
        mock.queue_pipe_out(0xA0, &[1, 2, 3, 4]);
        let pipes = PipeChannel::default();

        assert!(matches!(
            pipes.read_from_pipe_out(&mut mock, 0xA0, 3, true),
            Err(FpgaError::Codec(CodecError::OddLength { len: 3, word_size: 2 }))
        ));
        assert!(mock.calls().is_empty());

        // Unreordered reads of any length are fine and the queue is intact.
        let data = pipes.read_from_pipe_out(&mut mock, 0xA0, 3, false).unwrap();
        assert_eq!(data.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_short_reordered_read_keeps_ragged_tail() {
        let mut mock = opened();
        mock.limit_transfers(3);
        mock.queue_pipe_out(0xA2, &[0xBB, 0xAA, 0xCC, 0xDD]);

        let data = PipeChannel::default()
            .read_from_pipe_out(&mut mock, 0xA2, 4, true)
            .unwrap();
        assert!(data.is_partial());
        assert_eq!(data.as_bytes(), &[0xBB, 0xAA, 0xCC]);
        assert_eq!(data, "AABBCC");
    }

    #[test]
    fn test_short_read_reports_partial() {
        let mut mock = opened();
        mock.limit_transfers(4);
        mock.queue_pipe_out(0xA1, &[1, 2, 3, 4, 5, 6, 7, 8]);

        let data = PipeChannel::default()
            .read_from_pipe_out(&mut mock, 0xA1, 8, false)
            .unwrap();
        assert!(data.is_partial());
        assert_eq!(data.outcome(), TransferOutcome::new(8, 4));
        assert_eq!(data.as_bytes(), &[1, 2, 3, 4]);
    }
}
