//! Block-throttled pipe transfers.
//!
//! Large payloads are moved one block per collaborator call. Writes pad the
//! final block with zeros; reads request whole blocks and truncate. A failing
//! block stops the transfer and the error carries the bytes already moved.

use tracing::{debug, warn};

use super::pipe::{PipeChannel, check_read_length, prepare_payload};
use crate::codec::{self, PipeInput};
use crate::error::{FpgaError, Result};
use crate::transfer::{PipeOutData, TransferOutcome};
use crate::transport::PanelTransport;

#[derive(Debug, Clone, Default)]
pub struct BlockPipeChannel {
    pipe: PipeChannel,
    max_block_size: Option<usize>,
}

impl BlockPipeChannel {
    /// `max_block_size` is the interface limit, if known.
    pub fn new(pipe: PipeChannel, max_block_size: Option<usize>) -> Self {
        Self {
            pipe,
            max_block_size,
        }
    }

    pub fn max_block_size(&self) -> Option<usize> {
        self.max_block_size
    }

    fn check_block_size(&self, block_size: usize) -> Result<()> {
        let too_big = self.max_block_size.is_some_and(|max| block_size > max);
        if block_size == 0 || too_big {
            return Err(FpgaError::InvalidLength {
                what: "block size",
                length: block_size,
            });
        }
        Ok(())
    }

    /// Write `input` in `block_size` blocks.
    ///
    /// `progress` is called with (blocks done, total blocks) after each block.
    pub fn write_to_block_pipe_in<T, F>(
        &self,
        transport: &mut T,
        addr: u8,
        input: &PipeInput<'_>,
        block_size: usize,
        reorder: bool,
        mut progress: F,
    ) -> Result<TransferOutcome>
    where
        T: PanelTransport,
        F: FnMut(usize, usize),
    {
        let (addr, bytes) = prepare_payload(addr, input, reorder, self.pipe.word_size())?;
        self.check_block_size(block_size)?;

        let requested = bytes.len();
        let padded = codec::pad_to_block(bytes, block_size)?;
        let blocks = codec::chunk(&padded, block_size)?;
        let total = blocks.total();
        debug!(addr = %addr, requested, block_size, blocks = total, "Block pipe-in write");

        let mut transferred = 0usize;
        for (index, block) in blocks.enumerate() {
            let current = index + 1;
            let written = transport
                .write_block_pipe_in(addr.value(), block_size, block)
                .map_err(|e| FpgaError::device_io("WriteToBlockPipeIn", transferred, e))?;
            transferred += written;
            progress(current, total);

            if written < block.len() {
                warn!(addr = %addr, block = current, written, "Short block write");
                break;
            }
        }

        TransferOutcome::new(requested, transferred.min(requested)).require_complete()
    }

    /// Read `length` bytes in `block_size` blocks.
    ///
    /// A short block ends the read; what arrived is returned with a `Partial`
    /// outcome.
    pub fn read_from_block_pipe_out<T, F>(
        &self,
        transport: &mut T,
        addr: u8,
        length: usize,
        block_size: usize,
        reorder: bool,
        mut progress: F,
    ) -> Result<PipeOutData>
    where
        T: PanelTransport,
        F: FnMut(usize, usize),
    {
        let word_size = reorder.then_some(self.pipe.word_size());
        let addr = check_read_length(addr, length, word_size)?;
        self.check_block_size(block_size)?;

        let total = codec::block_count(length, block_size);
        let mut buf = vec![0u8; total * block_size];
        debug!(addr = %addr, length, block_size, blocks = total, "Block pipe-out read");

        let mut transferred = 0usize;
        for (index, block) in buf.chunks_mut(block_size).enumerate() {
            let read = transport
                .read_block_pipe_out(addr.value(), block_size, block)
                .map_err(|e| FpgaError::device_io("ReadFromBlockPipeOut", transferred, e))?;
            transferred += read;
            progress(index + 1, total);

            if read < block_size {
                warn!(addr = %addr, block = index + 1, read, "Short block read");
                break;
            }
        }

        buf.truncate(transferred.min(length));
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

    fn usb3() -> BlockPipeChannel {
        BlockPipeChannel::new(PipeChannel::default(), Some(16384))
    }

    #[test]
    fn test_read_issues_one_call_per_block() {
        let mut mock = opened();
        let pattern: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        mock.queue_pipe_out(0xA0, &pattern);

        let mut seen = Vec::new();
        let data = usb3()
            .read_from_block_pipe_out(&mut mock, 0xA0, 4096, 1024, false, |done, total| {
                seen.push((done, total))
            })
            .unwrap();

        assert_eq!(data.as_bytes(), pattern.as_slice());
        assert_eq!(
            mock.calls(),
            vec![
                PanelCall::ReadBlockPipeOut {
                    addr: 0xA0,
                    block_size: 1024,
                    len: 1024
                };
                4
            ]
        );
        assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_read_failure_reports_cumulative_bytes() {
        let mut mock = opened();
        mock.fail_after(MockOp::ReadBlockPipeOut, 2, PanelErrorCode::TRANSFER_ERROR);

        let err = usb3()
            .read_from_block_pipe_out(&mut mock, 0xA0, 4096, 1024, false, |_, _| {})
            .unwrap_err();
        assert!(matches!(
            err,
            FpgaError::DeviceIo {
                op: "ReadFromBlockPipeOut",
                transferred: 2048,
                ..
            }
        ));
        assert_eq!(err.transferred(), Some(2048));
        assert_eq!(mock.count(MockOp::ReadBlockPipeOut), 3);
    }

    #[test]
    fn test_read_truncates_last_block() {
        let mut mock = opened();
        mock.queue_pipe_out(0xA2, &[0x11; 2048]);

        let data = usb3()
            .read_from_block_pipe_out(&mut mock, 0xA2, 1500, 1024, false, |_, _| {})
            .unwrap();
        assert_eq!(data.len(), 1500);
        assert!(!data.is_partial());
        assert_eq!(mock.count(MockOp::ReadBlockPipeOut), 2);
    }

    #[test]
    fn test_write_pads_final_block() {
        let mut mock = opened();
        let payload = vec![0xEEu8; 1500];

        let outcome = usb3()
            .write_to_block_pipe_in(&mut mock, 0x80, &PipeInput::from(&payload), 1024, false, |_, _| {})
            .unwrap();
        assert_eq!(outcome, TransferOutcome::new(1500, 1500));

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        match &calls[1] {
            PanelCall::WriteBlockPipeIn {
                block_size, data, ..
            } => {
                assert_eq!(*block_size, 1024);
                assert_eq!(data.len(), 1024);
                assert!(data[..476].iter().all(|&b| b == 0xEE));
                assert!(data[476..].iter().all(|&b| b == 0));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_write_failure_mid_stream() {
        let mut mock = opened();
        mock.fail_after(MockOp::WriteBlockPipeIn, 1, PanelErrorCode::FIFO_OVERFLOW);
        let payload = vec![1u8; 3000];

        let err = usb3()
            .write_to_block_pipe_in(&mut mock, 0x80, &PipeInput::from(&payload), 1024, false, |_, _| {})
            .unwrap_err();
        assert_eq!(err.transferred(), Some(1024));
    }

    #[test]
    fn test_block_size_limits() {
        let mut mock = opened();
        let channel = BlockPipeChannel::new(PipeChannel::default(), Some(64));

        assert!(matches!(
            channel.read_from_block_pipe_out(&mut mock, 0xA0, 128, 0, false, |_, _| {}),
            Err(FpgaError::InvalidLength { what: "block size", length: 0 })
        ));
        assert!(matches!(
            channel.read_from_block_pipe_out(&mut mock, 0xA0, 128, 128, false, |_, _| {}),
            Err(FpgaError::InvalidLength { length: 128, .. })
        ));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_reordered_block_read_rejects_ragged_length_before_io() {
        let mut mock = opened();
        mock.queue_pipe_out(0xA0, &[0x5A; 1024]);

        let err = usb3()
            .read_from_block_pipe_out(&mut mock, 0xA0, 1023, 1024, true, |_, _| {})
            .unwrap_err();
        assert!(matches!(
            err,
            FpgaError::Codec(crate::codec::CodecError::OddLength {
                len: 1023,
                word_size: 2
            })
        ));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_short_block_read_is_partial() {
        let mut mock = opened();
        mock.limit_transfers(512);

        let data = usb3()
            .read_from_block_pipe_out(&mut mock, 0xA0, 2048, 1024, false, |_, _| {})
            .unwrap();
        assert!(data.is_partial());
        assert_eq!(data.len(), 512);
        assert_eq!(mock.count(MockOp::ReadBlockPipeOut), 1);
    }
}
