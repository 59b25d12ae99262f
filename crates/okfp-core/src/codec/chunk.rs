//! Block chunking for block-throttled pipes.
//!
//! Writes are padded with zeros up to a whole block; reads request whole
//! blocks and are truncated back to the requested length.

use super::CodecError;

/// Number of blocks needed to carry `total` bytes.
pub fn block_count(total: usize, block_size: usize) -> usize {
    if block_size == 0 {
        return 0;
    }
    total.div_ceil(block_size)
}

/// Split `data` into `block_size` blocks; the final block may be short.
pub fn chunk(data: &[u8], block_size: usize) -> Result<BlockChunks<'_>, CodecError> {
    if block_size == 0 {
        return Err(CodecError::InvalidBlockSize { block_size });
    }
    Ok(BlockChunks::new(data, block_size))
}

/// Zero-pad `data` to a whole number of blocks.
pub fn pad_to_block(mut data: Vec<u8>, block_size: usize) -> Result<Vec<u8>, CodecError> {
    if block_size == 0 {
        return Err(CodecError::InvalidBlockSize { block_size });
    }
    let padded = block_count(data.len(), block_size) * block_size;
    data.resize(padded, 0);
    Ok(data)
}

/// Concatenate blocks in order and truncate to `total` bytes.
pub fn unchunk<I, B>(blocks: I, total: usize) -> Vec<u8>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut out = Vec::with_capacity(total);
    for block in blocks {
        out.extend_from_slice(block.as_ref());
    }
    out.truncate(total);
    out
}

/// Iterator over fixed-size blocks of a buffer.
#[derive(Debug, Clone)]
pub struct BlockChunks<'a> {
    data: &'a [u8],
    block_size: usize,
    offset: usize,
    current: usize,
}

impl<'a> BlockChunks<'a> {
    fn new(data: &'a [u8], block_size: usize) -> Self {
        Self {
            data,
            block_size,
            offset: 0,
            current: 0,
        }
    }

    /// Total number of blocks (including a short final block).
    pub fn total(&self) -> usize {
        block_count(self.data.len(), self.block_size)
    }

    /// Index of the next block to be yielded.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Bytes handed out so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.total()
    }
}

impl<'a> Iterator for BlockChunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }

        let remaining = self.data.len() - self.offset;
        let len = remaining.min(self.block_size);

        let block = &self.data[self.offset..self.offset + len];
        self.offset += len;
        self.current += 1;

        Some(block)
    }
}
