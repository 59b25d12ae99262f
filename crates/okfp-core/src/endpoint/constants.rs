// Endpoint address map (one 32-entry bank per category)
pub const WIRE_IN_START: u8 = 0x00;
pub const WIRE_IN_END: u8 = 0x1F;
pub const WIRE_OUT_START: u8 = 0x20;
pub const WIRE_OUT_END: u8 = 0x3F;
pub const TRIGGER_IN_START: u8 = 0x40;
pub const TRIGGER_IN_END: u8 = 0x5F;
pub const TRIGGER_OUT_START: u8 = 0x60;
pub const TRIGGER_OUT_END: u8 = 0x7F;
pub const PIPE_IN_START: u8 = 0x80;
pub const PIPE_IN_END: u8 = 0x9F;
pub const PIPE_OUT_START: u8 = 0xA0;
pub const PIPE_OUT_END: u8 = 0xBF;

/// Highest address that belongs to any endpoint bank.
pub const LAST_ENDPOINT: u8 = PIPE_OUT_END;

/// Endpoints per bank.
pub const BANK_SIZE: usize = 32;

// Register widths
pub const WIRE_WIDTH: u32 = 32;
pub const TRIGGER_WIDTH: u32 = 32;
pub const PIPE_WIDTH: u32 = 32;

pub const FULL_MASK: u32 = 0xFFFF_FFFF;

// Block-throttled pipe limits per host interface
pub const USB2_MAX_BLOCK_SIZE: usize = 64;
pub const PCIE_MAX_BLOCK_SIZE: usize = 1024;
pub const USB3_MAX_BLOCK_SIZE: usize = 16384;

// Timing
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
pub const DEFAULT_TRIGGER_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_RESET_TIME_MS: u64 = 1000;

/// Byte-swap granularity used when reordering hex strings for the device.
pub const DEFAULT_REORDER_WORD_SIZE: usize = 2;
