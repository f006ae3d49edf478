//! Intel-HEX decoding and program-memory block assembly
//!
//! Records are decoded line by line and regrouped into 64-slot blocks that
//! the programming bridge writes as one row burst.

mod assembler;
mod block;
pub mod dump;
mod error;
mod record;

pub use assembler::{Assembler, AssemblerConfig, FirmwareImage, assemble};
pub use block::{ConfigAddresses, ConfigPair, ConfigWord, MemoryBlock};
pub use error::{ParseError, Result};
pub use record::{Record, RecordType};

/// Number of instruction slots in one block
pub const BLOCK_SLOTS: usize = 64;

/// Word-address distance between two consecutive instruction slots
pub const SLOT_STRIDE: u32 = 2;

/// Word-address span covered by one block
pub const BLOCK_SPAN: u32 = BLOCK_SLOTS as u32 * SLOT_STRIDE;

/// Highest word address a block may start at and still have a successor
pub const MAX_BLOCK_START: u32 = u32::MAX - BLOCK_SPAN;

/// Value of a slot the image never wrote ("unprogrammed" flash)
pub const UNPROGRAMMED: u32 = 0xFFFF_FFFF;

/// Size in bytes of one instruction chunk in a data record
pub const INSTRUCTION_BYTES: usize = 4;

/// Default word address of configuration word 1
pub const CW1_ADDRESS: u32 = 0xABFE;

/// Default word address of configuration word 2
pub const CW2_ADDRESS: u32 = 0xABFC;
