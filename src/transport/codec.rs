//! Wire codec for the programming bridge
//!
//! Every command is a single ASCII byte. Payloads are big-endian integers:
//! addresses and instruction slots take 4 bytes, configuration words 2.

use std::fmt;
use std::io::{self, ErrorKind, Read};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::TransportError;
use crate::hex::{BLOCK_SLOTS, ConfigPair, MemoryBlock};

/// Size of an encoded word address
pub const ADDRESS_BYTES: usize = 4;

/// Size of an encoded instruction slot
pub const SLOT_BYTES: usize = 4;

/// Size of an encoded configuration word
pub const CONFIG_WORD_BYTES: usize = 2;

/// Size of the 64-slot block burst
pub const BLOCK_PAYLOAD_BYTES: usize = BLOCK_SLOTS * SLOT_BYTES;

/// Size of the back-to-back configuration word pair
pub const CONFIG_PAYLOAD_BYTES: usize = 2 * CONFIG_WORD_BYTES;

/// Command bytes understood by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Wake the bridge before the first transfer
    Wake = b'A',
    /// Begin an instruction-block transfer
    InstructionBlock = b'i',
    /// Begin a configuration-word transfer
    ConfigWrite = b'c',
}

impl Command {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'A' => Some(Self::Wake),
            b'i' => Some(Self::InstructionBlock),
            b'c' => Some(Self::ConfigWrite),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wake => "Wake",
            Self::InstructionBlock => "InstructionBlock",
            Self::ConfigWrite => "ConfigWrite",
        };
        write!(f, "{name}")
    }
}

/// Acknowledgement byte returned by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack(u8);

impl Ack {
    /// Wrap a received byte
    #[must_use]
    pub const fn new(byte: u8) -> Self {
        Self(byte)
    }

    /// Raw byte value
    #[must_use]
    pub const fn byte(self) -> u8 {
        self.0
    }
}

/// Encode a word address
#[must_use]
pub fn encode_address(address: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(ADDRESS_BYTES);
    buf.put_u32(address);
    buf.freeze()
}

/// Encode all 64 slots of a block in address order
#[must_use]
pub fn encode_block_payload(block: &MemoryBlock) -> Bytes {
    let mut buf = BytesMut::with_capacity(BLOCK_PAYLOAD_BYTES);
    for &slot in block.slots() {
        buf.put_u32(slot);
    }
    buf.freeze()
}

/// Encode configuration word 1 followed by word 2
#[must_use]
pub fn encode_config_words(config: ConfigPair) -> Bytes {
    let mut buf = BytesMut::with_capacity(CONFIG_PAYLOAD_BYTES);
    buf.put_u16(config.cw1);
    buf.put_u16(config.cw2);
    buf.freeze()
}

/// Decode a word address
pub fn decode_address(mut bytes: &[u8]) -> Result<u32, TransportError> {
    ensure_len(bytes, ADDRESS_BYTES)?;
    Ok(bytes.get_u32())
}

/// Rebuild a block from its address frame and 64-slot burst
pub fn decode_block(address: &[u8], mut payload: &[u8]) -> Result<MemoryBlock, TransportError> {
    let first_address = decode_address(address)?;
    ensure_len(payload, BLOCK_PAYLOAD_BYTES)?;
    let mut slots = [0u32; BLOCK_SLOTS];
    for slot in &mut slots {
        *slot = payload.get_u32();
    }
    Ok(MemoryBlock::from_slots(first_address, slots))
}

/// Decode the configuration word pair
pub fn decode_config_words(mut bytes: &[u8]) -> Result<ConfigPair, TransportError> {
    ensure_len(bytes, CONFIG_PAYLOAD_BYTES)?;
    let cw1 = bytes.get_u16();
    let cw2 = bytes.get_u16();
    Ok(ConfigPair { cw1, cw2 })
}

/// Read one acknowledgement byte
///
/// The wait is bounded by the reader's own timeout. Returns `Ok(None)` when
/// that timeout expires or the reader reports end of stream; the byte's value
/// is not interpreted here.
pub fn read_ack<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<Ack>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(Ack(byte[0]))),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Ok(None);
            }
            Err(err) => return Err(err),
        }
    }
}

fn ensure_len(bytes: &[u8], needed: usize) -> Result<(), TransportError> {
    if bytes.len() < needed {
        return Err(TransportError::BufferTooSmall {
            needed,
            got: bytes.len(),
        });
    }
    Ok(())
}
