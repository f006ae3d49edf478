//! Program-memory blocks and configuration words

use super::{BLOCK_SLOTS, BLOCK_SPAN, CW1_ADDRESS, CW2_ADDRESS, SLOT_STRIDE, UNPROGRAMMED};

/// One row of 64 instruction slots, written to the target as a single burst
///
/// Slot `n` holds the instruction at word address `first_address + 2 * n`.
/// Slots the image never wrote keep the [`UNPROGRAMMED`] marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    first_address: u32,
    slots: [u32; BLOCK_SLOTS],
    written: u64,
}

impl MemoryBlock {
    /// Create an empty block starting at `first_address`
    #[must_use]
    pub const fn new(first_address: u32) -> Self {
        Self {
            first_address,
            slots: [UNPROGRAMMED; BLOCK_SLOTS],
            written: 0,
        }
    }

    /// Rebuild a block from a full set of slot values
    ///
    /// Slots holding [`UNPROGRAMMED`] are treated as never written.
    #[must_use]
    pub fn from_slots(first_address: u32, slots: [u32; BLOCK_SLOTS]) -> Self {
        let written = slots
            .iter()
            .enumerate()
            .filter(|(_, value)| **value != UNPROGRAMMED)
            .fold(0u64, |mask, (index, _)| mask | (1 << index));
        Self {
            first_address,
            slots,
            written,
        }
    }

    /// Word address of slot 0
    #[must_use]
    pub const fn first_address(&self) -> u32 {
        self.first_address
    }

    /// Word address of slot 63
    ///
    /// Saturates at `u32::MAX` for blocks starting above [`super::MAX_BLOCK_START`].
    #[must_use]
    pub const fn last_address(&self) -> u32 {
        self.first_address.saturating_add(BLOCK_SPAN - SLOT_STRIDE)
    }

    /// First address of the block that directly follows this one
    ///
    /// Saturates at `u32::MAX` for blocks starting above [`super::MAX_BLOCK_START`].
    #[must_use]
    pub const fn next_address(&self) -> u32 {
        self.first_address.saturating_add(BLOCK_SPAN)
    }

    /// All 64 slot values in address order
    #[must_use]
    pub const fn slots(&self) -> &[u32; BLOCK_SLOTS] {
        &self.slots
    }

    /// Number of distinct slots written
    #[must_use]
    pub const fn filled_count(&self) -> usize {
        self.written.count_ones() as usize
    }

    /// Whether every slot has been written
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.filled_count() == BLOCK_SLOTS
    }

    /// Whether `address` lies in `[first_address, last_address]`
    #[must_use]
    pub const fn contains(&self, address: u32) -> bool {
        address >= self.first_address && address - self.first_address < BLOCK_SPAN
    }

    /// Slot index for `address`, if it falls inside this block
    #[must_use]
    pub const fn slot_index(&self, address: u32) -> Option<usize> {
        if self.contains(address) {
            Some(((address - self.first_address) / SLOT_STRIDE) as usize)
        } else {
            None
        }
    }

    /// Whether the slot at `index` has been written
    #[must_use]
    pub const fn is_written(&self, index: usize) -> bool {
        index < BLOCK_SLOTS && self.written & (1 << index) != 0
    }

    /// Store `value` at `address`
    ///
    /// Returns the previous value when the slot had already been written, or
    /// `None` when the address is outside the block or the slot was fresh.
    /// Out-of-range addresses leave the block untouched.
    pub fn store(&mut self, address: u32, value: u32) -> Option<u32> {
        let index = self.slot_index(address)?;
        let previous = self.is_written(index).then_some(self.slots[index]);
        self.slots[index] = value;
        self.written |= 1 << index;
        previous
    }

    /// Slot value at `address`, if it falls inside this block
    #[must_use]
    pub fn get(&self, address: u32) -> Option<u32> {
        self.slot_index(address).map(|index| self.slots[index])
    }
}

/// Word addresses of the two configuration registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfigAddresses {
    /// Configuration word 1
    pub cw1: u32,
    /// Configuration word 2, also the addressing anchor of the config write
    pub cw2: u32,
}

impl ConfigAddresses {
    /// Which configuration word, if any, lives at `address`
    #[must_use]
    pub const fn matches(&self, address: u32) -> Option<ConfigWord> {
        if address == self.cw1 {
            Some(ConfigWord::Cw1)
        } else if address == self.cw2 {
            Some(ConfigWord::Cw2)
        } else {
            None
        }
    }
}

impl Default for ConfigAddresses {
    fn default() -> Self {
        Self {
            cw1: CW1_ADDRESS,
            cw2: CW2_ADDRESS,
        }
    }
}

/// Selects one of the two configuration words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWord {
    /// Configuration word 1
    Cw1,
    /// Configuration word 2
    Cw2,
}

/// The two 16-bit configuration words extracted from the image
///
/// Both default to all ones and are overwritten only by data landing on the
/// configuration addresses. They never occupy block slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfigPair {
    /// Configuration word 1
    pub cw1: u16,
    /// Configuration word 2
    pub cw2: u16,
}

impl ConfigPair {
    /// Overwrite one of the two words
    pub fn set(&mut self, word: ConfigWord, value: u16) {
        match word {
            ConfigWord::Cw1 => self.cw1 = value,
            ConfigWord::Cw2 => self.cw2 = value,
        }
    }
}

impl Default for ConfigPair {
    fn default() -> Self {
        Self {
            cw1: 0xFFFF,
            cw2: 0xFFFF,
        }
    }
}
