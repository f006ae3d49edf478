//! Record-to-block assembler
//!
//! Consumes decoded records in file order and regroups their instruction
//! chunks into [`MemoryBlock`]s on a 128-word grid, diverting the two
//! configuration words into a [`ConfigPair`].

use std::collections::HashSet;

use tracing::{debug, info, trace, warn};

use super::{
    BLOCK_SPAN, ConfigAddresses, ConfigPair, MAX_BLOCK_START, MemoryBlock, ParseError, Record,
    RecordType, Result, SLOT_STRIDE,
};

/// Assembler configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssemblerConfig {
    /// Word addresses diverted into the configuration pair
    pub config_addresses: ConfigAddresses,
    /// Configuration values used when the image does not set them
    pub defaults: ConfigPair,
}

/// Result of assembling one HEX image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    blocks: Vec<MemoryBlock>,
    config: ConfigPair,
    config_addresses: ConfigAddresses,
}

impl FirmwareImage {
    /// Build an image from already-assembled parts
    #[must_use]
    pub fn new(
        blocks: Vec<MemoryBlock>,
        config: ConfigPair,
        config_addresses: ConfigAddresses,
    ) -> Self {
        Self {
            blocks,
            config,
            config_addresses,
        }
    }

    /// Blocks in transfer order
    #[must_use]
    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    /// Extracted configuration words
    #[must_use]
    pub const fn config(&self) -> ConfigPair {
        self.config
    }

    /// Configuration register addresses used during assembly
    #[must_use]
    pub const fn config_addresses(&self) -> ConfigAddresses {
        self.config_addresses
    }

    /// Number of instructions stored across all blocks
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(MemoryBlock::filled_count).sum()
    }
}

/// Incremental parser state for one HEX image
///
/// Feed lines with [`Assembler::feed_line`] (or decoded records with
/// [`Assembler::apply`]) and call [`Assembler::finish`] once input ends.
#[derive(Debug, Clone)]
pub struct Assembler {
    config_addresses: ConfigAddresses,
    config: ConfigPair,
    base_address: u32,
    current: Option<MemoryBlock>,
    blocks: Vec<MemoryBlock>,
    finished: HashSet<u32>,
    line: usize,
    eof_seen: bool,
}

impl Assembler {
    /// Create an assembler with no open block
    #[must_use]
    pub fn new(config: &AssemblerConfig) -> Self {
        Self {
            config_addresses: config.config_addresses,
            config: config.defaults,
            base_address: 0,
            current: None,
            blocks: Vec::new(),
            finished: HashSet::new(),
            line: 0,
            eof_seen: false,
        }
    }

    /// Upper address bits set by the last extended-linear-address record
    #[must_use]
    pub const fn base_address(&self) -> u32 {
        self.base_address
    }

    /// Block currently being filled
    #[must_use]
    pub const fn current_block(&self) -> Option<&MemoryBlock> {
        self.current.as_ref()
    }

    /// Blocks finalized so far
    #[must_use]
    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    /// Configuration words seen so far
    #[must_use]
    pub const fn config(&self) -> ConfigPair {
        self.config
    }

    /// Whether an end-of-file record has been processed
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.eof_seen
    }

    /// Decode and apply the next input line
    ///
    /// Lines after the end-of-file record are ignored.
    pub fn feed_line(&mut self, line: &str) -> Result<()> {
        self.line += 1;
        if self.eof_seen {
            warn!(line = self.line, "ignoring input after end-of-file record");
            return Ok(());
        }
        let record = Record::decode(line, self.line)?;
        self.apply(&record, self.line)
    }

    /// Apply one decoded record taken from line `line`
    pub fn apply(&mut self, record: &Record, line: usize) -> Result<()> {
        trace!(line, record_type = %record.record_type(), offset = record.offset(), "record");
        match record.record_type() {
            RecordType::EndOfFile => {
                if let Some(block) = self.current.take() {
                    self.finalize(block);
                }
                self.eof_seen = true;
                debug!(line, blocks = self.blocks.len(), "end of file");
            }
            RecordType::ExtendedLinearAddress => {
                if let Some(base) = record.extended_base() {
                    debug!(line, base = format_args!("{base:#010x}"), "base address updated");
                    self.base_address = base;
                }
            }
            RecordType::Data => {
                let record_address = (self.base_address + u32::from(record.offset())) / 2;
                for (index, value) in (0u32..).zip(record.instructions()) {
                    let address = record_address + index * SLOT_STRIDE;
                    self.push_instruction(address, value, line)?;
                }
            }
        }
        Ok(())
    }

    /// Place one instruction at its word address
    pub fn push_instruction(&mut self, address: u32, value: u32, line: usize) -> Result<()> {
        if let Some(word) = self.config_addresses.matches(address) {
            // The low half of the word is the first two bytes in file order.
            #[allow(clippy::cast_possible_truncation)]
            let low = (value >> 16) as u16;
            debug!(line, ?word, value = format_args!("{low:#06x}"), "configuration word");
            self.config.set(word, low);
            return Ok(());
        }

        let Some(block) = self.current.as_mut() else {
            if address > MAX_BLOCK_START {
                return Err(ParseError::AddressOutOfRange { line, address });
            }
            debug!(line, first_address = address, "opening first block");
            let mut block = MemoryBlock::new(address);
            block.store(address, value);
            self.current = Some(block);
            return Ok(());
        };

        if block.contains(address) && !block.is_full() {
            if let Some(previous) = block.store(address, value) {
                warn!(
                    line,
                    address = format_args!("{address:#x}"),
                    previous = format_args!("{previous:#010x}"),
                    "instruction address written twice"
                );
            }
            return Ok(());
        }

        self.roll_over(address, value, line)
    }

    /// Consume the assembler and return the finished image
    pub fn finish(self) -> Result<FirmwareImage> {
        if !self.eof_seen {
            if self.current.is_some() {
                return Err(ParseError::MissingEndOfFile { line: self.line });
            }
            warn!(line = self.line, "input ended without end-of-file record");
        }
        Ok(FirmwareImage {
            blocks: self.blocks,
            config: self.config,
            config_addresses: self.config_addresses,
        })
    }

    fn roll_over(&mut self, address: u32, value: u32, line: usize) -> Result<()> {
        let Some(current) = self.current.take() else {
            return Ok(());
        };
        match self.next_block_start(&current, address, line) {
            Ok(first_address) => {
                self.finalize(current);
                info!(line, "making new block at {first_address:#x}");
                let mut block = MemoryBlock::new(first_address);
                block.store(address, value);
                self.current = Some(block);
                Ok(())
            }
            Err(err) => {
                self.current = Some(current);
                Err(err)
            }
        }
    }

    fn next_block_start(&self, current: &MemoryBlock, address: u32, line: usize) -> Result<u32> {
        let next = current.next_address();
        if address >= next && address - next < BLOCK_SPAN {
            return self.check_block_start(next, address, line);
        }

        let delta = i64::from(address) - i64::from(current.first_address());
        let window = delta.div_euclid(i64::from(BLOCK_SPAN));
        if window == 0 {
            return Err(ParseError::AddressOverlap {
                line,
                address,
                first_address: current.first_address(),
            });
        }
        let start = i64::from(current.first_address()) + window * i64::from(BLOCK_SPAN);
        let start =
            u32::try_from(start).map_err(|_| ParseError::AddressUnderflow { line, address })?;
        self.check_block_start(start, address, line)
    }

    fn check_block_start(&self, start: u32, address: u32, line: usize) -> Result<u32> {
        if start > MAX_BLOCK_START {
            return Err(ParseError::AddressOutOfRange { line, address });
        }
        if self.finished.contains(&start) {
            return Err(ParseError::AddressRegression {
                line,
                address,
                first_address: start,
            });
        }
        Ok(start)
    }

    fn finalize(&mut self, block: MemoryBlock) {
        let first_address = block.first_address();
        debug!(
            first_address = format_args!("{first_address:#x}"),
            filled = block.filled_count(),
            "block finalized"
        );
        self.finished.insert(first_address);
        self.blocks.push(block);
    }
}

/// Assemble a whole HEX image from its lines
///
/// Fails on the first malformed line; no partial image is returned.
pub fn assemble<I, S>(lines: I, config: &AssemblerConfig) -> Result<FirmwareImage>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut assembler = Assembler::new(config);
    for line in lines {
        assembler.feed_line(line.as_ref())?;
    }
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::{BLOCK_SLOTS, UNPROGRAMMED};
    use std::fmt::Write as _;

    /// Build a data record at byte `offset` holding `values` (checksum not computed)
    fn data_line(offset: u16, values: &[u32]) -> String {
        let mut data = String::new();
        for value in values {
            write!(data, "{value:08X}").unwrap();
        }
        format!(":{:02X}{offset:04X}00{data}00", values.len() * 4)
    }

    fn assemble_lines(lines: &[&str], config: &AssemblerConfig) -> Result<FirmwareImage> {
        assemble(lines.iter().copied(), config)
    }

    /// Data records holding one instruction each at consecutive word addresses
    fn sequential_lines(first_word: u32, count: u32) -> Vec<String> {
        let mut lines: Vec<String> = (0..count)
            .map(|n| data_line(((first_word + n * 2) * 2) as u16, &[0x0004_0000 + n]))
            .collect();
        lines.push(":00000001FF".to_string());
        lines
    }

    #[test]
    fn test_extended_address_scenario() {
        let image = assemble(
            [":02000004ABCD82", ":04AB0000DEADBEEFCC", ":00000001FF"],
            &AssemblerConfig::default(),
        )
        .unwrap();

        let expected = (0xABCD_0000u32 + 0xAB00) / 2;
        assert_eq!(image.blocks().len(), 1);
        let block = &image.blocks()[0];
        assert_eq!(block.first_address(), expected);
        assert_eq!(block.slots()[0], 0xDEAD_BEEF);
        assert_eq!(block.filled_count(), 1);
    }

    #[test]
    fn test_sixty_five_instructions_make_two_blocks() {
        let image = assemble(sequential_lines(0x100, 65), &AssemblerConfig::default()).unwrap();

        assert_eq!(image.blocks().len(), 2);
        assert_eq!(image.blocks()[0].first_address(), 0x100);
        assert_eq!(image.blocks()[0].filled_count(), 64);
        assert_eq!(image.blocks()[1].first_address(), 0x100 + 128);
        assert_eq!(image.blocks()[1].filled_count(), 1);
        assert_eq!(image.blocks()[1].slots()[0], 0x0004_0000 + 64);
    }

    #[test]
    fn test_multi_instruction_record_addresses() {
        let image = assemble_lines(
            &[&data_line(0x0010, &[1, 2, 3, 4]), ":00000001FF"],
            &AssemblerConfig::default(),
        )
        .unwrap();
        let block = &image.blocks()[0];
        assert_eq!(block.first_address(), 8);
        assert_eq!(block.get(8), Some(1));
        assert_eq!(block.get(10), Some(2));
        assert_eq!(block.get(12), Some(3));
        assert_eq!(block.get(14), Some(4));
    }

    #[test]
    fn test_gap_inside_block_is_sparse() {
        let image = assemble_lines(
            &[&data_line(0x0000, &[1]), &data_line(0x0040, &[2]), ":00000001FF"],
            &AssemblerConfig::default(),
        )
        .unwrap();
        assert_eq!(image.blocks().len(), 1);
        let block = &image.blocks()[0];
        assert_eq!(block.filled_count(), 2);
        assert_eq!(block.slots()[0], 1);
        assert_eq!(block.slots()[16], 2);
        assert_eq!(block.slots()[1], UNPROGRAMMED);
    }

    #[test]
    fn test_address_outside_partial_block_rolls_over() {
        // Word 0x80 is one past the first block's last address (0x7E).
        let image = assemble_lines(
            &[&data_line(0x0000, &[1]), &data_line(0x0100, &[2]), ":00000001FF"],
            &AssemblerConfig::default(),
        )
        .unwrap();
        assert_eq!(image.blocks().len(), 2);
        assert_eq!(image.blocks()[0].filled_count(), 1);
        assert_eq!(image.blocks()[1].first_address(), image.blocks()[0].last_address() + 2);
        assert_eq!(image.blocks()[1].slots()[0], 2);
    }

    #[test]
    fn test_far_jump_stays_on_block_grid() {
        // Word 0x1004 lies in the window starting at 0x1000.
        let image = assemble_lines(
            &[&data_line(0x0000, &[1]), &data_line(0x2008, &[2]), ":00000001FF"],
            &AssemblerConfig::default(),
        )
        .unwrap();
        let second = &image.blocks()[1];
        assert_eq!(second.first_address(), 0x1000);
        assert_eq!(second.get(0x1004), Some(2));
        assert_eq!(second.filled_count(), 1);
    }

    #[test]
    fn test_config_words_are_diverted() {
        let image = assemble_lines(
            &[
                &data_line(0x0000, &[0x0004_0000]),
                ":020000040001F9",
                &data_line(0x57F8, &[0x3A5C_0000, 0x7F7B_0000]),
                ":00000001FF",
            ],
            &AssemblerConfig::default(),
        )
        .unwrap();
        assert_eq!(image.config().cw2, 0x3A5C);
        assert_eq!(image.config().cw1, 0x7F7B);
        assert_eq!(image.blocks().len(), 1);
        assert_eq!(image.instruction_count(), 1);
    }

    #[test]
    fn test_config_word_as_first_instruction_never_opens_block() {
        let image = assemble_lines(
            &[
                ":020000040001F9",
                &data_line(0x57FC, &[0x1234_0000]),
                ":00000001FF",
            ],
            &AssemblerConfig::default(),
        )
        .unwrap();
        assert!(image.blocks().is_empty());
        assert_eq!(image.config().cw1, 0x1234);
        assert_eq!(image.config().cw2, 0xFFFF);
    }

    #[test]
    fn test_custom_config_addresses_and_defaults() {
        let config = AssemblerConfig {
            config_addresses: ConfigAddresses { cw1: 0x20, cw2: 0x22 },
            defaults: ConfigPair {
                cw1: 0x7FFF,
                cw2: 0xFFFF,
            },
        };
        let image =
            assemble_lines(&[&data_line(0x0044, &[0xAAAA_0000]), ":00000001FF"], &config).unwrap();
        assert_eq!(image.config().cw1, 0x7FFF);
        assert_eq!(image.config().cw2, 0xAAAA);
        assert_eq!(image.config_addresses(), config.config_addresses);
    }

    #[test]
    fn test_eof_finalizes_partial_block_and_ignores_trailing_lines() {
        let image = assemble_lines(
            &[&data_line(0x0000, &[1]), ":00000001FF", "garbage after eof"],
            &AssemblerConfig::default(),
        )
        .unwrap();
        assert_eq!(image.blocks().len(), 1);
        assert_eq!(image.blocks()[0].filled_count(), 1);
    }

    #[test]
    fn test_eof_only_image_has_no_blocks() {
        let image = assemble([":00000001FF"], &AssemblerConfig::default()).unwrap();
        assert!(image.blocks().is_empty());
        assert_eq!(image.config(), ConfigPair::default());
    }

    #[test]
    fn test_missing_eof_with_open_block() {
        let err = assemble([data_line(0x0000, &[1])], &AssemblerConfig::default()).unwrap_err();
        assert_eq!(err, ParseError::MissingEndOfFile { line: 1 });
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let err = assemble_lines(
            &[&data_line(0x0000, &[1]), "0400000000000400F8", ":00000001FF"],
            &AssemblerConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, ParseError::MissingStartCode { line: 2 });
    }

    #[test]
    fn test_unknown_type_reports_line() {
        let err = assemble(
            [":020000040000FA", ":0400000512345678E8"],
            &AssemblerConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.line(), 2);
        assert!(matches!(err, ParseError::UnknownRecordType { record_type: 5, .. }));
    }

    #[test]
    fn test_duplicate_into_full_block_is_overlap() {
        let mut assembler = Assembler::new(&AssemblerConfig::default());
        for n in 0..64 {
            assembler.push_instruction(n * 2, n, 1).unwrap();
        }
        let err = assembler.push_instruction(10, 99, 2).unwrap_err();
        assert_eq!(
            err,
            ParseError::AddressOverlap {
                line: 2,
                address: 10,
                first_address: 0
            }
        );
    }

    #[test]
    fn test_backward_jump_below_zero_underflows() {
        let mut assembler = Assembler::new(&AssemblerConfig::default());
        assembler.push_instruction(0x10, 1, 1).unwrap();
        let err = assembler.push_instruction(0x08, 2, 2).unwrap_err();
        assert_eq!(err, ParseError::AddressUnderflow { line: 2, address: 8 });
    }

    #[test]
    fn test_backward_jump_opens_earlier_window() {
        let mut assembler = Assembler::new(&AssemblerConfig::default());
        assembler.push_instruction(0x200, 1, 1).unwrap();
        assembler.push_instruction(0x110, 2, 2).unwrap();
        let current = assembler.current_block().unwrap();
        assert_eq!(current.first_address(), 0x100);
        assert_eq!(current.get(0x110), Some(2));
        assert_eq!(assembler.blocks()[0].first_address(), 0x200);
    }

    #[test]
    fn test_backward_jump_into_finished_block_is_rejected() {
        let mut assembler = Assembler::new(&AssemblerConfig::default());
        assembler.push_instruction(0x00, 0x1111, 1).unwrap();
        assembler.push_instruction(0x80, 0x2222, 2).unwrap();
        let err = assembler.push_instruction(0x02, 0x3333, 3).unwrap_err();
        assert_eq!(
            err,
            ParseError::AddressRegression {
                line: 3,
                address: 0x02,
                first_address: 0
            }
        );

        // The open block survives the failed placement.
        assert_eq!(assembler.current_block().unwrap().first_address(), 0x80);
        assert_eq!(assembler.blocks().len(), 1);
        assert_eq!(assembler.blocks()[0].get(0), Some(0x1111));
    }

    #[test]
    fn test_backward_jump_from_hex_records_is_rejected() {
        let err = assemble_lines(
            &[
                &data_line(0x0000, &[1]),
                &data_line(0x0100, &[2]),
                &data_line(0x0004, &[3]),
                ":00000001FF",
            ],
            &AssemblerConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ParseError::AddressRegression {
                line: 3,
                first_address: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_address_at_top_of_space_is_out_of_range() {
        let mut assembler = Assembler::new(&AssemblerConfig::default());
        let err = assembler.push_instruction(0xFFFF_FFF0, 1, 1).unwrap_err();
        assert_eq!(
            err,
            ParseError::AddressOutOfRange {
                line: 1,
                address: 0xFFFF_FFF0
            }
        );
        assert!(assembler.current_block().is_none());
    }

    #[test]
    fn test_roll_over_past_last_block_start_is_out_of_range() {
        let mut assembler = Assembler::new(&AssemblerConfig::default());
        assembler.push_instruction(MAX_BLOCK_START, 1, 1).unwrap();
        assembler.push_instruction(u32::MAX - 2, 2, 2).unwrap();
        let err = assembler.push_instruction(u32::MAX, 3, 3).unwrap_err();
        assert_eq!(
            err,
            ParseError::AddressOutOfRange {
                line: 3,
                address: u32::MAX
            }
        );
        assert_eq!(assembler.current_block().unwrap().filled_count(), 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: block geometry holds for any run of contiguous instructions
            #[test]
            fn prop_contiguous_run_fills_blocks_in_order(
                start in 0u32..0x3000,
                count in 1u32..300,
            ) {
                let first_word = start * 2;
                let image = assemble(
                    sequential_lines(first_word, count),
                    &AssemblerConfig {
                        config_addresses: ConfigAddresses { cw1: u32::MAX, cw2: u32::MAX - 2 },
                        defaults: ConfigPair::default(),
                    },
                ).unwrap();

                let expected_blocks = (count as usize).div_ceil(BLOCK_SLOTS);
                prop_assert_eq!(image.blocks().len(), expected_blocks);
                prop_assert_eq!(image.instruction_count(), count as usize);
                for (n, block) in image.blocks().iter().enumerate() {
                    prop_assert_eq!(block.first_address(), first_word + n as u32 * BLOCK_SPAN);
                    prop_assert_eq!(block.last_address(), block.first_address() + 126);
                    prop_assert!(block.filled_count() <= BLOCK_SLOTS);
                }
            }

            /// Property: nothing landing on a config address reaches a block
            #[test]
            fn prop_config_addresses_never_stored(
                words in prop::collection::vec(0u32..0x60, 1..120),
            ) {
                let config = AssemblerConfig {
                    config_addresses: ConfigAddresses { cw1: 0x20, cw2: 0x1E },
                    defaults: ConfigPair::default(),
                };
                let mut assembler = Assembler::new(&config);
                let mut words = words;
                words.sort_unstable();
                words.dedup();
                for word in &words {
                    assembler.push_instruction(word * 2, 0x1111_0000 | word, 1).unwrap();
                }
                assembler.feed_line(":00000001FF").unwrap();
                let image = assembler.finish().unwrap();
                for block in image.blocks() {
                    prop_assert_eq!(block.get(0x20).filter(|&v| v != UNPROGRAMMED), None);
                    prop_assert_eq!(block.get(0x1E).filter(|&v| v != UNPROGRAMMED), None);
                }
            }
        }
    }
}
