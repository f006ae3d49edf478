//! HEX parsing error types

use thiserror::Error;

/// Errors raised while decoding records or assembling blocks
///
/// Every variant carries the 1-based number of the input line that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Line does not begin with the `:` start code
    #[error("line {line}: file syntax error, missing ':' start code")]
    MissingStartCode {
        /// Failing line
        line: usize,
    },

    /// A field contains a character that is not a hex digit
    #[error("line {line}: invalid hex digit in {field}")]
    InvalidHexDigit {
        /// Failing line
        line: usize,
        /// Name of the field being decoded
        field: &'static str,
    },

    /// Line is shorter than the fixed record header
    #[error("line {line}: record truncated ({len} characters)")]
    Truncated {
        /// Failing line
        line: usize,
        /// Number of characters present
        len: usize,
    },

    /// Data field length disagrees with the byte-count field
    #[error("line {line}: byte count {declared} but {found} data bytes present")]
    LengthMismatch {
        /// Failing line
        line: usize,
        /// Byte count declared by the record
        declared: usize,
        /// Data bytes actually present
        found: usize,
    },

    /// Data field has an odd number of hex digits
    #[error("line {line}: data field has an odd number of hex digits ({digits})")]
    OddDataDigits {
        /// Failing line
        line: usize,
        /// Hex digits present in the data field
        digits: usize,
    },

    /// Record type outside data, end-of-file and extended-linear-address
    #[error("line {line}: bad record type {record_type:#04x}")]
    UnknownRecordType {
        /// Failing line
        line: usize,
        /// Record type byte
        record_type: u8,
    },

    /// Data record whose byte count is not a whole number of instructions
    #[error("line {line}: data record of {byte_count} bytes is not a multiple of 4")]
    MisalignedDataRecord {
        /// Failing line
        line: usize,
        /// Byte count of the record
        byte_count: usize,
    },

    /// Extended-linear-address record without exactly two data bytes
    #[error("line {line}: extended linear address record carries {byte_count} bytes, expected 2")]
    InvalidExtendedAddress {
        /// Failing line
        line: usize,
        /// Byte count of the record
        byte_count: usize,
    },

    /// A full block received an address inside its own range
    #[error("line {line}: address {address:#x} overlaps full block at {first_address:#x}")]
    AddressOverlap {
        /// Failing line
        line: usize,
        /// Instruction word address
        address: u32,
        /// First address of the full block
        first_address: u32,
    },

    /// A backward jump landed in a block that was already finalized
    #[error("line {line}: address {address:#x} returns to finished block at {first_address:#x}")]
    AddressRegression {
        /// Failing line
        line: usize,
        /// Instruction word address
        address: u32,
        /// First address of the finished block
        first_address: u32,
    },

    /// Word address too high for a whole block to start there
    #[error("line {line}: address {address:#x} is beyond the last block start")]
    AddressOutOfRange {
        /// Failing line
        line: usize,
        /// Instruction word address
        address: u32,
    },

    /// A backward jump would place the next block below address zero
    #[error("line {line}: address {address:#x} falls below the block grid")]
    AddressUnderflow {
        /// Failing line
        line: usize,
        /// Instruction word address
        address: u32,
    },

    /// Input ended while a block was open and no EOF record was seen
    #[error("missing end-of-file record after line {line}")]
    MissingEndOfFile {
        /// Last line read
        line: usize,
    },
}

impl ParseError {
    /// Line number the error refers to
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::MissingStartCode { line }
            | Self::InvalidHexDigit { line, .. }
            | Self::Truncated { line, .. }
            | Self::LengthMismatch { line, .. }
            | Self::OddDataDigits { line, .. }
            | Self::UnknownRecordType { line, .. }
            | Self::MisalignedDataRecord { line, .. }
            | Self::InvalidExtendedAddress { line, .. }
            | Self::AddressOverlap { line, .. }
            | Self::AddressRegression { line, .. }
            | Self::AddressOutOfRange { line, .. }
            | Self::AddressUnderflow { line, .. }
            | Self::MissingEndOfFile { line } => *line,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ParseError>;
