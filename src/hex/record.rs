//! Intel-HEX record decoder
//!
//! One text line decodes into one [`Record`].

use std::fmt;

use bytes::Bytes;

use super::{INSTRUCTION_BYTES, ParseError, Result};

/// Characters taken by the byte-count, offset and type fields
const HEADER_DIGITS: usize = 8;

/// Characters taken by the trailing checksum field
const CHECKSUM_DIGITS: usize = 2;

/// Intel-HEX record types understood by the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    /// Program data
    Data = 0x00,
    /// End of file
    EndOfFile = 0x01,
    /// Upper 16 bits of the 32-bit address space
    ExtendedLinearAddress = 0x04,
}

impl RecordType {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Data),
            0x01 => Some(Self::EndOfFile),
            0x04 => Some(Self::ExtendedLinearAddress),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "Data",
            Self::EndOfFile => "EndOfFile",
            Self::ExtendedLinearAddress => "ExtendedLinearAddress",
        };
        write!(f, "{name}")
    }
}

/// A decoded HEX record
///
/// # Line Format
///
/// ```text
/// :LL AAAA TT DD..DD CC
///  |   |   |    |    +-- checksum (carried, not verified)
///  |   |   |    +------- LL data bytes
///  |   |   +------------ record type
///  |   +---------------- 16-bit offset address
///  +-------------------- byte count
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    offset: u16,
    record_type: RecordType,
    data: Bytes,
    checksum: u8,
}

impl Record {
    /// Decode one line of HEX text
    ///
    /// `line_no` is the 1-based line number used in error reports. Trailing
    /// whitespace (including a carriage return) is ignored.
    pub fn decode(line: &str, line_no: usize) -> Result<Self> {
        let text = line.trim_end().as_bytes();
        let Some((&b':', body)) = text.split_first() else {
            return Err(ParseError::MissingStartCode { line: line_no });
        };

        if body.len() < HEADER_DIGITS + CHECKSUM_DIGITS {
            return Err(ParseError::Truncated {
                line: line_no,
                len: text.len(),
            });
        }

        let byte_count = usize::from(hex_byte(&body[0..2], line_no, "byte count")?);
        let offset = u16::from_be_bytes([
            hex_byte(&body[2..4], line_no, "offset address")?,
            hex_byte(&body[4..6], line_no, "offset address")?,
        ]);
        let type_byte = hex_byte(&body[6..8], line_no, "record type")?;
        let checksum = hex_byte(&body[body.len() - CHECKSUM_DIGITS..], line_no, "checksum")?;

        let data_digits = &body[HEADER_DIGITS..body.len() - CHECKSUM_DIGITS];
        if data_digits.len() % 2 != 0 {
            return Err(ParseError::OddDataDigits {
                line: line_no,
                digits: data_digits.len(),
            });
        }
        if data_digits.len() != byte_count * 2 {
            return Err(ParseError::LengthMismatch {
                line: line_no,
                declared: byte_count,
                found: data_digits.len() / 2,
            });
        }

        let record_type =
            RecordType::from_u8(type_byte).ok_or(ParseError::UnknownRecordType {
                line: line_no,
                record_type: type_byte,
            })?;

        match record_type {
            RecordType::Data if byte_count % INSTRUCTION_BYTES != 0 => {
                return Err(ParseError::MisalignedDataRecord {
                    line: line_no,
                    byte_count,
                });
            }
            RecordType::ExtendedLinearAddress if byte_count != 2 => {
                return Err(ParseError::InvalidExtendedAddress {
                    line: line_no,
                    byte_count,
                });
            }
            _ => {}
        }

        let data = data_digits
            .chunks_exact(2)
            .map(|pair| hex_byte(pair, line_no, "data"))
            .collect::<Result<Vec<u8>>>()?;

        Ok(Self {
            offset,
            record_type,
            data: Bytes::from(data),
            checksum,
        })
    }

    /// Number of data bytes
    #[must_use]
    pub fn byte_count(&self) -> usize {
        self.data.len()
    }

    /// 16-bit offset address field
    #[must_use]
    pub const fn offset(&self) -> u16 {
        self.offset
    }

    /// Record type
    #[must_use]
    pub const fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Raw data bytes in file order
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Checksum field as written in the file
    #[must_use]
    pub const fn checksum(&self) -> u8 {
        self.checksum
    }

    /// New upper address bits carried by an extended-linear-address record
    ///
    /// Returns `None` for any other record type.
    #[must_use]
    pub fn extended_base(&self) -> Option<u32> {
        match (self.record_type, self.data.as_ref()) {
            (RecordType::ExtendedLinearAddress, [hi, lo]) => {
                Some(u32::from(u16::from_be_bytes([*hi, *lo])) << 16)
            }
            _ => None,
        }
    }

    /// Instruction chunks of a data record
    ///
    /// Each chunk is four data bytes read in file order as a big-endian
    /// value, matching the word pairs the bridge expects on the wire.
    pub fn instructions(&self) -> impl Iterator<Item = u32> + '_ {
        self.data
            .chunks_exact(INSTRUCTION_BYTES)
            .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }
}

fn hex_byte(pair: &[u8], line: usize, field: &'static str) -> Result<u8> {
    let digit = |c: u8| {
        char::from(c)
            .to_digit(16)
            .ok_or(ParseError::InvalidHexDigit { line, field })
    };
    let hi = digit(pair[0])?;
    let lo = digit(pair[1])?;
    // Two hex digits always fit in a byte.
    #[allow(clippy::cast_possible_truncation)]
    let byte = ((hi << 4) | lo) as u8;
    Ok(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_record() {
        let record = Record::decode(":0400100000000400E8", 1).unwrap();
        assert_eq!(record.record_type(), RecordType::Data);
        assert_eq!(record.byte_count(), 4);
        assert_eq!(record.offset(), 0x0010);
        assert_eq!(record.checksum(), 0xE8);
        assert_eq!(record.instructions().collect::<Vec<_>>(), vec![0x0000_0400]);
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        let upper = Record::decode(":04AB0000DEADBEEFCC", 1).unwrap();
        let lower = Record::decode(":04ab0000deadbeefcc", 1).unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.instructions().next(), Some(0xDEAD_BEEF));
    }

    #[test]
    fn test_decode_strips_carriage_return() {
        let record = Record::decode(":00000001FF\r", 3).unwrap();
        assert_eq!(record.record_type(), RecordType::EndOfFile);
        assert_eq!(record.byte_count(), 0);
    }

    #[test]
    fn test_extended_linear_address() {
        let record = Record::decode(":02000004ABCD82", 1).unwrap();
        assert_eq!(record.record_type(), RecordType::ExtendedLinearAddress);
        assert_eq!(record.extended_base(), Some(0xABCD_0000));
    }

    #[test]
    fn test_extended_base_only_for_type_4() {
        let record = Record::decode(":0400000000000400F8", 1).unwrap();
        assert_eq!(record.extended_base(), None);
    }

    #[test]
    fn test_missing_start_code() {
        let err = Record::decode("0400000000000400F8", 7).unwrap_err();
        assert_eq!(err, ParseError::MissingStartCode { line: 7 });

        let err = Record::decode("", 8).unwrap_err();
        assert_eq!(err, ParseError::MissingStartCode { line: 8 });
    }

    #[test]
    fn test_unknown_record_type() {
        let err = Record::decode(":020000021200EA", 2).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownRecordType {
                line: 2,
                record_type: 0x02
            }
        );
    }

    #[test]
    fn test_truncated_record() {
        let err = Record::decode(":0400", 1).unwrap_err();
        assert!(matches!(err, ParseError::Truncated { line: 1, .. }));
    }

    #[test]
    fn test_length_mismatch() {
        let err = Record::decode(":08000000000004000000F0", 4).unwrap_err();
        assert_eq!(
            err,
            ParseError::LengthMismatch {
                line: 4,
                declared: 8,
                found: 6
            }
        );
    }

    #[test]
    fn test_odd_data_digits_rejected() {
        let err = Record::decode(":040000000000040F8", 4).unwrap_err();
        assert_eq!(err, ParseError::OddDataDigits { line: 4, digits: 7 });
        assert_eq!(
            err.to_string(),
            "line 4: data field has an odd number of hex digits (7)"
        );
    }

    #[test]
    fn test_misaligned_data_record_rejected() {
        let err = Record::decode(":020000000004FA", 5).unwrap_err();
        assert_eq!(
            err,
            ParseError::MisalignedDataRecord {
                line: 5,
                byte_count: 2
            }
        );
    }

    #[test]
    fn test_extended_address_wrong_length() {
        let err = Record::decode(":0400000400010000F7", 6).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidExtendedAddress {
                line: 6,
                byte_count: 4
            }
        );
    }

    #[test]
    fn test_invalid_hex_digit() {
        let err = Record::decode(":04000000ZZ000400F8", 9).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidHexDigit {
                line: 9,
                field: "data"
            }
        );
    }

    #[test]
    fn test_multiple_instructions_in_file_order() {
        let record = Record::decode(":080000000102030405060708D4", 1).unwrap();
        assert_eq!(
            record.instructions().collect::<Vec<_>>(),
            vec![0x0102_0304, 0x0506_0708]
        );
    }
}
