//! Human-readable dump of an assembled image
//!
//! ```text
//! : 256
//! 0x40000
//! 0xffffffff
//! ...            (64 slot lines)
//!
//! CW1: 0x7fff
//! CW2: 0xffff
//! ```

use std::io::{self, Write};

use super::{ConfigPair, FirmwareImage, MemoryBlock};

/// Write every block followed by the configuration words
pub fn write_image<W: Write>(image: &FirmwareImage, out: &mut W) -> io::Result<()> {
    for block in image.blocks() {
        write_block(block, out)?;
    }
    write_config(image.config(), out)
}

/// Write one block: a header with its first address, 64 slot lines, a blank line
pub fn write_block<W: Write>(block: &MemoryBlock, out: &mut W) -> io::Result<()> {
    writeln!(out, ": {}", block.first_address())?;
    for value in block.slots() {
        writeln!(out, "{value:#x}")?;
    }
    writeln!(out)
}

/// Write the two configuration words
pub fn write_config<W: Write>(config: ConfigPair, out: &mut W) -> io::Result<()> {
    writeln!(out, "CW1: {:#x}", config.cw1)?;
    writeln!(out, "CW2: {:#x}", config.cw2)?;
    writeln!(out)
}
