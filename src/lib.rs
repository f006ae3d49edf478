//! picload - Intel-HEX loader for in-circuit programming of PIC devices
//!
//! This library turns a textual Intel-HEX firmware image into fixed-size,
//! address-aligned program-memory blocks and streams them to an Arduino-class
//! programming bridge over a serial link using a small command/acknowledgement
//! protocol.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use picload::hex::{AssemblerConfig, assemble};
//!
//! let text = ":0400000000000400F8\n:00000001FF\n";
//! let image = assemble(text.lines(), &AssemblerConfig::default())?;
//! assert_eq!(image.blocks().len(), 1);
//! # Ok::<(), picload::hex::ParseError>(())
//! ```
//!
//! # Layers
//!
//! - [`hex`] - record decoding, block assembly and the debug dump
//! - [`transport`] - wire codec, serial link and the programming session

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod hex;
pub mod transport;

pub use hex::{ConfigPair, FirmwareImage, MemoryBlock, ParseError, assemble};
pub use transport::{LinkConfig, Session, SessionConfig, SessionReport, TransportError, program};

/// Crate version, reported by the command-line front end
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
