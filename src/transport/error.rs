//! Transport-level error types covering the serial link, codec and ack discipline.

use core::fmt;
use std::io;

use super::session::Stage;

/// Unified error type for programming-session operations.
#[derive(Debug)]
pub enum TransportError {
    /// The bridge sent nothing before the ack timeout expired.
    MissingAck {
        /// Protocol stage that was waiting.
        stage: Stage,
    },
    /// The bridge answered with a byte the configured ack policy rejects.
    UnexpectedAck {
        /// Protocol stage that was waiting.
        stage: Stage,
        /// Byte received.
        byte: u8,
    },
    /// Frame shorter than its fixed wire size.
    BufferTooSmall {
        /// Number of bytes required to decode the frame.
        needed: usize,
        /// Number of bytes supplied.
        got: usize,
    },
    /// Serial port could not be opened or configured.
    Link(serialport::Error),
    /// Underlying read or write failure.
    Io(io::Error),
}

impl TransportError {
    /// Protocol stage at which an ack failure occurred.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::MissingAck { stage } | Self::UnexpectedAck { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAck { stage } => write!(f, "no ack: {stage}"),
            Self::UnexpectedAck { stage, byte } => {
                write!(f, "unexpected ack {byte:#04x}: {stage}")
            }
            Self::BufferTooSmall { needed, got } => {
                write!(f, "buffer too small: need {needed} bytes, got {got}")
            }
            Self::Link(err) => write!(f, "serial link error: {err}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Link(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        Self::Link(err)
    }
}
