//! Programming session driver
//!
//! ```text
//! Idle -> AwaitingWakeAck -> SendingBlock* -> SendingConfig -> Done
//!                  \______________\_______________\____> Aborted
//! ```
//!
//! Every stage waits for one ack before the next is sent. A missing ack
//! aborts the whole session; nothing is retried.

use std::fmt;
use std::io::{Read, Write};

use tracing::{debug, info, instrument, warn};

use super::TransportError;
use super::codec::{self, Ack, Command};
use crate::hex::{ConfigAddresses, ConfigPair, FirmwareImage, MemoryBlock};

/// How acknowledgement bytes are judged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AckPolicy {
    /// Any received byte counts as success
    #[default]
    AnyByte,
    /// Only this byte counts as success
    Exact(u8),
}

impl AckPolicy {
    /// Whether `ack` satisfies the policy
    #[must_use]
    pub const fn accepts(self, ack: Ack) -> bool {
        match self {
            Self::AnyByte => true,
            Self::Exact(expected) => ack.byte() == expected,
        }
    }
}

/// Session configuration options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Acknowledgement policy applied at every stage
    pub ack_policy: AckPolicy,
}

/// Protocol stage awaiting an ack, used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Wake command
    Wake,
    /// Instruction-block command
    BlockControl {
        /// First address of the block
        first_address: u32,
    },
    /// Block address frame
    BlockAddress {
        /// First address of the block
        first_address: u32,
    },
    /// 64-slot burst
    BlockData {
        /// First address of the block
        first_address: u32,
    },
    /// Config-write command
    ConfigControl,
    /// Config address frame
    ConfigAddress,
    /// Config word pair
    ConfigData,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wake => write!(f, "Initial wakeup"),
            Self::BlockControl { first_address } => {
                write!(f, "Block {first_address} Instr Control")
            }
            Self::BlockAddress { first_address } => write!(f, "Block {first_address} Instr Addr"),
            Self::BlockData { first_address } => write!(f, "Block {first_address} Instr Block"),
            Self::ConfigControl => write!(f, "Config Write Control"),
            Self::ConfigAddress => write!(f, "Config Write Addr"),
            Self::ConfigData => write!(f, "Config Write Data"),
        }
    }
}

/// Session state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing sent yet
    Idle,
    /// Wake command sent
    AwaitingWakeAck,
    /// Transferring the block at `index`
    SendingBlock {
        /// Position in transfer order
        index: usize,
    },
    /// Transferring the configuration words
    SendingConfig,
    /// Every stage acknowledged
    Done,
    /// An ack failed; terminal
    Aborted {
        /// Stage whose ack failed
        stage: Stage,
    },
}

/// Summary of a finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    /// Final state
    pub state: SessionState,
    /// Blocks fully acknowledged
    pub blocks_sent: usize,
    /// Bytes written to the link
    pub bytes_written: usize,
    /// Acks received
    pub acks_received: usize,
}

impl SessionReport {
    /// Report of a session that has not sent anything yet
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Idle,
            blocks_sent: 0,
            bytes_written: 0,
            acks_received: 0,
        }
    }

    /// Report for a run where the link was unavailable
    #[must_use]
    pub const fn offline() -> Self {
        Self::new()
    }

    /// Whether the image reached the target
    #[must_use]
    pub const fn transferred(&self) -> bool {
        matches!(self.state, SessionState::Done)
    }
}

impl Default for SessionReport {
    fn default() -> Self {
        Self::new()
    }
}

/// One programming run over an exclusively owned link
///
/// The link is released when the session is dropped, whichever way
/// [`Session::run`] returns. After a failed run, [`Session::report`] still
/// shows the aborted stage and what was sent before it.
#[derive(Debug)]
pub struct Session<L: Read + Write> {
    link: L,
    config: SessionConfig,
    report: SessionReport,
}

impl<L: Read + Write> Session<L> {
    /// Create a session over `link`
    pub fn new(link: L, config: SessionConfig) -> Self {
        Self {
            link,
            config,
            report: SessionReport::new(),
        }
    }

    /// Current state
    pub const fn state(&self) -> SessionState {
        self.report.state
    }

    /// Progress so far, including the aborted stage after a failed run
    pub const fn report(&self) -> SessionReport {
        self.report
    }

    /// Transfer `image` to the bridge
    #[instrument(level = "info", skip(self, image), fields(blocks = image.blocks().len()))]
    pub fn run(&mut self, image: &FirmwareImage) -> Result<SessionReport, TransportError> {
        self.report = SessionReport::new();
        self.wake()?;
        for (index, block) in image.blocks().iter().enumerate() {
            info!("sending block {index}");
            self.report.state = SessionState::SendingBlock { index };
            self.send_block(block)?;
            self.report.blocks_sent += 1;
        }
        info!("sending config words");
        self.report.state = SessionState::SendingConfig;
        self.send_config(image.config_addresses(), image.config())?;
        self.report.state = SessionState::Done;
        Ok(self.report)
    }

    fn wake(&mut self) -> Result<(), TransportError> {
        self.send_command(Command::Wake)?;
        self.report.state = SessionState::AwaitingWakeAck;
        self.await_ack(Stage::Wake)
    }

    fn send_block(&mut self, block: &MemoryBlock) -> Result<(), TransportError> {
        let first_address = block.first_address();
        self.send_command(Command::InstructionBlock)?;
        self.await_ack(Stage::BlockControl { first_address })?;
        self.send(&codec::encode_address(first_address))?;
        self.await_ack(Stage::BlockAddress { first_address })?;
        self.send(&codec::encode_block_payload(block))?;
        self.await_ack(Stage::BlockData { first_address })
    }

    fn send_config(
        &mut self,
        addresses: ConfigAddresses,
        config: ConfigPair,
    ) -> Result<(), TransportError> {
        self.send_command(Command::ConfigWrite)?;
        self.await_ack(Stage::ConfigControl)?;
        self.send(&codec::encode_address(addresses.cw2))?;
        self.await_ack(Stage::ConfigAddress)?;
        self.send(&codec::encode_config_words(config))?;
        self.await_ack(Stage::ConfigData)
    }

    fn send_command(&mut self, command: Command) -> Result<(), TransportError> {
        debug!(%command, "command");
        self.send(&[command.as_u8()])
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.link.write_all(bytes)?;
        self.link.flush()?;
        self.report.bytes_written += bytes.len();
        Ok(())
    }

    fn await_ack(&mut self, stage: Stage) -> Result<(), TransportError> {
        let ack = match codec::read_ack(&mut self.link) {
            Ok(ack) => ack,
            Err(err) => {
                self.report.state = SessionState::Aborted { stage };
                return Err(err.into());
            }
        };
        let Some(ack) = ack else {
            warn!(%stage, "no ack");
            self.report.state = SessionState::Aborted { stage };
            return Err(TransportError::MissingAck { stage });
        };
        self.report.acks_received += 1;
        let byte = ack.byte();
        if !self.config.ack_policy.accepts(ack) {
            warn!(%stage, ack = format_args!("{byte:#04x}"), "rejected ack");
            self.report.state = SessionState::Aborted { stage };
            return Err(TransportError::UnexpectedAck { stage, byte });
        }
        debug!(%stage, ack = format_args!("{byte:#04x}"), "ack");
        Ok(())
    }
}

impl<L: Read + Write> Drop for Session<L> {
    fn drop(&mut self) {
        debug!(state = ?self.report.state, "session ended; releasing link");
    }
}

/// Run a whole programming session, or skip it when no link is available
///
/// With `link == None` the image is left untransferred and an offline report
/// is returned.
pub fn program<L: Read + Write>(
    image: &FirmwareImage,
    link: Option<L>,
    config: SessionConfig,
) -> Result<SessionReport, TransportError> {
    match link {
        Some(link) => Session::new(link, config).run(image),
        None => {
            warn!("programming bridge offline; skipping transfer");
            Ok(SessionReport::offline())
        }
    }
}
