//! Serial transport: wire codec, link setup and the programming session

pub mod codec;
mod error;
pub mod link;
mod session;

pub use codec::{Ack, Command};
pub use error::TransportError;
pub use link::LinkConfig;
pub use session::{
    AckPolicy, Session, SessionConfig, SessionReport, SessionState, Stage, program,
};
