//! Command-line front end: parse an Intel-HEX image, dump it, and stream it
//! to the PIC programming bridge.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clap_num::maybe_hex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use picload::hex::{AssemblerConfig, assemble, dump};
use picload::transport::{AckPolicy, LinkConfig, SessionConfig, link, program};

/// Load an Intel-HEX image into a PIC through a serial programming bridge.
///
/// If the serial port cannot be opened the image is still parsed (and dumped
/// when requested), but nothing is transferred.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Intel-HEX image to program.
    hex: PathBuf,
    /// Serial port of the bridge.
    #[arg(long, short, default_value = "/dev/ttyUSB0")]
    port: String,
    /// Line speed in baud.
    #[arg(long, short, default_value_t = 9600)]
    baud: u32,
    /// Seconds to wait for each ack.
    #[arg(long, default_value_t = 40)]
    ack_timeout: u64,
    /// Write the assembled blocks and config words to this file.
    #[arg(long)]
    dump: Option<PathBuf>,
    /// Parse (and dump) only; do not open the serial port.
    #[arg(long)]
    no_transfer: bool,
    /// Require this exact ack byte (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = maybe_hex::<u8>)]
    ack_byte: Option<u8>,
    /// Log protocol detail.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let text = fs::read_to_string(&args.hex)
        .with_context(|| format!("reading {}", args.hex.display()))?;
    let image = assemble(text.lines(), &AssemblerConfig::default())
        .with_context(|| format!("parsing {}", args.hex.display()))?;
    info!(
        blocks = image.blocks().len(),
        instructions = image.instruction_count(),
        "image assembled"
    );

    if let Some(path) = &args.dump {
        let mut out = BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        );
        dump::write_image(&image, &mut out)
            .and_then(|()| out.flush())
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "debug dump written");
    }

    let link_config = LinkConfig {
        port: args.port,
        baud_rate: args.baud,
        ack_timeout: Duration::from_secs(args.ack_timeout),
        ..LinkConfig::default()
    };
    let link = if args.no_transfer {
        None
    } else {
        link::try_open(&link_config)
    };

    let session_config = SessionConfig {
        ack_policy: args.ack_byte.map_or(AckPolicy::AnyByte, AckPolicy::Exact),
    };
    let report = program(&image, link, session_config).context("programming session aborted")?;
    if report.transferred() {
        info!(
            blocks = report.blocks_sent,
            bytes = report.bytes_written,
            "programming complete"
        );
    }
    Ok(())
}
