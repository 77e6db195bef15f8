use clap::{Args, Subcommand};
use std::path::PathBuf;

use nxtlink_frame::Wait;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod probe;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message to the brick.
    Send(SendArgs),
    /// Print messages from the brick until it ends the conversation.
    Listen(ListenArgs),
    /// Check that an NXT brick is reachable over USB.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, wait: Wait) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format, wait),
        Command::Listen(args) => listen::run(args, format, wait),
        Command::Probe(args) => probe::run(args, format, wait),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// UTF-8 string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex byte payload, e.g. "00 08" or "0008".
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read the payload from a file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Print response messages until the brick ends the conversation.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Also run the packet-mode handshake (opens and closes a session).
    #[arg(long)]
    pub handshake: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}
