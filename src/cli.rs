use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "golduino-web", version, about = "HTTP control surface for a Golduino board")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// Open the serial port and serve the web UI
    Serve(ServeOpts),
    /// List serial ports visible to this host
    Ports,
}

#[derive(Args, Debug, Clone)]
pub struct SerialOpts {
    /// Serial device path
    #[arg(long, default_value = "/dev/ttyACM0")]
    pub dev: String,
    /// Baud rate
    #[arg(long, default_value_t = 38_400)]
    pub baud: u32,
    /// Enable RTS/CTS
    #[arg(long, default_value_t = false)]
    pub rtscts: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ServeOpts {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// HTTP listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,
    /// Directory holding the .html files served under /golduino
    #[arg(long, default_value = "static")]
    pub root: PathBuf,
    /// What the mode tracker assumes after a reset
    #[arg(long, value_enum, default_value_t = ResetPolicy::Unchanged)]
    pub reset_mode: ResetPolicy,
    /// "strict" answers bad choices and out-of-range values with 400; the `c`
    /// (enter configure) sent before the check stays sent and the board is left
    /// in configure mode. "lenient" silently drops them like the original board app
    #[arg(long, value_enum, default_value_t = Validation::Strict)]
    pub validation: Validation,
}

/// Tracked mode after `r` is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ResetPolicy {
    /// Keep whatever mode was tracked before the reset.
    #[default]
    Unchanged,
    /// Forget the mode; the next mode switch is always re-sent.
    Unknown,
}

/// How bad input to the configuration commands is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Validation {
    /// Reject unknown choices and out-of-range values with an error.
    #[default]
    Strict,
    /// Write nothing for unknown choices, pass values through unchecked.
    Lenient,
}
