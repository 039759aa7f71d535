use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod emulate;
pub mod encode;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Multiply random operands on the device and verify the result.
    Run(RunArgs),
    /// Print the wire frame for a random operand.
    Encode(EncodeArgs),
    /// Serve the device side of the protocol on a Unix socket.
    Emulate(EmulateArgs),
    /// Show the driver version and the protocol bytes it speaks.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Emulate(args) => emulate::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Serial device or socket bridge path.
    pub port: PathBuf,
    /// Line rate (ignored for socket bridges).
    #[arg(long, default_value_t = mmalink_transport::DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Rows of A.
    #[arg(long, default_value_t = 2)]
    pub rows: usize,
    /// Cols of A and rows of B.
    #[arg(long, default_value_t = 2)]
    pub inner: usize,
    /// Cols of B.
    #[arg(long, default_value_t = 2)]
    pub cols: usize,
    /// RNG seed for reproducible operands. Random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Wait for each operand ACK (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub ack_timeout: String,
    /// Wait for DONE after START.
    #[arg(long, default_value = "30s")]
    pub completion_timeout: String,
    /// Read timeout while receiving the result frame.
    #[arg(long, default_value = "10s")]
    pub result_timeout: String,
    /// Accept elements within this absolute difference.
    #[arg(long, value_name = "EPS", conflicts_with = "relative_tolerance")]
    pub tolerance: Option<f32>,
    /// Accept elements within this fraction of the larger magnitude.
    #[arg(long, value_name = "EPS", conflicts_with = "tolerance")]
    pub relative_tolerance: Option<f32>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Operand slot (1 or 2).
    #[arg(long, default_value_t = 1)]
    pub slot: u32,
    #[arg(long, default_value_t = 2)]
    pub rows: usize,
    #[arg(long, default_value_t = 2)]
    pub cols: usize,
    /// RNG seed. Random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct EmulateArgs {
    /// Socket path to bind.
    pub socket: PathBuf,
    /// Delay between START and DONE (e.g. 250ms).
    #[arg(long)]
    pub completion_delay: Option<String>,
    /// Byte sent after each operand (0x06 acknowledges).
    #[arg(long, default_value = "0x06", value_parser = parse_byte)]
    pub ack_byte: u8,
    /// Bytes sent before DONE (comma-separated, e.g. 0x00,0x42).
    #[arg(long, value_delimiter = ',', value_parser = parse_byte)]
    pub chatter: Vec<u8>,
    /// Perturb the first element of every result.
    #[arg(long)]
    pub corrupt: bool,
    /// Exit after serving N connections.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Also show default line settings, timeouts and frame limits.
    #[arg(long)]
    pub defaults: bool,
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Parse a byte as decimal or `0x`-prefixed hex.
pub fn parse_byte(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid byte value: {input}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn parse_byte_hex_and_decimal() {
        assert_eq!(parse_byte("0x15"), Ok(0x15));
        assert_eq!(parse_byte("6"), Ok(6));
        assert!(parse_byte("0x100").is_err());
        assert!(parse_byte("nak").is_err());
    }
}
