use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mmalink_driver::{DeviceEmulator, EmulatorConfig};
use tracing::{info, warn};

use crate::cmd::{parse_duration, EmulateArgs};
use crate::exit::{io_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_session, OutputFormat, SessionOutput};

const ACCEPT_POLL: Duration = Duration::from_millis(50);

pub fn run(args: EmulateArgs, format: OutputFormat) -> CliResult<i32> {
    let completion_delay = match args.completion_delay.as_deref() {
        Some(value) => parse_duration(value)?,
        None => Duration::ZERO,
    };
    let emulator = DeviceEmulator::new(EmulatorConfig {
        completion_delay,
        ack_byte: args.ack_byte,
        chatter: args.chatter,
        corrupt_result: args.corrupt,
        ..EmulatorConfig::default()
    });

    remove_stale_socket(&args.socket)?;
    let listener =
        UnixListener::bind(&args.socket).map_err(|err| io_error("bind failed", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| io_error("bind failed", err))?;
    info!(socket = ?args.socket, "device emulator listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut served = 0usize;
    while running.load(Ordering::SeqCst) {
        let stream = match listener.accept() {
            Ok((stream, _)) => stream,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = std::fs::remove_file(&args.socket);
                return Err(io_error("accept failed", err));
            }
        };
        stream
            .set_nonblocking(false)
            .map_err(|err| io_error("accept failed", err))?;

        served += 1;
        let out = match emulator.serve(stream) {
            Ok(stats) => SessionOutput {
                connection: served,
                operands: stats.operands,
                multiplies: stats.multiplies,
                results: stats.results,
                ignored: stats.ignored,
                error: None,
            },
            Err(err) => {
                warn!(connection = served, error = %err, "host connection ended with error");
                SessionOutput {
                    connection: served,
                    operands: 0,
                    multiplies: 0,
                    results: 0,
                    ignored: 0,
                    error: Some(err.to_string()),
                }
            }
        };
        print_session(&out, format);

        if args.count.is_some_and(|count| served >= count) {
            break;
        }
    }

    let _ = std::fs::remove_file(&args.socket);
    Ok(SUCCESS)
}

fn remove_stale_socket(path: &Path) -> CliResult<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            std::fs::remove_file(path).map_err(|err| io_error("remove stale socket", err))
        }
        Ok(_) => Err(CliError::new(
            crate::exit::USAGE,
            format!("{} exists and is not a socket", path.display()),
        )),
        Err(_) => Ok(()),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    // A second Ctrl-C exits even while a host connection is being served.
    ctrlc::set_handler(move || {
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(130);
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
