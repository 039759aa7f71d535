use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Crates whose events `--log-level` controls. Everything else stays at warn.
const DRIVER_TARGETS: [&str; 5] = [
    "mmalink",
    "mmalink_driver",
    "mmalink_frame",
    "mmalink_transport",
    "mmalink_verify",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// `warn` globally, `level` for the driver crates.
pub fn default_directives(level: LogLevel) -> String {
    let mut directives = String::from("warn");
    for target in DRIVER_TARGETS {
        directives.push(',');
        directives.push_str(target);
        directives.push('=');
        directives.push_str(level.directive());
    }
    directives
}

/// A non-empty `RUST_LOG` wins over `--log-level`. An unparsable one falls
/// back to the flag and is reported once the subscriber is up.
fn build_filter(level: LogLevel, rust_log: Option<&str>) -> (EnvFilter, Option<String>) {
    let fallback = || EnvFilter::new(default_directives(level));
    match rust_log.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => (fallback(), None),
        Some(raw) => match EnvFilter::try_new(raw) {
            Ok(filter) => (filter, None),
            Err(err) => (fallback(), Some(format!("ignoring RUST_LOG={raw:?}: {err}"))),
        },
    }
}

/// Install the stderr subscriber. Later calls are no-ops.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (filter, rejected) = build_filter(level, rust_log.as_deref());

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false);
    let installed = match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };

    if let (true, Some(message)) = (installed, rejected) {
        tracing::warn!("{message}");
    }
}
