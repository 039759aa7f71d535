use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mmalink_frame::{Matrix, Shape};
use mmalink_verify::Tolerance;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct MismatchOutput {
    pub row: usize,
    pub col: usize,
    pub expected: f32,
    pub actual: f32,
}

#[derive(Serialize)]
pub struct RunOutput {
    pub port: String,
    pub transport: &'static str,
    pub seed: u64,
    pub a: Shape,
    pub b: Shape,
    pub compatibility: &'static str,
    pub compatibility_code: u8,
    pub tolerance: String,
    pub verified: bool,
    pub mismatch: Option<MismatchOutput>,
    pub elapsed_ms: f64,
    pub result: Matrix,
    pub reference: Matrix,
}

#[derive(Serialize)]
pub struct EncodeOutput {
    pub slot: u32,
    pub opcode: u8,
    pub shape: Shape,
    pub bytes: usize,
    pub hex: String,
    pub matrix: Matrix,
}

#[derive(Serialize)]
pub struct SessionOutput {
    pub connection: usize,
    pub operands: usize,
    pub multiplies: usize,
    pub results: usize,
    pub ignored: usize,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct OpcodeOutput {
    pub name: &'static str,
    pub byte: u8,
}

#[derive(Serialize)]
pub struct DefaultsOutput {
    pub baud: u32,
    pub ack_timeout_ms: u128,
    pub completion_timeout_ms: u128,
    pub result_timeout_ms: u128,
    pub poll_interval_ms: u128,
    pub max_result_elements: usize,
}

#[derive(Serialize)]
pub struct VersionOutput {
    pub name: &'static str,
    pub version: &'static str,
    pub platform: String,
    pub opcodes: Vec<OpcodeOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsOutput>,
}

pub fn tolerance_label(tolerance: Tolerance) -> String {
    match tolerance {
        Tolerance::Exact => "exact".to_string(),
        Tolerance::Absolute(eps) => format!("absolute({eps})"),
        Tolerance::Relative(eps) => format!("relative({eps})"),
    }
}

pub fn print_run(out: &RunOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["port".to_string(), out.port.clone()])
                .add_row(vec!["transport".to_string(), out.transport.to_string()])
                .add_row(vec!["seed".to_string(), out.seed.to_string()])
                .add_row(vec!["operands".to_string(), format!("{} · {}", out.a, out.b)])
                .add_row(vec![
                    "compatibility".to_string(),
                    format!("{} ({})", out.compatibility, out.compatibility_code),
                ])
                .add_row(vec!["tolerance".to_string(), out.tolerance.clone()])
                .add_row(vec!["verified".to_string(), out.verified.to_string()])
                .add_row(vec!["elapsed_ms".to_string(), format!("{:.2}", out.elapsed_ms)]);
            if let Some(m) = &out.mismatch {
                table.add_row(vec![
                    "mismatch".to_string(),
                    format!("({}, {}) expected {} got {}", m.row, m.col, m.expected, m.actual),
                ]);
            }
            println!("{table}");
            println!("{}", matrix_table("device result", &out.result));
        }
        OutputFormat::Pretty => {
            println!(
                "{} {} · {} on {} ({}) seed={} class={} tolerance={} elapsed={:.2}ms",
                if out.verified { "VERIFIED" } else { "MISMATCH" },
                out.a,
                out.b,
                out.port,
                out.transport,
                out.seed,
                out.compatibility,
                out.tolerance,
                out.elapsed_ms
            );
            if let Some(m) = &out.mismatch {
                println!(
                    "  first mismatch at ({}, {}): expected {}, got {}",
                    m.row, m.col, m.expected, m.actual
                );
            }
            for row in out.result.iter_rows() {
                println!("  {row:?}");
            }
        }
    }
}

pub fn print_encode(out: &EncodeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SLOT", "OPCODE", "SHAPE", "BYTES", "HEX"])
                .add_row(vec![
                    out.slot.to_string(),
                    format!("0x{:02X}", out.opcode),
                    out.shape.to_string(),
                    out.bytes.to_string(),
                    out.hex.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", out.hex),
    }
}

pub fn print_session(out: &SessionOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CONNECTION", "OPERANDS", "MULTIPLIES", "RESULTS", "IGNORED", "ERROR"])
                .add_row(vec![
                    out.connection.to_string(),
                    out.operands.to_string(),
                    out.multiplies.to_string(),
                    out.results.to_string(),
                    out.ignored.to_string(),
                    out.error.clone().unwrap_or_else(|| "-".to_string()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "connection={} operands={} multiplies={} results={} ignored={}{}",
                out.connection,
                out.operands,
                out.multiplies,
                out.results,
                out.ignored,
                out.error
                    .as_deref()
                    .map(|e| format!(" error={e}"))
                    .unwrap_or_default()
            );
        }
    }
}

pub fn print_version(out: &VersionOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"])
                .add_row(vec!["version".to_string(), format!("{} {}", out.name, out.version)])
                .add_row(vec!["platform".to_string(), out.platform.clone()]);
            for op in &out.opcodes {
                table.add_row(vec![op.name.to_string(), format!("0x{:02X}", op.byte)]);
            }
            if let Some(defaults) = &out.defaults {
                table
                    .add_row(vec!["baud".to_string(), defaults.baud.to_string()])
                    .add_row(vec![
                        "ack_timeout".to_string(),
                        format!("{}ms", defaults.ack_timeout_ms),
                    ])
                    .add_row(vec![
                        "completion_timeout".to_string(),
                        format!("{}ms", defaults.completion_timeout_ms),
                    ])
                    .add_row(vec![
                        "result_timeout".to_string(),
                        format!("{}ms", defaults.result_timeout_ms),
                    ])
                    .add_row(vec![
                        "poll_interval".to_string(),
                        format!("{}ms", defaults.poll_interval_ms),
                    ])
                    .add_row(vec![
                        "max_result_elements".to_string(),
                        defaults.max_result_elements.to_string(),
                    ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{} {} ({})", out.name, out.version, out.platform);
            if let Some(defaults) = &out.defaults {
                println!(
                    "baud={} ack={}ms completion={}ms result={}ms max_elements={}",
                    defaults.baud,
                    defaults.ack_timeout_ms,
                    defaults.completion_timeout_ms,
                    defaults.result_timeout_ms,
                    defaults.max_result_elements
                );
            }
        }
    }
}

pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn matrix_table(title: &str, matrix: &Matrix) -> Table {
    let mut table = Table::new();
    let mut header = vec![title.to_string()];
    header.extend((0..matrix.cols()).map(|c| c.to_string()));
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    for (r, row) in matrix.iter_rows().enumerate() {
        let mut cells = vec![r.to_string()];
        cells.extend(row.iter().map(|v| v.to_string()));
        table.add_row(cells);
    }
    table
}

fn print_json<T: Serialize>(out: &T) {
    println!(
        "{}",
        serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_space_separated_lowercase() {
        assert_eq!(hex_string(&[0x01, 0x00, 0xAB]), "01 00 ab");
        assert_eq!(hex_string(&[]), "");
    }

    #[test]
    fn tolerance_labels() {
        assert_eq!(tolerance_label(Tolerance::Exact), "exact");
        assert_eq!(tolerance_label(Tolerance::Absolute(0.5)), "absolute(0.5)");
    }
}
