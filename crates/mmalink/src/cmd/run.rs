use rand::Rng;

use mmalink::generate::{random_operands, seedable_rng};
use mmalink_driver::{multiply_and_verify, DriverConfig};
use mmalink_transport::{SerialConfig, SerialPort};
use mmalink_verify::Tolerance;
use tracing::info;

use crate::cmd::{parse_duration, RunArgs};
use crate::exit::{driver_error, frame_error, transport_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_run, tolerance_label, MismatchOutput, OutputFormat, RunOutput};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = DriverConfig {
        ack_timeout: parse_duration(&args.ack_timeout)?,
        completion_timeout: parse_duration(&args.completion_timeout)?,
        result_timeout: parse_duration(&args.result_timeout)?,
        ..DriverConfig::default()
    };
    let tolerance = match (args.tolerance, args.relative_tolerance) {
        (Some(eps), _) => Tolerance::Absolute(eps),
        (None, Some(eps)) => Tolerance::Relative(eps),
        (None, None) => Tolerance::Exact,
    };

    let seed = args.seed.unwrap_or_else(|| seedable_rng(None).gen());
    let mut rng = seedable_rng(Some(seed));
    let (a, b) = random_operands(&mut rng, args.rows, args.inner, args.cols)
        .map_err(|err| frame_error("invalid operand shape", err))?;
    info!(seed, a = %a.shape(), b = %b.shape(), "generated operands");

    let serial = SerialConfig {
        read_timeout: Some(config.result_timeout),
        ..SerialConfig::new(&args.port).with_baud_rate(args.baud)
    };
    let channel =
        SerialPort::open(&serial).map_err(|err| transport_error("open failed", err))?;

    let report = multiply_and_verify(channel, &a, &b, &config, tolerance)
        .map_err(|err| driver_error("multiply failed", err))?;

    let out = RunOutput {
        port: args.port.display().to_string(),
        transport: SerialPort::transport_name(&args.port),
        seed,
        a: a.shape(),
        b: b.shape(),
        compatibility: report.compatibility.name(),
        compatibility_code: report.compatibility.code(),
        tolerance: tolerance_label(report.tolerance),
        verified: report.verified(),
        mismatch: report.mismatch.map(|m| MismatchOutput {
            row: m.row,
            col: m.col,
            expected: m.expected,
            actual: m.actual,
        }),
        elapsed_ms: (report.elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0,
        result: report.result,
        reference: report.reference,
    };
    print_run(&out, format);

    if out.verified {
        Ok(SUCCESS)
    } else {
        eprintln!("error: device result differs from reference");
        Ok(FAILURE)
    }
}
