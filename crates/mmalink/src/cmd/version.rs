use mmalink_driver::DriverConfig;
use mmalink_frame::{opcode_name, ACK, DONE, GET_RESULT, SELECT_OPERAND_1, SELECT_OPERAND_2, START};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_version, DefaultsOutput, OpcodeOutput, OutputFormat, VersionOutput};

const OPCODES: [u8; 6] = [SELECT_OPERAND_1, SELECT_OPERAND_2, START, GET_RESULT, DONE, ACK];

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    print_version(&version_report(args.defaults), format);
    Ok(SUCCESS)
}

fn version_report(with_defaults: bool) -> VersionOutput {
    let opcodes = OPCODES
        .iter()
        .map(|&byte| OpcodeOutput {
            name: opcode_name(byte),
            byte,
        })
        .collect();

    let defaults = with_defaults.then(|| {
        let config = DriverConfig::default();
        DefaultsOutput {
            baud: mmalink_transport::DEFAULT_BAUD_RATE,
            ack_timeout_ms: config.ack_timeout.as_millis(),
            completion_timeout_ms: config.completion_timeout.as_millis(),
            result_timeout_ms: config.result_timeout.as_millis(),
            poll_interval_ms: config.poll_interval.as_millis(),
            max_result_elements: config.frame.max_elements,
        }
    });

    VersionOutput {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        platform: format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
        opcodes,
        defaults,
    }
}
