use mmalink::generate::{random_matrix, seedable_rng};
use mmalink_frame::{build_slot_select, encode};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{hex_string, print_encode, EncodeOutput, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let opcode = build_slot_select(args.slot).map_err(|err| frame_error("invalid slot", err))?;
    let mut rng = seedable_rng(args.seed);
    let matrix = random_matrix(&mut rng, args.rows, args.cols)
        .map_err(|err| frame_error("invalid operand shape", err))?;

    let mut wire = vec![opcode];
    wire.extend_from_slice(&encode(&matrix));

    let out = EncodeOutput {
        slot: args.slot,
        opcode,
        shape: matrix.shape(),
        bytes: wire.len(),
        hex: hex_string(&wire),
        matrix,
    };
    print_encode(&out, format);
    Ok(SUCCESS)
}
