use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::matrix::Matrix;

/// Dimension header: rows (4) + cols (4) = 8 bytes.
pub const DIM_HEADER_SIZE: usize = 8;

/// Each element is one big-endian IEEE-754 single.
pub const ELEMENT_SIZE: usize = 4;

/// Default maximum element count accepted from the wire: 16 Mi.
pub const DEFAULT_MAX_ELEMENTS: usize = 16 * 1024 * 1024;

/// Wire size of `matrix` once encoded.
pub fn encoded_len(matrix: &Matrix) -> usize {
    DIM_HEADER_SIZE + matrix.as_slice().len() * ELEMENT_SIZE
}

/// Encode a matrix into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬────────────┬──────────────────────────────┐
/// │ Rows M     │ Cols N     │ M×N elements, row-major      │
/// │ (4B BE u32)│ (4B BE u32)│ (4B BE f32 each)             │
/// └────────────┴────────────┴──────────────────────────────┘
/// ```
pub fn encode_matrix(matrix: &Matrix, dst: &mut BytesMut) {
    dst.reserve(encoded_len(matrix));
    // Matrix guarantees both dimensions fit u32.
    dst.put_u32(matrix.rows() as u32);
    dst.put_u32(matrix.cols() as u32);
    for &value in matrix.as_slice() {
        dst.put_f32(value);
    }
}

/// Encode a matrix into a fresh buffer.
pub fn encode(matrix: &Matrix) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(matrix));
    encode_matrix(matrix, &mut buf);
    buf.freeze()
}

/// Decode one matrix frame from the front of `src`.
///
/// On success, consumes exactly the frame bytes. Fails with
/// [`FrameError::MalformedFrame`] if `src` ends before all M×N elements are
/// present.
pub fn decode_matrix<B: Buf>(src: &mut B, max_elements: usize) -> Result<Matrix> {
    if src.remaining() < DIM_HEADER_SIZE {
        return Err(FrameError::MalformedFrame(format!(
            "dimension header needs {DIM_HEADER_SIZE} bytes, got {}",
            src.remaining()
        )));
    }

    let rows = src.get_u32();
    let cols = src.get_u32();
    let elements = payload_elements(rows, cols, max_elements)?;

    let needed = elements * ELEMENT_SIZE;
    if src.remaining() < needed {
        return Err(FrameError::MalformedFrame(format!(
            "{rows}x{cols} payload needs {needed} bytes, got {}",
            src.remaining()
        )));
    }

    let mut data = Vec::with_capacity(elements);
    for _ in 0..elements {
        data.push(src.get_f32());
    }
    Matrix::from_vec(rows as usize, cols as usize, data)
}

/// Decode a complete matrix frame from a byte slice.
pub fn decode(bytes: &[u8]) -> Result<Matrix> {
    let mut src = bytes;
    decode_matrix(&mut src, DEFAULT_MAX_ELEMENTS)
}

/// Validate a received dimension header and return the element count.
pub(crate) fn payload_elements(rows: u32, cols: u32, max_elements: usize) -> Result<usize> {
    if rows == 0 || cols == 0 {
        return Err(FrameError::MalformedFrame(format!(
            "header announces empty {rows}x{cols} matrix"
        )));
    }

    let elements = u64::from(rows) * u64::from(cols);
    if elements > max_elements as u64 {
        return Err(FrameError::PayloadTooLarge {
            elements,
            max: max_elements,
        });
    }
    Ok(elements as usize)
}

/// Configuration for the matrix codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest M×N accepted from the wire. Default: 16 Mi elements.
    pub max_elements: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample(rows: usize, cols: usize) -> Matrix {
        Matrix::from_fn(rows, cols, |r, c| (r as f32) * 1.5 - (c as f32) * 0.25 + 0.125).unwrap()
    }

    #[test]
    fn encodes_big_endian_header_and_elements() {
        let m = Matrix::from_rows(&[[1.0f32, -2.0]]).unwrap();
        let wire = encode(&m);

        assert_eq!(
            wire.as_ref(),
            &[
                0x00, 0x00, 0x00, 0x01, // M
                0x00, 0x00, 0x00, 0x02, // N
                0x3F, 0x80, 0x00, 0x00, // 1.0
                0xC0, 0x00, 0x00, 0x00, // -2.0
            ]
        );
        assert_eq!(wire.len(), encoded_len(&m));
    }

    #[test]
    fn decode_restores_values_not_raw_bytes() {
        let wire = [
            0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x41, 0x98, 0x00, 0x00, // 19.0
            0x42, 0x2C, 0x00, 0x00, // 43.0
        ];
        let m = decode(&wire).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 1);
        assert_eq!(m.as_slice(), &[19.0, 43.0]);
    }

    #[test]
    fn roundtrip_preserves_every_element() {
        for (rows, cols) in [(1, 1), (2, 2), (3, 7), (64, 1), (1, 64), (64, 64)] {
            let m = sample(rows, cols);
            let decoded = decode(&encode(&m)).unwrap();
            assert_eq!(decoded, m, "{rows}x{cols} should survive the wire");
        }
    }

    fn finite_matrix() -> impl Strategy<Value = Matrix> {
        (1usize..=64, 1usize..=64).prop_flat_map(|(rows, cols)| {
            prop::collection::vec(
                prop::num::f32::NORMAL | prop::num::f32::ZERO | prop::num::f32::SUBNORMAL,
                rows * cols,
            )
            .prop_map(move |data| Matrix::from_vec(rows, cols, data).unwrap())
        })
    }

    proptest! {
        #[test]
        fn any_finite_matrix_survives_the_wire(m in finite_matrix()) {
            let wire = encode(&m);
            prop_assert_eq!(wire.len(), encoded_len(&m));

            let decoded = decode(&wire).unwrap();
            prop_assert_eq!(decoded.shape(), m.shape());
            for (sent, received) in m.as_slice().iter().zip(decoded.as_slice()) {
                prop_assert_eq!(sent.to_bits(), received.to_bits());
            }
        }
    }

    #[test]
    fn roundtrip_preserves_special_values() {
        let m = Matrix::from_rows(&[[f32::MAX, f32::MIN_POSITIVE, -0.0, f32::INFINITY]]).unwrap();
        let decoded = decode(&encode(&m)).unwrap();
        for (a, b) in m.as_slice().iter().zip(decoded.as_slice()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn decode_consumes_exactly_one_frame() {
        let mut wire = BytesMut::new();
        encode_matrix(&sample(2, 3), &mut wire);
        encode_matrix(&sample(1, 1), &mut wire);

        let mut src = wire.freeze();
        let first = decode_matrix(&mut src, DEFAULT_MAX_ELEMENTS).unwrap();
        let second = decode_matrix(&mut src, DEFAULT_MAX_ELEMENTS).unwrap();

        assert_eq!(first.shape().to_string(), "2x3");
        assert_eq!(second.shape().to_string(), "1x1");
        assert!(!src.has_remaining());
    }

    #[test]
    fn truncated_header_is_malformed() {
        let result = decode(&[0x00, 0x00, 0x00]);
        assert!(matches!(result, Err(FrameError::MalformedFrame(_))));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let wire = encode(&sample(2, 2));
        let result = decode(&wire[..wire.len() - 1]);
        assert!(matches!(result, Err(FrameError::MalformedFrame(msg)) if msg.contains("2x2")));
    }

    #[test]
    fn zero_dimension_header_is_malformed() {
        let wire = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03];
        assert!(matches!(decode(&wire), Err(FrameError::MalformedFrame(_))));
    }

    #[test]
    fn oversized_header_rejected_before_allocation() {
        let mut wire = BytesMut::new();
        wire.put_u32(u32::MAX);
        wire.put_u32(u32::MAX);

        let mut src = wire.freeze();
        let result = decode_matrix(&mut src, DEFAULT_MAX_ELEMENTS);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn custom_element_limit() {
        let wire = encode(&sample(4, 4));
        let mut src = wire.clone();
        assert!(matches!(
            decode_matrix(&mut src, 15),
            Err(FrameError::PayloadTooLarge { elements: 16, max: 15 })
        ));
        let mut src = wire;
        assert!(decode_matrix(&mut src, 16).is_ok());
    }
}
