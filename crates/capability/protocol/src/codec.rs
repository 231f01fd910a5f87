//! 寄存器编解码：32 位浮点 ⇄ 两个 16 位字（大端，高字在前）。

use crate::error::ProtocolError;

/// 单个 float32 占用的寄存器数量。
pub const FLOAT32_WORDS: usize = 2;

pub fn encode_float32(value: f32) -> [u16; 2] {
    let bytes = value.to_be_bytes();
    [
        u16::from_be_bytes([bytes[0], bytes[1]]),
        u16::from_be_bytes([bytes[2], bytes[3]]),
    ]
}

/// 只读取前两个字；不足两个字时返回 `MalformedRegisterData`。
pub fn decode_float32(words: &[u16]) -> Result<f32, ProtocolError> {
    match words {
        [hi, lo, ..] => {
            let [b0, b1] = hi.to_be_bytes();
            let [b2, b3] = lo.to_be_bytes();
            Ok(f32::from_be_bytes([b0, b1, b2, b3]))
        }
        _ => Err(ProtocolError::MalformedRegisterData {
            expected: FLOAT32_WORDS,
            actual: words.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_big_endian_word_order() {
        // 9.0f32 = 0x4110_0000
        assert_eq!(encode_float32(9.0), [0x4110, 0x0000]);
        assert_eq!(encode_float32(-2.5), [0xC020, 0x0000]);
    }

    #[test]
    fn round_trips_finite_values() {
        let samples = [
            0.0f32,
            -0.0,
            1.0,
            -1.0,
            7.25,
            3.141_592_7,
            f32::MIN_POSITIVE,
            f32::MAX,
            f32::MIN,
            1.0e-40,
        ];
        for value in samples {
            let decoded = decode_float32(&encode_float32(value)).unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits());
        }
        for bits in (0u32..u32::MAX).step_by(7_919_993) {
            let value = f32::from_bits(bits);
            if value.is_finite() {
                assert_eq!(decode_float32(&encode_float32(value)).unwrap(), value);
            }
        }
    }

    #[test]
    fn short_input_is_an_error_not_zero() {
        assert_eq!(
            decode_float32(&[0x4110]),
            Err(ProtocolError::MalformedRegisterData {
                expected: 2,
                actual: 1
            })
        );
        assert!(decode_float32(&[]).is_err());
    }

    #[test]
    fn extra_words_are_ignored() {
        assert_eq!(decode_float32(&[0x4110, 0x0000, 0xFFFF]).unwrap(), 9.0);
    }
}
