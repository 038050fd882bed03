//! Volume shaping of wave samples into converter codes.
//!
//! The volume control of a theremin should feel roughly logarithmic to the player, so the 8 bit volume is first
//! expanded into a 16 bit quasi-exponential gain `v² + 2v`. The signed sample is then multiplied by that gain and the
//! rounding bias and converter offset are added in the same 32 bit field, so the converter code is just the top half
//! of the sum. There is no branch on the sign of the sample and no shift after the multiply.
//!
//! The arithmetic wraps instead of saturating. Samples must stay in `[-2048, 2047]` for the result to fit the 12 bit
//! converter.

/// Added to the 32 bit product before truncating to the high half.
///
/// `0x0800` in the high half is the converter offset, `0x8000` in the low half is half an LSB of the output, which
/// turns the truncation into rounding.
pub const ROUNDING_AND_OFFSET: u32 = 0x0800_8000;

/// The output for a zero sample or a zero volume, i.e. silence.
pub const SILENCE: u16 = (ROUNDING_AND_OFFSET >> 16) as u16;

/// The mid-scale code of the 12 bit converter.
///
/// Note that this is one count below [`SILENCE`]: the shaper biases around 2048, and that bias is kept as is since it
/// sets the DC level of the audio output.
pub const CONVERTER_MID_SCALE: u16 = 2047;

/// `gain(v)` is the quasi-exponential gain for volume `v`, `v² + 2v`.
///
/// The gain is monotonic and reaches full scale, `gain(255) == 0xFFFF`.
#[inline(always)]
pub const fn gain(volume: u8) -> u16 {
    let v = volume as u16;
    v.wrapping_mul(v).wrapping_add(v).wrapping_add(v)
}

/// `shape(s, v)` is the converter code for sample `s` played at volume `v`.
///
/// # Arguments
///
/// * `sample` - signed wave sample, nominally in `[-2048, 2047]`
///
/// * `volume` - volume in `[0, 255]`
#[inline(always)]
pub const fn shape(sample: i16, volume: u8) -> u16 {
    // i16 * u16 always fits in i32, the extremes are -32768 * 65535 and 32767 * 65535
    let product = (sample as i32) * (gain(volume) as i32);
    let corrected = (product as u32).wrapping_add(ROUNDING_AND_OFFSET);
    (corrected >> 16) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MIN: i16 = -2048;
    const SAMPLE_MAX: i16 = 2047;

    #[test]
    fn gain_follows_the_square_plus_twice_curve() {
        assert_eq!(gain(0), 0);
        assert_eq!(gain(1), 3);
        assert_eq!(gain(16), 288);
        assert_eq!(gain(128), 16_640);
        assert_eq!(gain(255), u16::MAX);
    }

    #[test]
    fn gain_is_strictly_increasing() {
        for v in 1..=255u8 {
            assert!(gain(v) > gain(v - 1), "gain not increasing at {}", v);
        }
    }

    #[test]
    fn zero_sample_is_silence_at_every_volume() {
        for v in 0..=255u8 {
            assert_eq!(shape(0, v), SILENCE);
        }
    }

    #[test]
    fn zero_volume_is_silence_for_every_sample() {
        for s in SAMPLE_MIN..=SAMPLE_MAX {
            assert_eq!(shape(s, 0), SILENCE);
        }
    }

    #[test]
    fn silence_is_offset_2048() {
        assert_eq!(SILENCE, 0x0800);
        assert_eq!(CONVERTER_MID_SCALE + 1, SILENCE);
    }

    #[test]
    fn output_is_monotonic_in_volume() {
        for s in (SAMPLE_MIN..=SAMPLE_MAX).step_by(7) {
            for v in 1..=255u8 {
                let quieter = shape(s, v - 1);
                let louder = shape(s, v);
                if s > 0 {
                    assert!(quieter <= louder, "sample {} volume {}", s, v);
                } else {
                    assert!(quieter >= louder, "sample {} volume {}", s, v);
                }
            }
        }
    }

    #[test]
    fn full_volume_spans_the_converter_range() {
        assert_eq!(shape(SAMPLE_MAX, 255), 4095);
        assert_eq!(shape(SAMPLE_MIN, 255), 0);
        assert_eq!(shape(1024, 255), 3072);
        assert_eq!(shape(-1024, 255), 1024);
    }

    #[test]
    fn matches_wide_reference_arithmetic() {
        for s in (SAMPLE_MIN..=SAMPLE_MAX).step_by(13) {
            for v in [0u8, 1, 2, 17, 64, 99, 128, 200, 254, 255] {
                let g = (v as i64) * (v as i64) + 2 * (v as i64);
                let expected = ((s as i64) * g + 0x0800_8000) >> 16;
                assert_eq!(shape(s, v) as i64, expected, "sample {} volume {}", s, v);
            }
        }
    }

    #[test]
    fn rounds_half_lsb_up() {
        // 1 * gain(255) is one count short of 1.0 in the high half, the bias rounds it up
        assert_eq!(shape(1, 255), SILENCE + 1);
        // 1 * gain(127) is just under 0.25 LSB and rounds away
        assert_eq!(shape(1, 127), SILENCE);
    }

    #[test]
    fn out_of_range_samples_wrap_silently() {
        // 4095 * 65535 + offset overflows the 12 bit range but not the 16 bit code
        assert_eq!(shape(4095, 255), 0x0800 + 4095);
        // the far negative end wraps the 32 bit field around to a code far above the converter range
        assert_eq!(shape(i16::MIN, 255), 0x8801);
    }
}
