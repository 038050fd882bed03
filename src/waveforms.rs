//! The default set of waveform tables.
//!
//! The tables are computed at compile time with integer arithmetic only and end up as ordinary read-only data. Every
//! sample stays in `[-2048, 2047]`, the range the volume shaper is built for.

use crate::wavetable::{WaveformTable, TABLE_COUNT, TABLE_LEN};

/// Full-scale amplitude of a single waveform.
const AMPLITUDE: i32 = 2047;

const HALF: usize = TABLE_LEN / 2;
const QUARTER: usize = TABLE_LEN / 4;

/// The shapes of the default tables, in table order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Shape {
    Sine,
    SineOctave,
    Organ,
    Triangle,
    Sawtooth,
    Square,
    Pulse,
    Hollow,
}

/// The shape stored at each index of [`BUILTIN`].
pub const SHAPES: [Shape; TABLE_COUNT] = [
    Shape::Sine,
    Shape::SineOctave,
    Shape::Organ,
    Shape::Triangle,
    Shape::Sawtooth,
    Shape::Square,
    Shape::Pulse,
    Shape::Hollow,
];

/// The default waveform tables.
pub static BUILTIN: [WaveformTable; TABLE_COUNT] = [
    build(SHAPES[0]),
    build(SHAPES[1]),
    build(SHAPES[2]),
    build(SHAPES[3]),
    build(SHAPES[4]),
    build(SHAPES[5]),
    build(SHAPES[6]),
    build(SHAPES[7]),
];

/// `build(shape)` is one cycle of `shape`.
pub const fn build(shape: Shape) -> WaveformTable {
    let mut table = [0i16; TABLE_LEN];
    let mut i = 0;
    while i < TABLE_LEN {
        table[i] = sample(shape, i) as i16;
        i += 1;
    }
    table
}

const fn sample(shape: Shape, i: usize) -> i32 {
    match shape {
        Shape::Sine => sine(i, AMPLITUDE),
        Shape::SineOctave => sine(i, 1365) + sine(2 * i, 682),
        Shape::Organ => sine(i, 1200) + sine(3 * i, 500) + sine(5 * i, 347),
        Shape::Triangle => {
            let t = if i < QUARTER {
                i as i32
            } else if i < HALF + QUARTER {
                HALF as i32 - i as i32
            } else {
                i as i32 - TABLE_LEN as i32
            };
            AMPLITUDE * t / QUARTER as i32
        }
        Shape::Sawtooth => (i as i32 - HALF as i32) * 4,
        Shape::Square => {
            if i < HALF {
                1536
            } else {
                -1536
            }
        }
        Shape::Pulse => {
            if i < QUARTER {
                1536
            } else {
                -512
            }
        }
        Shape::Hollow => sine(i, 1024) + sine(3 * i, 1023),
    }
}

/// `sine(phase, amp)` is `amp * sin(2π * phase / TABLE_LEN)`, using Bhaskara's rational approximation.
///
/// The approximation is exact at the zero crossings and peaks and stays within 0.2% of full scale elsewhere.
const fn sine(phase: usize, amplitude: i32) -> i32 {
    let p = phase & (TABLE_LEN - 1);
    let (p, sign) = if p < HALF { (p, 1) } else { (p - HALF, -1) };

    // p(π - p) in table units, peaks at QUARTER² = 65536
    let a = (p * (HALF - p)) as i32;
    sign * amplitude * 4 * a / (327_680 - a)
}
