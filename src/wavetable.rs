//! Access to the read-only waveform tables.
//!
//! The generator only ever asks for one sample at a time, given the selected [`Waveform`] and an offset into its
//! table. Table contents are opaque to the core; [`crate::waveforms`] provides a default set.

use crate::Error;

/// The number of samples in one waveform cycle.
pub const TABLE_LEN: usize = 1024;

/// The number of selectable waveforms.
pub const TABLE_COUNT: usize = 8;

/// One full cycle of a periodic waveform.
pub type WaveformTable = [i16; TABLE_LEN];

/// The index of a selectable waveform, always in `[0, TABLE_COUNT)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Waveform(u8);

impl Waveform {
    /// The waveform selected at power-up.
    pub const FIRST: Waveform = Waveform(0);

    /// The highest selectable waveform.
    pub const LAST: Waveform = Waveform(TABLE_COUNT as u8 - 1);

    /// `Waveform::new(i)` is the waveform at index `i`, if it exists.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < TABLE_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// `w.index()` is the table index of the waveform.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for Waveform {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index).ok_or(Error::InvalidWaveform(index))
    }
}

impl From<Waveform> for u8 {
    fn from(w: Waveform) -> u8 {
        w.0
    }
}

/// A read-only provider of waveform samples.
///
/// Implementations must be constant time, the generator calls this once per tick.
pub trait WaveformSource {
    /// `src.sample(w, offset)` is the stored sample of waveform `w` at `offset`.
    ///
    /// Offsets wrap modulo [`TABLE_LEN`].
    fn sample(&self, waveform: Waveform, offset: usize) -> i16;
}

impl WaveformSource for [WaveformTable; TABLE_COUNT] {
    #[inline(always)]
    fn sample(&self, waveform: Waveform, offset: usize) -> i16 {
        self[waveform.index()][offset & (TABLE_LEN - 1)]
    }
}

impl<T: WaveformSource + ?Sized> WaveformSource for &T {
    #[inline(always)]
    fn sample(&self, waveform: Waveform, offset: usize) -> i16 {
        (**self).sample(waveform, offset)
    }
}
