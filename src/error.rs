use core::fmt;

/// Errors produced while configuring the instrument.
///
/// Nothing on the real-time paths can fail, so these only come out of setup and host-side conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Waveform index is out of bounds (must be < `wavetable::TABLE_COUNT`).
    InvalidWaveform(u8),
    /// Raw operating mode code does not name a mode.
    InvalidMode(u8),
    /// A frequency was requested over a measurement window of zero length.
    EmptyMeasurementWindow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidWaveform(idx) => write!(f, "waveform index {} out of range", idx),
            Error::InvalidMode(code) => write!(f, "unknown operating mode {}", code),
            Error::EmptyMeasurementWindow => write!(f, "measurement window is empty"),
        }
    }
}
