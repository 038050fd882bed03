//! Startup configuration.

use crate::{shared::Shared, wavetable::Waveform};

/// What the converter is fed with.
///
/// Resolved once at startup, the tick handler never changes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    /// Synthesized audio, shaped by the volume control.
    Audio,
    /// The pitch increment itself as a control voltage, for driving other synthesizers.
    ControlVoltage,
}

impl OutputMode {
    /// The output mode chosen by the `cv-output` cargo feature.
    pub const BUILD: OutputMode = if cfg!(feature = "cv-output") {
        OutputMode::ControlVoltage
    } else {
        OutputMode::Audio
    };
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::BUILD
    }
}

/// The instrument settings applied at power-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub output: OutputMode,
    pub waveform: Waveform,
    pub volume: u8,
    pub increment: u16,
}

impl Config {
    /// `Config::new()` is the build's output mode, the first waveform and silence.
    pub const fn new() -> Self {
        Self {
            output: OutputMode::BUILD,
            waveform: Waveform::FIRST,
            volume: 0,
            increment: 0,
        }
    }

    /// `cfg.apply(sh)` writes the initial controls into the shared state.
    pub fn apply(&self, shared: &Shared) {
        shared.controls.set_waveform(self.waveform);
        shared.controls.set_volume(self.volume);
        shared.controls.set_increment(self.increment);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
