//! State shared between the interrupt handlers and host logic.

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};

use crate::{
    calibration::CalibrationCounter, capture::CaptureChannel, clock::TickClock, mode::OperatingMode,
    wavetable::Waveform,
};

/// Everything that crosses an interrupt boundary.
///
/// Meant to be a `static`. The capture interrupts call [`Shared::on_pitch_edge`], [`Shared::on_volume_edge`] and
/// [`Shared::on_calibration_overflow`], the tick handler reads the controls and drives the channels, and host logic
/// reads the channels and writes the controls.
pub struct Shared {
    mode: Mutex<Cell<OperatingMode>>,

    /// Pitch oscillator measurement
    pub pitch: CaptureChannel,

    /// Volume oscillator measurement
    pub volume: CaptureChannel,

    /// Overflow counter for the calibration modes
    pub calibration: CalibrationCounter,

    /// Logical clock advanced by every tick
    pub clock: TickClock,

    /// Playback parameters written by host logic
    pub controls: Controls,
}

impl Shared {
    /// `Shared::new()` is the power-up state, in play mode with all controls at zero.
    pub const fn new() -> Self {
        Self {
            mode: Mutex::new(Cell::new(OperatingMode::Play)),
            pitch: CaptureChannel::new(),
            volume: CaptureChannel::new(),
            calibration: CalibrationCounter::new(),
            clock: TickClock::new(),
            controls: Controls::new(),
        }
    }

    /// `sh.mode()` is the current operating mode.
    pub fn mode(&self) -> OperatingMode {
        critical_section::with(|cs| self.mode.borrow(cs).get())
    }

    pub(crate) fn set_mode(&self, cs: CriticalSection<'_>, mode: OperatingMode) {
        self.mode.borrow(cs).set(mode);
    }

    /// `sh.on_pitch_edge(c)` handles a pitch oscillator edge captured at counter value `c`.
    ///
    /// Ignored outside play mode.
    pub fn on_pitch_edge(&self, counter: u16) {
        if self.mode() == OperatingMode::Play {
            self.pitch.capture(counter);
        }
    }

    /// `sh.on_volume_edge(c)` handles a volume oscillator edge captured at counter value `c`.
    ///
    /// Ignored outside play mode.
    pub fn on_volume_edge(&self, counter: u16) {
        if self.mode() == OperatingMode::Play {
            self.volume.capture(counter);
        }
    }

    /// `sh.on_calibration_overflow()` handles an overflow of the calibration timer.
    ///
    /// Ignored in play mode.
    pub fn on_calibration_overflow(&self) {
        if self.mode().is_calibration() {
            self.calibration.on_overflow();
        }
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

/// A consistent copy of the playback controls, taken once per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlSnapshot {
    pub volume: u8,
    pub increment: u16,
    pub waveform: Waveform,
}

/// The host-writable playback parameters.
pub struct Controls {
    volume: Mutex<Cell<u8>>,
    increment: Mutex<Cell<u16>>,
    waveform: Mutex<Cell<Waveform>>,
}

impl Controls {
    /// `Controls::new()` is silence: volume zero, increment zero, first waveform.
    pub const fn new() -> Self {
        Self {
            volume: Mutex::new(Cell::new(0)),
            increment: Mutex::new(Cell::new(0)),
            waveform: Mutex::new(Cell::new(Waveform::FIRST)),
        }
    }

    /// `ctl.set_volume(v)` sets the volume, the full `u8` range is valid.
    pub fn set_volume(&self, volume: u8) {
        critical_section::with(|cs| self.volume.borrow(cs).set(volume));
    }

    /// `ctl.set_increment(i)` sets the per-tick table pointer step, in 1/64ths of a sample.
    pub fn set_increment(&self, increment: u16) {
        critical_section::with(|cs| self.increment.borrow(cs).set(increment));
    }

    /// `ctl.set_waveform(w)` selects the waveform table.
    pub fn set_waveform(&self, waveform: Waveform) {
        critical_section::with(|cs| self.waveform.borrow(cs).set(waveform));
    }

    /// `ctl.snapshot()` is the current value of every control.
    pub fn snapshot(&self) -> ControlSnapshot {
        critical_section::with(|cs| ControlSnapshot {
            volume: self.volume.borrow(cs).get(),
            increment: self.increment.borrow(cs).get(),
            waveform: self.waveform.borrow(cs).get(),
        })
    }

    /// `ctl.clamp_increment(max)` limits the stored increment to `max` and returns it.
    pub(crate) fn clamp_increment(&self, max: u16) -> u16 {
        critical_section::with(|cs| {
            let increment = self.increment.borrow(cs);
            let clamped = increment.get().min(max);
            increment.set(clamped);
            clamped
        })
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::new()
    }
}
