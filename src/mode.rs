//! Operating modes and the switching between them.
//!
//! In [`OperatingMode::Play`] the wave tick and both capture interrupts run. The two calibration modes stop all of
//! them and instead let the oscillator under test clock a timer whose overflows are counted, which gives an absolute
//! frequency against the known time base rather than the relative deltas of play mode.
//!
//! Mode switches happen from thread context only, never from one of the core's interrupts.

use crate::{shared::Shared, Error};

/// The hardware configuration currently in effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    #[default]
    Play,
    PitchCalibration,
    VolumeCalibration,
}

impl OperatingMode {
    /// `m.is_calibration()` is true for either calibration mode.
    pub const fn is_calibration(self) -> bool {
        !matches!(self, OperatingMode::Play)
    }
}

impl TryFrom<u8> for OperatingMode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(OperatingMode::Play),
            1 => Ok(OperatingMode::PitchCalibration),
            2 => Ok(OperatingMode::VolumeCalibration),
            _ => Err(Error::InvalidMode(code)),
        }
    }
}

/// The two measured oscillators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sensor {
    Pitch,
    Volume,
}

/// The interrupt sources the core configures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptSource {
    /// The periodic wave generation tick.
    WaveTick,
    /// Edge capture of the pitch oscillator.
    PitchEdge,
    /// Edge capture of the volume oscillator.
    VolumeEdge,
    /// Overflow of the calibration timer.
    CalibrationOverflow,
}

/// Timer and interrupt controls needed to switch modes.
pub trait ModeHardware {
    /// Mask every interrupt source listed in [`InterruptSource`].
    fn disable_all(&mut self);

    /// Run the free-running counter that both capture channels latch.
    fn start_capture_timer(&mut self);

    /// Clock the calibration timer from `sensor`'s oscillator and let it overflow freely.
    fn start_calibration_timer(&mut self, sensor: Sensor);

    /// Unmask `source`.
    fn enable(&mut self, source: InterruptSource);
}

/// Switches the hardware between the operating modes.
pub struct ModeManager<H> {
    hw: H,
}

impl<H: ModeHardware> ModeManager<H> {
    /// `ModeManager::new(hw)` is a mode manager in charge of `hw`.
    ///
    /// No hardware is touched until the first mode is entered.
    pub fn new(hw: H) -> Self {
        Self { hw }
    }

    /// `mm.enter_play_mode(sh)` runs the wave tick and both capture channels.
    pub fn enter_play_mode(&mut self, shared: &Shared) {
        self.enter(OperatingMode::Play, shared);
    }

    /// `mm.enter_pitch_calibration_mode(sh)` counts pitch oscillator overflows, everything else stops.
    pub fn enter_pitch_calibration_mode(&mut self, shared: &Shared) {
        self.enter(OperatingMode::PitchCalibration, shared);
    }

    /// `mm.enter_volume_calibration_mode(sh)` counts volume oscillator overflows, everything else stops.
    pub fn enter_volume_calibration_mode(&mut self, shared: &Shared) {
        self.enter(OperatingMode::VolumeCalibration, shared);
    }

    /// `mm.enter(m, sh)` reconfigures the hardware for mode `m`.
    ///
    /// All sources are masked before any timer is touched and the whole switch runs in one critical section, so no
    /// interrupt ever sees a half configured timer.
    pub fn enter(&mut self, mode: OperatingMode, shared: &Shared) {
        #[cfg(feature = "defmt")]
        defmt::debug!("entering {} mode", mode);

        critical_section::with(|cs| {
            self.hw.disable_all();
            shared.set_mode(cs, mode);

            match mode {
                OperatingMode::Play => {
                    self.hw.start_capture_timer();
                    self.hw.enable(InterruptSource::PitchEdge);
                    self.hw.enable(InterruptSource::VolumeEdge);
                    self.hw.enable(InterruptSource::WaveTick);
                }
                OperatingMode::PitchCalibration => self.start_calibration(Sensor::Pitch, shared),
                OperatingMode::VolumeCalibration => self.start_calibration(Sensor::Volume, shared),
            }
        });
    }

    fn start_calibration(&mut self, sensor: Sensor, shared: &Shared) {
        shared.calibration.reset();
        self.hw.start_calibration_timer(sensor);
        self.hw.enable(InterruptSource::CalibrationOverflow);
    }

    /// `mm.hw()` is a reference to the managed hardware.
    pub fn hw(&self) -> &H {
        &self.hw
    }

    /// `mm.release()` gives the hardware back.
    pub fn release(self) -> H {
        self.hw
    }
}
