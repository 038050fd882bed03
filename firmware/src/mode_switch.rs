use theremin_core::mode::OperatingMode;

use crate::board::Panel;

/// The front panel three position mode switch.
pub struct ModeSwitch {
    /// The mode reported by the last poll
    last: Option<OperatingMode>,
}

impl ModeSwitch {
    /// `ModeSwitch::new()` is a mode switch that has not been read yet.
    pub fn new() -> Self {
        Self { last: None }
    }

    /// `sw.read(panel)` is the mode currently selected on the panel.
    pub fn read(&self, panel: &Panel) -> OperatingMode {
        match panel.mode_switch() {
            (false, true) => OperatingMode::PitchCalibration,
            (true, false) => OperatingMode::VolumeCalibration,
            _ => OperatingMode::Play,
        }
    }

    /// `sw.poll(panel)` is the selected mode if it changed since the last poll.
    ///
    /// The first poll always reports the selected mode.
    pub fn poll(&mut self, panel: &Panel) -> Option<OperatingMode> {
        let mode = self.read(panel);
        if self.last == Some(mode) {
            None
        } else {
            self.last = Some(mode);
            Some(mode)
        }
    }
}
