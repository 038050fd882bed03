//! Absolute frequency measurement for the calibration modes.
//!
//! In calibration the oscillator under test clocks a hardware timer directly and every timer overflow bumps the
//! [`CalibrationCounter`]. Host logic resets the counter, waits a known window and converts the overflow count plus
//! the residual timer count into hertz with [`frequency_hz`].

use core::cell::Cell;

use critical_section::Mutex;

use crate::Error;

/// A wrapping count of calibration timer overflows.
pub struct CalibrationCounter {
    overflows: Mutex<Cell<u16>>,
}

impl CalibrationCounter {
    /// `CalibrationCounter::new()` is a counter at zero.
    pub const fn new() -> Self {
        Self {
            overflows: Mutex::new(Cell::new(0)),
        }
    }

    /// `cc.on_overflow()` counts one timer overflow.
    ///
    /// Called from the calibration timer's overflow interrupt.
    pub fn on_overflow(&self) {
        critical_section::with(|cs| {
            let overflows = self.overflows.borrow(cs);
            overflows.set(overflows.get().wrapping_add(1));
        });
    }

    /// `cc.overflows()` is the number of overflows counted since the last reset.
    pub fn overflows(&self) -> u16 {
        critical_section::with(|cs| self.overflows.borrow(cs).get())
    }

    /// `cc.reset()` sets the counter back to zero.
    pub fn reset(&self) {
        critical_section::with(|cs| self.overflows.borrow(cs).set(0));
    }
}

impl Default for CalibrationCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// `frequency_hz(o, r, p, w)` is the frequency of an oscillator that overflowed a timer of period `p` counts `o`
/// times and left `r` residual counts during a window of `w` microseconds.
///
/// # Arguments
///
/// * `overflows` - overflows counted during the window
///
/// * `residual` - timer count at the end of the window
///
/// * `period` - counts per overflow, e.g. 65536 for a free-running 16 bit timer
///
/// * `window_us` - length of the measurement window in microseconds
pub fn frequency_hz(overflows: u16, residual: u16, period: u32, window_us: u32) -> Result<u32, Error> {
    if window_us == 0 {
        return Err(Error::EmptyMeasurementWindow);
    }

    let cycles = overflows as u64 * period as u64 + residual as u64;
    Ok((cycles * 1_000_000 / window_us as u64) as u32)
}
