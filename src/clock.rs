//! A logical clock driven by the wave tick.
//!
//! The tick handler advances the clock once per tick, which gives host logic a 32µs time base without a second
//! hardware timer.

use core::cell::Cell;

use critical_section::Mutex;

/// The rate of the wave tick.
pub const TICK_HZ: u32 = 31_250;

/// The period of the wave tick.
pub const MICROS_PER_TICK: u32 = 1_000_000 / TICK_HZ;

/// A wrapping tick counter.
pub struct TickClock {
    ticks: Mutex<Cell<u32>>,
}

impl TickClock {
    /// `TickClock::new()` is a clock at tick zero.
    pub const fn new() -> Self {
        Self {
            ticks: Mutex::new(Cell::new(0)),
        }
    }

    /// `clk.advance()` moves the clock forward by one tick.
    pub fn advance(&self) {
        critical_section::with(|cs| {
            let ticks = self.ticks.borrow(cs);
            ticks.set(ticks.get().wrapping_add(1));
        });
    }

    /// `clk.ticks()` is the raw tick count, wrapping after about 38 hours.
    pub fn ticks(&self) -> u32 {
        critical_section::with(|cs| self.ticks.borrow(cs).get())
    }

    /// `clk.micros()` is the elapsed time in microseconds, wrapping after about 71 minutes.
    pub fn micros(&self) -> u32 {
        self.ticks().wrapping_mul(MICROS_PER_TICK)
    }

    /// `clk.millis()` is the elapsed time in milliseconds.
    pub fn millis(&self) -> u32 {
        (self.ticks() as u64 * MICROS_PER_TICK as u64 / 1_000) as u32
    }

    /// `clk.elapsed_since(t)` is the number of ticks since the clock read `t`.
    ///
    /// Correct across one wrap of the counter.
    pub fn elapsed_since(&self, start: u32) -> u32 {
        self.ticks().wrapping_sub(start)
    }

    /// `clk.has_elapsed(t, n)` is true if at least `n` ticks passed since the clock read `t`.
    pub fn has_elapsed(&self, start: u32, ticks: u32) -> bool {
        self.elapsed_since(start) >= ticks
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

/// `millis_to_ticks(ms)` is the number of ticks in `ms` milliseconds, rounded down.
pub const fn millis_to_ticks(ms: u32) -> u32 {
    (ms as u64 * 1_000 / MICROS_PER_TICK as u64) as u32
}
