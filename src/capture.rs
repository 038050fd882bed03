//! Frequency measurement of the pitch and volume oscillators.
//!
//! Each channel has two producers. The capture interrupt fires on every qualifying edge of the oscillator, latches a
//! free-running counter and restarts the debounce count. The tick handler samples the oscillator's digital level once
//! per tick and counts the ticks it stays asserted. After three confirmations the counter difference between the last
//! two latches is taken as the new delta, after five the reading is published. A glitch that lasts one or two ticks is
//! thus never measured.

use core::cell::RefCell;

use critical_section::Mutex;

/// Consecutive asserted ticks after which the delta is computed.
pub const COMPUTE_THRESHOLD: u8 = 3;

/// Consecutive asserted ticks after which the reading is published.
pub const PUBLISH_THRESHOLD: u8 = 5;

/// What a debounce step did, if anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebounceEvent {
    /// A new delta was computed from the last two latched counter values.
    Computed(u16),
    /// The ready flag was raised.
    Published,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ChannelState {
    latched: u16,
    previous: u16,
    delta: u16,
    debounce: u8,
    ready: bool,
}

/// One debounced frequency measurement channel.
///
/// A channel is `Sync` and meant to live in a `static` shared by its capture interrupt, the tick handler and the
/// host logic. Every access is a short critical section.
pub struct CaptureChannel {
    state: Mutex<RefCell<ChannelState>>,
}

impl CaptureChannel {
    /// `CaptureChannel::new()` is a channel that has never seen an edge.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(ChannelState {
                latched: 0,
                previous: 0,
                delta: 0,
                debounce: 0,
                ready: false,
            })),
        }
    }

    /// `ch.capture(c)` records an oscillator edge seen when the free-running counter read `c`.
    ///
    /// Called from the channel's capture interrupt.
    pub fn capture(&self, counter: u16) {
        critical_section::with(|cs| {
            let mut s = self.state.borrow_ref_mut(cs);
            s.latched = counter;
            s.debounce = 0;
        });
    }

    /// `ch.debounce(level)` advances the debounce logic by one tick with the oscillator at `level`.
    ///
    /// Called once per tick from the tick handler. The debounce count saturates, so a stuck oscillator never
    /// re-triggers a computation.
    pub fn debounce(&self, level: bool) -> Option<DebounceEvent> {
        critical_section::with(|cs| {
            let mut s = self.state.borrow_ref_mut(cs);
            if level {
                s.debounce = s.debounce.saturating_add(1);
            }

            match s.debounce {
                COMPUTE_THRESHOLD if level => {
                    s.delta = s.latched.wrapping_sub(s.previous);
                    s.previous = s.latched;
                    Some(DebounceEvent::Computed(s.delta))
                }
                PUBLISH_THRESHOLD if level => {
                    s.ready = true;
                    Some(DebounceEvent::Published)
                }
                _ => None,
            }
        })
    }

    /// `ch.reading()` is the latest published delta, or `None` if no reading is ready.
    pub fn reading(&self) -> Option<u16> {
        critical_section::with(|cs| {
            let s = self.state.borrow_ref(cs);
            s.ready.then(|| s.delta)
        })
    }

    /// `ch.take_reading()` is the latest published delta, clearing the ready flag.
    ///
    /// This is how host logic acknowledges a reading; the tick handler never clears the flag.
    pub fn take_reading(&self) -> Option<u16> {
        critical_section::with(|cs| {
            let mut s = self.state.borrow_ref_mut(cs);
            let reading = s.ready.then(|| s.delta);
            s.ready = false;
            reading
        })
    }

    /// `ch.delta()` is the last computed delta, published or not.
    pub fn delta(&self) -> u16 {
        critical_section::with(|cs| self.state.borrow_ref(cs).delta)
    }

    /// `ch.is_ready()` is true if a published reading has not been taken yet.
    pub fn is_ready(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).ready)
    }

    /// `ch.debounce_count()` is the number of asserted ticks since the last edge.
    pub fn debounce_count(&self) -> u8 {
        critical_section::with(|cs| self.state.borrow_ref(cs).debounce)
    }
}

impl Default for CaptureChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run `levels` through the debounce logic, collecting the events.
    fn run(ch: &CaptureChannel, levels: &[bool]) -> Vec<(usize, DebounceEvent)> {
        levels
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| ch.debounce(l).map(|e| (i + 1, e)))
            .collect()
    }

    #[test]
    fn short_glitches_are_rejected() {
        for glitch_len in 1..=2 {
            let ch = CaptureChannel::new();
            ch.capture(1000);

            let mut levels = vec![true; glitch_len];
            levels.extend([false; 10]);

            assert!(run(&ch, &levels).is_empty());
            assert!(ch.debounce_count() < COMPUTE_THRESHOLD);
            assert_eq!(ch.delta(), 0);
            assert_eq!(ch.reading(), None);
        }
    }

    #[test]
    fn delta_at_tick_three_and_ready_at_tick_five() {
        let ch = CaptureChannel::new();
        ch.capture(400);

        let events = run(&ch, &[true; 12]);

        assert_eq!(
            events,
            vec![(3, DebounceEvent::Computed(400)), (5, DebounceEvent::Published)]
        );
        assert_eq!(ch.reading(), Some(400));
        assert_eq!(ch.debounce_count(), 12);
    }

    #[test]
    fn deasserted_ticks_hold_the_count() {
        let ch = CaptureChannel::new();
        ch.capture(50);

        let events = run(&ch, &[true, true, false, false, true, false, true, true, true]);

        // the third and fifth asserted ticks are ticks 5 and 8
        assert_eq!(
            events,
            vec![(5, DebounceEvent::Computed(50)), (8, DebounceEvent::Published)]
        );
    }

    #[test]
    fn each_edge_measures_the_counter_difference() {
        let ch = CaptureChannel::new();

        ch.capture(1_000);
        run(&ch, &[true; 6]);
        ch.capture(1_250);
        run(&ch, &[true; 6]);
        assert_eq!(ch.take_reading(), Some(250));

        ch.capture(1_600);
        run(&ch, &[true; 3]);
        assert_eq!(ch.delta(), 350);
    }

    #[test]
    fn delta_wraps_with_the_free_running_counter() {
        let ch = CaptureChannel::new();
        ch.capture(65_000);
        run(&ch, &[true; 5]);
        ch.capture(464);
        run(&ch, &[true; 5]);
        assert_eq!(ch.reading(), Some(1_000));
    }

    #[test]
    fn an_edge_restarts_the_debounce() {
        let ch = CaptureChannel::new();
        ch.capture(10);
        run(&ch, &[true, true]);
        ch.capture(30);
        let events = run(&ch, &[true; 3]);

        assert_eq!(events, vec![(3, DebounceEvent::Computed(30))]);
    }

    #[test]
    fn ready_flag_survives_until_taken() {
        let ch = CaptureChannel::new();
        ch.capture(77);
        run(&ch, &[true; 5]);

        // a new edge restarts debouncing but leaves the published reading alone
        ch.capture(177);
        run(&ch, &[true; 2]);
        assert!(ch.is_ready());
        assert_eq!(ch.reading(), Some(77));

        assert_eq!(ch.take_reading(), Some(77));
        assert!(!ch.is_ready());
        assert_eq!(ch.take_reading(), None);
    }

    #[test]
    fn stuck_oscillator_computes_only_once() {
        let ch = CaptureChannel::new();
        ch.capture(5);

        let events = run(&ch, &[true; 600]);

        assert_eq!(events.len(), 2);
        assert_eq!(ch.debounce_count(), u8::MAX);
    }
}
