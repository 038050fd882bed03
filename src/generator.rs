//! The periodic wave generation handler.
//!
//! One call to [`WaveGenerator::tick`] is one service of the ~31.25kHz tick interrupt. It has about 25µs of the 32µs
//! period to itself, and about 10µs of that is the converter transfer. There is no detection of a missed deadline: a
//! late tick simply delays the next one.

use crate::{
    config::OutputMode,
    mode::OperatingMode,
    shaper,
    shared::Shared,
    wavetable::{WaveformSource, TABLE_LEN},
};

/// Fractional bits of the table pointer.
pub const POINTER_FRACTION_BITS: u32 = 6;

/// The largest increment that can be sent to the converter in control voltage mode.
pub const CV_INCREMENT_MAX: u16 = 4095;

/// The synthesis cursor.
///
/// The table pointer is a 16 bit fixed point number with [`POINTER_FRACTION_BITS`] fractional bits, which is exactly
/// one table of [`TABLE_LEN`] samples. It wraps around with the fixed width arithmetic, so the table repeats without
/// any bounds handling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlaybackState {
    pointer: u16,
}

impl PlaybackState {
    /// `PlaybackState::at(p)` is a cursor with table pointer `p`.
    pub const fn at(pointer: u16) -> Self {
        Self { pointer }
    }

    /// `ps.pointer()` is the raw table pointer.
    pub const fn pointer(&self) -> u16 {
        self.pointer
    }

    /// `ps.offset()` is the table offset of the pointer, in `[0, TABLE_LEN)`.
    pub const fn offset(&self) -> usize {
        (self.pointer >> POINTER_FRACTION_BITS) as usize & (TABLE_LEN - 1)
    }

    /// `ps.advance(i)` steps the pointer by increment `i`, wrapping.
    pub fn advance(&mut self, increment: u16) {
        self.pointer = self.pointer.wrapping_add(increment);
    }
}

/// The hardware the tick handler talks to.
pub trait TickIo {
    /// Mask the tick's own interrupt and let everything else preempt the rest of the tick.
    fn begin_tick(&mut self);

    /// Send one code to the converter, returning once the transfer is done.
    fn write_converter(&mut self, code: u16);

    /// The current digital level of the pitch oscillator.
    fn pitch_level(&mut self) -> bool;

    /// The current digital level of the volume oscillator.
    fn volume_level(&mut self) -> bool;

    /// Mask interrupts and, if `rearm` is set, unmask the tick's own interrupt for the next period.
    fn end_tick(&mut self, rearm: bool);
}

/// Owns the playback state and produces one output code per tick.
pub struct WaveGenerator<S> {
    source: S,
    output: OutputMode,
    playback: PlaybackState,
}

impl<S: WaveformSource> WaveGenerator<S> {
    /// `WaveGenerator::new(src, out)` is a generator at the start of the table, reading waveforms from `src` and
    /// producing `out`.
    pub const fn new(source: S, output: OutputMode) -> Self {
        Self {
            source,
            output,
            playback: PlaybackState::at(0),
        }
    }

    /// `wg.output()` is the output mode chosen at construction.
    pub fn output(&self) -> OutputMode {
        self.output
    }

    /// `wg.playback()` is the current synthesis cursor.
    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    /// `wg.seek(p)` moves the table pointer to `p`.
    pub fn seek(&mut self, pointer: u16) {
        self.playback = PlaybackState::at(pointer);
    }

    /// `wg.tick(sh, io)` services one tick of the wave interrupt.
    ///
    /// Outside play mode the tick does nothing and leaves its interrupt masked, it was only pending from before the
    /// mode switch.
    pub fn tick<IO: TickIo>(&mut self, shared: &Shared, io: &mut IO) {
        io.begin_tick();

        if shared.mode() != OperatingMode::Play {
            io.end_tick(false);
            return;
        }

        match self.output {
            OutputMode::ControlVoltage => {
                let increment = shared.controls.clamp_increment(CV_INCREMENT_MAX);
                io.write_converter(increment);
            }
            OutputMode::Audio => {
                let controls = shared.controls.snapshot();
                let sample = self.source.sample(controls.waveform, self.playback.offset());
                io.write_converter(shaper::shape(sample, controls.volume));
                self.playback.advance(controls.increment);
            }
        }

        shared.clock.advance();

        shared.pitch.debounce(io.pitch_level());
        shared.volume.debounce(io.volume_level());

        io.end_tick(shared.mode() == OperatingMode::Play);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mode::OperatingMode,
        waveforms::BUILTIN,
        wavetable::{Waveform, WaveformTable, TABLE_COUNT},
    };

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Call {
        Begin,
        Write(u16),
        Pitch,
        Volume,
        End(bool),
    }

    #[derive(Default)]
    struct MockIo {
        calls: Vec<Call>,
        pitch: bool,
        volume: bool,
    }

    impl MockIo {
        fn written(&self) -> Vec<u16> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Write(code) => Some(*code),
                    _ => None,
                })
                .collect()
        }
    }

    impl TickIo for MockIo {
        fn begin_tick(&mut self) {
            self.calls.push(Call::Begin);
        }

        fn write_converter(&mut self, code: u16) {
            self.calls.push(Call::Write(code));
        }

        fn pitch_level(&mut self) -> bool {
            self.calls.push(Call::Pitch);
            self.pitch
        }

        fn volume_level(&mut self) -> bool {
            self.calls.push(Call::Volume);
            self.volume
        }

        fn end_tick(&mut self, rearm: bool) {
            self.calls.push(Call::End(rearm));
        }
    }

    /// Tables whose samples are small and distinct, so every read is identifiable.
    fn ramp_tables() -> [WaveformTable; TABLE_COUNT] {
        let mut tables = [[0; TABLE_LEN]; TABLE_COUNT];
        for (t, table) in tables.iter_mut().enumerate() {
            for (i, s) in table.iter_mut().enumerate() {
                *s = i as i16 - 512 + t as i16;
            }
        }
        tables
    }

    #[test]
    fn a_tick_runs_its_steps_in_order() {
        let shared = Shared::new();
        shared.controls.set_volume(255);
        let mut wg = WaveGenerator::new(&BUILTIN, OutputMode::Audio);
        let mut io = MockIo::default();

        wg.tick(&shared, &mut io);

        assert_eq!(
            io.calls,
            vec![
                Call::Begin,
                Call::Write(shaper::SILENCE),
                Call::Pitch,
                Call::Volume,
                Call::End(true)
            ]
        );
        assert_eq!(shared.clock.ticks(), 1);
    }

    #[test]
    fn plays_table_seven_at_unit_rate() {
        let shared = Shared::new();
        shared.controls.set_waveform(Waveform::LAST);
        shared.controls.set_volume(255);
        shared.controls.set_increment(64);

        let mut wg = WaveGenerator::new(&BUILTIN, OutputMode::Audio);
        let mut io = MockIo::default();
        for _ in 0..TABLE_LEN {
            wg.tick(&shared, &mut io);
        }

        let expected = BUILTIN[7].iter().map(|&s| shaper::shape(s, 255)).collect::<Vec<_>>();
        let written = io.written();
        assert_eq!(written.len(), TABLE_LEN);
        for (i, (&got, &want)) in written.iter().zip(&expected).enumerate() {
            assert!((got as i32 - want as i32).abs() <= 1, "sample {}: {} vs {}", i, got, want);
        }
        // back at the start after one full cycle
        assert_eq!(wg.playback().pointer(), 0);
    }

    #[test]
    fn pointer_wraps_to_offset_zero() {
        let tables = ramp_tables();
        let shared = Shared::new();
        shared.controls.set_volume(255);
        shared.controls.set_increment(64);

        let mut wg = WaveGenerator::new(&tables, OutputMode::Audio);
        wg.seek(u16::MAX - 63);
        assert_eq!(wg.playback().offset(), TABLE_LEN - 1);

        let mut io = MockIo::default();
        wg.tick(&shared, &mut io);
        assert_eq!(wg.playback().pointer(), 0);
        assert_eq!(wg.playback().offset(), 0);
        wg.tick(&shared, &mut io);

        assert_eq!(
            io.written(),
            vec![shaper::shape(tables[0][TABLE_LEN - 1], 255), shaper::shape(tables[0][0], 255)]
        );
    }

    #[test]
    fn offsets_advance_smoothly_across_the_wrap() {
        for increment in [1u16, 63, 64, 100, 777, 4095, 40_000] {
            let mut ps = PlaybackState::at(u16::MAX - increment / 2);
            let before = ps.offset();
            ps.advance(increment);
            let step = (ps.offset() + TABLE_LEN - before) % TABLE_LEN;

            let nominal = (increment >> POINTER_FRACTION_BITS) as usize;
            assert!(step == nominal || step == nominal + 1, "increment {} stepped {}", increment, step);
        }
    }

    #[test]
    fn playback_rate_follows_the_increment() {
        let tables = ramp_tables();
        let shared = Shared::new();
        shared.controls.set_volume(255);
        shared.controls.set_increment(3 * 64 + 32);

        let mut wg = WaveGenerator::new(&tables, OutputMode::Audio);
        let mut io = MockIo::default();
        for _ in 0..4 {
            wg.tick(&shared, &mut io);
        }

        // 3.5 samples per tick reads offsets 0, 3, 7, 10
        let expected = [0, 3, 7, 10]
            .iter()
            .map(|&i| shaper::shape(tables[0][i], 255))
            .collect::<Vec<_>>();
        assert_eq!(io.written(), expected);
    }

    #[test]
    fn zero_volume_is_silent() {
        let shared = Shared::new();
        shared.controls.set_increment(500);
        let mut wg = WaveGenerator::new(&BUILTIN, OutputMode::Audio);
        let mut io = MockIo::default();
        for _ in 0..200 {
            wg.tick(&shared, &mut io);
        }
        assert!(io.written().iter().all(|&c| c == shaper::SILENCE));
    }

    #[test]
    fn control_voltage_mode_sends_the_clamped_increment() {
        let shared = Shared::new();
        shared.controls.set_volume(255);
        let mut wg = WaveGenerator::new(&BUILTIN, OutputMode::ControlVoltage);
        let mut io = MockIo::default();

        shared.controls.set_increment(1_234);
        wg.tick(&shared, &mut io);
        shared.controls.set_increment(9_999);
        wg.tick(&shared, &mut io);

        assert_eq!(io.written(), vec![1_234, CV_INCREMENT_MAX]);
        assert_eq!(shared.controls.snapshot().increment, CV_INCREMENT_MAX);
        assert_eq!(wg.playback().pointer(), 0);
        assert_eq!(shared.clock.ticks(), 2);
    }

    #[test]
    fn ticks_drive_both_debouncers() {
        let shared = Shared::new();
        let mut wg = WaveGenerator::new(&BUILTIN, OutputMode::Audio);
        let mut io = MockIo {
            pitch: true,
            ..MockIo::default()
        };

        shared.on_pitch_edge(2_000);
        shared.on_volume_edge(3_000);
        for _ in 0..5 {
            wg.tick(&shared, &mut io);
        }
        assert_eq!(shared.pitch.reading(), Some(2_000));
        assert_eq!(shared.volume.debounce_count(), 0);

        io.volume = true;
        for _ in 0..5 {
            wg.tick(&shared, &mut io);
        }
        assert_eq!(shared.volume.reading(), Some(3_000));
    }

    #[test]
    fn calibration_ticks_do_nothing_and_stay_masked() {
        let shared = Shared::new();
        critical_section::with(|cs| shared.set_mode(cs, OperatingMode::PitchCalibration));
        shared.controls.set_volume(255);
        shared.controls.set_increment(64);

        let mut wg = WaveGenerator::new(&BUILTIN, OutputMode::Audio);
        let mut io = MockIo {
            pitch: true,
            volume: true,
            ..MockIo::default()
        };
        for _ in 0..10 {
            wg.tick(&shared, &mut io);
        }

        assert!(io.written().is_empty());
        assert_eq!(io.calls.last(), Some(&Call::End(false)));
        assert_eq!(shared.clock.ticks(), 0);
        assert_eq!(shared.pitch.debounce_count(), 0);
        assert_eq!(shared.volume.debounce_count(), 0);
        assert_eq!(wg.playback().pointer(), 0);
    }
}
