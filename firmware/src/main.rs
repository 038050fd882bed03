// cargo flash --chip stm32l031k6tx --release

#![no_std]
#![no_main]

mod board;
mod mode_switch;

use core::cell::RefCell;

use cortex_m_rt::entry;
use cortex_m_semihosting::hprintln;
use critical_section::Mutex;
use panic_halt as _;
use stm32l0xx_hal::pac::interrupt;

use theremin_core::{
    calibration,
    config::Config,
    generator::WaveGenerator,
    mode::{ModeManager, OperatingMode, Sensor},
    shared::Shared,
    waveforms::BUILTIN,
    wavetable::{WaveformTable, TABLE_COUNT},
};

use crate::board::{Board, ModeControl, TickHardware};
use crate::mode_switch::ModeSwitch;

/// Pitch oscillator delta at the lowest playable note, found by tuning the instrument.
const PITCH_REFERENCE: u16 = 20_000;

/// Volume oscillator delta with the hand far from the volume antenna.
const VOLUME_REFERENCE: u16 = 30_000;

/// One calibration measurement, one second of the 16MHz core clock.
const CALIBRATION_WINDOW_CYCLES: u32 = 16_000_000;
const CALIBRATION_WINDOW_US: u32 = 1_000_000;

static SHARED: Shared = Shared::new();

/// Handed over from `main` to the tick interrupt, which keeps it from then on.
static TICK_HARDWARE: Mutex<RefCell<Option<TickHardware>>> = Mutex::new(RefCell::new(None));

/// Run the theremin.
///
/// Thread context does everything that is not time critical: it follows the panel mode switch, maps published
/// readings onto the playback controls and reports calibration measurements.
#[entry]
fn main() -> ! {
    let Board { tick, modes, panel } = Board::init();
    critical_section::with(|cs| TICK_HARDWARE.borrow_ref_mut(cs).replace(tick));

    let config = Config::new();
    config.apply(&SHARED);
    hprintln!("theremin ready, {:?} output", config.output);

    let mut modes = ModeManager::new(modes);
    let mut mode_switch = ModeSwitch::new();

    loop {
        if let Some(mode) = mode_switch.poll(&panel) {
            hprintln!("entering {:?}", mode);
            modes.enter(mode, &SHARED);
        }

        match SHARED.mode() {
            OperatingMode::Play => play(),
            OperatingMode::PitchCalibration => calibrate(&modes, Sensor::Pitch),
            OperatingMode::VolumeCalibration => calibrate(&modes, Sensor::Volume),
        }
    }
}

/// Apply fresh readings to the playback controls, then sleep until the next interrupt.
fn play() {
    if let Some(delta) = SHARED.pitch.take_reading() {
        SHARED.controls.set_increment(pitch_to_increment(delta));
    }
    if let Some(delta) = SHARED.volume.take_reading() {
        SHARED.controls.set_volume(delta_to_volume(delta));
    }
    cortex_m::asm::wfi();
}

/// Measure the absolute frequency of `sensor`'s oscillator over one window and report it.
fn calibrate(modes: &ModeManager<ModeControl>, sensor: Sensor) {
    critical_section::with(|_| {
        SHARED.calibration.reset();
        modes.hw().restart_count(sensor);
    });

    cortex_m::asm::delay(CALIBRATION_WINDOW_CYCLES);

    let (overflows, residual) =
        critical_section::with(|_| (SHARED.calibration.overflows(), modes.hw().residual(sensor)));

    match calibration::frequency_hz(overflows, residual, modes.hw().period(sensor), CALIBRATION_WINDOW_US) {
        Ok(hz) => hprintln!("{:?}: {} Hz", sensor, hz),
        Err(e) => hprintln!("{:?}: {}", sensor, e),
    }
}

// TODO: replace the linear mappings with the pitch and volume curves from the calibration results
/// `pitch_to_increment(d)` is the table pointer increment for a pitch oscillator delta of `d`.
///
/// The closer the hand, the lower the beat frequency and the smaller the delta, so the pitch rises as the delta falls.
fn pitch_to_increment(delta: u16) -> u16 {
    PITCH_REFERENCE.saturating_sub(delta).saturating_mul(2)
}

/// `delta_to_volume(d)` is the volume for a volume oscillator delta of `d`.
fn delta_to_volume(delta: u16) -> u8 {
    (VOLUME_REFERENCE.saturating_sub(delta) >> 4).min(u8::MAX as u16) as u8
}

#[interrupt]
fn TIM2() {
    static mut GENERATOR: WaveGenerator<&'static [WaveformTable; TABLE_COUNT]> =
        WaveGenerator::new(&BUILTIN, Config::new().output);
    static mut HARDWARE: Option<TickHardware> = None;

    if HARDWARE.is_none() {
        *HARDWARE = critical_section::with(|cs| TICK_HARDWARE.borrow_ref_mut(cs).take());
    }
    if let Some(hw) = HARDWARE {
        GENERATOR.tick(&SHARED, hw);
    }
}

#[interrupt]
fn TIM21() {
    if let Some(counter) = board::pitch_capture() {
        SHARED.on_pitch_edge(counter);
    }
    if board::calibration_overflowed(Sensor::Pitch) {
        SHARED.on_calibration_overflow();
    }
}

#[interrupt]
fn TIM22() {
    if board::calibration_overflowed(Sensor::Volume) {
        SHARED.on_calibration_overflow();
    }
}

#[interrupt]
fn EXTI4_15() {
    SHARED.on_volume_edge(board::volume_capture());
}
