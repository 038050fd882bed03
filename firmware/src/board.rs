use stm32l0xx_hal::{
    exti::{Exti, ExtiLine, GpioLine, TriggerEdge},
    gpio::{
        gpioa::{PA4, PA5, PA7},
        gpiob::{PB0, PB1},
        Analog, Input, Output, PullUp, PushPull,
    },
    pac::{self, Interrupt, Peripherals, NVIC, SPI1, TIM2},
    prelude::*,
    rcc::Config,
    spi::{self, NoMiso, Spi},
    syscfg::SYSCFG,
    timer::Timer,
};

use theremin_core::{
    clock::TICK_HZ,
    generator::TickIo,
    mode::{InterruptSource, ModeHardware, Sensor},
};

/// GPIOA pin carrying the pitch oscillator, TIM21_CH1 on AF0.
const PITCH_PIN: u8 = 2;

/// GPIOA pin carrying the volume oscillator, EXTI6 and TIM22_CH1 on AF5.
const VOLUME_PIN: u8 = 6;

/// Counts per overflow of the pitch calibration timer, a free-running 16 bit TIM21.
pub const PITCH_CALIBRATION_PERIOD: u32 = 1 << 16;

/// Counts per overflow of the volume calibration timer, TIM22 reloading at 0xFF.
pub const VOLUME_CALIBRATION_PERIOD: u32 = 1 << 8;

/// MCP4921 command bits: channel A, unbuffered, 1x gain, output enabled.
const MCP4921_WRITE: u16 = 0x3000;
const MCP4921_DATA_MASK: u16 = 0x0FFF;

// Cortex-M0+ only implements the top two priority bits, lower is more urgent
const CAPTURE_PRIORITY: u8 = 0x00;
const TICK_PRIORITY: u8 = 0x40;

// RCC_APB2ENR
const TIM21EN: u32 = 1 << 2;
const TIM22EN: u32 = 1 << 5;

// TIMx register bits shared by TIM21 and TIM22
const CR1_CEN: u32 = 1 << 0;
const DIER_UIE: u32 = 1 << 0;
const DIER_CC1IE: u32 = 1 << 1;
const SR_UIF: u32 = 1 << 0;
const SR_CC1IF: u32 = 1 << 1;
const CCMR1_CC1S_TI1: u32 = 0b01;
const CCER_CC1E: u32 = 1 << 0;
const SMCR_EXT_CLOCK_TI1FP1: u32 = (0b101 << 4) | 0b111;

type DacSpi = Spi<SPI1, (PA5<Analog>, NoMiso, PA7<Analog>)>;

/// The physical board hardware is represented here.
///
/// The peripherals are split by who uses them: the tick interrupt owns [`TickHardware`], thread context owns the
/// [`ModeControl`] and the [`Panel`].
pub struct Board {
    pub tick: TickHardware,
    pub modes: ModeControl,
    pub panel: Panel,
}

/// Peripherals used by the wave tick.
pub struct TickHardware {
    /// 31.25kHz tick timer
    timer: Timer<TIM2>,

    /// SPI bus to the MCP4921 DAC
    spi: DacSpi,

    /// DAC chip select, active low
    dac_cs: PA4<Output<PushPull>>,
}

/// Timer and interrupt configuration for the operating modes.
pub struct ModeControl {
    _private: (),
}

/// Front panel mode switch.
pub struct Panel {
    switch_1: PB0<Input<PullUp>>,
    switch_2: PB1<Input<PullUp>>,
}

impl Board {
    /// `Board::init()` is the board with all peripherals initialized and every core interrupt masked.
    pub fn init() -> Self {
        let cp = cortex_m::Peripherals::take().unwrap();
        let dp = Peripherals::take().unwrap();

        // use internal HSI oscillator as clock, the capture timer counts at the full 16MHz
        let mut rcc = dp.RCC.freeze(Config::hsi16());

        let gpioa = dp.GPIOA.split(&mut rcc);
        let gpiob = dp.GPIOB.split(&mut rcc);

        let mut dac_cs = gpioa.pa4.into_push_pull_output();
        dac_cs.set_high().unwrap();
        let spi = dp
            .SPI1
            .spi((gpioa.pa5, NoMiso, gpioa.pa7), spi::MODE_0, 8.MHz(), &mut rcc);

        let mut timer = Timer::new(dp.TIM2, TICK_HZ.Hz(), &mut rcc);
        timer.listen();

        // the volume oscillator interrupts on its rising edge, the pitch one is captured by TIM21
        let volume_pin = gpioa.pa6.into_floating_input();
        let _pitch_pin = gpioa.pa2.into_floating_input();
        let mut syscfg = SYSCFG::new(dp.SYSCFG, &mut rcc);
        let mut exti = Exti::new(dp.EXTI);
        let line = GpioLine::from_raw_line(volume_pin.pin_number()).unwrap();
        exti.listen_gpio(&mut syscfg, volume_pin.port(), line, TriggerEdge::Rising);

        let rcc_regs = unsafe { &*pac::RCC::ptr() };
        rcc_regs
            .apb2enr
            .modify(|r, w| unsafe { w.bits(r.bits() | TIM21EN | TIM22EN) });

        let mut nvic = cp.NVIC;
        unsafe {
            nvic.set_priority(Interrupt::TIM21, CAPTURE_PRIORITY);
            nvic.set_priority(Interrupt::TIM22, CAPTURE_PRIORITY);
            nvic.set_priority(Interrupt::EXTI4_15, CAPTURE_PRIORITY);
            nvic.set_priority(Interrupt::TIM2, TICK_PRIORITY);
        }

        let mut modes = ModeControl { _private: () };
        modes.disable_all();

        Self {
            tick: TickHardware { timer, spi, dac_cs },
            modes,
            panel: Panel {
                switch_1: gpiob.pb0.into_pull_up_input(),
                switch_2: gpiob.pb1.into_pull_up_input(),
            },
        }
    }
}

impl TickHardware {
    /// `th.dac_write(w)` shifts the 16 bit command word `w` out to the DAC, returning once the last bit is out.
    fn dac_write(&mut self, word: u16) -> Result<(), spi::Error> {
        self.dac_cs.set_low().ok();
        for byte in word.to_be_bytes() {
            nb::block!(self.spi.send(byte))?;
            nb::block!(self.spi.read())?;
        }
        self.dac_cs.set_high().ok();
        Ok(())
    }
}

impl TickIo for TickHardware {
    fn begin_tick(&mut self) {
        NVIC::mask(Interrupt::TIM2);
        self.timer.clear_irq();
    }

    fn write_converter(&mut self, code: u16) {
        // a failed transfer just loses this sample
        if self.dac_write(MCP4921_WRITE | (code & MCP4921_DATA_MASK)).is_err() {
            self.dac_cs.set_high().ok();
        }
    }

    fn pitch_level(&mut self) -> bool {
        gpioa_level(PITCH_PIN)
    }

    fn volume_level(&mut self) -> bool {
        gpioa_level(VOLUME_PIN)
    }

    fn end_tick(&mut self, rearm: bool) {
        if rearm {
            unsafe { NVIC::unmask(Interrupt::TIM2) };
        }
    }
}

impl ModeControl {
    /// `mc.residual(s)` is the current count of `s`'s calibration timer.
    pub fn residual(&self, sensor: Sensor) -> u16 {
        match sensor {
            Sensor::Pitch => tim21().cnt.read().bits() as u16,
            Sensor::Volume => tim22().cnt.read().bits() as u16,
        }
    }

    /// `mc.restart_count(s)` sets `s`'s calibration timer back to zero.
    pub fn restart_count(&self, sensor: Sensor) {
        match sensor {
            Sensor::Pitch => tim21().cnt.write(|w| unsafe { w.bits(0) }),
            Sensor::Volume => tim22().cnt.write(|w| unsafe { w.bits(0) }),
        }
    }

    /// `mc.period(s)` is the number of counts per overflow of `s`'s calibration timer.
    pub fn period(&self, sensor: Sensor) -> u32 {
        match sensor {
            Sensor::Pitch => PITCH_CALIBRATION_PERIOD,
            Sensor::Volume => VOLUME_CALIBRATION_PERIOD,
        }
    }
}

impl ModeHardware for ModeControl {
    fn disable_all(&mut self) {
        NVIC::mask(Interrupt::TIM2);
        NVIC::mask(Interrupt::TIM21);
        NVIC::mask(Interrupt::TIM22);
        NVIC::mask(Interrupt::EXTI4_15);

        for tim in [tim21(), tim22()] {
            tim.cr1.write(|w| unsafe { w.bits(0) });
            tim.dier.write(|w| unsafe { w.bits(0) });
            tim.smcr.write(|w| unsafe { w.bits(0) });
            tim.sr.write(|w| unsafe { w.bits(0) });
        }
        set_gpioa_alternate(VOLUME_PIN, None);
        set_gpioa_alternate(PITCH_PIN, Some(0));
    }

    fn start_capture_timer(&mut self) {
        let tim = tim21();
        tim.psc.write(|w| unsafe { w.bits(0) });
        tim.arr.write(|w| unsafe { w.bits(0xFFFF) });
        tim.ccmr1_input().write(|w| unsafe { w.bits(CCMR1_CC1S_TI1) });
        tim.ccer.write(|w| unsafe { w.bits(CCER_CC1E) });
        tim.dier.write(|w| unsafe { w.bits(DIER_CC1IE) });
        tim.cr1.write(|w| unsafe { w.bits(CR1_CEN) });
    }

    fn start_calibration_timer(&mut self, sensor: Sensor) {
        let (tim, period) = match sensor {
            Sensor::Pitch => (tim21(), PITCH_CALIBRATION_PERIOD),
            Sensor::Volume => {
                set_gpioa_alternate(VOLUME_PIN, Some(5));
                (tim22(), VOLUME_CALIBRATION_PERIOD)
            }
        };

        tim.psc.write(|w| unsafe { w.bits(0) });
        tim.arr.write(|w| unsafe { w.bits(period - 1) });
        tim.ccmr1_input().write(|w| unsafe { w.bits(CCMR1_CC1S_TI1) });
        tim.smcr.write(|w| unsafe { w.bits(SMCR_EXT_CLOCK_TI1FP1) });
        tim.cnt.write(|w| unsafe { w.bits(0) });
        tim.dier.write(|w| unsafe { w.bits(DIER_UIE) });
        tim.cr1.write(|w| unsafe { w.bits(CR1_CEN) });
    }

    fn enable(&mut self, source: InterruptSource) {
        let irq = match source {
            InterruptSource::WaveTick => Interrupt::TIM2,
            InterruptSource::PitchEdge => Interrupt::TIM21,
            InterruptSource::VolumeEdge => {
                clear_volume_edge();
                Interrupt::EXTI4_15
            }
            InterruptSource::CalibrationOverflow => {
                unsafe { NVIC::unmask(Interrupt::TIM22) };
                Interrupt::TIM21
            }
        };
        NVIC::unpend(irq);
        unsafe { NVIC::unmask(irq) };
    }
}

impl Panel {
    /// `panel.mode_switch()` is the state of the two mode switch poles, true when closed.
    pub fn mode_switch(&self) -> (bool, bool) {
        (
            self.switch_1.is_low().unwrap_or(false),
            self.switch_2.is_low().unwrap_or(false),
        )
    }
}

/// `pitch_capture()` is the latched pitch counter if TIM21 captured an edge, clearing the capture.
///
/// Called from the TIM21 interrupt only.
pub fn pitch_capture() -> Option<u16> {
    let tim = tim21();
    if tim.sr.read().bits() & SR_CC1IF != 0 {
        // reading CCR1 clears CC1IF
        Some(tim.ccr1.read().bits() as u16)
    } else {
        None
    }
}

/// `calibration_overflowed(s)` is true if `s`'s calibration timer overflowed, clearing the flag.
///
/// Called from the TIM21 and TIM22 interrupts only.
pub fn calibration_overflowed(sensor: Sensor) -> bool {
    let tim = match sensor {
        Sensor::Pitch => tim21(),
        Sensor::Volume => tim22(),
    };
    if tim.sr.read().bits() & SR_UIF != 0 {
        tim.sr.modify(|r, w| unsafe { w.bits(r.bits() & !SR_UIF) });
        true
    } else {
        false
    }
}

/// `volume_capture()` is the free-running capture counter at a volume oscillator edge, clearing the EXTI line.
///
/// Called from the EXTI4_15 interrupt only.
pub fn volume_capture() -> u16 {
    let count = tim21().cnt.read().bits() as u16;
    clear_volume_edge();
    count
}

fn clear_volume_edge() {
    let exti = unsafe { &*pac::EXTI::ptr() };
    exti.pr.write(|w| unsafe { w.bits(1 << VOLUME_PIN) });
}

fn tim21() -> &'static pac::tim21::RegisterBlock {
    unsafe { &*pac::TIM21::ptr() }
}

fn tim22() -> &'static pac::tim21::RegisterBlock {
    unsafe { &*pac::TIM22::ptr() }
}

fn gpioa_level(pin: u8) -> bool {
    let gpioa = unsafe { &*pac::GPIOA::ptr() };
    gpioa.idr.read().bits() & (1 << pin) != 0
}

/// `set_gpioa_alternate(p, af)` puts GPIOA pin `p` into alternate function `af`, or back to input for `None`.
fn set_gpioa_alternate(pin: u8, af: Option<u8>) {
    let gpioa = unsafe { &*pac::GPIOA::ptr() };
    let shift = pin as u32 * 2;
    let mode = if af.is_some() { 0b10 } else { 0b00 };
    gpioa
        .moder
        .modify(|r, w| unsafe { w.bits((r.bits() & !(0b11 << shift)) | (mode << shift)) });

    if let Some(af) = af {
        let shift = pin as u32 * 4;
        gpioa
            .afrl
            .modify(|r, w| unsafe { w.bits((r.bits() & !(0xF << shift)) | ((af as u32) << shift)) });
    }
}
