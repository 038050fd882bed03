//! Real-time core of an analog theremin.
//!
//! Every tick of a ~31.25kHz periodic interrupt the [`generator::WaveGenerator`] reads one sample from a waveform
//! table, shapes it with the volume curve of [`shaper`], hands it to the converter and runs the debounce logic of the
//! two frequency measurement channels in [`capture`]. The capture interrupts of the pitch and volume oscillators only
//! latch a counter, so they are short enough to preempt the tick at any point.
//!
//! All state that crosses interrupt contexts lives in [`shared::Shared`], which is built from
//! `critical_section::Mutex` cells and can be placed in a `static`. Hardware is reached only through the
//! [`generator::TickIo`] and [`mode::ModeHardware`] traits, so the whole core runs on the host in tests.

#![cfg_attr(not(test), no_std)]

pub mod calibration;
pub mod capture;
pub mod clock;
pub mod config;
mod error;
pub mod generator;
pub mod mode;
pub mod shaper;
pub mod shared;
pub mod waveforms;
pub mod wavetable;

pub use error::Error;
