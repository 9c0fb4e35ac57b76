//! GPIO low-side switches

use embassy_stm32::Peri;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::peripherals::{PA12, PB15, PC13};
use stepdrive_control::Phase;

/// Low-side gate outputs, high = conducting
pub struct LowSideSwitches<'d> {
    pins: [Output<'d>; 3],
}

impl<'d> LowSideSwitches<'d> {
    pub fn new(
        pc13: impl Into<Peri<'d, PC13>>,
        pa12: impl Into<Peri<'d, PA12>>,
        pb15: impl Into<Peri<'d, PB15>>,
    ) -> Self {
        Self {
            pins: [
                Output::new(pc13.into(), Level::Low, Speed::VeryHigh), // Phase A low
                Output::new(pa12.into(), Level::Low, Speed::VeryHigh), // Phase B low
                Output::new(pb15.into(), Level::Low, Speed::VeryHigh), // Phase C low
            ],
        }
    }

    pub fn configure(&mut self, phase: Phase) {
        self.deassert(phase);
    }

    pub fn assert(&mut self, phase: Phase) {
        self.pins[phase.index()].set_high();
    }

    pub fn deassert(&mut self, phase: Phase) {
        self.pins[phase.index()].set_low();
    }
}
