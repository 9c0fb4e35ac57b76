//! TIM1 PWM for the three high-side gates

use embassy_stm32::Peri;
use embassy_stm32::gpio::OutputType;
use embassy_stm32::peripherals::{PA8, PA9, PA10, TIM1};
use embassy_stm32::time::khz;
use embassy_stm32::timer::Channel;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use stepdrive_control::{DutyLevel, Phase};

/// High-side PWM outputs, one TIM1 channel per phase
pub struct HighSidePwm<'d> {
    pwm: SimplePwm<'d, TIM1>,
    max_duty: u16,
}

impl<'d> HighSidePwm<'d> {
    pub fn new(
        tim1: impl Into<Peri<'d, TIM1>>,
        pa8: impl Into<Peri<'d, PA8>>,
        pa9: impl Into<Peri<'d, PA9>>,
        pa10: impl Into<Peri<'d, PA10>>,
        pwm_freq: u32,
    ) -> Self {
        let ch1 = PwmPin::new(pa8.into(), OutputType::PushPull); // Phase A high
        let ch2 = PwmPin::new(pa9.into(), OutputType::PushPull); // Phase B high
        let ch3 = PwmPin::new(pa10.into(), OutputType::PushPull); // Phase C high

        let pwm = SimplePwm::new(
            tim1.into(),
            Some(ch1),
            Some(ch2),
            Some(ch3),
            None,
            khz(pwm_freq / 1000),
            CountingMode::EdgeAlignedUp,
        );

        // Full-scale DutyLevel is rescaled onto the timer period
        let max_duty = pwm.max_duty_cycle() as u16;

        defmt::info!("High-side PWM init: freq={}Hz, max_duty={}", pwm_freq, max_duty);

        Self { pwm, max_duty }
    }

    fn channel(phase: Phase) -> Channel {
        match phase {
            Phase::A => Channel::Ch1,
            Phase::B => Channel::Ch2,
            Phase::C => Channel::Ch3,
        }
    }

    /// Zero the phase's duty and start its channel
    pub fn configure(&mut self, phase: Phase) {
        let mut ch = self.pwm.channel(Self::channel(phase));
        ch.set_duty_cycle(0u16.into());
        ch.enable();
    }

    pub fn set_duty(&mut self, phase: Phase, level: DutyLevel) {
        let counts = level.scaled_to(self.max_duty);
        self.pwm
            .channel(Self::channel(phase))
            .set_duty_cycle(counts.into());
    }

    pub fn max_duty(&self) -> u16 {
        self.max_duty
    }
}
