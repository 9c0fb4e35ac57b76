//! Half-bridge outputs for the B-G431B-ESC1 power stage
//!
//! High sides are driven by TIM1 CH1-CH3 (PA8, PA9, PA10), low sides by plain GPIO
//! (PC13, PA12, PB15), so each low side is either fully on or fully off.

pub mod low_side;
pub mod pwm;

use core::convert::Infallible;
use core::sync::atomic::{AtomicU8, Ordering};

use embassy_stm32::Peri;
use embassy_stm32::peripherals::{PA8, PA9, PA10, PA12, PB15, PC13, TIM1};
use stepdrive_control::{DutyLevel, Phase, PhaseOutputs};

use self::low_side::LowSideSwitches;
use self::pwm::HighSidePwm;

/// Power stage configuration
pub struct BridgeConfig {
    pub pwm_freq: u32, // Hz
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            pwm_freq: 20_000, // 20 kHz
        }
    }
}

/// What the control loop is doing, mirrored for the status LED
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum DriveState {
    Boot = 0,
    /// Accepting commands, no step energized yet
    Ready = 1,
    Driving = 2,
    /// Loop cancelled, all phases released
    Stopped = 3,
}

static DRIVE_STATE: AtomicU8 = AtomicU8::new(DriveState::Boot as u8);

pub fn set_drive_state(state: DriveState) {
    DRIVE_STATE.store(state as u8, Ordering::Relaxed);
}

pub fn get_drive_state() -> DriveState {
    match DRIVE_STATE.load(Ordering::Relaxed) {
        0 => DriveState::Boot,
        1 => DriveState::Ready,
        2 => DriveState::Driving,
        _ => DriveState::Stopped,
    }
}

/// Hardware [`PhaseOutputs`]: register writes that cannot fail
pub struct BridgeOutputs<'d> {
    high: HighSidePwm<'d>,
    low: LowSideSwitches<'d>,
}

impl<'d> BridgeOutputs<'d> {
    /// Claim TIM1 and the six gate pins
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        tim1: impl Into<Peri<'d, TIM1>>,
        pa8: impl Into<Peri<'d, PA8>>,
        pc13: impl Into<Peri<'d, PC13>>,
        pa9: impl Into<Peri<'d, PA9>>,
        pa12: impl Into<Peri<'d, PA12>>,
        pa10: impl Into<Peri<'d, PA10>>,
        pb15: impl Into<Peri<'d, PB15>>,
        config: BridgeConfig,
    ) -> Self {
        // Low sides first so they are held off before the timer starts
        let low = LowSideSwitches::new(pc13, pa12, pb15);
        let high = HighSidePwm::new(tim1, pa8, pa9, pa10, config.pwm_freq);
        Self { high, low }
    }
}

impl PhaseOutputs for BridgeOutputs<'_> {
    type Error = Infallible;

    fn configure(&mut self, phase: Phase) -> Result<(), Self::Error> {
        self.high.configure(phase);
        self.low.configure(phase);
        defmt::debug!("phase {} configured, max_duty={}", phase, self.high.max_duty());
        Ok(())
    }

    fn set_duty(&mut self, phase: Phase, level: DutyLevel) -> Result<(), Self::Error> {
        self.high.set_duty(phase, level);
        Ok(())
    }

    fn assert_low(&mut self, phase: Phase) -> Result<(), Self::Error> {
        self.low.assert(phase);
        Ok(())
    }

    fn deassert_low(&mut self, phase: Phase) -> Result<(), Self::Error> {
        self.low.deassert(phase);
        Ok(())
    }
}
