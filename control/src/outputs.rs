//! Half-bridge output capability
//!
//! Every write the controller makes to the motor goes through [`PhaseOutputs`]. The
//! firmware implements it over TIM1 and GPIO; `RecordingOutputs` (feature `std`)
//! implements it in memory for tests and the host simulator.

use crate::duty::DutyLevel;
use crate::phase::Phase;

/// PWM high-side and digital low-side outputs for all three phases
///
/// Writes take effect immediately and never block. The hardware backend uses
/// `core::convert::Infallible` as its error.
pub trait PhaseOutputs {
    type Error: core::fmt::Debug;

    /// One-time setup of both outputs of `phase`: PWM at duty 0, low side deasserted
    ///
    /// Must be called exactly once per phase before any other operation on it.
    fn configure(&mut self, phase: Phase) -> Result<(), Self::Error>;

    fn set_duty(&mut self, phase: Phase, level: DutyLevel) -> Result<(), Self::Error>;

    fn assert_low(&mut self, phase: Phase) -> Result<(), Self::Error>;

    fn deassert_low(&mut self, phase: Phase) -> Result<(), Self::Error>;

    fn clear_duty(&mut self, phase: Phase) -> Result<(), Self::Error> {
        self.set_duty(phase, DutyLevel::ZERO)
    }
}

/// Output state of one phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseOutputState {
    /// High-side PWM level
    pub duty: DutyLevel,
    /// Low-side switch asserted
    pub low_side: bool,
}

impl PhaseOutputState {
    pub const IDLE: PhaseOutputState = PhaseOutputState {
        duty: DutyLevel::ZERO,
        low_side: false,
    };

    pub fn is_idle(&self) -> bool {
        self.duty.is_zero() && !self.low_side
    }

    /// Both halves of the bridge conducting at once
    pub fn is_shoot_through(&self) -> bool {
        !self.duty.is_zero() && self.low_side
    }
}

/// De-energize every phase (the "break" half of a transition)
///
/// Idempotent; safe to call with some or all phases already idle.
pub fn release_all<O: PhaseOutputs>(outputs: &mut O) -> Result<(), O::Error> {
    for phase in Phase::ALL {
        outputs.clear_duty(phase)?;
        outputs.deassert_low(phase)?;
    }
    Ok(())
}

/// Configure both outputs of every phase, then leave them all de-energized
pub fn configure_all<O: PhaseOutputs>(outputs: &mut O) -> Result<(), O::Error> {
    for phase in Phase::ALL {
        outputs.configure(phase)?;
    }
    release_all(outputs)
}

/// No shoot-through, at most one PWM-driven phase and at most one conducting low side
pub fn outputs_are_safe(outputs: &[PhaseOutputState; 3]) -> bool {
    let driven = outputs.iter().filter(|o| !o.duty.is_zero()).count();
    let conducting = outputs.iter().filter(|o| o.low_side).count();
    driven <= 1 && conducting <= 1 && !outputs.iter().any(PhaseOutputState::is_shoot_through)
}
