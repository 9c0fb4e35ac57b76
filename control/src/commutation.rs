//! Three-step commutation logic for BLDC motor control

use core::fmt;

use crate::duty::DutyLevel;
use crate::outputs::{PhaseOutputState, PhaseOutputs, release_all};
use crate::phase::Phase;

/// Three-step commutation state
///
/// Each step energizes 2 of the 3 phases:
/// - One phase PWM-driven on its high side
/// - One other phase conducting on its low side
/// - One phase idle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommutationStep {
    A = 0, // A+, B-, C idle
    B = 1, // B+, C-, A idle
    C = 2, // C+, A-, B idle
}

impl CommutationStep {
    pub const ALL: [CommutationStep; 3] = [Self::A, Self::B, Self::C];

    /// Classify an input symbol, case-insensitive
    pub const fn from_symbol(symbol: u8) -> Option<Self> {
        match symbol {
            b'A' | b'a' => Some(Self::A),
            b'B' | b'b' => Some(Self::B),
            b'C' | b'c' => Some(Self::C),
            _ => None,
        }
    }

    /// Phase whose high side carries the PWM signal
    pub const fn pwm_phase(self) -> Phase {
        match self {
            Self::A => Phase::A,
            Self::B => Phase::B,
            Self::C => Phase::C,
        }
    }

    /// Phase whose low side is held conducting
    pub const fn low_side_phase(self) -> Phase {
        match self {
            Self::A => Phase::B,
            Self::B => Phase::C,
            Self::C => Phase::A,
        }
    }

    pub const fn name(self) -> &'static str {
        self.pwm_phase().name()
    }
}

impl fmt::Display for CommutationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the control loop remembers between commands
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerState {
    /// `None` until the first step command (all outputs de-energized)
    pub(crate) step: Option<CommutationStep>,
    pub(crate) duty: DutyLevel,
}

impl ControllerState {
    pub const fn new(duty: DutyLevel) -> Self {
        Self { step: None, duty }
    }

    pub fn step(&self) -> Option<CommutationStep> {
        self.step
    }

    pub fn duty(&self) -> DutyLevel {
        self.duty
    }

    /// The per-phase outputs this state implies
    pub fn phase_outputs(&self) -> [PhaseOutputState; 3] {
        let mut outputs = [PhaseOutputState::IDLE; 3];
        if let Some(step) = self.step {
            outputs[step.pwm_phase().index()].duty = self.duty;
            outputs[step.low_side_phase().index()].low_side = true;
        }
        outputs
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new(DutyLevel::STARTUP)
    }
}

/// Switch to `step` with break-before-make
///
/// All phases are released before the new PWM phase and low side are set, so the
/// outgoing and incoming assignments never overlap. If a write fails every phase is
/// released again and the state is left with no active step.
pub fn activate<O: PhaseOutputs>(
    state: &mut ControllerState,
    outputs: &mut O,
    step: CommutationStep,
) -> Result<(), O::Error> {
    state.step = None;

    if let Err(e) = energize(outputs, step, state.duty) {
        release_after_fault(state, outputs);
        return Err(e);
    }

    state.step = Some(step);
    log::debug!(
        "step {}: {} high PWM {}, {} low on",
        step,
        step.pwm_phase(),
        state.duty,
        step.low_side_phase()
    );
    Ok(())
}

fn energize<O: PhaseOutputs>(
    outputs: &mut O,
    step: CommutationStep,
    duty: DutyLevel,
) -> Result<(), O::Error> {
    // Break
    release_all(outputs)?;

    // Make
    outputs.set_duty(step.pwm_phase(), duty)?;
    outputs.assert_low(step.low_side_phase())
}

/// Drop the active step and de-energize everything after a failed output write
///
/// Leaves the outputs matching [`ControllerState::phase_outputs`] whenever the
/// release itself succeeds.
pub(crate) fn release_after_fault<O: PhaseOutputs>(state: &mut ControllerState, outputs: &mut O) {
    state.step = None;
    if let Err(e) = release_all(outputs) {
        log::error!("release after output fault failed: {:?}", e);
    }
}
