//! In-memory output backend
//!
//! Mirrors the pin state the firmware would produce and keeps every call plus a
//! snapshot after each one, so transition ordering can be checked without hardware.

use std::fmt;
use std::vec::Vec;

use crate::duty::DutyLevel;
use crate::outputs::{PhaseOutputState, PhaseOutputs};
use crate::phase::Phase;

/// One write made through [`PhaseOutputs`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputCall {
    Configure(Phase),
    SetDuty(Phase, DutyLevel),
    AssertLow(Phase),
    DeassertLow(Phase),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingError {
    /// Write to a phase before `configure`
    NotConfigured(Phase),
    /// Second `configure` of the same phase
    AlreadyConfigured(Phase),
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::NotConfigured(phase) => write!(f, "phase {} used before configure", phase),
            RecordingError::AlreadyConfigured(phase) => write!(f, "phase {} configured twice", phase),
        }
    }
}

impl std::error::Error for RecordingError {}

#[derive(Clone, Debug, Default)]
pub struct RecordingOutputs {
    configured: [bool; 3],
    pins: [PhaseOutputState; 3],
    calls: Vec<OutputCall>,
    history: Vec<[PhaseOutputState; 3]>,
}

impl RecordingOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mirrored pin state, indexed by [`Phase::index`]
    pub fn pins(&self) -> &[PhaseOutputState; 3] {
        &self.pins
    }

    pub fn pin(&self, phase: Phase) -> PhaseOutputState {
        self.pins[phase.index()]
    }

    pub fn calls(&self) -> &[OutputCall] {
        &self.calls
    }

    /// Pin state after each recorded call
    pub fn history(&self) -> &[[PhaseOutputState; 3]] {
        &self.history
    }

    /// Forget recorded calls and snapshots; pin state is kept
    pub fn clear_log(&mut self) {
        self.calls.clear();
        self.history.clear();
    }

    fn record(&mut self, call: OutputCall) {
        self.calls.push(call);
        self.history.push(self.pins);
    }

    fn check_configured(&self, phase: Phase) -> Result<(), RecordingError> {
        if self.configured[phase.index()] {
            Ok(())
        } else {
            Err(RecordingError::NotConfigured(phase))
        }
    }
}

impl PhaseOutputs for RecordingOutputs {
    type Error = RecordingError;

    fn configure(&mut self, phase: Phase) -> Result<(), Self::Error> {
        if self.configured[phase.index()] {
            return Err(RecordingError::AlreadyConfigured(phase));
        }
        self.configured[phase.index()] = true;
        self.pins[phase.index()] = PhaseOutputState::IDLE;
        self.record(OutputCall::Configure(phase));
        Ok(())
    }

    fn set_duty(&mut self, phase: Phase, level: DutyLevel) -> Result<(), Self::Error> {
        self.check_configured(phase)?;
        self.pins[phase.index()].duty = level;
        self.record(OutputCall::SetDuty(phase, level));
        Ok(())
    }

    fn assert_low(&mut self, phase: Phase) -> Result<(), Self::Error> {
        self.check_configured(phase)?;
        self.pins[phase.index()].low_side = true;
        self.record(OutputCall::AssertLow(phase));
        Ok(())
    }

    fn deassert_low(&mut self, phase: Phase) -> Result<(), Self::Error> {
        self.check_configured(phase)?;
        self.pins[phase.index()].low_side = false;
        self.record(OutputCall::DeassertLow(phase));
        Ok(())
    }
}
