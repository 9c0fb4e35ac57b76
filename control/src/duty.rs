//! Duty levels and the duty controller

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::commutation::{ControllerState, release_after_fault};
use crate::outputs::PhaseOutputs;

/// Full PWM resolution shared by all phases
pub const MAX_DUTY: u16 = u16::MAX;

/// Duty level applied to the PWM-driven phase, in `[0, MAX_DUTY]`
///
/// `MAX_DUTY` is the full `u16` range so an out-of-range level cannot be constructed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(transparent)]
pub struct DutyLevel(u16);

impl DutyLevel {
    pub const ZERO: DutyLevel = DutyLevel(0);
    pub const MAX: DutyLevel = DutyLevel(MAX_DUTY);
    /// Power-up level before any duty command (~30%)
    pub const STARTUP: DutyLevel = DutyLevel(20_000);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Rescale onto a PWM generator whose full scale is `max` counts, rounding down
    pub fn scaled_to(self, max: u16) -> u16 {
        (self.0 as u32 * max as u32 / MAX_DUTY as u32) as u16
    }
}

impl From<u16> for DutyLevel {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for DutyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, MAX_DUTY)
    }
}

/// Operator duty command: a single digit in `1..=9`, i.e. 10%-90% in 10% steps
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyCommand(u8);

impl DutyCommand {
    pub const fn new(digit: u8) -> Option<Self> {
        match digit {
            1..=9 => Some(Self(digit)),
            _ => None,
        }
    }

    /// Classify an input symbol; only `'1'..='9'` are duty commands
    pub const fn from_symbol(symbol: u8) -> Option<Self> {
        match symbol {
            b'1'..=b'9' => Some(Self(symbol - b'0')),
            _ => None,
        }
    }

    pub const fn digit(self) -> u8 {
        self.0
    }

    pub const fn percent(self) -> u8 {
        self.0 * 10
    }

    /// `digit * MAX_DUTY / 10`, truncated
    pub const fn level(self) -> DutyLevel {
        DutyLevel((self.0 as u32 * MAX_DUTY as u32 / 10) as u16)
    }
}

/// Store `level` as the current duty and re-apply it to the PWM-driven phase, if any
///
/// Idle and low-side phases are left untouched. If the write fails the previous duty
/// is kept and the bridge is released with no active step.
pub fn apply_duty<O: PhaseOutputs>(
    state: &mut ControllerState,
    outputs: &mut O,
    level: DutyLevel,
) -> Result<(), O::Error> {
    if let Some(step) = state.step {
        if let Err(e) = outputs.set_duty(step.pwm_phase(), level) {
            release_after_fault(state, outputs);
            return Err(e);
        }
    }
    state.duty = level;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_levels_truncate() {
        let expected = [6553, 13107, 19660, 26214, 32767, 39321, 45874, 52428, 58981];
        for (digit, raw) in (1..=9).zip(expected) {
            let cmd = DutyCommand::new(digit).unwrap();
            assert_eq!(cmd.level().raw(), raw, "digit {}", digit);
            assert_eq!(cmd.percent(), digit * 10);
        }
    }

    #[test]
    fn test_symbol_range() {
        assert_eq!(DutyCommand::from_symbol(b'0'), None);
        assert_eq!(DutyCommand::from_symbol(b'5'), DutyCommand::new(5));
        assert_eq!(DutyCommand::from_symbol(b':'), None);
        assert_eq!(DutyCommand::new(10), None);
    }

    #[test]
    fn test_scaled_to_timer_period() {
        assert_eq!(DutyLevel::MAX.scaled_to(8499), 8499);
        assert_eq!(DutyLevel::ZERO.scaled_to(8499), 0);
        assert_eq!(DutyCommand::new(5).unwrap().level().scaled_to(1000), 499);
    }
}
