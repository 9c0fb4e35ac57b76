//! Operator command classification

use core::fmt;

use crate::commutation::CommutationStep;
use crate::duty::DutyCommand;

/// A classified input symbol
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Step(CommutationStep),
    Duty(DutyCommand),
}

impl Command {
    /// Digits `1..=9` are duty commands; everything else is tried as a step
    pub fn classify(symbol: u8) -> Result<Self, Error<core::convert::Infallible>> {
        if let Some(duty) = DutyCommand::from_symbol(symbol) {
            return Ok(Command::Duty(duty));
        }
        CommutationStep::from_symbol(symbol)
            .map(Command::Step)
            .ok_or(Error::InvalidCommand(symbol))
    }
}

/// Errors from handling one command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Symbol is neither a step nor a duty command; nothing was changed
    InvalidCommand(u8),
    /// The output backend rejected a write
    Output(E),
}

impl<E> Error<E> {
    pub fn is_invalid_command(&self) -> bool {
        matches!(self, Error::InvalidCommand(_))
    }
}

impl Error<core::convert::Infallible> {
    /// Widen a classification error to any output error type
    pub fn widen<E>(self) -> Error<E> {
        match self {
            Error::InvalidCommand(symbol) => Error::InvalidCommand(symbol),
            Error::Output(never) => match never {},
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCommand(symbol) if symbol.is_ascii_graphic() => write!(
                f,
                "Invalid input '{}'. Use A, B, or C for steps, 1-9 for duty.",
                *symbol as char
            ),
            Error::InvalidCommand(symbol) => write!(
                f,
                "Invalid input 0x{:02x}. Use A, B, or C for steps, 1-9 for duty.",
                symbol
            ),
            Error::Output(e) => write!(f, "output write failed: {:?}", e),
        }
    }
}
