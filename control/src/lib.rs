//! Open-loop three-step BLDC commutation
//!
//! Holds the commutation state machine and the duty controller, independent of any
//! particular board. The firmware supplies a hardware [`PhaseOutputs`]; tests and the
//! host simulator use `RecordingOutputs` (feature `std`).
//!
//! Step command to energized pair:
//!
//! | Step | PWM high side | Low side on |
//! |------|---------------|-------------|
//! | A    | A             | B           |
//! | B    | B             | C           |
//! | C    | C             | A           |

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod command;
pub mod commutation;
pub mod dispatch;
pub mod duty;
pub mod outputs;
pub mod phase;
#[cfg(any(test, feature = "std"))]
pub mod recording;

pub use command::{Command, Error};
pub use commutation::{CommutationStep, ControllerState};
pub use dispatch::{Controller, Event, Outcome, SymbolSource};
pub use duty::{DutyCommand, DutyLevel, MAX_DUTY};
pub use outputs::{PhaseOutputState, PhaseOutputs};
pub use phase::Phase;
#[cfg(any(test, feature = "std"))]
pub use recording::{OutputCall, RecordingError, RecordingOutputs};

#[cfg(test)]
mod tests;
