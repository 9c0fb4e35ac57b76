//! Command dispatcher and control loop

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::command::{Command, Error};
use crate::commutation::{self, CommutationStep, ControllerState};
use crate::duty::{self, DutyCommand, DutyLevel};
use crate::outputs::{self, PhaseOutputs};

pub const READY_BANNER: &str = "BLDC PWM Control Ready.";
pub const USAGE_HINT: &str = "Type A/B/C for commutation step, 1-9 to adjust duty.";

/// Non-blocking source of command symbols
pub trait SymbolSource {
    /// Next pending symbol, or `None` right away if nothing has arrived
    fn try_read(&mut self) -> Option<u8>;
}

/// What an accepted command did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Stepped(CommutationStep),
    DutyChanged(DutyCommand),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Stepped(step) => write!(
                f,
                "Step {}: {}_high PWM, {}_low ON",
                step,
                step.pwm_phase(),
                step.low_side_phase()
            ),
            Event::DutyChanged(cmd) => write!(f, "Duty set to {}%", cmd.percent()),
        }
    }
}

/// Result of one poll of the input source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Nothing was waiting
    Idle,
    Handled(Event),
    /// Invalid symbol, reported and ignored
    Rejected(u8),
}

/// Write the startup banner and usage hint
pub fn write_banner<W: Write>(console: &mut W) -> fmt::Result {
    writeln!(console, "{}", READY_BANNER)?;
    writeln!(console, "{}", USAGE_HINT)
}

/// Commutation and duty controller bound to its outputs
pub struct Controller<O> {
    state: ControllerState,
    outputs: O,
}

impl<O: PhaseOutputs> Controller<O> {
    /// Configure every phase and start de-energized at `duty`
    pub fn new(mut outputs: O, duty: DutyLevel) -> Result<Self, O::Error> {
        outputs::configure_all(&mut outputs)?;
        Ok(Self {
            state: ControllerState::new(duty),
            outputs,
        })
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    /// Backend access for bookkeeping; writes made through it bypass the controller state
    pub fn outputs_mut(&mut self) -> &mut O {
        &mut self.outputs
    }

    pub fn into_outputs(self) -> O {
        self.outputs
    }

    pub fn execute(&mut self, command: Command) -> Result<Event, O::Error> {
        match command {
            Command::Step(step) => {
                commutation::activate(&mut self.state, &mut self.outputs, step)?;
                Ok(Event::Stepped(step))
            }
            Command::Duty(cmd) => {
                duty::apply_duty(&mut self.state, &mut self.outputs, cmd.level())?;
                Ok(Event::DutyChanged(cmd))
            }
        }
    }

    pub fn handle_symbol(&mut self, symbol: u8) -> Result<Event, Error<O::Error>> {
        let command = Command::classify(symbol).map_err(|e| e.widen())?;
        self.execute(command).map_err(Error::Output)
    }

    /// Read at most one symbol from `source` and act on it
    ///
    /// Diagnostics go to `console`; a console write failure is ignored. Only output
    /// backend errors are returned.
    pub fn poll<S, W>(&mut self, source: &mut S, console: &mut W) -> Result<Outcome, O::Error>
    where
        S: SymbolSource,
        W: Write,
    {
        let Some(symbol) = source.try_read() else {
            return Ok(Outcome::Idle);
        };
        match self.handle_symbol(symbol) {
            Ok(event) => {
                let _ = writeln!(console, "{}", event);
                Ok(Outcome::Handled(event))
            }
            Err(err @ Error::InvalidCommand(_)) => {
                log::warn!("rejected input symbol 0x{:02x}", symbol);
                let _ = writeln!(console, "{}", err);
                Ok(Outcome::Rejected(symbol))
            }
            Err(Error::Output(e)) => Err(e),
        }
    }

    /// Poll `source` until `cancel` is raised, then release every phase
    ///
    /// Blocking reference loop for callers without an executor: it re-polls immediately
    /// on a miss and never suspends. The firmware console task and the host simulator
    /// drive [`Controller::poll`] themselves so they can yield between misses, and
    /// follow the same cancel-then-[`Controller::shutdown`] sequence.
    pub fn run<S, W>(
        &mut self,
        source: &mut S,
        console: &mut W,
        cancel: &AtomicBool,
    ) -> Result<(), O::Error>
    where
        S: SymbolSource,
        W: Write,
    {
        while !cancel.load(Ordering::Relaxed) {
            self.poll(source, console)?;
        }
        self.shutdown()
    }

    /// De-energize all outputs and forget the active step; duty is kept
    pub fn shutdown(&mut self) -> Result<(), O::Error> {
        self.state.step = None;
        outputs::release_all(&mut self.outputs)
    }
}
