//! Command-sequence properties of the controller, checked against recorded outputs

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::outputs::outputs_are_safe;
use crate::{
    Command, CommutationStep, Controller, DutyCommand, DutyLevel, Event, MAX_DUTY, Outcome, OutputCall,
    Phase, PhaseOutputState, PhaseOutputs, RecordingOutputs, SymbolSource,
};

/// Replays a fixed byte string, one symbol per poll
struct Script<'a> {
    bytes: &'a [u8],
}

impl SymbolSource for Script<'_> {
    fn try_read(&mut self) -> Option<u8> {
        let (first, rest) = self.bytes.split_first()?;
        self.bytes = rest;
        Some(*first)
    }
}

/// Raises the cancel flag once the script runs dry
struct CancelWhenDone<'a> {
    script: Script<'a>,
    cancel: &'a AtomicBool,
}

impl SymbolSource for CancelWhenDone<'_> {
    fn try_read(&mut self) -> Option<u8> {
        let next = self.script.try_read();
        if next.is_none() {
            self.cancel.store(true, Ordering::Relaxed);
        }
        next
    }
}

fn controller() -> Controller<RecordingOutputs> {
    Controller::new(RecordingOutputs::new(), DutyLevel::STARTUP).unwrap()
}

fn feed(ctrl: &mut Controller<RecordingOutputs>, symbols: &[u8]) -> String {
    let mut source = Script { bytes: symbols };
    let mut console = String::new();
    while ctrl.poll(&mut source, &mut console).unwrap() != Outcome::Idle {}
    console
}

fn level(digit: u8) -> DutyLevel {
    DutyCommand::new(digit).unwrap().level()
}

#[test]
fn test_new_configures_each_phase_once_and_starts_idle() {
    let ctrl = controller();
    let calls = ctrl.outputs().calls();
    assert_eq!(
        &calls[..3],
        &[
            OutputCall::Configure(Phase::A),
            OutputCall::Configure(Phase::B),
            OutputCall::Configure(Phase::C),
        ]
    );
    assert!(ctrl.outputs().pins().iter().all(PhaseOutputState::is_idle));
    assert_eq!(ctrl.state().step(), None);
    assert_eq!(ctrl.state().duty(), DutyLevel::STARTUP);
}

#[test]
fn test_outputs_stay_safe_for_all_short_command_sequences() {
    const ALPHABET: &[u8] = b"AbC159x";

    fn explore(prefix: &mut Vec<u8>, depth: usize) {
        let mut ctrl = controller();
        for &symbol in prefix.iter() {
            feed(&mut ctrl, &[symbol]);
            for snapshot in ctrl.outputs().history() {
                assert!(outputs_are_safe(snapshot), "unsafe during {:?}", prefix);
            }
            assert_eq!(ctrl.outputs().pins(), &ctrl.state().phase_outputs());
        }
        if depth == 0 {
            return;
        }
        for &symbol in ALPHABET {
            prefix.push(symbol);
            explore(prefix, depth - 1);
            prefix.pop();
        }
    }

    explore(&mut Vec::new(), 4);
}

#[test]
fn test_break_before_make_between_any_two_steps() {
    for from in CommutationStep::ALL {
        for to in CommutationStep::ALL {
            let mut ctrl = controller();
            ctrl.execute(Command::Step(from)).unwrap();

            let before = ctrl.outputs().calls().len();
            ctrl.execute(Command::Step(to)).unwrap();
            let calls = &ctrl.outputs().calls()[before..];
            let history = &ctrl.outputs().history()[before..];

            let all_idle = |pins: &[PhaseOutputState; 3]| pins.iter().all(PhaseOutputState::is_idle);
            let first_idle = history
                .iter()
                .position(all_idle)
                .expect("transition never passed through all-idle");
            let last_idle = history.iter().rposition(all_idle).unwrap();

            // Until the break completes only the outgoing step's outputs may be on
            for pins in &history[..first_idle] {
                for phase in Phase::ALL {
                    let pin = pins[phase.index()];
                    assert!(pin.duty.is_zero() || phase == from.pwm_phase());
                    assert!(!pin.low_side || phase == from.low_side_phase());
                }
            }

            assert_eq!(
                &calls[last_idle + 1..],
                &[
                    OutputCall::SetDuty(to.pwm_phase(), DutyLevel::STARTUP),
                    OutputCall::AssertLow(to.low_side_phase()),
                ],
                "{:?} -> {:?}",
                from,
                to
            );
        }
    }
}

#[test]
fn test_duty_digits_scale_linearly_with_floor() {
    for digit in 1..=9u8 {
        let mut ctrl = controller();
        let console = feed(&mut ctrl, &[b'A', b'0' + digit]);
        let expected = (digit as u32 * MAX_DUTY as u32 / 10) as u16;
        assert_eq!(ctrl.outputs().pin(Phase::A).duty.raw(), expected);
        assert_eq!(ctrl.state().duty().raw(), expected);
        assert!(console.ends_with(&format!("Duty set to {}%\n", digit as u32 * 10)));
    }
}

#[test]
fn test_duty_before_first_step_only_updates_state() {
    let mut ctrl = controller();
    let before = ctrl.outputs().calls().len();
    feed(&mut ctrl, b"3");
    assert_eq!(ctrl.outputs().calls().len(), before);
    assert_eq!(ctrl.state().duty(), level(3));

    feed(&mut ctrl, b"a");
    assert_eq!(ctrl.outputs().pin(Phase::A).duty, level(3));
}

#[test]
fn test_duty_persists_across_steps() {
    let mut ctrl = controller();
    feed(&mut ctrl, b"7A");
    assert_eq!(ctrl.outputs().pin(Phase::A).duty, level(7));
    assert!(ctrl.outputs().pin(Phase::B).low_side);

    feed(&mut ctrl, b"B");
    assert_eq!(ctrl.outputs().pin(Phase::B).duty, level(7));
    assert!(ctrl.outputs().pin(Phase::A).is_idle());
    assert!(ctrl.outputs().pin(Phase::C).low_side);
}

#[test]
fn test_duty_change_only_touches_pwm_phase() {
    let mut ctrl = controller();
    feed(&mut ctrl, b"c");
    let before = ctrl.outputs().calls().len();
    feed(&mut ctrl, b"2");
    assert_eq!(
        &ctrl.outputs().calls()[before..],
        &[OutputCall::SetDuty(Phase::C, level(2))]
    );
    assert!(ctrl.outputs().pin(Phase::A).low_side);
}

#[test]
fn test_repeated_step_is_idempotent() {
    let mut once = controller();
    feed(&mut once, b"A");
    let mut twice = controller();
    feed(&mut twice, b"AA");

    assert_eq!(once.outputs().pins(), twice.outputs().pins());
    assert_eq!(once.state(), twice.state());
}

#[test]
fn test_invalid_input_changes_nothing() {
    let mut ctrl = controller();
    feed(&mut ctrl, b"A5");
    let state = ctrl.state().clone();
    let pins = *ctrl.outputs().pins();
    let before = ctrl.outputs().calls().len();

    let mut console = String::new();
    for symbol in [b'x', b'0', b'\r', b'Z', b' '] {
        let mut source = Script { bytes: &[symbol] };
        let outcome = ctrl.poll(&mut source, &mut console).unwrap();
        assert_eq!(outcome, Outcome::Rejected(symbol));
    }

    assert_eq!(ctrl.state(), &state);
    assert_eq!(ctrl.outputs().pins(), &pins);
    assert_eq!(ctrl.outputs().calls().len(), before);
    assert_eq!(console.lines().count(), 5);
    assert!(console.starts_with("Invalid input 'x'."));
}

#[test]
fn test_a_5_b_end_to_end() {
    let mut ctrl = controller();
    let console = feed(&mut ctrl, b"A5B");

    assert_eq!(
        console,
        "Step A: A_high PWM, B_low ON\nDuty set to 50%\nStep B: B_high PWM, C_low ON\n"
    );
    assert_eq!(ctrl.state().step(), Some(CommutationStep::B));
    assert_eq!(ctrl.state().duty().raw(), 32767);

    let outputs = ctrl.outputs();
    assert_eq!(outputs.pin(Phase::A), PhaseOutputState::IDLE);
    assert_eq!(outputs.pin(Phase::B).duty.raw(), 32767);
    assert!(!outputs.pin(Phase::B).low_side);
    assert_eq!(outputs.pin(Phase::C).duty, DutyLevel::ZERO);
    assert!(outputs.pin(Phase::C).low_side);
}

#[test]
fn test_handle_symbol_reports_events() {
    let mut ctrl = controller();
    assert_eq!(
        ctrl.handle_symbol(b'c'),
        Ok(Event::Stepped(CommutationStep::C))
    );
    assert!(ctrl.handle_symbol(b'?').unwrap_err().is_invalid_command());
}

#[test]
fn test_run_releases_outputs_on_cancel() {
    let cancel = AtomicBool::new(false);
    let mut source = CancelWhenDone {
        script: Script { bytes: b"B9q" },
        cancel: &cancel,
    };
    let mut ctrl = controller();
    let mut console = String::new();

    ctrl.run(&mut source, &mut console, &cancel).unwrap();

    assert!(cancel.load(Ordering::Relaxed));
    assert_eq!(console.lines().count(), 3);
    assert_eq!(ctrl.state().step(), None);
    assert_eq!(ctrl.state().duty(), level(9));
    assert!(ctrl.outputs().pins().iter().all(PhaseOutputState::is_idle));
}

/// Recording backend that refuses selected writes on demand
#[derive(Default)]
struct FaultyOutputs {
    inner: RecordingOutputs,
    fail_nonzero_duty: Cell<bool>,
    fail_assert_low: Cell<bool>,
}

impl PhaseOutputs for FaultyOutputs {
    type Error = &'static str;

    fn configure(&mut self, phase: Phase) -> Result<(), Self::Error> {
        self.inner.configure(phase).map_err(|_| "misuse")
    }

    fn set_duty(&mut self, phase: Phase, level: DutyLevel) -> Result<(), Self::Error> {
        if self.fail_nonzero_duty.get() && !level.is_zero() {
            return Err("fault");
        }
        self.inner.set_duty(phase, level).map_err(|_| "misuse")
    }

    fn assert_low(&mut self, phase: Phase) -> Result<(), Self::Error> {
        if self.fail_assert_low.get() {
            return Err("fault");
        }
        self.inner.assert_low(phase).map_err(|_| "misuse")
    }

    fn deassert_low(&mut self, phase: Phase) -> Result<(), Self::Error> {
        self.inner.deassert_low(phase).map_err(|_| "misuse")
    }
}

fn faulty_controller() -> Controller<FaultyOutputs> {
    Controller::new(FaultyOutputs::default(), DutyLevel::STARTUP).unwrap()
}

#[test]
fn test_failed_duty_write_releases_bridge_and_keeps_old_duty() {
    let mut ctrl = faulty_controller();
    ctrl.execute(Command::Step(CommutationStep::A)).unwrap();
    ctrl.outputs().fail_nonzero_duty.set(true);

    let mut console = String::new();
    let result = ctrl.poll(&mut Script { bytes: b"9" }, &mut console);

    assert_eq!(result, Err("fault"));
    assert!(console.is_empty());
    assert_eq!(ctrl.state().step(), None);
    assert_eq!(ctrl.state().duty(), DutyLevel::STARTUP);
    assert_eq!(ctrl.outputs().inner.pins(), &ctrl.state().phase_outputs());
    assert!(ctrl.outputs().inner.pins().iter().all(PhaseOutputState::is_idle));
}

#[test]
fn test_failed_low_side_write_leaves_no_phase_driven() {
    let mut ctrl = faulty_controller();
    ctrl.execute(Command::Step(CommutationStep::A)).unwrap();
    ctrl.outputs().fail_assert_low.set(true);

    let mut console = String::new();
    let result = ctrl.poll(&mut Script { bytes: b"B" }, &mut console);

    assert_eq!(result, Err("fault"));
    assert_eq!(ctrl.state().step(), None);
    assert_eq!(ctrl.outputs().inner.pins(), &ctrl.state().phase_outputs());
    assert!(ctrl.outputs().inner.pin(Phase::B).duty.is_zero());
    for snapshot in ctrl.outputs().inner.history() {
        assert!(outputs_are_safe(snapshot));
    }

    // Recovers once the backend accepts writes again
    ctrl.outputs().fail_assert_low.set(false);
    feed_faulty(&mut ctrl, b"B");
    assert_eq!(ctrl.state().step(), Some(CommutationStep::B));
    assert_eq!(ctrl.outputs().inner.pins(), &ctrl.state().phase_outputs());
}

fn feed_faulty(ctrl: &mut Controller<FaultyOutputs>, symbols: &[u8]) {
    let mut source = Script { bytes: symbols };
    let mut console = String::new();
    while ctrl.poll(&mut source, &mut console).unwrap() != Outcome::Idle {}
}
