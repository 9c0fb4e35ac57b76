#![no_std]
#![no_main]

use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_executor::Spawner;
use embassy_futures::yield_now;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_time::{Duration, Timer, with_timeout};
use rtt_target::{ChannelMode::*, rtt_init};
use stepdrive_control::dispatch::write_banner;
use stepdrive_control::{Controller, DutyLevel, Event, Outcome};

mod rtt_io;
use rtt_io::{RttReader, RttWriter};

mod motor;
use motor::{BridgeConfig, BridgeOutputs, DriveState, get_drive_state, set_drive_state};

// Use panic-probe for panics
use panic_probe as _;

/// Raised by a button hold; the console loop releases all phases and exits
static STOP: AtomicBool = AtomicBool::new(false);

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // defmt logs on up channel 0, operator console on up 1 / down 0
    let channels = rtt_init! {
        up: {
            0: { size: 1024, mode: NoBlockSkip, name: "defmt" }
            1: { size: 1024, mode: NoBlockTrim, name: "console" }
        }
        down: {
            0: { size: 64, name: "cmd" }
        }
    };

    // Configure rtt-target as the defmt global logger on up channel 0
    rtt_target::set_defmt_channel(channels.up.0);

    let console = rtt_io::RttIo::new(channels.up.1, channels.down.0);
    let (cmd_rx, console_tx) = console.split();

    // Initialize STM32 with HSE=8MHz feeding PLL to 170MHz SYSCLK
    let p = {
        let mut config = embassy_stm32::Config::default();
        {
            use embassy_stm32::rcc::*;
            use embassy_stm32::time::Hertz;
            config.rcc.hse = Some(Hse {
                freq: Hertz(8_000_000),
                mode: HseMode::Oscillator,
            });
            // VCO in: 8MHz / 2 = 4MHz; VCO: 4MHz * 85 = 340MHz; SYSCLK: 340MHz / 2 = 170MHz
            config.rcc.pll = Some(Pll {
                source: PllSource::HSE,
                prediv: PllPreDiv::DIV2,
                mul: PllMul::MUL85,
                divp: None,
                divq: None,
                divr: Some(PllRDiv::DIV2),
            });
            config.rcc.sys = Sysclk::PLL1_R;
            // Above 150MHz, enable Range1 boost mode per RM0440 guidance
            config.rcc.boost = true;
        }
        embassy_stm32::init(config)
    };

    defmt::info!("stepdrive starting");

    // Button: PC10, external pull-up, active-low to GND
    let button = ExtiInput::new(p.PC10, p.EXTI10, Pull::None);

    // LED on PC6
    let mut led = Output::new(p.PC6, Level::Low, Speed::Low);

    let bridge = BridgeOutputs::init(
        p.TIM1,
        p.PA8,  // Phase A high
        p.PC13, // Phase A low
        p.PA9,  // Phase B high
        p.PA12, // Phase B low
        p.PA10, // Phase C high
        p.PB15, // Phase C low
        BridgeConfig::default(),
    );
    let controller =
        Controller::new(bridge, DutyLevel::STARTUP).unwrap_or_else(|never| match never {});

    spawner.spawn(console_task(controller, cmd_rx, console_tx)).unwrap();
    spawner.spawn(button_handler(button)).unwrap();

    defmt::info!("All tasks spawned, entering LED status loop");

    // LED status loop - shows drive state via blink patterns
    loop {
        match get_drive_state() {
            DriveState::Boot => {
                // Quick double blink
                for _ in 0..2 {
                    led.set_high();
                    Timer::after(Duration::from_millis(100)).await;
                    led.set_low();
                    Timer::after(Duration::from_millis(100)).await;
                }
                Timer::after(Duration::from_millis(600)).await;
            }
            DriveState::Ready => {
                // Slow blink (1 Hz, 10% duty)
                led.set_high();
                Timer::after(Duration::from_millis(100)).await;
                led.set_low();
                Timer::after(Duration::from_millis(900)).await;
            }
            DriveState::Driving => {
                // Solid ON with periodic short delay to allow state changes
                led.set_high();
                Timer::after(Duration::from_millis(500)).await;
            }
            DriveState::Stopped => {
                // Triple blink pattern
                for _ in 0..3 {
                    led.set_high();
                    Timer::after(Duration::from_millis(120)).await;
                    led.set_low();
                    Timer::after(Duration::from_millis(120)).await;
                }
                Timer::after(Duration::from_millis(800)).await;
            }
        }
    }
}

/// Command loop: poll the console without blocking and drive the bridge
///
/// A miss yields straight back to the executor so the LED and button tasks get to
/// run; each command is handled to completion with no await in between.
#[embassy_executor::task]
async fn console_task(
    mut controller: Controller<BridgeOutputs<'static>>,
    mut cmd_rx: RttReader,
    mut console_tx: RttWriter,
) {
    let _ = write_banner(&mut console_tx);
    set_drive_state(DriveState::Ready);
    defmt::info!("Console ready, duty={}", controller.state().duty());

    while !STOP.load(Ordering::Relaxed) {
        let outcome = controller
            .poll(&mut cmd_rx, &mut console_tx)
            .unwrap_or_else(|never| match never {});
        match outcome {
            Outcome::Idle => yield_now().await,
            Outcome::Handled(event) => {
                defmt::info!("{}", event);
                if let Event::Stepped(step) = event {
                    defmt::debug!(
                        "{} high at {}, {} low on",
                        step.pwm_phase(),
                        controller.state().duty(),
                        step.low_side_phase()
                    );
                    set_drive_state(DriveState::Driving);
                }
            }
            Outcome::Rejected(symbol) => {
                defmt::warn!("Invalid input {=u8:#x} ignored", symbol);
            }
        }
    }

    controller.shutdown().unwrap_or_else(|never| match never {});
    let _ = writeln!(console_tx, "Stopped, all phases released.");
    set_drive_state(DriveState::Stopped);
    defmt::info!("Console loop stopped");
}

/// A button hold cancels the console loop
#[embassy_executor::task]
async fn button_handler(mut button: ExtiInput<'static>) {
    const HOLD_DELAY: u64 = 1000;

    defmt::info!("Button ready (active-low), hold to stop");

    loop {
        // Wait for press (active-low => falling edge)
        button.wait_for_falling_edge().await;

        // If release does not happen within HOLD_DELAY, it's a hold
        if with_timeout(
            Duration::from_millis(HOLD_DELAY),
            button.wait_for_rising_edge(),
        )
        .await
        .is_err()
        {
            defmt::info!("Button: HOLD, stopping");
            STOP.store(true, Ordering::Relaxed);
            button.wait_for_rising_edge().await;
        } else {
            defmt::debug!("Button: click ignored");
        }
    }
}
