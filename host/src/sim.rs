//! In-process controller driven from stdin
//!
//! Prints exactly what the firmware console would and logs the mirrored pin state.

use std::collections::VecDeque;
use std::future::Future;

use anyhow::{Context, Result};
use stepdrive_control::dispatch::write_banner;
use stepdrive_control::outputs::outputs_are_safe;
use stepdrive_control::{Controller, DutyLevel, Outcome, RecordingOutputs, SymbolSource};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::config::HostConfig;

/// Bytes typed but not yet consumed by the controller
#[derive(Default)]
struct PendingInput(VecDeque<u8>);

impl SymbolSource for PendingInput {
    fn try_read(&mut self) -> Option<u8> {
        self.0.pop_front()
    }
}

pub struct Simulator {
    controller: Controller<RecordingOutputs>,
    pending: PendingInput,
}

impl Simulator {
    pub fn new(initial_duty: DutyLevel) -> Result<Self> {
        let controller = Controller::new(RecordingOutputs::new(), initial_duty)
            .context("Failed to configure simulated outputs")?;
        Ok(Self {
            controller,
            pending: PendingInput::default(),
        })
    }

    pub fn banner() -> String {
        let mut text = String::new();
        let _ = write_banner(&mut text);
        text
    }

    /// Run every byte through the controller; returns the console text produced
    pub fn feed(&mut self, bytes: &[u8]) -> Result<String> {
        self.pending.0.extend(bytes);
        let mut text = String::new();
        loop {
            let outcome = self.controller.poll(&mut self.pending, &mut text)?;
            match outcome {
                Outcome::Idle => break,
                Outcome::Handled(event) => {
                    let pins = self.controller.outputs().pins();
                    debug!(?event, ?pins, "outputs");
                    if !outputs_are_safe(pins) {
                        error!(?pins, "unsafe output state");
                    }
                }
                Outcome::Rejected(symbol) => debug!(symbol, "rejected"),
            }
        }
        // Only the live pin state is reported, so the call log is not kept across feeds
        self.controller.outputs_mut().clear_log();
        Ok(text)
    }

    /// Release every phase
    pub fn shutdown(&mut self) -> Result<()> {
        self.controller.shutdown()?;
        Ok(())
    }

    pub fn controller(&self) -> &Controller<RecordingOutputs> {
        &self.controller
    }
}

/// Feed `input` line by line until it ends or `cancel` resolves, then release outputs
pub async fn run_session<R, W, F>(
    mut sim: Simulator,
    input: R,
    mut output: W,
    cancel: F,
) -> Result<Simulator>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    output.write_all(Simulator::banner().as_bytes()).await?;
    output.flush().await?;

    let mut lines = input.lines();
    tokio::pin!(cancel);
    loop {
        tokio::select! {
            _ = &mut cancel => {
                info!("Cancelled");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                let text = sim.feed(line.as_bytes())?;
                output.write_all(text.as_bytes()).await?;
                output.flush().await?;
            }
        }
    }

    sim.shutdown()?;
    output.write_all(b"Stopped, all phases released.\n").await?;
    output.flush().await?;
    Ok(sim)
}

pub async fn run(cfg: &HostConfig) -> Result<()> {
    let duty = cfg.initial_duty();
    info!("Simulating controller (initial duty {})", duty);
    let sim = Simulator::new(duty)?;
    let stdin = BufReader::new(tokio::io::stdin());
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    run_session(sim, stdin, tokio::io::stdout(), ctrl_c).await?;
    Ok(())
}
