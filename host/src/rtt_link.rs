//! Operator console over a debug probe
//!
//! Forwards stdin lines to the device `cmd` channel and prints the `console` and
//! decoded `defmt` channels.

use anyhow::{Context, Result};
use defmt_decoder::{DecodeError, StreamDecoder, Table};
use probe_rs::Permissions;
use probe_rs::probe::list::Lister;
use probe_rs::rtt::{Rtt, ScanRegion};
use std::fs;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::HostConfig;

fn find_up(rtt: &mut Rtt, name: &str) -> Option<usize> {
    rtt.up_channels()
        .iter()
        .position(|ch| ch.name().map(|n| n == name).unwrap_or(false))
}

fn find_down(rtt: &mut Rtt, name: &str) -> Option<usize> {
    rtt.down_channels()
        .iter()
        .position(|ch| ch.name().map(|n| n == name).unwrap_or(false))
}

/// Read stdin lines on a separate task so the RTT pump never waits on the terminal
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line.into_bytes()).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

pub async fn run(cfg: &HostConfig) -> Result<()> {
    let probe_sel = cfg.probe.clone();
    let chip = cfg.chip.clone();

    info!("stepdrive host - RTT console (chip={:?}, probe={:?})", chip, probe_sel);

    // Get list of available probes
    let lister = Lister::new();
    let probes = lister.list_all();

    if probes.is_empty() {
        error!("No debug probes found! Make sure ST-Link is connected.");
        return Err(anyhow::anyhow!("No probes found"));
    }

    info!("Found {} probe(s)", probes.len());

    // Open specific probe if configured, otherwise first
    let probe = if let Some(sel) = probe_sel {
        let mut parts = sel.split(':');
        let vid = parts.next();
        let pid = parts.next();
        let serial = parts.next();
        let chosen = probes.iter().find(|p| {
            let ok_vid = vid.and_then(|v| u16::from_str_radix(v, 16).ok())
                .map(|v| p.vendor_id == v).unwrap_or(true);
            let ok_pid = pid.and_then(|v| u16::from_str_radix(v, 16).ok())
                .map(|v| p.product_id == v).unwrap_or(true);
            let ok_ser = serial.map(|s| p.serial_number.as_deref() == Some(s)).unwrap_or(true);
            ok_vid && ok_pid && ok_ser
        }).ok_or_else(|| anyhow::anyhow!("Configured probe not found: {}", sel))?;
        chosen.open().context("Failed to open selected probe")?
    } else {
        probes[0].open().context("Failed to open probe")?
    };

    let ts = match chip {
        Some(name) => probe_rs::config::TargetSelector::from(name),
        None => probe_rs::config::TargetSelector::Auto,
    };
    let mut session = probe
        .attach(ts, Permissions::default())
        .context("Failed to attach to target")?;
    let mut core = session.core(0)?;

    let mut rtt = Rtt::attach_region(&mut core, &ScanRegion::Ram)
        .context("Failed to attach RTT")?;
    info!("RTT attached");

    let console_idx = find_up(&mut rtt, "console").or(Some(1));
    let defmt_idx = if cfg.stream_defmt() { find_up(&mut rtt, "defmt").or(Some(0)) } else { None };
    let cmd_idx = find_down(&mut rtt, "cmd").or(Some(0));
    info!("Using channels: console={:?}, defmt={:?}, cmd={:?}", console_idx, defmt_idx, cmd_idx);

    // Prepare defmt decoder (ELF path)
    let default_elf = {
        let p = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../device/target/thumbv7em-none-eabihf/release/stepdrive");
        p.to_string_lossy().into_owned()
    };
    let defmt_table: Option<Table> = if defmt_idx.is_some() {
        let elf_path = cfg.elf.clone().unwrap_or(default_elf);
        let elf_bytes = fs::read(&elf_path)
            .with_context(|| format!("Failed to read ELF at {}", elf_path))?;
        Some(
            Table::parse(&elf_bytes)
                .context("Parsing defmt table from ELF failed")?
                .ok_or_else(|| anyhow::anyhow!("No .defmt section in ELF; build device with defmt"))?,
        )
    } else { None };
    let mut defmt_stream: Option<Box<dyn StreamDecoder + Send + Sync + '_>> = defmt_table
        .as_ref()
        .map(|t| t.new_stream_decoder());

    let mut commands = spawn_stdin_reader();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut buf = vec![0u8; 1024];
    let mut defbuf = vec![0u8; 2048];
    loop {
        // Console text, printed as-is
        if let Some(up_idx) = console_idx {
            if let Some(channel) = rtt.up_channels().get_mut(up_idx) {
                let count = channel.read(&mut core, &mut buf)?;
                if count > 0 {
                    print!("{}", String::from_utf8_lossy(&buf[..count]));
                }
            }
        }
        // Read DEFMT channel and decode
        if let (Some(up_idx), Some(stream)) = (defmt_idx, defmt_stream.as_mut()) {
            if let Some(channel) = rtt.up_channels().get_mut(up_idx) {
                let count = channel.read(&mut core, &mut defbuf)?;
                if count > 0 {
                    stream.received(&defbuf[..count]);
                    loop {
                        match stream.decode() {
                            Ok(frame) => println!("{}", frame.display(true)),
                            Err(DecodeError::UnexpectedEof) => break,
                            Err(DecodeError::Malformed) => { error!("Malformed defmt frame"); break; }
                        }
                    }
                }
            }
        }
        // Operator keystrokes, one line at a time
        while let Ok(line) = commands.try_recv() {
            let channel = match cmd_idx {
                Some(down_idx) => rtt.down_channels().get_mut(down_idx),
                None => None,
            };
            match channel {
                Some(channel) => {
                    let written = channel.write(&mut core, &line)?;
                    if written < line.len() {
                        warn!("cmd channel full, dropped {} byte(s)", line.len() - written);
                    }
                }
                None => warn!("No cmd channel on target; input dropped"),
            }
        }
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Detaching");
                return Ok(());
            }
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
    }
}
