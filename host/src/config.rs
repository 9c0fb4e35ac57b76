use anyhow::{Context, Result};
use serde::Deserialize;
use std::{env, fs, path::PathBuf};
use stepdrive_control::DutyLevel;

/// What the host drives
#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Attach to the board over a debug probe and relay the RTT console
    #[default]
    Probe,
    /// Run the controller in-process against recorded outputs
    Simulate,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct HostConfig {
    #[serde(default)]
    pub mode: Mode,
    pub probe: Option<String>,          // e.g. "0483:374b:<serial>" or "0483:374b"
    pub chip: Option<String>,           // e.g. "STM32G431CBTx"
    pub elf: Option<String>,            // path to device ELF with .defmt
    pub stream_defmt: Option<bool>,     // default: true
    pub initial_duty: Option<DutyLevel>, // simulate only, raw 0-65535; default 20000
}

impl HostConfig {
    /// Priority: STEPDRIVE_HOST_CONFIG env var, then ./stepdrive-host.toml if it exists
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var("STEPDRIVE_HOST_CONFIG") {
            return Self::from_path(PathBuf::from(p));
        }
        let p = env::current_dir()
            .context("Failed to resolve working directory")?
            .join("stepdrive-host.toml");
        if p.exists() {
            return Self::from_path(p);
        }
        Ok(Self::default())
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&s).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn stream_defmt(&self) -> bool { self.stream_defmt.unwrap_or(true) }
    pub fn initial_duty(&self) -> DutyLevel { self.initial_duty.unwrap_or(DutyLevel::STARTUP) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = HostConfig::from_toml("").unwrap();
        assert_eq!(cfg.mode, Mode::Probe);
        assert!(cfg.stream_defmt());
        assert_eq!(cfg.initial_duty(), DutyLevel::STARTUP);
    }

    #[test]
    fn test_simulate_config() {
        let cfg = HostConfig::from_toml(
            r#"
            mode = "simulate"
            chip = "STM32G431CBTx"
            stream_defmt = false
            initial_duty = 32767
            "#,
        )
        .unwrap();
        assert_eq!(cfg.mode, Mode::Simulate);
        assert_eq!(cfg.chip.as_deref(), Some("STM32G431CBTx"));
        assert!(!cfg.stream_defmt());
        assert_eq!(cfg.initial_duty().raw(), 32767);
    }

    #[test]
    fn test_rejects_out_of_range_duty() {
        assert!(HostConfig::from_toml("initial_duty = 70000").is_err());
        assert!(HostConfig::from_toml(r#"mode = "bench""#).is_err());
    }
}
