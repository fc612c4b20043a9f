use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use taskminder_core::EngineConfig;

use crate::state::{ensure_taskminder_home, taskminder_home};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub display: DisplaySection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Seconds between scans (values below 5 are raised to 5).
    pub interval_secs: u64,
    /// Seconds before the first scan.
    pub initial_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// IANA zone used to read and print due times.
    pub timezone: String,
    pub default_lead_minutes: i64,
    /// Window for `upcoming` when `--minutes` is omitted.
    pub upcoming_window_minutes: i64,
}

impl Default for EngineSection {
    fn default() -> Self {
        let d = EngineConfig::default();
        Self {
            interval_secs: d.interval.as_secs(),
            initial_delay_secs: d.initial_delay.as_secs(),
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            default_lead_minutes: 30,
            upcoming_window_minutes: 60,
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::from_secs(self.interval_secs, self.initial_delay_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(taskminder_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config) -> Result<PathBuf> {
    let p = ensure_taskminder_home()?.join("config.toml");
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(p)
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let written = save_config(&Config::default())?;
    println!("Wrote {}", written.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str("[engine]\ninterval_secs = 2\n").unwrap();
        assert_eq!(cfg.engine.interval_secs, 2);
        assert_eq!(cfg.engine.initial_delay_secs, 5);
        assert_eq!(cfg.display, DisplaySection::default());

        // Clamped on the way into the engine.
        assert_eq!(cfg.engine.to_engine_config().interval, Duration::from_secs(5));
    }

    #[test]
    fn default_round_trips_through_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(s.contains("interval_secs = 30"));
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back, Config::default());
    }

    #[test]
    fn missing_file_is_default() {
        let p = std::env::temp_dir().join("taskminder-no-such-config.toml");
        assert_eq!(load_config_from(&p).unwrap(), Config::default());
    }
}
