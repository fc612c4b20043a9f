use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$TASKMINDER_HOME`, else `~/.taskminder`.
pub fn taskminder_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("TASKMINDER_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".taskminder"))
}

pub fn ensure_taskminder_home() -> Result<PathBuf> {
    let dir = taskminder_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}
