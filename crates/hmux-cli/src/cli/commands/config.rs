//! `hmux config` – print the config path and effective values.

use anyhow::Result;
use hmux_core::config::{self, EngineConfig};

pub fn run_config(cfg: &EngineConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
