use anyhow::{Context, Result};

use gdsview_core::EngineConfig;

pub fn execute(config: &EngineConfig) -> Result<()> {
    let toml = config
        .to_toml_string()
        .context("Failed to serialize configuration")?;
    print!("{}", toml);
    Ok(())
}
