use crate::core::settings::Settings;
use anyhow::{Context, Result};

pub fn run(settings: &Settings) -> Result<()> {
    if let Some(path) = Settings::config_path() {
        println!("# default location: {}", path.display());
    }

    let rendered = toml::to_string_pretty(settings).context("Failed to render settings")?;
    print!("{}", rendered);
    Ok(())
}
