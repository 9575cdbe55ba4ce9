use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use camcal_config::Config;

const DEFAULT_CONFIG_FILE: &str = "camcal.json";

fn read_config(path: &Path) -> anyhow::Result<Config> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let config = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Explicit file, else `camcal.json` in the working directory, else built-in defaults
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        tracing::info!("Loading config from {}", path.display());
        return read_config(path);
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        tracing::info!("Loading config from {}", local.display());
        return read_config(&local);
    }

    tracing::info!("No config file, using defaults");
    Ok(Config::new())
}
