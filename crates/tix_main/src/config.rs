//! Loading the tix settings file

use std::path::Path;

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File, FileFormat};
use tix_domain::{Settings, expand_home};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "~/.tix.yml";

/// Read settings from the YAML file at `path` (a leading `~/` is expanded),
/// overlaid with `TIX_*` environment variables such as `TIX_READY_LABEL` or
/// `TIX_RETRIEVAL__TOP_K`.
pub fn load_settings(path: &str) -> Result<Settings> {
    let path = expand_home(path);
    if !path.is_file() {
        bail!(
            "config file not found at {}; create it and list your repositories under `repositories:`",
            path.display()
        );
    }

    let settings = read_settings(&path)?;
    debug!(path = %path.display(), repos = settings.repositories.len(), "Config loaded");
    Ok(settings)
}

fn read_settings(path: &Path) -> Result<Settings> {
    let mut settings: Settings = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .add_source(
            Environment::with_prefix("TIX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read config file {}", path.display()))?
        .try_deserialize()
        .with_context(|| format!("failed to parse config file {}", path.display()))?;

    settings.expand_directories();
    Ok(settings)
}
