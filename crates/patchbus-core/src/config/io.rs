//! Dispatcher config file I/O
//!
//! The file is YAML. Fields left out take their defaults, and a file is only
//! accepted if the resulting [`DispatcherConfig`] passes `validate`.

use anyhow::{Context, Result};
use std::path::Path;

use super::DispatcherConfig;

/// Read and validate a dispatcher config, reporting why a file was rejected
pub fn read_dispatcher_config(path: &Path) -> Result<DispatcherConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dispatcher config {:?}", path))?;

    let config: DispatcherConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse dispatcher config {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Rejected dispatcher config {:?}", path))?;

    Ok(config)
}

/// Load the dispatcher config, falling back to defaults
///
/// A missing file is normal on first run. A file that can't be read, doesn't
/// parse, or describes a dispatcher that can't be built is logged and
/// replaced by [`DispatcherConfig::default`], so the result always passes
/// `validate`.
pub fn load_dispatcher_config(path: &Path) -> DispatcherConfig {
    if !path.exists() {
        log::info!("No dispatcher config at {:?}, using defaults", path);
        return DispatcherConfig::default();
    }

    match read_dispatcher_config(path) {
        Ok(config) => {
            log::info!(
                "Loaded dispatcher config from {:?} ({} slots, {} ms)",
                path,
                config.channel_capacity,
                config.refresh_interval_ms
            );
            config
        }
        Err(e) => {
            log::warn!("{:#}, using defaults", e);
            DispatcherConfig::default()
        }
    }
}

/// Write the dispatcher config, creating parent directories
///
/// Refuses configs that `load_dispatcher_config` would throw away.
pub fn save_dispatcher_config(config: &DispatcherConfig, path: &Path) -> Result<()> {
    config
        .validate()
        .context("Refusing to save invalid dispatcher config")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize dispatcher config")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write dispatcher config {:?}", path))?;

    log::debug!("Saved dispatcher config to {:?}", path);
    Ok(())
}
