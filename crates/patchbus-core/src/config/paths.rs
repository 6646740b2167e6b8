//! Standard locations for patchbus configuration files

use std::path::PathBuf;

/// Get the configuration directory
///
/// Returns: `{config_dir}/patchbus` (e.g. `~/.config/patchbus` on Linux),
/// falling back to `./patchbus` when no config dir is known.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patchbus")
}

/// Get the default path for a config file
///
/// Returns: `{config_dir}/patchbus/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}
