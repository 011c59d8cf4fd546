//! Locating the configuration file.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the config location.
pub const CONFIG_ENV: &str = "ATTACHVAULT_CONFIG";

const CONFIG_FILE: &str = "config.json";

/// Picks the configuration file to load.
///
/// `$ATTACHVAULT_CONFIG` wins; then `config.json` in the working
/// directory; then `<config dir>/attachvault/config.json`. When none of
/// them exists the working-directory path is returned so the load error
/// names the place most people expect.
pub fn config_path() -> PathBuf {
    resolve(
        std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        Path::new("."),
        dirs::config_dir(),
    )
}

fn resolve(explicit: Option<PathBuf>, cwd: &Path, config_dir: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }

    let local = cwd.join(CONFIG_FILE);
    if local.exists() {
        return local;
    }

    config_dir
        .map(|dir| dir.join("attachvault").join(CONFIG_FILE))
        .filter(|p| p.exists())
        .unwrap_or(local)
}
