use std::path::{Path, PathBuf};

/// Environment variable naming the data directory.
pub const HOME_ENV: &str = "STRIDE_HOME";

const DEFAULT_DIR_NAME: &str = ".stride";

/// Resolve the data directory: explicit flag, then `STRIDE_HOME`, then
/// `$HOME/.stride`, then `./.stride`.
pub fn resolve_home(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    match std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        Some(home) => PathBuf::from(home).join(DEFAULT_DIR_NAME),
        None => PathBuf::from(DEFAULT_DIR_NAME),
    }
}

pub fn database_path(home: &Path) -> PathBuf {
    home.join("stride.db")
}

pub fn lock_path(home: &Path) -> PathBuf {
    home.join("stride.lock")
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.json")
}
