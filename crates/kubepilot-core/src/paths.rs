//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = ".kubepilot";
const CACHE_DIR_NAME: &str = "kubepilot";

/// Get the kubepilot config directory (~/.kubepilot)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Default config file (~/.kubepilot/config.yaml)
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

/// Get the logs directory (~/.kubepilot/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Cache directory for a pinned runtime version
/// (`<user cache dir>/kubepilot/cli/<version>`, temp dir when no cache dir exists)
pub fn runtime_cache_dir(version: &str) -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
        .join("cli")
        .join(version)
}
