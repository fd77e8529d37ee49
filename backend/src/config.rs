//! Application configuration.
//!
//! Values come from the environment (a `.env` file is loaded first when present)
//! and fall back to the defaults below. CLI flags override them.

use std::env;
use std::path::PathBuf;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default data directory holding the store snapshot.
pub const DEFAULT_DATA_DIR: &str = ".editais";

/// Rows per page in the roster detail view.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Maximum upload size accepted by the server (in bytes).
///
/// 20 MB limit.
pub const MAX_UPLOAD_SIZE: usize = 20 * 1024 * 1024;

pub const ENV_PORT: &str = "EDITAIS_PORT";
pub const ENV_DATA_DIR: &str = "EDITAIS_DATA_DIR";
pub const ENV_PAGE_SIZE: &str = "EDITAIS_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    /// Load from `.env` and the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unparseable values fall back to
    /// the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            port: lookup(ENV_PORT)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            data_dir: lookup(ENV_DATA_DIR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            page_size: lookup(ENV_PAGE_SIZE)
                .and_then(|v| v.trim().parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.page_size),
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.data_dir = dir;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.page_size, 50);
    }

    #[test]
    fn test_env_values_and_fallbacks() {
        let vars: HashMap<&str, &str> = [
            (ENV_PORT, "8080"),
            (ENV_DATA_DIR, "/var/lib/editais"),
            (ENV_PAGE_SIZE, "0"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/editais"));
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_cli_overrides() {
        let config = AppConfig::default()
            .with_port(Some(4000))
            .with_data_dir(None);
        assert_eq!(config.port, 4000);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }
}
