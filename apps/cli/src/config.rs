use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: Option<String>,
}

/// `<config dir>/plantdoc/client.toml`, when the platform has a config dir.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("plantdoc").join("client.toml"))
}

/// A missing file is an empty config; an unreadable or malformed one is an error.
pub fn load_config(path: &Path) -> anyhow::Result<ClientConfig> {
    match fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw)
            .with_context(|| format!("failed to parse '{}'", path.display())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(err) => {
            Err(err).with_context(|| format!("failed to read '{}'", path.display()))
        }
    }
}

/// Flag or `PLANTDOC_SERVER_URL` first, then the config file, then the default.
pub fn resolve_server_url(from_args: Option<&str>, config: &ClientConfig) -> String {
    [from_args, config.server_url.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .unwrap_or(DEFAULT_SERVER_URL)
        .to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
