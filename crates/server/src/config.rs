use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_bind: String,
    pub upload_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub classifier_url: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:5000".into(),
            upload_dir: PathBuf::from("./uploads"),
            data_dir: None,
            classifier_url: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    upload_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    classifier_url: Option<String>,
    max_upload_bytes: Option<usize>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new("server.toml"), |key| std::env::var(key).ok())
}

/// Defaults, then `config_path` if it exists and parses, then the environment.
pub fn load_settings_from(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.bind_addr {
                    settings.server_bind = v;
                }
                if let Some(v) = file_cfg.upload_dir {
                    settings.upload_dir = v;
                }
                if let Some(v) = file_cfg.data_dir {
                    settings.data_dir = Some(v);
                }
                if let Some(v) = file_cfg.classifier_url {
                    settings.classifier_url = Some(v);
                }
                if let Some(v) = file_cfg.max_upload_bytes {
                    settings.max_upload_bytes = v;
                }
            }
            Err(error) => {
                warn!(
                    path = %config_path.display(),
                    %error,
                    "ignoring unreadable server config"
                );
            }
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("APP__UPLOAD_DIR") {
        settings.upload_dir = PathBuf::from(v);
    }

    if let Some(v) = env("APP__DATA_DIR") {
        settings.data_dir = Some(PathBuf::from(v));
    }

    if let Some(v) = env("CLASSIFIER_URL") {
        settings.classifier_url = Some(v);
    }
    if let Some(v) = env("APP__CLASSIFIER_URL") {
        settings.classifier_url = Some(v);
    }
    settings.classifier_url = settings
        .classifier_url
        .filter(|url| !url.trim().is_empty());

    if let Some(v) = env("APP__MAX_UPLOAD_BYTES") {
        if let Ok(parsed) = v.trim().parse::<usize>() {
            settings.max_upload_bytes = parsed;
        }
    }

    settings
}

pub fn prepare_upload_dir(raw_upload_dir: &Path) -> anyhow::Result<PathBuf> {
    let upload_dir = if raw_upload_dir.as_os_str().is_empty() {
        Settings::default().upload_dir
    } else {
        raw_upload_dir.to_path_buf()
    };

    fs::create_dir_all(&upload_dir).with_context(|| {
        format!(
            "failed to create upload directory '{}'",
            upload_dir.display()
        )
    })?;

    Ok(upload_dir)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
