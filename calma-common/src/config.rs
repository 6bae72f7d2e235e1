//! Configuration file loading
//!
//! Resolution priority for every setting:
//! 1. Environment variable (highest)
//! 2. TOML config file (`~/.config/calma/calma-gen.toml`, or
//!    `/etc/calma/calma-gen.toml` on Linux)
//! 3. Compiled default, where one exists

use crate::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Raw TOML file contents. All fields optional; resolution happens in the
/// consuming service's config module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<String>,
    pub text_api_key: Option<String>,
    pub text_api_base_url: Option<String>,
    pub speech_api_key: Option<String>,
    pub speech_api_base_url: Option<String>,
    pub storage_base_url: Option<String>,
    pub storage_service_key: Option<String>,
    pub media_binary_path: Option<String>,
}

/// Candidate config file paths for a service, most specific first
pub fn config_file_candidates(service: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("calma").join(format!("{}.toml", service)));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from(format!("/etc/calma/{}.toml", service)));
    }
    candidates
}

/// Load the first readable TOML config for a service.
///
/// A missing file is not an error; an unreadable or malformed file is
/// logged and skipped so a broken config cannot take the service down
/// when environment variables carry the required values.
pub fn load_toml_config(service: &str) -> Result<TomlConfig> {
    for path in config_file_candidates(service) {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<TomlConfig>(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded TOML config");
                    return Ok(config);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Malformed TOML config, skipping");
                }
            },
            Err(_) => continue,
        }
    }
    Ok(TomlConfig::default())
}
