//! Daemon settings
//!
//! Layering: built-in defaults, then an optional TOML file, then
//! `LINGUARD_`-prefixed environment variables (`__` separates sections,
//! e.g. `LINGUARD_ENGINE__BASE_URL`).

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use linguard_api_http::ApiServerConfig;
use linguard_core::domain::{CacheConfig, EngineConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "LINGUARD";
const CONFIG_PATH_VAR: &str = "LINGUARD_CONFIG";
const CONFIG_FILE: &str = "linguard.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub server: ApiServerConfig,
}

impl Settings {
    /// Load from the config file (if any) and the process environment
    pub fn load() -> Result<(Self, Option<PathBuf>)> {
        let path = config_path();
        let settings = Self::build(path.as_deref(), environment())?;
        Ok((settings, path))
    }

    fn build(file: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// `LINGUARD_CONFIG` (tilde-expanded), else the platform config dir
fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
        return Some(PathBuf::from(shellexpand::tilde(&path).into_owned()));
    }
    ProjectDirs::from("", "", "linguard").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}
