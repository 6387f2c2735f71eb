// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use harmonia_store_core::{StoreDir, TrustedKeys};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::{ClientError, IoContext};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "HARMONIA_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Store used for whichever of `--from`/`--to` is omitted
    pub store: String,

    /// Path to the Nix store directory
    pub store_dir: String,

    /// Maximum number of concurrent transfers; defaults to the number of CPUs
    pub max_jobs: Option<usize>,

    /// Require a trusted signature on every copied path
    pub check_sigs: bool,

    /// Keys in `name:base64` form
    pub trusted_public_keys: Vec<String>,

    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: "auto".to_string(),
            store_dir: StoreDir::DEFAULT.to_string(),
            max_jobs: None,
            check_sigs: true,
            trusted_public_keys: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        let contents = std::fs::read_to_string(path)
            .io_context(|| format!("Failed to read config file at {}", path.display()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ClientError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else the file named by `HARMONIA_CONFIG`,
    /// else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ClientError> {
        Self::load_from(explicit, std::env::var_os(CONFIG_ENV))
    }

    fn load_from(explicit: Option<&Path>, env: Option<OsString>) -> Result<Self, ClientError> {
        match explicit.map(Path::to_path_buf).or(env.map(PathBuf::from)) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.max_jobs == Some(0) {
            return Err(ClientError::config("max_jobs must be at least 1"));
        }
        if self.store.is_empty() {
            return Err(ClientError::config("store must not be empty"));
        }
        self.store_dir()?;
        self.trusted_keys()?;
        EnvFilter::try_new(&self.log_level).map_err(|e| {
            ClientError::config(format!("invalid log_level '{}': {e}", self.log_level))
        })?;
        Ok(())
    }

    pub fn store_dir(&self) -> Result<StoreDir, ClientError> {
        StoreDir::new(&self.store_dir)
            .map_err(|e| ClientError::config(format!("invalid store_dir: {e}")))
    }

    pub fn trusted_keys(&self) -> Result<TrustedKeys, ClientError> {
        Ok(TrustedKeys::parse_all(&self.trusted_public_keys)?)
    }
}
