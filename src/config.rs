//! Layered configuration
//!
//! Precedence, lowest first: built-in defaults, an optional TOML file,
//! `KVBUCKET__SECTION__KEY` environment variables. Command-line flags are
//! applied on top by the binary.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;
pub const DEFAULT_STORAGE_PATH: &str = "data/kvbucket.redb";

const ENV_PREFIX: &str = "KVBUCKET";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Database file
    pub path: PathBuf,
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl Settings {
    /// Load settings from defaults, `file` (if given) and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.bind", DEFAULT_BIND)?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("server.max_body_size", DEFAULT_MAX_BODY_SIZE as i64)?
            .set_default("server.enable_cors", false)?
            .set_default("storage.path", DEFAULT_STORAGE_PATH)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.server.max_body_size == 0 {
            return Err(Error::Config("server.max_body_size must be positive".to_string()));
        }
        if self.storage.path.as_os_str().is_empty() {
            return Err(Error::Config("storage.path must not be empty".to_string()));
        }
        Ok(())
    }

    /// `bind:port` for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}
