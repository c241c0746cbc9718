use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use strum_macros::Display;
use url::Url;

pub const ENV_PREFIX: &str = "QDB_CLI";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
// Same location and keys as the questdb-rest client's config file
pub const LEGACY_CONFIG_FILE: &str = ".questdb-rest/config.json";

#[derive(Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct QdbCliConfig {
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
    pub user: Option<String>,
    pub password: Option<String>,
    /// HTTP request timeout, in seconds
    pub timeout: u64,
    pub dry_run: bool,
}

impl Default for QdbCliConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            scheme: Scheme::default(),
            user: None,
            password: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            dry_run: false,
        }
    }
}

impl QdbCliConfig {
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}:{}/", self.scheme, self.host, self.port))
    }
}

/// Values given on the command line; these win over every other source
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<u32>,
    pub dry_run: bool,
}

pub fn validate_config(config: QdbCliConfig) -> Result<QdbCliConfig, ConfigError> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::Message("Host cannot be empty".to_string()));
    }
    if config.port == 0 {
        return Err(ConfigError::Message(
            "Port must be a positive integer".to_string(),
        ));
    }
    if config.timeout == 0 {
        return Err(ConfigError::Message(
            "Timeout must be at least one second".to_string(),
        ));
    }
    if config.password.is_some() && config.user.is_none() {
        return Err(ConfigError::Message(
            "A password was configured without a user".to_string(),
        ));
    }
    Ok(config)
}

fn legacy_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| Path::new(&home).join(LEGACY_CONFIG_FILE))
}

fn env_source(env: Option<HashMap<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .source(env)
}

fn apply_overrides(
    builder: ConfigBuilder<DefaultState>,
    overrides: &ConfigOverrides,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let mut builder = builder
        .set_override_option("host", overrides.host.clone())?
        .set_override_option("port", overrides.port.map(i64::from))?
        .set_override_option("user", overrides.user.clone())?
        .set_override_option("password", overrides.password.clone())?
        .set_override_option("timeout", overrides.timeout.map(i64::from))?;
    if overrides.dry_run {
        builder = builder.set_override("dry_run", true)?;
    }
    Ok(builder)
}

/// Layered load: explicit file (or the legacy JSON file if present), then
/// `QDB_CLI__*` environment variables, then command-line overrides.
pub fn load_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<QdbCliConfig, ConfigError> {
    let mut config = Config::builder();

    match path {
        Some(path) => config = config.add_source(File::from(path)),
        None => {
            if let Some(legacy) = legacy_config_path() {
                config = config.add_source(File::from(legacy).required(false));
            }
        }
    }

    let config = apply_overrides(config.add_source(env_source(None)), overrides)?;
    config.build()?.try_deserialize().and_then(validate_config)
}

// Load a config from a string (to test our structs are defined correctly)
pub fn load_config_from_string(
    config_str: &str,
    skip_validation: bool,
    env: Option<HashMap<String, String>>,
) -> Result<QdbCliConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(config_str, FileFormat::Toml))
        .add_source(env_source(env));

    if skip_validation {
        config.build()?.try_deserialize()
    } else {
        config.build()?.try_deserialize().and_then(validate_config)
    }
}
