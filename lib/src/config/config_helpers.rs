// lib/src/config/config_helpers.rs
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use serde_yaml2 as serde_yaml;

use crate::config::config_constants::*;
use crate::config::config_structs::{ClinicConfig, ClinicConfigWrapper, StorageEngineType};
use models::errors::{ClinicError, ClinicResult};

/// Where the effective config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The default path did not exist.
    Defaults(PathBuf),
}

/// Loads the YAML config, falling back to defaults when the default file is
/// missing, then applies environment overrides and validates the result.
/// Runs before logging is set up, so the caller reports the source with
/// [`report_config_source`] afterwards.
pub fn load_clinic_config(config_file_path: Option<&Path>) -> Result<(ClinicConfig, ConfigSource)> {
    let path_to_use = config_file_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let (mut config, source) = if path_to_use.exists() {
        let config_content = fs::read_to_string(&path_to_use)
            .context(format!("Failed to read clinic config file: {}", path_to_use.display()))?;
        let config = parse_clinic_config(&config_content)
            .with_context(|| format!("Failed to parse clinic config YAML: {}", path_to_use.display()))?;
        (config, ConfigSource::File(path_to_use))
    } else if config_file_path.is_some() {
        return Err(anyhow!("Config file not found at {}", path_to_use.display()));
    } else {
        (ClinicConfig::default(), ConfigSource::Defaults(path_to_use))
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(|e| anyhow!(e.to_string()))?;
    Ok((config, source))
}

pub fn report_config_source(source: &ConfigSource) {
    match source {
        ConfigSource::File(path) => info!("Loaded clinic config from {}", path.display()),
        ConfigSource::Defaults(path) => {
            warn!("Config file not found at {}. Using default clinic config.", path.display())
        }
    }
}

pub fn parse_clinic_config(content: &str) -> Result<ClinicConfig> {
    let wrapper: ClinicConfigWrapper = serde_yaml::from_str(content)
        .map_err(|e| anyhow!("invalid clinic config: {:?}", e))?;
    Ok(wrapper.clinic)
}

pub fn render_clinic_config(config: &ClinicConfig) -> Result<String> {
    let wrapper = ClinicConfigWrapper { clinic: config.clone() };
    serde_yaml::to_string(&wrapper).map_err(|e| anyhow!("Failed to serialize clinic config to YAML: {:?}", e))
}

/// Applies `PORT`, `JWT_SECRET`, `DATABASE_URL`, `CLINIC_STORAGE_ENGINE` and
/// `CLINIC_DATA_DIRECTORY` on top of the file values.
pub fn apply_env_overrides<F>(config: &mut ClinicConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup(ENV_PORT) {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} must be a port number, got '{}'", ENV_PORT, port))?;
        debug!("Port overridden from environment: {}", config.server.port);
    }
    if let Some(secret) = lookup(ENV_TOKEN_SECRET).filter(|s| !s.is_empty()) {
        config.auth.token_secret = Some(secret);
    }
    if let Some(url) = lookup(ENV_DATABASE_URL).filter(|s| !s.is_empty()) {
        config.storage.connection_string = Some(url);
    }
    if let Some(engine) = lookup(ENV_STORAGE_ENGINE) {
        config.storage.engine = engine.parse::<StorageEngineType>().map_err(|e| anyhow!(e))?;
    }
    if let Some(dir) = lookup(ENV_DATA_DIRECTORY).filter(|s| !s.is_empty()) {
        config.storage.data_directory = PathBuf::from(dir);
    }
    Ok(())
}

pub fn validate_config(config: &ClinicConfig) -> ClinicResult<()> {
    config.server.socket_addr()?;
    if config.auth.token_ttl_hours <= 0 {
        return Err(ClinicError::ConfigurationError("auth.token_ttl_hours must be positive".into()));
    }
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&config.auth.bcrypt_cost) {
        return Err(ClinicError::ConfigurationError(format!(
            "auth.bcrypt_cost must be between {} and {}",
            MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }
    if config.visits.min_symptoms_length == 0 {
        return Err(ClinicError::ConfigurationError("visits.min_symptoms_length must be at least 1".into()));
    }
    if config.storage.engine == StorageEngineType::Postgres && config.storage.connection_string.is_none() {
        return Err(ClinicError::ConfigurationError(format!(
            "the postgres engine needs storage.connection_string or {}",
            ENV_DATABASE_URL
        )));
    }
    Ok(())
}

/// Copy of the config that is safe to print.
pub fn redacted(config: &ClinicConfig) -> ClinicConfig {
    let mut copy = config.clone();
    if copy.auth.token_secret.is_some() {
        copy.auth.token_secret = Some("<redacted>".to_string());
    }
    if copy.storage.connection_string.is_some() {
        copy.storage.connection_string = Some("<redacted>".to_string());
    }
    copy
}
