// lib/src/config/config_structs.rs
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::config_constants::*;
use models::errors::{ClinicError, ClinicResult};

/// Backing engine for users and visits. Written in YAML as a plain scalar
/// (`engine: sled`), so serde goes through `FromStr`/`as_str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageEngineType {
    InMemory,
    #[default]
    JsonFile,
    Sled,
    Postgres,
}

impl StorageEngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageEngineType::InMemory => "in-memory",
            StorageEngineType::JsonFile => "json-file",
            StorageEngineType::Sled => "sled",
            StorageEngineType::Postgres => "postgres",
        }
    }
}

impl fmt::Display for StorageEngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageEngineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in-memory" | "inmemory" | "memory" => Ok(StorageEngineType::InMemory),
            "json-file" | "jsonfile" | "json" | "file" => Ok(StorageEngineType::JsonFile),
            "sled" => Ok(StorageEngineType::Sled),
            "postgres" | "postgresql" => Ok(StorageEngineType::Postgres),
            other => Err(format!(
                "unknown storage engine '{}' (expected in-memory, json-file, sled or postgres)",
                other
            )),
        }
    }
}

impl Serialize for StorageEngineType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StorageEngineType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { host: DEFAULT_HOST.to_string(), port: DEFAULT_PORT }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> ClinicResult<SocketAddr> {
        let ip: IpAddr = self.host.parse().map_err(|_| {
            ClinicError::ConfigurationError(format!("'{}' is not a valid listen address", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub engine: StorageEngineType,
    pub data_directory: PathBuf,
    /// Only used by the postgres engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            engine: StorageEngineType::default(),
            data_directory: PathBuf::from(DEFAULT_DATA_DIRECTORY),
            connection_string: None,
        }
    }
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        StorageConfig { engine: StorageEngineType::InMemory, ..Default::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for bearer tokens. A random per-process key is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            token_secret: None,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

/// Booking rules applied by the visit lifecycle engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitPolicy {
    pub min_symptoms_length: usize,
    pub enforce_doctor_availability: bool,
}

impl Default for VisitPolicy {
    fn default() -> Self {
        VisitPolicy {
            min_symptoms_length: DEFAULT_MIN_SYMPTOMS_LENGTH,
            enforce_doctor_availability: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub visits: VisitPolicy,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for ClinicConfig {
    fn default() -> Self {
        ClinicConfig {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            visits: VisitPolicy::default(),
            log_level: default_log_level(),
        }
    }
}

/// On-disk layout: everything lives under a top-level `clinic` key.
#[derive(Debug, Deserialize, Serialize)]
pub struct ClinicConfigWrapper {
    pub clinic: ClinicConfig,
}
