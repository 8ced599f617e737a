// lib/src/config/config_constants.rs

pub const DEFAULT_CONFIG_PATH: &str = "./clinic.yaml";
pub const DEFAULT_DATA_DIRECTORY: &str = "./data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
pub const DEFAULT_BCRYPT_COST: u32 = 12;
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

pub const DEFAULT_MIN_SYMPTOMS_LENGTH: usize = 10;

pub const USERS_FILE_NAME: &str = "users.json";
pub const VISITS_FILE_NAME: &str = "visits.json";
pub const SLED_DIRECTORY_NAME: &str = "sled";

// Environment overrides
pub const ENV_PORT: &str = "PORT";
pub const ENV_TOKEN_SECRET: &str = "JWT_SECRET";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_STORAGE_ENGINE: &str = "CLINIC_STORAGE_ENGINE";
pub const ENV_DATA_DIRECTORY: &str = "CLINIC_DATA_DIRECTORY";
