// lib/src/lib.rs
pub mod auth;
pub mod config;
pub mod database;
pub mod services;
pub mod storage_engine;

pub use config::{ClinicConfig, StorageConfig, StorageEngineType, VisitPolicy};
pub use database::ClinicDatabase;

pub use auth::{AuthGate, Caller, TokenSigner};
pub use services::{IdentityService, StatsService, VisitService};
pub use storage_engine::{create_storage, ClinicStorageEngine, InMemoryStorage, StorageEngine};

// Domain types live in the 'models' crate.
pub use models::errors::{ClinicError, ClinicResult};
pub use models::medical::{Role, User, Visit, VisitStatus};
