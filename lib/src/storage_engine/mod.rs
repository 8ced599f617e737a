// lib/src/storage_engine/mod.rs
pub mod inmemory_storage;
pub mod json_file_storage;
#[cfg(feature = "postgres-datastore")]
pub mod postgres_storage;
pub mod sled_storage;
pub mod storage_engine;
pub mod storage_utils;

use std::sync::Arc;

use log::{error, info};

pub use crate::config::{StorageConfig, StorageEngineType};
pub use inmemory_storage::InMemoryStorage;
pub use json_file_storage::JsonFileStorage;
#[cfg(feature = "postgres-datastore")]
pub use postgres_storage::PostgresStorage;
pub use sled_storage::SledStorage;
pub use storage_engine::{ClinicStorageEngine, StorageEngine};

use models::errors::{ClinicError, ClinicResult};

/// Builds and connects the engine named in the config.
pub async fn create_storage(config: &StorageConfig) -> ClinicResult<Arc<dyn ClinicStorageEngine>> {
    let engine: Arc<dyn ClinicStorageEngine> = match config.engine {
        StorageEngineType::InMemory => Arc::new(InMemoryStorage::new(config)),
        StorageEngineType::JsonFile => Arc::new(JsonFileStorage::new(config)),
        StorageEngineType::Sled => Arc::new(SledStorage::new(config)?),
        StorageEngineType::Postgres => {
            #[cfg(feature = "postgres-datastore")]
            {
                Arc::new(PostgresStorage::new(config).await?)
            }
            #[cfg(not(feature = "postgres-datastore"))]
            {
                error!("Postgres storage requested but the 'postgres-datastore' feature is disabled");
                return Err(ClinicError::ConfigurationError(
                    "postgres storage is not compiled in; rebuild with --features postgres-datastore".to_string(),
                ));
            }
        }
    };
    engine.connect().await.map_err(|e| {
        error!("Failed to connect {} storage: {}", config.engine, e);
        e
    })?;
    info!("Storage engine {} is running", engine.get_type());
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_create_in_memory_engine() {
        let engine = create_storage(&StorageConfig::in_memory()).await.unwrap();
        assert_eq!(engine.get_type(), "in-memory");
        assert!(engine.is_running().await);
    }

    #[cfg(not(feature = "postgres-datastore"))]
    #[tokio::test]
    async fn should_refuse_postgres_without_feature() {
        let config = StorageConfig {
            engine: StorageEngineType::Postgres,
            connection_string: Some("postgres://localhost/clinic".into()),
            ..StorageConfig::default()
        };
        let result = create_storage(&config).await;
        assert!(matches!(result, Err(ClinicError::ConfigurationError(_))));
    }
}
