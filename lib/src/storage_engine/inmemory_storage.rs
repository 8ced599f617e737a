// lib/src/storage_engine/inmemory_storage.rs
use async_trait::async_trait;
use log::info;
use tokio::sync::Mutex as TokioMutex;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::storage_engine::storage_utils::ClinicTables;
use crate::storage_engine::{ClinicStorageEngine, StorageEngine};
use models::errors::ClinicResult;
use models::medical::{User, Visit};

/// Volatile store; all state is lost when the process exits.
#[derive(Debug)]
pub struct InMemoryStorage {
    config: StorageConfig,
    tables: TokioMutex<ClinicTables>,
    running: TokioMutex<bool>,
}

impl InMemoryStorage {
    pub fn new(config: &StorageConfig) -> Self {
        InMemoryStorage {
            config: config.clone(),
            tables: TokioMutex::new(ClinicTables::default()),
            running: TokioMutex::new(false),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        InMemoryStorage::new(&StorageConfig::in_memory())
    }
}

#[async_trait]
impl StorageEngine for InMemoryStorage {
    async fn connect(&self) -> ClinicResult<()> {
        let mut running = self.running.lock().await;
        *running = true;
        info!("In-memory storage ready");
        Ok(())
    }

    async fn flush(&self) -> ClinicResult<()> {
        Ok(())
    }

    async fn close(&self) -> ClinicResult<()> {
        let mut running = self.running.lock().await;
        *running = false;
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "in-memory"
    }

    async fn is_running(&self) -> bool {
        *self.running.lock().await
    }
}

#[async_trait]
impl ClinicStorageEngine for InMemoryStorage {
    async fn create_user(&self, user: User) -> ClinicResult<User> {
        self.tables.lock().await.insert_user(user)
    }

    async fn get_user(&self, id: &Uuid) -> ClinicResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> ClinicResult<Option<User>> {
        Ok(self.tables.lock().await.find_user_by_username(username))
    }

    async fn get_all_users(&self) -> ClinicResult<Vec<User>> {
        Ok(self.tables.lock().await.sorted_users())
    }

    async fn update_user(&self, user: User) -> ClinicResult<User> {
        self.tables.lock().await.replace_user(user)
    }

    async fn create_visit(&self, visit: Visit) -> ClinicResult<Visit> {
        self.tables.lock().await.insert_visit(visit)
    }

    async fn get_visit(&self, id: &Uuid) -> ClinicResult<Option<Visit>> {
        Ok(self.tables.lock().await.visits.get(id).cloned())
    }

    async fn get_all_visits(&self) -> ClinicResult<Vec<Visit>> {
        Ok(self.tables.lock().await.sorted_visits())
    }

    async fn update_visit(&self, visit: Visit) -> ClinicResult<Visit> {
        self.tables.lock().await.replace_visit(visit)
    }

    async fn clear_data(&self) -> ClinicResult<()> {
        self.tables.lock().await.clear();
        Ok(())
    }
}
