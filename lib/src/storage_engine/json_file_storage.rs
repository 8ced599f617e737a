// lib/src/storage_engine/json_file_storage.rs
//! Flat-file store: `users.json` and `visits.json`, each a JSON array in the
//! camelCase wire layout. All state is kept in memory behind one mutex and the
//! touched file is rewritten after every mutation through a temporary file
//! followed by a rename.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex as TokioMutex;
use uuid::Uuid;

use crate::config::{StorageConfig, USERS_FILE_NAME, VISITS_FILE_NAME};
use crate::storage_engine::storage_utils::ClinicTables;
use crate::storage_engine::{ClinicStorageEngine, StorageEngine};
use models::errors::{ClinicError, ClinicResult};
use models::medical::{User, Visit};

#[derive(Debug)]
pub struct JsonFileStorage {
    data_directory: PathBuf,
    tables: TokioMutex<ClinicTables>,
    running: TokioMutex<bool>,
}

impl JsonFileStorage {
    pub fn new(config: &StorageConfig) -> Self {
        JsonFileStorage {
            data_directory: config.data_directory.clone(),
            tables: TokioMutex::new(ClinicTables::default()),
            running: TokioMutex::new(false),
        }
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_directory.join(USERS_FILE_NAME)
    }

    pub fn visits_path(&self) -> PathBuf {
        self.data_directory.join(VISITS_FILE_NAME)
    }

    /// Applies `change` to a copy of the tables, writes the affected file and
    /// only then swaps the copy in, so a failed write leaves memory untouched.
    async fn mutate<T, F>(&self, target: Table, change: F) -> ClinicResult<T>
    where
        F: FnOnce(&mut ClinicTables) -> ClinicResult<T>,
    {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let result = change(&mut next)?;
        match target {
            Table::Users => write_json_atomic(&self.users_path(), &next.sorted_users()).await?,
            Table::Visits => write_json_atomic(&self.visits_path(), &next.sorted_visits()).await?,
        }
        *tables = next;
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy)]
enum Table {
    Users,
    Visits,
}

async fn read_json_array<T: DeserializeOwned>(path: &Path) -> ClinicResult<Vec<T>> {
    match fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            error!("Failed to parse {:?}: {}", path, e);
            ClinicError::Serialization(format!("{} is not a valid JSON array: {}", path.display(), e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{:?} does not exist yet, starting empty", path);
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, records: &[T]) -> ClinicResult<()> {
    let bytes = serde_json::to_vec_pretty(records)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &bytes).await?;
    fs::rename(&tmp_path, path).await.map_err(|e| {
        error!("Failed to move {:?} into place at {:?}: {}", tmp_path, path, e);
        ClinicError::from(e)
    })
}

#[async_trait]
impl StorageEngine for JsonFileStorage {
    async fn connect(&self) -> ClinicResult<()> {
        fs::create_dir_all(&self.data_directory).await.map_err(|e| {
            ClinicError::StorageError(format!(
                "Failed to create data directory {}: {}",
                self.data_directory.display(),
                e
            ))
        })?;
        let users: Vec<User> = read_json_array(&self.users_path()).await?;
        let visits: Vec<Visit> = read_json_array(&self.visits_path()).await?;
        info!(
            "Loaded {} users and {} visits from {:?}",
            users.len(),
            visits.len(),
            self.data_directory
        );
        *self.tables.lock().await = ClinicTables::from_records(users, visits);
        *self.running.lock().await = true;
        Ok(())
    }

    async fn flush(&self) -> ClinicResult<()> {
        let tables = self.tables.lock().await;
        write_json_atomic(&self.users_path(), &tables.sorted_users()).await?;
        write_json_atomic(&self.visits_path(), &tables.sorted_visits()).await
    }

    async fn close(&self) -> ClinicResult<()> {
        let mut running = self.running.lock().await;
        if *running {
            if let Err(e) = self.flush().await {
                warn!("Final flush of {:?} failed: {}", self.data_directory, e);
            }
        }
        *running = false;
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "json-file"
    }

    async fn is_running(&self) -> bool {
        *self.running.lock().await
    }
}

#[async_trait]
impl ClinicStorageEngine for JsonFileStorage {
    async fn create_user(&self, user: User) -> ClinicResult<User> {
        self.mutate(Table::Users, |t| t.insert_user(user)).await
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
        self.mutate(Table::Users, |t| t.replace_user(user)).await
    }

    async fn create_visit(&self, visit: Visit) -> ClinicResult<Visit> {
        self.mutate(Table::Visits, |t| t.insert_visit(visit)).await
    }

    async fn get_visit(&self, id: &Uuid) -> ClinicResult<Option<Visit>> {
        Ok(self.tables.lock().await.visits.get(id).cloned())
    }

    async fn get_all_visits(&self) -> ClinicResult<Vec<Visit>> {
        Ok(self.tables.lock().await.sorted_visits())
    }

    async fn update_visit(&self, visit: Visit) -> ClinicResult<Visit> {
        self.mutate(Table::Visits, |t| t.replace_visit(visit)).await
    }

    async fn clear_data(&self) -> ClinicResult<()> {
        let mut tables = self.tables.lock().await;
        write_json_atomic::<User>(&self.users_path(), &[]).await?;
        write_json_atomic::<Visit>(&self.visits_path(), &[]).await?;
        tables.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage_engine::storage_utils::conformance;
    use models::medical::Role;

    fn temp_config() -> StorageConfig {
        let dir = std::env::temp_dir().join(format!("clinic-json-{}", Uuid::new_v4()));
        StorageConfig { data_directory: dir, ..StorageConfig::default() }
    }

    async fn store() -> Arc<dyn ClinicStorageEngine> {
        let storage = JsonFileStorage::new(&temp_config());
        storage.connect().await.unwrap();
        Arc::new(storage)
    }

    #[tokio::test]
    async fn should_persist_across_reopen() {
        let config = temp_config();
        let storage = JsonFileStorage::new(&config);
        storage.connect().await.unwrap();
        let patient = storage.create_user(conformance::user("pat", Role::Patient)).await.unwrap();
        let doctor = storage.create_user(conformance::user("doc", Role::Doctor)).await.unwrap();
        let visit = storage.create_visit(conformance::visit(&patient, &doctor, 9)).await.unwrap();
        storage.close().await.unwrap();

        let reopened = JsonFileStorage::new(&config);
        reopened.connect().await.unwrap();
        assert_eq!(reopened.get_all_users().await.unwrap().len(), 2);
        assert_eq!(reopened.get_visit(&visit.id).await.unwrap(), Some(visit));

        let raw = std::fs::read_to_string(reopened.users_path()).unwrap();
        assert!(raw.contains("\"fullName\""));
        assert!(!reopened.data_directory.join("users.json.tmp").exists());
        let _ = std::fs::remove_dir_all(&config.data_directory);
    }

    #[tokio::test]
    async fn should_reject_malformed_files() {
        let config = temp_config();
        std::fs::create_dir_all(&config.data_directory).unwrap();
        std::fs::write(config.data_directory.join(USERS_FILE_NAME), "{not json").unwrap();
        let storage = JsonFileStorage::new(&config);
        assert!(matches!(storage.connect().await, Err(ClinicError::Serialization(_))));
        let _ = std::fs::remove_dir_all(&config.data_directory);
    }

    #[tokio::test]
    async fn should_reject_duplicate_users() {
        conformance::rejects_duplicate_users(store().await).await;
    }

    #[tokio::test]
    async fn should_update_profiles_but_not_identity() {
        conformance::updates_profiles_but_not_identity(store().await).await;
    }

    #[tokio::test]
    async fn should_guard_doctor_slots() {
        conformance::guards_doctor_slots(store().await).await;
    }

    #[tokio::test]
    async fn should_enforce_visit_versions() {
        conformance::enforces_visit_versions(store().await).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_book_each_slot_once_under_contention() {
        conformance::books_each_slot_once_under_contention(store().await).await;
    }

    #[tokio::test]
    async fn should_clear_everything() {
        conformance::clears_everything(store().await).await;
    }
}
