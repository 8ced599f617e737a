// lib/src/storage_engine/sled_storage.rs
//! Embedded key-value store on sled. Records are JSON values keyed by id bytes.
//! Uniqueness lives in index trees (`usernames`, `emails`, `slots`) that are
//! only ever changed inside the same transaction as the record they index.

use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, error, info};
use serde::de::DeserializeOwned;
use sled::transaction::{abort, ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, IVec, Tree};
use tokio::sync::Mutex as TokioMutex;
use uuid::Uuid;

use crate::config::{StorageConfig, SLED_DIRECTORY_NAME};
use crate::storage_engine::storage_utils::{
    merge_user_update, slot_key, EMAIL_TAKEN, SLOT_TAKEN, STALE_VISIT, USERNAME_TAKEN,
};
use crate::storage_engine::{ClinicStorageEngine, StorageEngine};
use models::errors::{ClinicError, ClinicResult};
use models::medical::{User, Visit};

const USERS_TREE: &str = "users";
const USERNAMES_TREE: &str = "usernames";
const EMAILS_TREE: &str = "emails";
const VISITS_TREE: &str = "visits";
const SLOTS_TREE: &str = "slots";

#[derive(Debug)]
pub struct SledStorage {
    path: PathBuf,
    db: Db,
    users: Tree,
    usernames: Tree,
    emails: Tree,
    visits: Tree,
    slots: Tree,
    running: TokioMutex<bool>,
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> ClinicResult<T> {
    serde_json::from_slice(bytes).map_err(ClinicError::from)
}

fn tx_deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ConflictableTransactionError<ClinicError>> {
    deserialize(bytes).map_err(ConflictableTransactionError::Abort)
}

fn map_tx_error(err: TransactionError<ClinicError>) -> ClinicError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => {
            error!("Sled transaction failed: {}", e);
            ClinicError::from(e)
        }
    }
}

impl SledStorage {
    pub fn new(config: &StorageConfig) -> ClinicResult<Self> {
        let path = config.data_directory.join(SLED_DIRECTORY_NAME);
        info!("Opening sled database at {:?}", path);
        let db = sled::open(&path).map_err(|e| {
            error!("Failed to open sled database at {:?}: {}", path, e);
            ClinicError::StorageError(format!("Failed to open sled database at {}: {}", path.display(), e))
        })?;
        Self::with_db(db, path)
    }

    pub fn with_db(db: Db, path: PathBuf) -> ClinicResult<Self> {
        Ok(SledStorage {
            users: db.open_tree(USERS_TREE)?,
            usernames: db.open_tree(USERNAMES_TREE)?,
            emails: db.open_tree(EMAILS_TREE)?,
            visits: db.open_tree(VISITS_TREE)?,
            slots: db.open_tree(SLOTS_TREE)?,
            path,
            db,
            running: TokioMutex::new(false),
        })
    }

    fn collect<T: DeserializeOwned>(tree: &Tree) -> ClinicResult<Vec<T>> {
        tree.iter()
            .values()
            .map(|value| value.map_err(ClinicError::from).and_then(|bytes| deserialize(&bytes)))
            .collect()
    }
}

#[async_trait]
impl StorageEngine for SledStorage {
    async fn connect(&self) -> ClinicResult<()> {
        *self.running.lock().await = true;
        info!(
            "Sled storage ready at {:?} ({} users, {} visits)",
            self.path,
            self.users.len(),
            self.visits.len()
        );
        Ok(())
    }

    async fn flush(&self) -> ClinicResult<()> {
        let bytes_flushed = self.db.flush_async().await?;
        debug!("SledStorage::flush - flushed {} bytes to disk at {:?}", bytes_flushed, self.path);
        Ok(())
    }

    async fn close(&self) -> ClinicResult<()> {
        self.flush().await?;
        *self.running.lock().await = false;
        info!("Sled storage at {:?} closed", self.path);
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "sled"
    }

    async fn is_running(&self) -> bool {
        *self.running.lock().await
    }
}

#[async_trait]
impl ClinicStorageEngine for SledStorage {
    async fn create_user(&self, user: User) -> ClinicResult<User> {
        let bytes = serde_json::to_vec(&user)?;
        let id = user.id.as_bytes();
        (&self.users, &self.usernames, &self.emails)
            .transaction(|(users, usernames, emails)| {
                if usernames.get(user.username.as_bytes())?.is_some() {
                    return abort(ClinicError::Conflict(USERNAME_TAKEN.to_string()));
                }
                if emails.get(user.email.as_bytes())?.is_some() {
                    return abort(ClinicError::Conflict(EMAIL_TAKEN.to_string()));
                }
                usernames.insert(user.username.as_bytes(), &id[..])?;
                emails.insert(user.email.as_bytes(), &id[..])?;
                users.insert(&id[..], bytes.as_slice())?;
                Ok(())
            })
            .map_err(map_tx_error)?;
        Ok(user)
    }

    async fn get_user(&self, id: &Uuid) -> ClinicResult<Option<User>> {
        self.users
            .get(id.as_bytes())?
            .map(|bytes| deserialize(&bytes))
            .transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> ClinicResult<Option<User>> {
        let Some(id) = self.usernames.get(username.as_bytes())? else {
            return Ok(None);
        };
        self.users.get(&id)?.map(|bytes| deserialize(&bytes)).transpose()
    }

    async fn get_all_users(&self) -> ClinicResult<Vec<User>> {
        let mut users: Vec<User> = Self::collect(&self.users)?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn update_user(&self, user: User) -> ClinicResult<User> {
        (&self.users, &self.emails)
            .transaction(|(users, emails)| {
                let id = user.id.as_bytes();
                let Some(raw) = users.get(&id[..])? else {
                    return abort(ClinicError::NotFound("User".to_string()));
                };
                let stored: User = tx_deserialize(&raw)?;
                let merged = merge_user_update(&stored, user.clone());
                if merged.email != stored.email {
                    if let Some(owner) = emails.get(merged.email.as_bytes())? {
                        if owner != IVec::from(&id[..]) {
                            return abort(ClinicError::Conflict(EMAIL_TAKEN.to_string()));
                        }
                    }
                    emails.remove(stored.email.as_bytes())?;
                    emails.insert(merged.email.as_bytes(), &id[..])?;
                }
                let bytes = serde_json::to_vec(&merged)
                    .map_err(|e| ConflictableTransactionError::Abort(ClinicError::from(e)))?;
                users.insert(&id[..], bytes)?;
                Ok(merged)
            })
            .map_err(map_tx_error)
    }

    async fn create_visit(&self, visit: Visit) -> ClinicResult<Visit> {
        let bytes = serde_json::to_vec(&visit)?;
        let slot = slot_key(&visit);
        let id = visit.id.as_bytes();
        (&self.visits, &self.slots)
            .transaction(|(visits, slots)| {
                if visit.status.is_active() {
                    if slots.get(slot.as_slice())?.is_some() {
                        return abort(ClinicError::Conflict(SLOT_TAKEN.to_string()));
                    }
                    slots.insert(slot.as_slice(), &id[..])?;
                }
                visits.insert(&id[..], bytes.as_slice())?;
                Ok(())
            })
            .map_err(map_tx_error)?;
        debug!("Stored visit {} in sled", visit.visit_code);
        Ok(visit)
    }

    async fn get_visit(&self, id: &Uuid) -> ClinicResult<Option<Visit>> {
        self.visits
            .get(id.as_bytes())?
            .map(|bytes| deserialize(&bytes))
            .transpose()
    }

    async fn get_all_visits(&self) -> ClinicResult<Vec<Visit>> {
        let mut visits: Vec<Visit> = Self::collect(&self.visits)?;
        visits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(visits)
    }

    async fn update_visit(&self, visit: Visit) -> ClinicResult<Visit> {
        let mut next = visit;
        let read_version = next.version;
        next.version += 1;
        let bytes = serde_json::to_vec(&next)?;
        let id = next.id.as_bytes();
        (&self.visits, &self.slots)
            .transaction(|(visits, slots)| {
                let Some(raw) = visits.get(&id[..])? else {
                    return abort(ClinicError::NotFound("Visit".to_string()));
                };
                let stored: Visit = tx_deserialize(&raw)?;
                if stored.version != read_version {
                    return abort(ClinicError::Conflict(STALE_VISIT.to_string()));
                }
                let old_slot = slot_key(&stored);
                let new_slot = slot_key(&next);
                if stored.status.is_active() && (!next.status.is_active() || old_slot != new_slot) {
                    slots.remove(old_slot.as_slice())?;
                }
                if next.status.is_active() && (!stored.status.is_active() || old_slot != new_slot) {
                    if slots.get(new_slot.as_slice())?.is_some() {
                        return abort(ClinicError::Conflict(SLOT_TAKEN.to_string()));
                    }
                    slots.insert(new_slot.as_slice(), &id[..])?;
                }
                visits.insert(&id[..], bytes.as_slice())?;
                Ok(())
            })
            .map_err(map_tx_error)?;
        Ok(next)
    }

    async fn clear_data(&self) -> ClinicResult<()> {
        for tree in [&self.users, &self.usernames, &self.emails, &self.visits, &self.slots] {
            tree.clear()?;
        }
        self.db.flush_async().await?;
        info!("Cleared all clinic data from sled at {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage_engine::storage_utils::conformance;
    use models::medical::Role;

    fn temporary() -> SledStorage {
        let db = sled::Config::new().temporary(true).open().unwrap();
        SledStorage::with_db(db, PathBuf::from("/tmp/clinic-sled-test")).unwrap()
    }

    fn store() -> Arc<dyn ClinicStorageEngine> {
        Arc::new(temporary())
    }

    #[tokio::test]
    async fn should_persist_across_reopen() {
        let dir = std::env::temp_dir().join(format!("clinic-sled-{}", Uuid::new_v4()));
        let config = StorageConfig { data_directory: dir.clone(), ..StorageConfig::default() };
        let patient_id = {
            let storage = SledStorage::new(&config).unwrap();
            storage.connect().await.unwrap();
            let patient = storage.create_user(conformance::user("pat", Role::Patient)).await.unwrap();
            storage.close().await.unwrap();
            patient.id
        };
        let reopened = SledStorage::new(&config).unwrap();
        let found = reopened.get_user_by_username("pat").await.unwrap().unwrap();
        assert_eq!(found.id, patient_id);
        drop(reopened);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn should_reject_duplicate_users() {
        conformance::rejects_duplicate_users(store()).await;
    }

    #[tokio::test]
    async fn should_update_profiles_but_not_identity() {
        conformance::updates_profiles_but_not_identity(store()).await;
    }

    #[tokio::test]
    async fn should_move_email_index_on_update() {
        let storage = temporary();
        let user = storage.create_user(conformance::user("mover", Role::Finance)).await.unwrap();
        let mut change = user.clone();
        change.email = "new@example.com".to_string();
        storage.update_user(change).await.unwrap();

        let mut reuse = conformance::user("next", Role::Finance);
        reuse.email = user.email.clone();
        storage.create_user(reuse).await.unwrap();
    }

    #[tokio::test]
    async fn should_guard_doctor_slots() {
        conformance::guards_doctor_slots(store()).await;
    }

    #[tokio::test]
    async fn should_enforce_visit_versions() {
        conformance::enforces_visit_versions(store()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_book_each_slot_once_under_contention() {
        conformance::books_each_slot_once_under_contention(store()).await;
    }

    #[tokio::test]
    async fn should_clear_everything() {
        conformance::clears_everything(store()).await;
    }
}
