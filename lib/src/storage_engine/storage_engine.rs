// lib/src/storage_engine/storage_engine.rs
use std::fmt::Debug;

use async_trait::async_trait;
use uuid::Uuid;

use models::errors::ClinicResult;
use models::medical::{User, Visit};

// StorageEngine and ClinicStorageEngine traits
#[async_trait]
pub trait StorageEngine: Send + Sync + Debug + 'static {
    async fn connect(&self) -> ClinicResult<()>;
    async fn flush(&self) -> ClinicResult<()>;
    async fn close(&self) -> ClinicResult<()>;
    fn get_type(&self) -> &'static str;
    async fn is_running(&self) -> bool;
}

/// Identity and visit store. Every engine keeps the same guarantees:
///
/// * `create_user` fails with `Conflict` when the username or email is taken,
///   and the check and insert happen atomically.
/// * `create_visit` fails with `Conflict` when the doctor already has an active
///   visit at exactly the same appointment time, again atomically.
/// * `update_visit` only writes when the stored version equals the version on
///   the passed visit; the stored copy gets `version + 1`.
#[async_trait]
pub trait ClinicStorageEngine: StorageEngine {
    async fn create_user(&self, user: User) -> ClinicResult<User>;
    async fn get_user(&self, id: &Uuid) -> ClinicResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> ClinicResult<Option<User>>;
    async fn get_all_users(&self) -> ClinicResult<Vec<User>>;
    /// Replaces the mutable fields of an existing user. Role and username are kept.
    async fn update_user(&self, user: User) -> ClinicResult<User>;

    async fn create_visit(&self, visit: Visit) -> ClinicResult<Visit>;
    async fn get_visit(&self, id: &Uuid) -> ClinicResult<Option<Visit>>;
    async fn get_all_visits(&self) -> ClinicResult<Vec<Visit>>;
    async fn update_visit(&self, visit: Visit) -> ClinicResult<Visit>;

    async fn clear_data(&self) -> ClinicResult<()>;
}
