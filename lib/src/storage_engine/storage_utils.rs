// lib/src/storage_engine/storage_utils.rs
//! Table logic shared by the engines that keep everything in process memory
//! (the in-memory and JSON-file engines), plus the conflict messages every
//! engine reports.

use std::collections::HashMap;

use uuid::Uuid;

use models::errors::{ClinicError, ClinicResult};
use models::medical::{User, Visit};

pub const USERNAME_TAKEN: &str = "Username already exists";
pub const EMAIL_TAKEN: &str = "Email already exists";
pub const SLOT_TAKEN: &str = "Doctor already has a visit scheduled at this time";
pub const STALE_VISIT: &str = "visit was modified concurrently";

/// Key of the doctor's time slot: 16 id bytes followed by the big-endian
/// appointment time in milliseconds.
pub fn slot_key(visit: &Visit) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(visit.doctor_id.as_bytes());
    key.extend_from_slice(&visit.appointment_date.timestamp_millis().to_be_bytes());
    key
}

/// Carries the immutable fields of the stored user over the replacement.
pub fn merge_user_update(stored: &User, mut update: User) -> User {
    update.id = stored.id;
    update.username = stored.username.clone();
    update.role = stored.role;
    update.created_at = stored.created_at;
    update
}

/// Users and visits held in memory, with the uniqueness and slot rules applied.
#[derive(Debug, Clone, Default)]
pub struct ClinicTables {
    pub users: HashMap<Uuid, User>,
    pub visits: HashMap<Uuid, Visit>,
}

impl ClinicTables {
    pub fn from_records(users: Vec<User>, visits: Vec<Visit>) -> Self {
        ClinicTables {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
            visits: visits.into_iter().map(|v| (v.id, v)).collect(),
        }
    }

    pub fn insert_user(&mut self, user: User) -> ClinicResult<User> {
        if self.users.values().any(|u| u.username == user.username) {
            return Err(ClinicError::Conflict(USERNAME_TAKEN.to_string()));
        }
        if self.users.values().any(|u| u.email == user.email) {
            return Err(ClinicError::Conflict(EMAIL_TAKEN.to_string()));
        }
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn find_user_by_username(&self, username: &str) -> Option<User> {
        self.users.values().find(|u| u.username == username).cloned()
    }

    pub fn replace_user(&mut self, user: User) -> ClinicResult<User> {
        let stored = self
            .users
            .get(&user.id)
            .ok_or_else(|| ClinicError::NotFound("User".to_string()))?;
        let merged = merge_user_update(stored, user);
        if self.users.values().any(|u| u.id != merged.id && u.email == merged.email) {
            return Err(ClinicError::Conflict(EMAIL_TAKEN.to_string()));
        }
        self.users.insert(merged.id, merged.clone());
        Ok(merged)
    }

    pub fn insert_visit(&mut self, visit: Visit) -> ClinicResult<Visit> {
        if visit.status.is_active() && self.visits.values().any(|v| v.conflicts_with(&visit)) {
            return Err(ClinicError::Conflict(SLOT_TAKEN.to_string()));
        }
        self.visits.insert(visit.id, visit.clone());
        Ok(visit)
    }

    pub fn replace_visit(&mut self, mut visit: Visit) -> ClinicResult<Visit> {
        let stored = self
            .visits
            .get(&visit.id)
            .ok_or_else(|| ClinicError::NotFound("Visit".to_string()))?;
        if stored.version != visit.version {
            return Err(ClinicError::Conflict(STALE_VISIT.to_string()));
        }
        visit.version += 1;
        self.visits.insert(visit.id, visit.clone());
        Ok(visit)
    }

    pub fn sorted_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        users
    }

    pub fn sorted_visits(&self) -> Vec<Visit> {
        let mut visits: Vec<Visit> = self.visits.values().cloned().collect();
        visits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        visits
    }

    pub fn clear(&mut self) {
        self.users.clear();
        self.visits.clear();
    }
}

/// Behaviour every engine must share. Each engine's test module runs these
/// against its own instance.
#[cfg(test)]
pub(crate) mod conformance {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use models::medical::{NewUser, Role, Treatment, VisitStatus};

    use super::*;
    use crate::storage_engine::ClinicStorageEngine;

    pub fn user(username: &str, role: Role) -> User {
        User::new(
            NewUser {
                username: username.to_string(),
                password_hash: "$2b$04$notarealhash".to_string(),
                full_name: format!("{} Example", username),
                email: format!("{}@example.com", username),
                phone: None,
                role,
                specialty: (role == Role::Doctor).then(|| "General Practice".to_string()),
                date_of_birth: None,
            },
            Utc::now(),
        )
    }

    pub fn visit(patient: &User, doctor: &User, hour: u32) -> Visit {
        let at = Utc.with_ymd_and_hms(2024, 6, 3, hour, 0, 0).unwrap();
        Visit::schedule(patient.id, doctor.id, at, "Recurring chest pain".to_string(), Utc::now())
    }

    pub async fn rejects_duplicate_users(store: Arc<dyn ClinicStorageEngine>) {
        let alice = store.create_user(user("alice", Role::Patient)).await.unwrap();
        let again = store.create_user(user("alice", Role::Patient)).await;
        assert_eq!(again, Err(ClinicError::Conflict(USERNAME_TAKEN.to_string())));

        let mut same_email = user("alice2", Role::Patient);
        same_email.email = alice.email.clone();
        let result = store.create_user(same_email).await;
        assert_eq!(result, Err(ClinicError::Conflict(EMAIL_TAKEN.to_string())));

        assert_eq!(store.get_all_users().await.unwrap().len(), 1);
        let found = store.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
        assert_eq!(store.get_user(&alice.id).await.unwrap(), Some(alice));
        assert!(store.get_user_by_username("nobody").await.unwrap().is_none());
    }

    pub async fn updates_profiles_but_not_identity(store: Arc<dyn ClinicStorageEngine>) {
        let doctor = store.create_user(user("house", Role::Doctor)).await.unwrap();
        let other = store.create_user(user("wilson", Role::Doctor)).await.unwrap();

        let mut change = doctor.clone();
        change.role = Role::Finance;
        change.username = "hacked".to_string();
        change.is_available = false;
        change.full_name = "Gregory House".to_string();
        let updated = store.update_user(change).await.unwrap();
        assert_eq!(updated.role, Role::Doctor);
        assert_eq!(updated.username, "house");
        assert!(!updated.is_available);

        let stored = store.get_user(&doctor.id).await.unwrap().unwrap();
        assert_eq!(stored.full_name, "Gregory House");
        assert_eq!(stored.username, "house");

        let mut steal = stored.clone();
        steal.email = other.email.clone();
        assert!(matches!(store.update_user(steal).await, Err(ClinicError::Conflict(_))));

        let ghost = user("ghost", Role::Patient);
        assert!(matches!(store.update_user(ghost).await, Err(ClinicError::NotFound(_))));
    }

    pub async fn guards_doctor_slots(store: Arc<dyn ClinicStorageEngine>) {
        let patient = store.create_user(user("pat", Role::Patient)).await.unwrap();
        let doctor = store.create_user(user("doc", Role::Doctor)).await.unwrap();

        let first = store.create_visit(visit(&patient, &doctor, 9)).await.unwrap();
        let clash = store.create_visit(visit(&patient, &doctor, 9)).await;
        assert_eq!(clash, Err(ClinicError::Conflict(SLOT_TAKEN.to_string())));
        store.create_visit(visit(&patient, &doctor, 10)).await.unwrap();

        let mut cancelled = first.clone();
        cancelled.status = VisitStatus::Cancelled;
        store.update_visit(cancelled).await.unwrap();
        store.create_visit(visit(&patient, &doctor, 9)).await.unwrap();

        assert_eq!(store.get_all_visits().await.unwrap().len(), 3);
    }

    pub async fn enforces_visit_versions(store: Arc<dyn ClinicStorageEngine>) {
        let patient = store.create_user(user("pat", Role::Patient)).await.unwrap();
        let doctor = store.create_user(user("doc", Role::Doctor)).await.unwrap();
        let created = store.create_visit(visit(&patient, &doctor, 11)).await.unwrap();
        assert_eq!(created.version, 0);

        let mut started = created.clone();
        started.status = VisitStatus::InProgress;
        let started = store.update_visit(started).await.unwrap();
        assert_eq!(started.version, 1);

        let mut stale = created.clone();
        stale.replace_treatments(vec![Treatment { name: "X-Ray".into(), description: String::new(), cost: 50.0 }]);
        assert_eq!(store.update_visit(stale).await, Err(ClinicError::Conflict(STALE_VISIT.to_string())));

        let stored = store.get_visit(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, VisitStatus::InProgress);
        assert_eq!(stored.total_amount, 0.0);
        assert_eq!(stored.version, 1);

        let missing = visit(&patient, &doctor, 12);
        assert!(matches!(store.update_visit(missing).await, Err(ClinicError::NotFound(_))));
    }

    pub async fn books_each_slot_once_under_contention(store: Arc<dyn ClinicStorageEngine>) {
        let patient = store.create_user(user("pat", Role::Patient)).await.unwrap();
        let doctor = store.create_user(user("doc", Role::Doctor)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let candidate = visit(&patient, &doctor, 14);
            handles.push(tokio::spawn(async move { store.create_visit(candidate).await }));
        }
        let mut booked = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(ClinicError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(booked, 1);
    }

    pub async fn clears_everything(store: Arc<dyn ClinicStorageEngine>) {
        let patient = store.create_user(user("pat", Role::Patient)).await.unwrap();
        let doctor = store.create_user(user("doc", Role::Doctor)).await.unwrap();
        store.create_visit(visit(&patient, &doctor, 8)).await.unwrap();
        store.clear_data().await.unwrap();
        assert!(store.get_all_users().await.unwrap().is_empty());
        assert!(store.get_all_visits().await.unwrap().is_empty());
        // Slots are released too.
        let patient = store.create_user(user("pat", Role::Patient)).await.unwrap();
        let doctor = store.create_user(user("doc", Role::Doctor)).await.unwrap();
        store.create_visit(visit(&patient, &doctor, 8)).await.unwrap();
    }
}
