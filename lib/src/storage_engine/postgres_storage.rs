// lib/src/storage_engine/postgres_storage.rs
// NOTE: Creates the `users` and `visits` tables on connect if they are missing.
// NOTE: Treatments and medical history are stored as serialized JSON text.
// NOTE: `visits_active_slot` is a partial unique index on (doctor_id, appointment_date)
//       covering scheduled and in-progress visits; it is what prevents double booking.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info, warn};
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, Row};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::storage_engine::storage_utils::{EMAIL_TAKEN, SLOT_TAKEN, STALE_VISIT, USERNAME_TAKEN};
use crate::storage_engine::{ClinicStorageEngine, StorageEngine};
use models::errors::{ClinicError, ClinicResult, ValidationErrors};
use models::identifiers::VisitCode;
use models::medical::{Role, User, Visit, VisitStatus};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone TEXT,
    role TEXT NOT NULL,
    specialty TEXT,
    is_available BOOLEAN NOT NULL DEFAULT TRUE,
    date_of_birth DATE,
    medical_history TEXT NOT NULL DEFAULT '[]',
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS visits (
    id UUID PRIMARY KEY,
    visit_code TEXT NOT NULL UNIQUE,
    patient_id UUID NOT NULL REFERENCES users(id),
    doctor_id UUID NOT NULL REFERENCES users(id),
    appointment_date TIMESTAMPTZ NOT NULL,
    status TEXT NOT NULL,
    symptoms TEXT NOT NULL,
    diagnosis TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    treatments TEXT NOT NULL DEFAULT '[]',
    total_amount DOUBLE PRECISION NOT NULL DEFAULT 0,
    is_paid BOOLEAN NOT NULL DEFAULT FALSE,
    version BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS visits_active_slot
    ON visits (doctor_id, appointment_date)
    WHERE status IN ('scheduled', 'in-progress');
"#;

const USER_COLUMNS: &str = "id, username, password_hash, full_name, email, phone, role, specialty, \
     is_available, date_of_birth, medical_history, created_at, updated_at";

const VISIT_COLUMNS: &str = "id, visit_code, patient_id, doctor_id, appointment_date, status, symptoms, \
     diagnosis, notes, treatments, total_amount, is_paid, version, created_at, updated_at";

#[derive(Debug)]
pub struct PostgresStorage {
    client: Arc<Mutex<Client>>,
}

fn storage_err(e: tokio_postgres::Error) -> ClinicError {
    error!("Postgres error: {}", e);
    ClinicError::StorageError(e.to_string())
}

/// Turns unique-constraint violations into the same conflicts the other engines report.
fn map_write_error(e: tokio_postgres::Error) -> ClinicError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        let constraint = e.as_db_error().and_then(|db| db.constraint()).unwrap_or_default();
        let message = if constraint.contains("username") {
            USERNAME_TAKEN
        } else if constraint.contains("email") {
            EMAIL_TAKEN
        } else if constraint == "visits_active_slot" {
            SLOT_TAKEN
        } else {
            warn!("Unique violation on unexpected constraint '{}'", constraint);
            "Record already exists"
        };
        return ClinicError::Conflict(message.to_string());
    }
    storage_err(e)
}

fn corrupt_row(e: ValidationErrors) -> ClinicError {
    ClinicError::Serialization(format!("unreadable row: {}", e))
}

fn user_from_row(row: &Row) -> ClinicResult<User> {
    let role: String = row.get("role");
    let history: String = row.get("medical_history");
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        role: role.parse::<Role>().map_err(corrupt_row)?,
        specialty: row.get("specialty"),
        is_available: row.get("is_available"),
        date_of_birth: row.get::<_, Option<NaiveDate>>("date_of_birth"),
        medical_history: serde_json::from_str(&history)?,
        created_at: row.get::<_, DateTime<Utc>>("created_at"),
        updated_at: row.get::<_, DateTime<Utc>>("updated_at"),
    })
}

fn visit_from_row(row: &Row) -> ClinicResult<Visit> {
    let code: String = row.get("visit_code");
    let status: String = row.get("status");
    let treatments: String = row.get("treatments");
    let version: i64 = row.get("version");
    Ok(Visit {
        id: row.get("id"),
        visit_code: VisitCode::new(code).map_err(corrupt_row)?,
        patient_id: row.get("patient_id"),
        doctor_id: row.get("doctor_id"),
        appointment_date: row.get("appointment_date"),
        status: status.parse::<VisitStatus>().map_err(corrupt_row)?,
        symptoms: row.get("symptoms"),
        diagnosis: row.get("diagnosis"),
        notes: row.get("notes"),
        treatments: serde_json::from_str(&treatments)?,
        total_amount: row.get("total_amount"),
        is_paid: row.get("is_paid"),
        version: u64::try_from(version).unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl PostgresStorage {
    pub async fn new(config: &StorageConfig) -> ClinicResult<Self> {
        let connection_string = config
            .connection_string
            .as_ref()
            .ok_or_else(|| ClinicError::ConfigurationError("Postgres connection string is required".to_string()))?;
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| ClinicError::StorageError(format!("Failed to connect to Postgres: {}", e)))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Postgres connection closed with error: {}", e);
            }
        });
        Ok(PostgresStorage { client: Arc::new(Mutex::new(client)) })
    }
}

#[async_trait]
impl StorageEngine for PostgresStorage {
    async fn connect(&self) -> ClinicResult<()> {
        let client = self.client.lock().await;
        client.batch_execute(SCHEMA).await.map_err(storage_err)?;
        info!("Postgres schema ready");
        Ok(())
    }

    async fn flush(&self) -> ClinicResult<()> {
        // Every statement commits on its own.
        Ok(())
    }

    async fn close(&self) -> ClinicResult<()> {
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "postgres"
    }

    async fn is_running(&self) -> bool {
        !self.client.lock().await.is_closed()
    }
}

#[async_trait]
impl ClinicStorageEngine for PostgresStorage {
    async fn create_user(&self, user: User) -> ClinicResult<User> {
        let history = serde_json::to_string(&user.medical_history)?;
        let client = self.client.lock().await;
        client
            .execute(
                &format!(
                    "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                    USER_COLUMNS
                ),
                &[
                    &user.id,
                    &user.username,
                    &user.password_hash,
                    &user.full_name,
                    &user.email,
                    &user.phone,
                    &user.role.as_str(),
                    &user.specialty,
                    &user.is_available,
                    &user.date_of_birth,
                    &history,
                    &user.created_at,
                    &user.updated_at,
                ],
            )
            .await
            .map_err(map_write_error)?;
        Ok(user)
    }

    async fn get_user(&self, id: &Uuid) -> ClinicResult<Option<User>> {
        let client = self.client.lock().await;
        let rows = client
            .query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS), &[id])
            .await
            .map_err(storage_err)?;
        rows.first().map(user_from_row).transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> ClinicResult<Option<User>> {
        let client = self.client.lock().await;
        let rows = client
            .query(&format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS), &[&username])
            .await
            .map_err(storage_err)?;
        rows.first().map(user_from_row).transpose()
    }

    async fn get_all_users(&self) -> ClinicResult<Vec<User>> {
        let client = self.client.lock().await;
        let rows = client
            .query(&format!("SELECT {} FROM users ORDER BY created_at, id", USER_COLUMNS), &[])
            .await
            .map_err(storage_err)?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update_user(&self, user: User) -> ClinicResult<User> {
        let history = serde_json::to_string(&user.medical_history)?;
        let client = self.client.lock().await;
        let rows = client
            .query(
                &format!(
                    "UPDATE users SET password_hash = $2, full_name = $3, email = $4, phone = $5, \
                     specialty = $6, is_available = $7, date_of_birth = $8, medical_history = $9, \
                     updated_at = $10 WHERE id = $1 RETURNING {}",
                    USER_COLUMNS
                ),
                &[
                    &user.id,
                    &user.password_hash,
                    &user.full_name,
                    &user.email,
                    &user.phone,
                    &user.specialty,
                    &user.is_available,
                    &user.date_of_birth,
                    &history,
                    &user.updated_at,
                ],
            )
            .await
            .map_err(map_write_error)?;
        rows.first()
            .map(user_from_row)
            .transpose()?
            .ok_or_else(|| ClinicError::NotFound("User".to_string()))
    }

    async fn create_visit(&self, visit: Visit) -> ClinicResult<Visit> {
        let treatments = serde_json::to_string(&visit.treatments)?;
        let version = i64::try_from(visit.version).unwrap_or(i64::MAX);
        let client = self.client.lock().await;
        client
            .execute(
                &format!(
                    "INSERT INTO visits ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
                    VISIT_COLUMNS
                ),
                &[
                    &visit.id,
                    &visit.visit_code.as_str(),
                    &visit.patient_id,
                    &visit.doctor_id,
                    &visit.appointment_date,
                    &visit.status.as_str(),
                    &visit.symptoms,
                    &visit.diagnosis,
                    &visit.notes,
                    &treatments,
                    &visit.total_amount,
                    &visit.is_paid,
                    &version,
                    &visit.created_at,
                    &visit.updated_at,
                ],
            )
            .await
            .map_err(map_write_error)?;
        Ok(visit)
    }

    async fn get_visit(&self, id: &Uuid) -> ClinicResult<Option<Visit>> {
        let client = self.client.lock().await;
        let rows = client
            .query(&format!("SELECT {} FROM visits WHERE id = $1", VISIT_COLUMNS), &[id])
            .await
            .map_err(storage_err)?;
        rows.first().map(visit_from_row).transpose()
    }

    async fn get_all_visits(&self) -> ClinicResult<Vec<Visit>> {
        let client = self.client.lock().await;
        let rows = client
            .query(&format!("SELECT {} FROM visits ORDER BY created_at, id", VISIT_COLUMNS), &[])
            .await
            .map_err(storage_err)?;
        rows.iter().map(visit_from_row).collect()
    }

    async fn update_visit(&self, visit: Visit) -> ClinicResult<Visit> {
        let treatments = serde_json::to_string(&visit.treatments)?;
        let read_version = i64::try_from(visit.version).unwrap_or(i64::MAX);
        let client = self.client.lock().await;
        let rows = client
            .query(
                &format!(
                    "UPDATE visits SET status = $3, diagnosis = $4, notes = $5, treatments = $6, \
                     total_amount = $7, is_paid = $8, updated_at = $9, version = version + 1 \
                     WHERE id = $1 AND version = $2 RETURNING {}",
                    VISIT_COLUMNS
                ),
                &[
                    &visit.id,
                    &read_version,
                    &visit.status.as_str(),
                    &visit.diagnosis,
                    &visit.notes,
                    &treatments,
                    &visit.total_amount,
                    &visit.is_paid,
                    &visit.updated_at,
                ],
            )
            .await
            .map_err(map_write_error)?;
        if let Some(row) = rows.first() {
            return visit_from_row(row);
        }
        let exists = client
            .query_opt("SELECT 1 FROM visits WHERE id = $1", &[&visit.id])
            .await
            .map_err(storage_err)?
            .is_some();
        if exists {
            Err(ClinicError::Conflict(STALE_VISIT.to_string()))
        } else {
            Err(ClinicError::NotFound("Visit".to_string()))
        }
    }

    async fn clear_data(&self) -> ClinicResult<()> {
        let client = self.client.lock().await;
        client.batch_execute("TRUNCATE visits, users").await.map_err(storage_err)?;
        Ok(())
    }
}
