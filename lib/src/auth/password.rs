// lib/src/auth/password.rs
use log::error;
use tokio::task;

use models::errors::{ClinicError, ClinicResult};

fn hashing_error(err: bcrypt::BcryptError) -> ClinicError {
    error!("Password hashing failed: {}", err);
    ClinicError::InternalError(format!("password hashing failed: {}", err))
}

/// bcrypt is deliberately slow, so it runs on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> ClinicResult<String> {
    task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await?
        .map_err(hashing_error)
}

pub async fn verify_password(password: String, hash: String) -> ClinicResult<bool> {
    task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await?
        .map_err(hashing_error)
}
