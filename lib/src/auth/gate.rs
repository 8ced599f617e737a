// lib/src/auth/gate.rs
use std::sync::Arc;

use log::debug;
use uuid::Uuid;

use crate::auth::token::TokenSigner;
use crate::storage_engine::ClinicStorageEngine;
use models::errors::{ClinicError, ClinicResult};
use models::medical::{Role, User};

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
    pub username: String,
}

impl Caller {
    pub fn from_user(user: &User) -> Self {
        Caller { id: user.id, role: user.role, username: user.username.clone() }
    }

    /// Fails with `Forbidden` unless the caller holds one of `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> ClinicResult<()> {
        if allowed.contains(&self.role) {
            return Ok(());
        }
        debug!("{} ({}) denied, needs one of {:?}", self.username, self.role, allowed);
        let names: Vec<&str> = allowed.iter().map(Role::as_str).collect();
        Err(ClinicError::Forbidden(format!("requires role {}", names.join(" or "))))
    }
}

pub fn extract_bearer_token(header: Option<&str>) -> ClinicResult<&str> {
    let header = header.ok_or_else(|| ClinicError::Unauthorized("Missing Authorization header".to_string()))?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ClinicError::Unauthorized("Authorization header must use Bearer scheme".to_string()))
}

/// Verifies bearer credentials and resolves them to a stored user.
#[derive(Debug, Clone)]
pub struct AuthGate {
    signer: Arc<TokenSigner>,
    store: Arc<dyn ClinicStorageEngine>,
}

impl AuthGate {
    pub fn new(signer: Arc<TokenSigner>, store: Arc<dyn ClinicStorageEngine>) -> Self {
        AuthGate { signer, store }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// The role comes from the stored user, not from the token claims.
    pub async fn authenticate(&self, authorization: Option<&str>) -> ClinicResult<Caller> {
        let token = extract_bearer_token(authorization)?;
        let claims = self.signer.verify(token)?;
        let user = self
            .store
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| ClinicError::Unauthorized("User no longer exists".to_string()))?;
        Ok(Caller::from_user(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_engine::InMemoryStorage;
    use chrono::Utc;
    use models::medical::NewUser;

    fn patient() -> User {
        User::new(
            NewUser {
                username: "pat".into(),
                password_hash: "x".into(),
                full_name: "Pat Patient".into(),
                email: "pat@example.com".into(),
                phone: None,
                role: Role::Patient,
                specialty: None,
                date_of_birth: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn should_extract_bearer_token() {
        assert_eq!(extract_bearer_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert!(extract_bearer_token(None).is_err());
        assert!(extract_bearer_token(Some("Basic dXNlcg==")).is_err());
        assert!(extract_bearer_token(Some("Bearer ")).is_err());
    }

    #[test]
    fn should_enforce_role_allow_list() {
        let caller = Caller::from_user(&patient());
        assert!(caller.require_role(&[Role::Patient]).is_ok());
        let err = caller.require_role(&[Role::Doctor, Role::Finance]).unwrap_err();
        assert_eq!(err, ClinicError::Forbidden("requires role doctor or finance".into()));
    }

    #[tokio::test]
    async fn should_resolve_token_to_stored_user() {
        let store: Arc<dyn ClinicStorageEngine> = Arc::new(InMemoryStorage::default());
        let signer = Arc::new(TokenSigner::new(b"gate".to_vec(), 1));
        let gate = AuthGate::new(signer.clone(), store.clone());

        let user = store.create_user(patient()).await.unwrap();
        let header = format!("Bearer {}", signer.issue(&user).unwrap());
        let caller = gate.authenticate(Some(&header)).await.unwrap();
        assert_eq!(caller.id, user.id);
        assert_eq!(caller.role, Role::Patient);

        let ghost = patient();
        let header = format!("Bearer {}", signer.issue(&ghost).unwrap());
        assert!(matches!(gate.authenticate(Some(&header)).await, Err(ClinicError::Unauthorized(_))));
        assert!(matches!(gate.authenticate(None).await, Err(ClinicError::Unauthorized(_))));
    }
}
