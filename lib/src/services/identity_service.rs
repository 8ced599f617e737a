// lib/src/services/identity_service.rs
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::auth::{hash_password, verify_password, Caller, TokenSigner};
use crate::services::validation::{
    check_email, check_full_name, check_password, derive_doctor_username, validate_registration,
};
use crate::storage_engine::ClinicStorageEngine;
use models::errors::{ClinicError, ClinicResult, ValidationErrors};
use models::medical::{NewUser, Role, User, UserProfile};
use models::requests::{AddDoctorRequest, AuthResponse, AvailabilityUpdate, LoginRequest, ProfileUpdate, RegisterRequest};

/// Registration, login and profile management.
#[derive(Debug, Clone)]
pub struct IdentityService {
    store: Arc<dyn ClinicStorageEngine>,
    signer: Arc<TokenSigner>,
    bcrypt_cost: u32,
}

impl IdentityService {
    pub fn new(store: Arc<dyn ClinicStorageEngine>, signer: Arc<TokenSigner>, bcrypt_cost: u32) -> Self {
        IdentityService { store, signer, bcrypt_cost }
    }

    async fn load(&self, caller: &Caller) -> ClinicResult<User> {
        self.store
            .get_user(&caller.id)
            .await?
            .ok_or_else(|| ClinicError::NotFound("User".to_string()))
    }

    pub async fn register(&self, req: RegisterRequest) -> ClinicResult<AuthResponse> {
        let valid = validate_registration(&req)?;
        if self.store.get_user_by_username(&valid.username).await?.is_some() {
            return Err(ClinicError::Conflict("Username already exists".to_string()));
        }
        let password_hash = hash_password(valid.password.clone(), self.bcrypt_cost).await?;
        let user = User::new(valid.into_new_user(password_hash), Utc::now());
        // The store re-checks uniqueness atomically; the lookup above only skips hashing.
        let user = self.store.create_user(user).await?;
        info!("Registered {} '{}' ({})", user.role, user.username, user.id);
        Ok(AuthResponse {
            message: "User registered successfully".to_string(),
            token: self.signer.issue(&user)?,
            user: user.profile(),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> ClinicResult<AuthResponse> {
        let mut errors = ValidationErrors::new();
        let username = req.username.trim();
        if username.is_empty() {
            errors.add("username", "Username is required");
        }
        if req.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors.into_result()?;

        let Some(user) = self.store.get_user_by_username(username).await? else {
            debug!("Login for unknown username '{}'", username);
            return Err(ClinicError::InvalidCredentials);
        };
        if !verify_password(req.password, user.password_hash.clone()).await? {
            warn!("Failed login for '{}'", user.username);
            return Err(ClinicError::InvalidCredentials);
        }
        info!("User '{}' logged in", user.username);
        Ok(AuthResponse {
            message: "Login successful".to_string(),
            token: self.signer.issue(&user)?,
            user: user.profile(),
        })
    }

    pub async fn profile(&self, caller: &Caller) -> ClinicResult<UserProfile> {
        Ok(self.load(caller).await?.profile())
    }

    pub async fn update_profile(&self, caller: &Caller, update: ProfileUpdate) -> ClinicResult<UserProfile> {
        let mut user = self.load(caller).await?;
        let mut errors = ValidationErrors::new();
        if let Some(name) = update.full_name.as_deref() {
            user.full_name = check_full_name(&mut errors, name);
        }
        if let Some(email) = update.email.as_deref() {
            user.email = check_email(&mut errors, email);
        }
        if let Some(phone) = update.phone {
            let phone = phone.trim().to_string();
            user.phone = (!phone.is_empty()).then_some(phone);
        }
        if let Some(specialty) = update.specialty {
            if !user.is_doctor() {
                errors.add("specialty", "Only doctors have a specialty");
            } else if specialty.trim().is_empty() {
                errors.add("specialty", "Specialty cannot be empty");
            } else {
                user.specialty = Some(specialty.trim().to_string());
            }
        }
        errors.into_result()?;

        user.updated_at = Utc::now();
        let user = self.store.update_user(user).await?;
        info!("Updated profile of '{}'", user.username);
        Ok(user.profile())
    }

    pub async fn set_availability(&self, caller: &Caller, update: AvailabilityUpdate) -> ClinicResult<UserProfile> {
        caller.require_role(&[Role::Doctor])?;
        let is_available = update
            .is_available
            .ok_or_else(|| ClinicError::invalid_field("isAvailable", "isAvailable must be true or false"))?;
        let mut user = self.load(caller).await?;
        user.is_available = is_available;
        user.updated_at = Utc::now();
        let user = self.store.update_user(user).await?;
        info!("Doctor '{}' is now {}", user.username, if is_available { "available" } else { "unavailable" });
        Ok(user.profile())
    }

    pub async fn list_users(&self, caller: &Caller) -> ClinicResult<Vec<UserProfile>> {
        caller.require_role(&[Role::Finance])?;
        Ok(self.store.get_all_users().await?.iter().map(User::profile).collect())
    }

    pub async fn list_doctors(&self) -> ClinicResult<Vec<UserProfile>> {
        let users = self.store.get_all_users().await?;
        Ok(users.iter().filter(|u| u.is_doctor()).map(User::profile).collect())
    }

    /// Finance staff onboarding a doctor directly.
    pub async fn add_doctor(&self, caller: &Caller, req: AddDoctorRequest) -> ClinicResult<UserProfile> {
        caller.require_role(&[Role::Finance])?;
        let mut errors = ValidationErrors::new();
        let full_name = check_full_name(&mut errors, &req.full_name);
        let specialty = req.specialty.trim().to_string();
        if specialty.is_empty() {
            errors.add("specialty", "Specialty is required for doctors");
        }
        check_password(&mut errors, &req.password);
        let username = derive_doctor_username(&full_name);
        let email = match req.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => check_email(&mut errors, email),
            None => format!("{}@example.com", username),
        };
        errors.into_result()?;

        let password_hash = hash_password(req.password, self.bcrypt_cost).await?;
        let doctor = User::new(
            NewUser {
                username,
                password_hash,
                full_name,
                email,
                phone: req.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
                role: Role::Doctor,
                specialty: Some(specialty),
                date_of_birth: None,
            },
            Utc::now(),
        );
        let doctor = self.store.create_user(doctor).await?;
        info!("Finance user '{}' added doctor '{}'", caller.username, doctor.username);
        Ok(doctor.profile())
    }
}
