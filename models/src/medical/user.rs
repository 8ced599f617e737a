// models/src/medical/user.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationErrors, ValidationResult};
use crate::identifiers::UserId;

/// Fixed per user; gates which operations are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Finance,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Patient, Role::Doctor, Role::Finance];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Finance => "finance",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> ValidationResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "finance" => Ok(Role::Finance),
            _ => Err(ValidationErrors::single("role", "Invalid user type")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalHistoryEntry {
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
}

fn default_available() -> bool {
    true
}

/// Stored user record. Never sent over the wire as-is; see [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    // Doctor-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(default = "default_available")]
    pub is_available: bool,
    // Patient-only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub medical_history: Vec<MedicalHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Already-validated fields for a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub specialty: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl User {
    pub fn new(new_user: NewUser, now: DateTime<Utc>) -> Self {
        let NewUser { username, password_hash, full_name, email, phone, role, specialty, date_of_birth } = new_user;
        User {
            id: Uuid::new_v4(),
            username,
            password_hash,
            full_name,
            email,
            phone,
            role,
            specialty: if role == Role::Doctor { specialty } else { None },
            is_available: true,
            date_of_birth: if role == Role::Patient { date_of_birth } else { None },
            medical_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }

    pub fn patient_summary(&self) -> PatientSummary {
        PatientSummary {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            date_of_birth: self.date_of_birth,
        }
    }

    pub fn doctor_summary(&self) -> DoctorSummary {
        DoctorSummary {
            full_name: self.full_name.clone(),
            specialty: self.specialty.clone(),
        }
    }
}

/// External projection of a [`User`]; the password hash is never included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub medical_history: Vec<MedicalHistoryEntry>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            specialty: user.specialty.clone(),
            is_available: user.is_doctor().then_some(user.is_available),
            date_of_birth: user.date_of_birth,
            medical_history: user.medical_history.clone(),
            created_at: user.created_at,
        }
    }
}

/// Read-only patient fields embedded in a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
}

/// Read-only doctor fields embedded in a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSummary {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(role: Role) -> NewUser {
        NewUser {
            username: "jdoe".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            full_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            role,
            specialty: Some("Cardiology".to_string()),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
        }
    }

    #[test]
    fn should_parse_roles_case_insensitively() {
        assert_eq!("Doctor".parse::<Role>().unwrap(), Role::Doctor);
        assert_eq!(" finance ".parse::<Role>().unwrap(), Role::Finance);
        let err = "admin".parse::<Role>().unwrap_err();
        assert_eq!(err.fields(), vec!["role"]);
    }

    #[test]
    fn should_keep_only_role_specific_fields() {
        let patient = User::new(new_user(Role::Patient), Utc::now());
        assert!(patient.specialty.is_none());
        assert!(patient.date_of_birth.is_some());

        let doctor = User::new(new_user(Role::Doctor), Utc::now());
        assert_eq!(doctor.specialty.as_deref(), Some("Cardiology"));
        assert!(doctor.date_of_birth.is_none());
        assert!(doctor.is_available);
    }

    #[test]
    fn should_exclude_password_hash_from_profile() {
        let user = User::new(new_user(Role::Doctor), Utc::now());
        let json = serde_json::to_value(user.profile()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["fullName"], "Jane Doe");
        assert_eq!(json["role"], "doctor");
        assert_eq!(json["isAvailable"], true);
    }

    #[test]
    fn should_hide_availability_for_non_doctors() {
        let user = User::new(new_user(Role::Finance), Utc::now());
        assert!(user.profile().is_available.is_none());
    }

    #[test]
    fn should_default_availability_when_missing_from_storage() {
        let user = User::new(new_user(Role::Doctor), Utc::now());
        let mut json = serde_json::to_value(&user).unwrap();
        json.as_object_mut().unwrap().remove("isAvailable");
        let restored: User = serde_json::from_value(json).unwrap();
        assert!(restored.is_available);
    }
}
