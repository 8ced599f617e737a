// lib/src/services/validation.rs
//! Input checks shared by the services. Each check appends to a
//! `ValidationErrors` so one response can name every bad field.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use models::errors::{ValidationErrors, ValidationResult};
use models::medical::{NewUser, Role, Treatment};
use models::requests::RegisterRequest;
use models::timestamp::parse_date;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_FULL_NAME_LEN: usize = 2;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

/// Trimmed, lowercased email, or a field error.
pub fn check_email(errors: &mut ValidationErrors, raw: &str) -> String {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !email_regex().is_match(&email) {
        errors.add("email", "Email is not valid");
    }
    email
}

pub fn check_full_name(errors: &mut ValidationErrors, raw: &str) -> String {
    let name = raw.trim().to_string();
    if name.chars().count() < MIN_FULL_NAME_LEN {
        errors.add("fullName", format!("Full name must be at least {} characters", MIN_FULL_NAME_LEN));
    }
    name
}

pub fn check_password(errors: &mut ValidationErrors, raw: &str) {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", format!("Password must be at least {} characters", MIN_PASSWORD_LEN));
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Registration fields after validation, minus the password hash.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRegistration {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub specialty: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl ValidRegistration {
    pub fn into_new_user(self, password_hash: String) -> NewUser {
        NewUser {
            username: self.username,
            password_hash,
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            role: self.role,
            specialty: self.specialty,
            date_of_birth: self.date_of_birth,
        }
    }
}

pub fn validate_registration(req: &RegisterRequest) -> ValidationResult<ValidRegistration> {
    let mut errors = ValidationErrors::new();

    let username = req.username.trim().to_string();
    if username.chars().count() < MIN_USERNAME_LEN {
        errors.add("username", format!("Username must be at least {} characters", MIN_USERNAME_LEN));
    }
    check_password(&mut errors, &req.password);
    let email = check_email(&mut errors, &req.email);
    let full_name = check_full_name(&mut errors, &req.full_name);

    let role = match req.role.parse::<Role>() {
        Ok(role) => Some(role),
        Err(e) => {
            errors.0.extend(e.0);
            None
        }
    };

    let specialty = non_empty(req.specialty.as_deref());
    if role == Some(Role::Doctor) && specialty.is_none() {
        errors.add("specialty", "Specialty is required for doctors");
    }

    let mut date_of_birth = None;
    if role == Some(Role::Patient) {
        match non_empty(req.date_of_birth.as_deref()) {
            None => errors.add("dateOfBirth", "Date of birth is required for patients"),
            Some(raw) => match parse_date(&raw) {
                Some(date) => date_of_birth = Some(date),
                None => errors.add("dateOfBirth", format!("'{}' is not a valid date", raw)),
            },
        }
    }

    errors.into_result()?;
    let role = role.ok_or_else(|| ValidationErrors::single("role", "Invalid user type"))?;
    Ok(ValidRegistration {
        username,
        password: req.password.clone(),
        full_name,
        email,
        phone: non_empty(req.phone.as_deref()),
        role,
        specialty,
        date_of_birth,
    })
}

pub fn validate_treatments(treatments: &[Treatment]) -> ValidationResult<()> {
    let mut errors = ValidationErrors::new();
    for (i, treatment) in treatments.iter().enumerate() {
        if treatment.name.trim().is_empty() {
            errors.add(&format!("treatments[{}].name", i), "Treatment name is required");
        }
        if !treatment.cost.is_finite() || treatment.cost < 0.0 {
            errors.add(&format!("treatments[{}].cost", i), "Cost must be a non-negative number");
        }
    }
    errors.into_result()
}

/// `"Gregory House"` becomes `"gregory.house"`.
pub fn derive_doctor_username(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: &str) -> RegisterRequest {
        RegisterRequest {
            username: "  jdoe ".into(),
            password: "secret1".into(),
            email: "Jane.Doe@Example.com".into(),
            full_name: " Jane Doe ".into(),
            role: role.into(),
            specialty: Some("Cardiology".into()),
            date_of_birth: Some("1990-04-12".into()),
            phone: Some("  ".into()),
        }
    }

    #[test]
    fn should_normalize_valid_patient() {
        let valid = validate_registration(&request("patient")).unwrap();
        assert_eq!(valid.username, "jdoe");
        assert_eq!(valid.email, "jane.doe@example.com");
        assert_eq!(valid.full_name, "Jane Doe");
        assert_eq!(valid.role, Role::Patient);
        assert_eq!(valid.date_of_birth, NaiveDate::from_ymd_opt(1990, 4, 12));
        assert!(valid.phone.is_none());
    }

    #[test]
    fn should_list_every_bad_field() {
        let req = RegisterRequest { role: "doctor".into(), ..RegisterRequest::default() };
        let errors = validate_registration(&req).unwrap_err();
        assert_eq!(errors.fields(), vec!["username", "password", "email", "fullName", "specialty"]);
    }

    #[test]
    fn should_require_date_of_birth_for_patients_only() {
        let mut req = request("patient");
        req.date_of_birth = None;
        assert_eq!(validate_registration(&req).unwrap_err().fields(), vec!["dateOfBirth"]);

        let mut finance = request("finance");
        finance.date_of_birth = None;
        let valid = validate_registration(&finance).unwrap();
        assert!(valid.date_of_birth.is_none());
    }

    #[test]
    fn should_reject_unknown_role_and_bad_email() {
        let mut req = request("admin");
        req.email = "not-an-email".into();
        assert_eq!(validate_registration(&req).unwrap_err().fields(), vec!["email", "role"]);
    }

    #[test]
    fn should_reject_negative_or_nameless_treatments() {
        let treatments = vec![
            Treatment { name: "X-Ray".into(), description: String::new(), cost: 50.0 },
            Treatment { name: " ".into(), description: String::new(), cost: -1.0 },
            Treatment { name: "MRI".into(), description: String::new(), cost: f64::NAN },
        ];
        let errors = validate_treatments(&treatments).unwrap_err();
        assert_eq!(errors.fields(), vec!["treatments[1].name", "treatments[1].cost", "treatments[2].cost"]);
        assert!(validate_treatments(&[]).is_ok());
    }

    #[test]
    fn should_derive_doctor_usernames() {
        assert_eq!(derive_doctor_username("Gregory  House"), "gregory.house");
        assert_eq!(derive_doctor_username("Cher"), "cher");
    }
}
