use core::ops::Deref;
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationErrors, ValidationResult};

pub type UserId = Uuid;
pub type VisitId = Uuid;

/// Length of the random suffix appended to every visit code.
pub const VISIT_CODE_SUFFIX_LEN: usize = 5;

/// Human-readable visit code: `V` + creation time in milliseconds + an
/// uppercase alphanumeric suffix. Uniqueness is probabilistic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitCode(String);

impl VisitCode {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(VISIT_CODE_SUFFIX_LEN)
            .map(char::from)
            .collect::<String>()
            .to_uppercase();
        VisitCode(format!("V{}{}", now.timestamp_millis(), suffix))
    }

    pub fn new(s: String) -> ValidationResult<Self> {
        let valid = s.len() > 1 + VISIT_CODE_SUFFIX_LEN
            && s.starts_with('V')
            && s[1..].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase());
        if valid {
            Ok(VisitCode(s))
        } else {
            Err(ValidationErrors::single("visitCode", format!("'{}' is not a valid visit code", s)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for VisitCode {
    type Target = String;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for VisitCode {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> ValidationResult<Self> {
        Self::new(s.to_string())
    }
}

impl fmt::Display for VisitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses a caller-supplied id, reporting the offending field on failure.
pub fn parse_id(field: &str, raw: &str) -> ValidationResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ValidationErrors::single(field, format!("'{}' is not a valid id", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn should_generate_code_from_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let code = VisitCode::generate(now);
        let millis = now.timestamp_millis().to_string();
        assert!(code.starts_with('V'));
        assert_eq!(&code[1..1 + millis.len()], millis);
        assert_eq!(code.len(), 1 + millis.len() + VISIT_CODE_SUFFIX_LEN);
    }

    #[test]
    fn should_uppercase_suffix() {
        let code = VisitCode::generate(Utc::now());
        assert!(code[1..].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn should_round_trip_generated_code() {
        let code = VisitCode::generate(Utc::now());
        let parsed = VisitCode::from_str(code.as_str());
        assert_eq!(parsed.unwrap(), code);
    }

    #[test]
    fn should_not_accept_malformed_code() {
        assert!(VisitCode::from_str("").is_err());
        assert!(VisitCode::from_str("X1700000000000ABCDE").is_err());
        assert!(VisitCode::from_str("V1700000000000abcde").is_err());
    }

    #[test]
    fn should_report_field_for_bad_id() {
        let err = parse_id("doctorId", "not-a-uuid").unwrap_err();
        assert_eq!(err.fields(), vec!["doctorId"]);
        assert!(parse_id("doctorId", &Uuid::new_v4().to_string()).is_ok());
    }
}
