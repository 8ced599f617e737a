// models/src/medical/visit.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationErrors, ValidationResult};
use crate::identifiers::{UserId, VisitCode, VisitId};
use crate::medical::user::{DoctorSummary, PatientSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl VisitStatus {
    pub const ALL: [VisitStatus; 4] = [
        VisitStatus::Scheduled,
        VisitStatus::InProgress,
        VisitStatus::Completed,
        VisitStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::InProgress => "in-progress",
            VisitStatus::Completed => "completed",
            VisitStatus::Cancelled => "cancelled",
        }
    }

    /// Active visits hold their doctor's time slot.
    pub fn is_active(&self) -> bool {
        matches!(self, VisitStatus::Scheduled | VisitStatus::InProgress)
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitStatus {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> ValidationResult<Self> {
        VisitStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| ValidationErrors::single("status", format!("'{}' is not a valid visit status", s)))
    }
}

/// A billable line item attached to a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cost: f64,
}

/// Sum of treatment costs; the only way a visit's total is ever produced.
pub fn total_amount(treatments: &[Treatment]) -> f64 {
    treatments.iter().map(|t| t.cost).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: VisitId,
    pub visit_code: VisitCode,
    pub patient_id: UserId,
    pub doctor_id: UserId,
    pub appointment_date: DateTime<Utc>,
    pub status: VisitStatus,
    pub symptoms: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub treatments: Vec<Treatment>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub is_paid: bool,
    /// Bumped by the store on every successful update.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// A freshly booked visit: scheduled, unpaid, no treatments. The
    /// appointment is kept at millisecond precision, the unit every store
    /// compares slots in.
    pub fn schedule(
        patient_id: UserId,
        doctor_id: UserId,
        appointment_date: DateTime<Utc>,
        symptoms: String,
        now: DateTime<Utc>,
    ) -> Self {
        Visit {
            id: Uuid::new_v4(),
            visit_code: VisitCode::generate(now),
            patient_id,
            doctor_id,
            appointment_date: appointment_date.trunc_subsecs(3),
            status: VisitStatus::Scheduled,
            symptoms,
            diagnosis: String::new(),
            notes: String::new(),
            treatments: Vec::new(),
            total_amount: 0.0,
            is_paid: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn replace_treatments(&mut self, treatments: Vec<Treatment>) {
        self.total_amount = total_amount(&treatments);
        self.treatments = treatments;
    }

    /// True when both visits are active and book the same doctor at the same instant.
    pub fn conflicts_with(&self, other: &Visit) -> bool {
        self.id != other.id
            && self.doctor_id == other.doctor_id
            && self.appointment_date == other.appointment_date
            && self.status.is_active()
            && other.status.is_active()
    }
}

/// A visit with its patient and doctor expanded into read-only summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitView {
    #[serde(flatten)]
    pub visit: Visit,
    pub patient: Option<PatientSummary>,
    pub doctor: Option<DoctorSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn sample_visit() -> Visit {
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        Visit::schedule(Uuid::new_v4(), Uuid::new_v4(), at, "Persistent headache".into(), Utc::now())
    }

    #[test]
    fn should_schedule_with_defaults() {
        let visit = sample_visit();
        assert_eq!(visit.status, VisitStatus::Scheduled);
        assert_eq!(visit.total_amount, 0.0);
        assert!(visit.treatments.is_empty());
        assert!(!visit.is_paid);
        assert!(visit.diagnosis.is_empty());
    }

    #[test]
    fn should_use_kebab_case_status_on_the_wire() {
        assert_eq!(serde_json::to_value(VisitStatus::InProgress).unwrap(), "in-progress");
        assert_eq!("in-progress".parse::<VisitStatus>().unwrap(), VisitStatus::InProgress);
        assert!("in_progress".parse::<VisitStatus>().is_err());
    }

    #[test]
    fn should_flatten_visit_into_view() {
        let visit = sample_visit();
        let view = VisitView { visit: visit.clone(), patient: None, doctor: None };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["visitCode"], visit.visit_code.as_str());
        assert_eq!(json["status"], "scheduled");
        assert_eq!(json["totalAmount"], 0.0);
        assert!(json["patient"].is_null());
    }

    #[test]
    fn should_detect_conflicts_only_between_active_visits() {
        let first = sample_visit();
        let mut second = sample_visit();
        second.doctor_id = first.doctor_id;
        assert!(first.conflicts_with(&second));
        assert!(!first.conflicts_with(&first));

        second.status = VisitStatus::Cancelled;
        assert!(!first.conflicts_with(&second));

        second.status = VisitStatus::InProgress;
        second.appointment_date = first.appointment_date + chrono::Duration::minutes(30);
        assert!(!first.conflicts_with(&second));
    }

    #[test]
    fn should_reset_total_for_empty_treatments() {
        let mut visit = sample_visit();
        visit.replace_treatments(vec![Treatment { name: "X-Ray".into(), description: String::new(), cost: 50.0 }]);
        assert_eq!(visit.total_amount, 50.0);
        visit.replace_treatments(Vec::new());
        assert_eq!(visit.total_amount, 0.0);
    }

    proptest! {
        #[test]
        fn total_amount_tracks_treatment_costs(costs in proptest::collection::vec(0.0f64..10_000.0, 0..16)) {
            let treatments: Vec<Treatment> = costs
                .iter()
                .enumerate()
                .map(|(i, cost)| Treatment { name: format!("item-{}", i), description: String::new(), cost: *cost })
                .collect();
            let mut visit = sample_visit();
            visit.replace_treatments(treatments);
            let expected: f64 = costs.iter().sum();
            prop_assert_eq!(visit.total_amount, expected);
            prop_assert_eq!(visit.treatments.len(), costs.len());
        }
    }
}
