// models/src/dashboard.rs
use serde::{Deserialize, Serialize};

/// Figures for a single doctor's own visits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStats {
    pub total_visits: usize,
    pub completed_visits: usize,
    pub scheduled_visits: usize,
    pub in_progress_visits: usize,
    /// Sum of totalAmount over completed visits.
    pub total_revenue: f64,
}

/// Clinic-wide figures for finance staff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceStats {
    pub total_doctors: usize,
    pub total_patients: usize,
    pub total_visits: usize,
    pub completed_visits: usize,
    pub scheduled_visits: usize,
    pub in_progress_visits: usize,
    pub total_revenue: f64,
    /// Completed and paid.
    pub paid_amount: f64,
    /// `total_revenue - paid_amount`
    pub pending_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClinicStats {
    Doctor(DoctorStats),
    Finance(FinanceStats),
}
