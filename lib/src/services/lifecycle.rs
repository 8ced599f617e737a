// lib/src/services/lifecycle.rs
//! Visit lifecycle rules: who may do what to a visit, and in which status.
//!
//! ```text
//! scheduled ──start──▶ in-progress ──complete──▶ completed
//!     │
//!     └──cancel──▶ cancelled
//! ```
//!
//! Every function here checks permission first, then the status precondition,
//! and only mutates the visit when both pass. Nothing in this module touches
//! storage; [`crate::services::VisitService`] persists the result.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::Caller;
use crate::config::VisitPolicy;
use crate::services::validation::validate_treatments;
use models::errors::{ClinicError, ClinicResult, ValidationErrors};
use models::identifiers::parse_id;
use models::medical::{Role, Visit, VisitStatus};
use models::requests::{CreateVisitRequest, MedicalUpdate, PaymentUpdate};
use models::timestamp::parse_datetime_field;

/// Checked booking input.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub symptoms: String,
}

pub fn validate_booking(caller: &Caller, req: &CreateVisitRequest, policy: &VisitPolicy) -> ClinicResult<BookingRequest> {
    caller.require_role(&[Role::Patient])?;

    let mut errors = ValidationErrors::new();
    let doctor_id = if req.doctor_id.trim().is_empty() {
        errors.add("doctorId", "Doctor is required");
        None
    } else {
        parse_id("doctorId", req.doctor_id.trim()).map_err(|e| errors.0.extend(e.0)).ok()
    };
    let appointment_date = if req.appointment_date.trim().is_empty() {
        errors.add("appointmentDate", "Appointment date is required");
        None
    } else {
        parse_datetime_field("appointmentDate", &req.appointment_date)
            .map_err(|e| errors.0.extend(e.0))
            .ok()
    };
    let symptoms = req.symptoms.trim().to_string();
    if symptoms.chars().count() < policy.min_symptoms_length {
        errors.add(
            "symptoms",
            format!("Symptoms must be at least {} characters", policy.min_symptoms_length),
        );
    }
    errors.into_result()?;

    match (doctor_id, appointment_date) {
        (Some(doctor_id), Some(appointment_date)) => Ok(BookingRequest { doctor_id, appointment_date, symptoms }),
        _ => Err(ClinicError::InternalError("booking validation lost a field".to_string())),
    }
}

/// Only the doctor the visit is assigned to passes.
pub fn ensure_assigned_doctor(caller: &Caller, visit: &Visit) -> ClinicResult<()> {
    caller.require_role(&[Role::Doctor])?;
    if visit.doctor_id != caller.id {
        return Err(ClinicError::Forbidden("visit is assigned to another doctor".to_string()));
    }
    Ok(())
}

/// Patients see their own visits, doctors those assigned to them, finance all.
pub fn ensure_can_view(caller: &Caller, visit: &Visit) -> ClinicResult<()> {
    let allowed = match caller.role {
        Role::Patient => visit.patient_id == caller.id,
        Role::Doctor => visit.doctor_id == caller.id,
        Role::Finance => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(ClinicError::Forbidden("visit belongs to someone else".to_string()))
    }
}

fn require_status(visit: &Visit, expected: VisitStatus, action: &str) -> ClinicResult<()> {
    if visit.status == expected {
        return Ok(());
    }
    Err(ClinicError::InvalidState(format!(
        "Cannot {} visit: status is {}, expected {}",
        action, visit.status, expected
    )))
}

pub fn start(visit: &mut Visit, caller: &Caller, now: DateTime<Utc>) -> ClinicResult<()> {
    ensure_assigned_doctor(caller, visit)?;
    require_status(visit, VisitStatus::Scheduled, "start")?;
    visit.status = VisitStatus::InProgress;
    visit.updated_at = now;
    Ok(())
}

pub fn complete(visit: &mut Visit, caller: &Caller, now: DateTime<Utc>) -> ClinicResult<()> {
    ensure_assigned_doctor(caller, visit)?;
    require_status(visit, VisitStatus::InProgress, "complete")?;
    visit.status = VisitStatus::Completed;
    visit.updated_at = now;
    Ok(())
}

/// The owning patient or the assigned doctor may cancel a visit that has not started.
pub fn cancel(visit: &mut Visit, caller: &Caller, now: DateTime<Utc>) -> ClinicResult<()> {
    caller.require_role(&[Role::Patient, Role::Doctor])?;
    let owns = match caller.role {
        Role::Patient => visit.patient_id == caller.id,
        _ => visit.doctor_id == caller.id,
    };
    if !owns {
        return Err(ClinicError::Forbidden("only the patient or the assigned doctor can cancel".to_string()));
    }
    require_status(visit, VisitStatus::Scheduled, "cancel")?;
    visit.status = VisitStatus::Cancelled;
    visit.updated_at = now;
    Ok(())
}

/// Present fields replace stored ones; replacing treatments recomputes the total.
pub fn apply_medical(visit: &mut Visit, caller: &Caller, update: MedicalUpdate, now: DateTime<Utc>) -> ClinicResult<()> {
    ensure_assigned_doctor(caller, visit)?;
    if let Some(treatments) = &update.treatments {
        validate_treatments(treatments)?;
    }
    if let Some(diagnosis) = update.diagnosis {
        visit.diagnosis = diagnosis;
    }
    if let Some(notes) = update.notes {
        visit.notes = notes;
    }
    if let Some(treatments) = update.treatments {
        visit.replace_treatments(treatments);
    }
    visit.updated_at = now;
    Ok(())
}

pub fn set_payment(visit: &mut Visit, caller: &Caller, update: PaymentUpdate, now: DateTime<Utc>) -> ClinicResult<()> {
    caller.require_role(&[Role::Finance])?;
    let is_paid = update
        .is_paid
        .ok_or_else(|| ClinicError::invalid_field("isPaid", "isPaid must be true or false"))?;
    visit.is_paid = is_paid;
    visit.updated_at = now;
    Ok(())
}
