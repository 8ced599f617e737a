// lib/src/services/visit_service.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use uuid::Uuid;

use crate::auth::Caller;
use crate::config::VisitPolicy;
use crate::services::lifecycle;
use crate::storage_engine::ClinicStorageEngine;
use models::errors::{ClinicError, ClinicResult, ValidationErrors};
use models::medical::{Role, User, Visit, VisitStatus, VisitView};
use models::requests::{CreateVisitRequest, MedicalUpdate, PaymentUpdate, VisitQuery};
use models::timestamp::{parse_date, parse_datetime};

/// Parsed listing filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitFilter {
    pub status: Option<VisitStatus>,
    /// Inclusive.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive.
    pub until: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl VisitFilter {
    /// A bare `endDate` covers that whole day.
    pub fn parse(query: &VisitQuery, caller: &Caller) -> ClinicResult<Self> {
        let mut errors = ValidationErrors::new();
        let non_empty = |raw: &Option<String>| raw.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

        let status = non_empty(&query.status).and_then(|raw| {
            raw.parse::<VisitStatus>().map_err(|e| errors.0.extend(e.0)).ok()
        });
        let from = non_empty(&query.start_date).and_then(|raw| {
            let parsed = parse_datetime(&raw);
            if parsed.is_none() {
                errors.add("startDate", format!("'{}' is not a valid date", raw));
            }
            parsed
        });
        let until = non_empty(&query.end_date).and_then(|raw| {
            let parsed = if raw.len() == 10 {
                parse_date(&raw)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|midnight| midnight.and_utc() + Duration::days(1))
            } else {
                parse_datetime(&raw).map(|dt| dt + Duration::milliseconds(1))
            };
            if parsed.is_none() {
                errors.add("endDate", format!("'{}' is not a valid date", raw));
            }
            parsed
        });
        errors.into_result()?;

        let search = non_empty(&query.search).map(|s| s.to_lowercase());
        if search.is_some() && caller.role != Role::Finance {
            debug!("Ignoring search filter from {} caller '{}'", caller.role, caller.username);
        }
        Ok(VisitFilter {
            status,
            from,
            until,
            search: search.filter(|_| caller.role == Role::Finance),
        })
    }

    fn matches(&self, visit: &Visit, users: &HashMap<Uuid, User>) -> bool {
        if self.status.is_some_and(|s| s != visit.status) {
            return false;
        }
        if self.from.is_some_and(|from| visit.appointment_date < from) {
            return false;
        }
        if self.until.is_some_and(|until| visit.appointment_date >= until) {
            return false;
        }
        match &self.search {
            None => true,
            Some(needle) => {
                let name_matches = |id: &Uuid| {
                    users
                        .get(id)
                        .is_some_and(|u| u.full_name.to_lowercase().contains(needle.as_str()))
                };
                visit.visit_code.to_lowercase().contains(needle.as_str())
                    || name_matches(&visit.patient_id)
                    || name_matches(&visit.doctor_id)
            }
        }
    }
}

fn expand(visit: Visit, users: &HashMap<Uuid, User>) -> VisitView {
    VisitView {
        patient: users.get(&visit.patient_id).map(User::patient_summary),
        doctor: users.get(&visit.doctor_id).map(User::doctor_summary),
        visit,
    }
}

/// Booking, listing and the lifecycle transitions, persisted through the store.
#[derive(Debug, Clone)]
pub struct VisitService {
    store: Arc<dyn ClinicStorageEngine>,
    policy: VisitPolicy,
}

impl VisitService {
    pub fn new(store: Arc<dyn ClinicStorageEngine>, policy: VisitPolicy) -> Self {
        VisitService { store, policy }
    }

    async fn view(&self, visit: Visit) -> ClinicResult<VisitView> {
        let mut users = HashMap::new();
        for id in [visit.patient_id, visit.doctor_id] {
            if let Some(user) = self.store.get_user(&id).await? {
                users.insert(id, user);
            }
        }
        Ok(expand(visit, &users))
    }

    async fn load(&self, id: &Uuid) -> ClinicResult<Visit> {
        self.store
            .get_visit(id)
            .await?
            .ok_or_else(|| ClinicError::NotFound("Visit".to_string()))
    }

    pub async fn create(&self, caller: &Caller, req: CreateVisitRequest) -> ClinicResult<VisitView> {
        let booking = lifecycle::validate_booking(caller, &req, &self.policy)?;
        let doctor = self
            .store
            .get_user(&booking.doctor_id)
            .await?
            .filter(User::is_doctor)
            .ok_or_else(|| ClinicError::NotFound("Doctor".to_string()))?;
        if self.policy.enforce_doctor_availability && !doctor.is_available {
            return Err(ClinicError::Conflict("Doctor is not available".to_string()));
        }
        let patient = self
            .store
            .get_user(&caller.id)
            .await?
            .filter(User::is_patient)
            .ok_or_else(|| ClinicError::NotFound("Patient".to_string()))?;

        let visit = Visit::schedule(patient.id, doctor.id, booking.appointment_date, booking.symptoms, Utc::now());
        let visit = self.store.create_visit(visit).await?;
        info!(
            "Booked visit {} for patient '{}' with doctor '{}' at {}",
            visit.visit_code, patient.username, doctor.username, visit.appointment_date
        );
        let users = HashMap::from([(patient.id, patient), (doctor.id, doctor)]);
        Ok(expand(visit, &users))
    }

    /// Newest appointment first.
    pub async fn list(&self, caller: &Caller, query: &VisitQuery) -> ClinicResult<Vec<VisitView>> {
        let filter = VisitFilter::parse(query, caller)?;
        let users: HashMap<Uuid, User> = self
            .store
            .get_all_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        let mut visits: Vec<Visit> = self
            .store
            .get_all_visits()
            .await?
            .into_iter()
            .filter(|v| lifecycle::ensure_can_view(caller, v).is_ok())
            .filter(|v| filter.matches(v, &users))
            .collect();
        visits.sort_by(|a, b| b.appointment_date.cmp(&a.appointment_date).then(b.created_at.cmp(&a.created_at)));
        Ok(visits.into_iter().map(|v| expand(v, &users)).collect())
    }

    pub async fn get(&self, caller: &Caller, id: &Uuid) -> ClinicResult<VisitView> {
        let visit = self.load(id).await?;
        lifecycle::ensure_can_view(caller, &visit)?;
        self.view(visit).await
    }

    /// Checks the caller's role, loads the visit, applies `transition` and
    /// stores it under the version it was read at. Ownership checks happen
    /// inside `transition` once the visit is known.
    async fn transition<F>(
        &self,
        caller: &Caller,
        allowed: &[Role],
        id: &Uuid,
        action: &str,
        transition: F,
    ) -> ClinicResult<VisitView>
    where
        F: FnOnce(&mut Visit) -> ClinicResult<()>,
    {
        caller.require_role(allowed)?;
        let mut visit = self.load(id).await?;
        let before = visit.status;
        transition(&mut visit)?;
        let visit = self.store.update_visit(visit).await?;
        if before != visit.status {
            info!("Visit {} {}: {} -> {}", visit.visit_code, action, before, visit.status);
        } else {
            info!("Visit {} {}", visit.visit_code, action);
        }
        self.view(visit).await
    }

    pub async fn start(&self, caller: &Caller, id: &Uuid) -> ClinicResult<VisitView> {
        self.transition(caller, &[Role::Doctor], id, "started", |v| lifecycle::start(v, caller, Utc::now()))
            .await
    }

    pub async fn update_medical(&self, caller: &Caller, id: &Uuid, update: MedicalUpdate) -> ClinicResult<VisitView> {
        self.transition(caller, &[Role::Doctor], id, "medical record updated", |v| {
            lifecycle::apply_medical(v, caller, update, Utc::now())
        })
        .await
    }

    pub async fn complete(&self, caller: &Caller, id: &Uuid) -> ClinicResult<VisitView> {
        self.transition(caller, &[Role::Doctor], id, "completed", |v| lifecycle::complete(v, caller, Utc::now()))
            .await
    }

    pub async fn cancel(&self, caller: &Caller, id: &Uuid) -> ClinicResult<VisitView> {
        self.transition(caller, &[Role::Patient, Role::Doctor], id, "cancelled", |v| {
            lifecycle::cancel(v, caller, Utc::now())
        })
        .await
    }

    pub async fn set_payment(&self, caller: &Caller, id: &Uuid, update: PaymentUpdate) -> ClinicResult<VisitView> {
        self.transition(caller, &[Role::Finance], id, "payment updated", |v| {
            lifecycle::set_payment(v, caller, update, Utc::now())
        })
        .await
    }
}
