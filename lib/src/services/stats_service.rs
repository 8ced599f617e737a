// lib/src/services/stats_service.rs
use std::sync::Arc;

use log::debug;
use uuid::Uuid;

use crate::auth::Caller;
use crate::storage_engine::ClinicStorageEngine;
use models::dashboard::{ClinicStats, DoctorStats, FinanceStats};
use models::errors::{ClinicError, ClinicResult};
use models::medical::{Role, User, Visit, VisitStatus};

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    total: usize,
    completed: usize,
    scheduled: usize,
    in_progress: usize,
    revenue: f64,
    paid: f64,
}

fn tally<'a>(visits: impl Iterator<Item = &'a Visit>) -> Tally {
    visits.fold(Tally::default(), |mut t, visit| {
        t.total += 1;
        match visit.status {
            VisitStatus::Scheduled => t.scheduled += 1,
            VisitStatus::InProgress => t.in_progress += 1,
            VisitStatus::Completed => {
                t.completed += 1;
                t.revenue += visit.total_amount;
                if visit.is_paid {
                    t.paid += visit.total_amount;
                }
            }
            VisitStatus::Cancelled => {}
        }
        t
    })
}

pub fn doctor_stats(doctor_id: &Uuid, visits: &[Visit]) -> DoctorStats {
    let t = tally(visits.iter().filter(|v| &v.doctor_id == doctor_id));
    DoctorStats {
        total_visits: t.total,
        completed_visits: t.completed,
        scheduled_visits: t.scheduled,
        in_progress_visits: t.in_progress,
        total_revenue: t.revenue,
    }
}

pub fn finance_stats(users: &[User], visits: &[Visit]) -> FinanceStats {
    let t = tally(visits.iter());
    FinanceStats {
        total_doctors: users.iter().filter(|u| u.role == Role::Doctor).count(),
        total_patients: users.iter().filter(|u| u.role == Role::Patient).count(),
        total_visits: t.total,
        completed_visits: t.completed,
        scheduled_visits: t.scheduled,
        in_progress_visits: t.in_progress,
        total_revenue: t.revenue,
        paid_amount: t.paid,
        pending_amount: t.revenue - t.paid,
    }
}

/// Recomputed from a full scan on every call.
#[derive(Debug, Clone)]
pub struct StatsService {
    store: Arc<dyn ClinicStorageEngine>,
}

impl StatsService {
    pub fn new(store: Arc<dyn ClinicStorageEngine>) -> Self {
        StatsService { store }
    }

    pub async fn stats(&self, caller: &Caller) -> ClinicResult<ClinicStats> {
        match caller.role {
            Role::Doctor => {
                let visits = self.store.get_all_visits().await?;
                Ok(ClinicStats::Doctor(doctor_stats(&caller.id, &visits)))
            }
            Role::Finance => {
                let users = self.store.get_all_users().await?;
                let visits = self.store.get_all_visits().await?;
                let stats = finance_stats(&users, &visits);
                debug!("Finance stats: {} visits, revenue {:.2}", stats.total_visits, stats.total_revenue);
                Ok(ClinicStats::Finance(stats))
            }
            Role::Patient => Err(ClinicError::Forbidden("statistics are for doctors and finance".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use models::medical::{NewUser, Treatment};
    use proptest::prelude::*;

    fn visit(doctor: Uuid, status: VisitStatus, amount: f64, paid: bool) -> Visit {
        let at = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();
        let mut v = Visit::schedule(Uuid::new_v4(), doctor, at, "General checkup".into(), Utc::now());
        v.replace_treatments(vec![Treatment { name: "Consult".into(), description: String::new(), cost: amount }]);
        v.status = status;
        v.is_paid = paid;
        v
    }

    fn user(role: Role) -> User {
        User::new(
            NewUser {
                username: format!("{}-{}", role, Uuid::new_v4()),
                password_hash: "x".into(),
                full_name: "Someone".into(),
                email: format!("{}@example.com", Uuid::new_v4()),
                phone: None,
                role,
                specialty: None,
                date_of_birth: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn should_count_only_the_doctors_visits() {
        let me = Uuid::new_v4();
        let visits = vec![
            visit(me, VisitStatus::Completed, 120.0, false),
            visit(me, VisitStatus::Scheduled, 30.0, false),
            visit(me, VisitStatus::InProgress, 10.0, false),
            visit(me, VisitStatus::Cancelled, 99.0, false),
            visit(Uuid::new_v4(), VisitStatus::Completed, 500.0, true),
        ];
        let stats = doctor_stats(&me, &visits);
        assert_eq!(stats.total_visits, 4);
        assert_eq!(stats.completed_visits, 1);
        assert_eq!(stats.scheduled_visits, 1);
        assert_eq!(stats.in_progress_visits, 1);
        assert_eq!(stats.total_revenue, 120.0);
    }

    #[test]
    fn should_split_paid_and_pending_revenue() {
        let doc = Uuid::new_v4();
        let users = vec![user(Role::Doctor), user(Role::Patient), user(Role::Patient), user(Role::Finance)];
        let visits = vec![
            visit(doc, VisitStatus::Completed, 50.0, true),
            visit(doc, VisitStatus::Completed, 75.0, false),
            visit(doc, VisitStatus::InProgress, 20.0, true),
        ];
        let stats = finance_stats(&users, &visits);
        assert_eq!(stats.total_doctors, 1);
        assert_eq!(stats.total_patients, 2);
        assert_eq!(stats.total_visits, 3);
        assert_eq!(stats.completed_visits, 2);
        assert_eq!(stats.total_revenue, 125.0);
        assert_eq!(stats.paid_amount, 50.0);
        assert_eq!(stats.pending_amount, 75.0);
    }

    proptest! {
        #[test]
        fn paid_plus_pending_is_revenue(entries in proptest::collection::vec((0u32..10_000, any::<bool>(), 0u8..4), 0..32)) {
            let doc = Uuid::new_v4();
            let visits: Vec<Visit> = entries
                .iter()
                .map(|(cents, paid, status)| {
                    visit(doc, VisitStatus::ALL[*status as usize], f64::from(*cents) / 100.0, *paid)
                })
                .collect();
            let stats = finance_stats(&[], &visits);
            prop_assert!((stats.paid_amount + stats.pending_amount - stats.total_revenue).abs() < 1e-6);
            prop_assert!(stats.paid_amount <= stats.total_revenue + 1e-9);
            prop_assert_eq!(stats.total_visits, visits.len());
        }
    }

    #[tokio::test]
    async fn should_forbid_patients() {
        let store: Arc<dyn ClinicStorageEngine> = Arc::new(crate::storage_engine::InMemoryStorage::default());
        let service = StatsService::new(store);
        let patient = Caller { id: Uuid::new_v4(), role: Role::Patient, username: "p".into() };
        assert!(matches!(service.stats(&patient).await, Err(ClinicError::Forbidden(_))));
        let doctor = Caller { id: Uuid::new_v4(), role: Role::Doctor, username: "d".into() };
        assert_eq!(service.stats(&doctor).await.unwrap(), ClinicStats::Doctor(DoctorStats::default()));
    }
}
