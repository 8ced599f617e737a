// lib/src/services/mod.rs
pub mod identity_service;
pub mod lifecycle;
pub mod stats_service;
pub mod validation;
pub mod visit_service;

pub use identity_service::IdentityService;
pub use stats_service::StatsService;
pub use visit_service::{VisitFilter, VisitService};
