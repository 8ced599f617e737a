// models/src/medical/mod.rs
pub mod user;
pub mod visit;

pub use user::{DoctorSummary, MedicalHistoryEntry, NewUser, PatientSummary, Role, User, UserProfile};
pub use visit::{total_amount, Treatment, Visit, VisitStatus, VisitView};
