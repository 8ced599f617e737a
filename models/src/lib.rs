// models/src/lib.rs

// Declare all top-level modules within the 'models' crate
pub mod dashboard;
pub mod errors;
pub mod identifiers;
pub mod requests;
pub mod timestamp;

// Declare the 'medical' sub-module
pub mod medical;

// Re-export common core types for convenience when other crates use 'models::*'
pub use dashboard::{ClinicStats, DoctorStats, FinanceStats};
pub use errors::{ClinicError, ClinicResult, FieldError, ValidationErrors, ValidationResult};
pub use identifiers::{UserId, VisitCode, VisitId};
pub use medical::{
    DoctorSummary, MedicalHistoryEntry, NewUser, PatientSummary, Role, Treatment, User, UserProfile,
    Visit, VisitStatus, VisitView,
};
