// server/src/api/mod.rs

//! HTTP surface of the clinic service. Every route is a thin warp filter that
//! authenticates, decodes the body and delegates to the services held by
//! [`lib::database::ClinicDatabase`].

pub mod handlers_auth;
pub mod handlers_stats;
pub mod handlers_user;
pub mod handlers_visit;
pub mod rejections;
pub mod routes;

pub use rejections::{handle_rejection, ApiError};
pub use routes::routes;
