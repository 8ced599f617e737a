// lib/src/auth/mod.rs
pub mod gate;
pub mod password;
pub mod token;

pub use gate::{extract_bearer_token, AuthGate, Caller};
pub use password::{hash_password, verify_password};
pub use token::{TokenClaims, TokenSigner};
