// lib/src/auth/token.rs
//! HS256 bearer tokens in the usual three-part `header.claims.signature`
//! layout, each part base64url without padding.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use log::{debug, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::AuthConfig;
use models::errors::{ClinicError, ClinicResult};
use models::medical::{Role, User};

type HmacSha256 = Hmac<Sha256>;

const RANDOM_SECRET_LEN: usize = 32;

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub iat: i64, // issued at, unix seconds
    pub exp: i64, // expiry, unix seconds
}

#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_hours: i64) -> Self {
        TokenSigner { secret: secret.into(), ttl: Duration::hours(ttl_hours) }
    }

    /// Uses the configured secret, or a random one that dies with the process.
    pub fn from_config(config: &AuthConfig) -> Self {
        match config.token_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => TokenSigner::new(secret.as_bytes(), config.token_ttl_hours),
            None => {
                warn!("No token secret configured; tokens will not survive a restart");
                let mut secret = vec![0u8; RANDOM_SECRET_LEN];
                rand::thread_rng().fill_bytes(&mut secret);
                TokenSigner::new(secret, config.token_ttl_hours)
            }
        }
    }

    pub fn issue(&self, user: &User) -> ClinicResult<String> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> ClinicResult<String> {
        let claims = TokenClaims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let header = TokenHeader { alg: "HS256".to_string(), typ: "JWT".to_string() };
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let message = format!("{}.{}", header_b64, claims_b64);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(message.as_bytes())?.finalize().into_bytes());
        Ok(format!("{}.{}", message, signature))
    }

    pub fn verify(&self, token: &str) -> ClinicResult<TokenClaims> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> ClinicResult<TokenClaims> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header_b64, claims_b64, signature_b64] = parts.as_slice() else {
            return Err(ClinicError::Unauthorized("Invalid token format".to_string()));
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| ClinicError::Unauthorized("Invalid token signature".to_string()))?;
        let message = format!("{}.{}", header_b64, claims_b64);
        self.mac(message.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| ClinicError::Unauthorized("Invalid token signature".to_string()))?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| ClinicError::Unauthorized("Invalid token claims encoding".to_string()))?;
        let claims: TokenClaims = serde_json::from_slice(&claims_json)
            .map_err(|_| ClinicError::Unauthorized("Invalid token claims".to_string()))?;

        if claims.exp <= now.timestamp() {
            debug!("Rejected expired token for {}", claims.username);
            return Err(ClinicError::Unauthorized("Token has expired".to_string()));
        }
        Ok(claims)
    }

    fn mac(&self, message: &[u8]) -> ClinicResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ClinicError::InternalError(format!("Failed to create HMAC: {}", e)))?;
        mac.update(message);
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::medical::NewUser;

    fn doctor() -> User {
        User::new(
            NewUser {
                username: "drgrey".into(),
                password_hash: "x".into(),
                full_name: "Meredith Grey".into(),
                email: "grey@example.com".into(),
                phone: None,
                role: Role::Doctor,
                specialty: Some("Surgery".into()),
                date_of_birth: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn should_issue_and_verify() {
        let signer = TokenSigner::new(b"test-secret".to_vec(), 24);
        let user = doctor();
        let token = signer.issue(&user).unwrap();
        assert_eq!(token.split('.').count(), 3);
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Doctor);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn should_reject_expired_tokens() {
        let signer = TokenSigner::new(b"test-secret".to_vec(), 24);
        let issued = Utc::now() - Duration::hours(25);
        let token = signer.issue_at(&doctor(), issued).unwrap();
        let err = signer.verify(&token).unwrap_err();
        assert_eq!(err, ClinicError::Unauthorized("Token has expired".into()));
    }

    #[test]
    fn should_reject_foreign_signatures() {
        let ours = TokenSigner::new(b"ours".to_vec(), 24);
        let theirs = TokenSigner::new(b"theirs".to_vec(), 24);
        let token = theirs.issue(&doctor()).unwrap();
        assert!(matches!(ours.verify(&token), Err(ClinicError::Unauthorized(_))));
    }

    #[test]
    fn should_reject_tampered_claims() {
        let signer = TokenSigner::new(b"test-secret".to_vec(), 24);
        let token = signer.issue(&doctor()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&serde_json::json!({
                "sub": Uuid::new_v4(), "username": "x", "role": "finance", "iat": 0, "exp": i64::MAX
            }))
            .unwrap(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert!(matches!(signer.verify(&forged), Err(ClinicError::Unauthorized(_))));
    }

    #[test]
    fn should_reject_malformed_tokens() {
        let signer = TokenSigner::new(b"test-secret".to_vec(), 24);
        for token in ["", "abc", "a.b", "a.b.c.d", "a.b.!!!"] {
            assert!(matches!(signer.verify(token), Err(ClinicError::Unauthorized(_))), "{}", token);
        }
    }

    #[test]
    fn should_generate_random_secret_when_unset() {
        let config = AuthConfig::default();
        let first = TokenSigner::from_config(&config);
        let second = TokenSigner::from_config(&config);
        let token = first.issue(&doctor()).unwrap();
        assert!(second.verify(&token).is_err());
    }
}
