//! HS256 JSON Web Tokens for the session credential.
//!
//! Only the subset the service needs is implemented: a fixed
//! `{"alg":"HS256","typ":"JWT"}` header, `userId`/`iat`/`exp`/`jti` claims and
//! constant-time signature verification.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AuthTokenError {
    #[error("auth token secret is too short (min {MIN_SECRET_LEN} bytes)")]
    SecretTooShort,

    #[error("invalid auth token format")]
    InvalidFormat,

    #[error("unsupported auth token algorithm")]
    UnsupportedAlgorithm,

    #[error("auth token signature is invalid")]
    InvalidSignature,

    #[error("auth token is expired")]
    Expired,

    #[error("failed to decode auth token payload")]
    PayloadDecode,

    #[error("failed to parse auth token payload")]
    PayloadParse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct JwtHeader {
    alg: String,
    typ: String,
}

impl JwtHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub iat: u64,
    pub exp: u64,
    #[serde(default)]
    pub jti: String,
}

impl SessionClaims {
    pub fn is_expired(&self, reference_secs: u64) -> bool {
        reference_secs >= self.exp
    }
}

#[derive(Clone)]
pub struct AuthTokenService {
    secret: Arc<[u8]>,
    ttl: Duration,
}

impl AuthTokenService {
    pub fn new(secret: Vec<u8>, ttl: Duration) -> Result<Self, AuthTokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthTokenError::SecretTooShort);
        }

        Ok(Self {
            secret: Arc::<[u8]>::from(secret),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue_session_token(
        &self,
        user_id: &str,
        issued_at_secs: u64,
    ) -> Result<String, AuthTokenError> {
        let claims = SessionClaims {
            user_id: user_id.to_string(),
            iat: issued_at_secs,
            exp: issued_at_secs.saturating_add(self.ttl.as_secs()),
            jti: Uuid::new_v4().to_string(),
        };
        self.issue(&claims)
    }

    pub fn issue(&self, claims: &SessionClaims) -> Result<String, AuthTokenError> {
        let header =
            serde_json::to_vec(&JwtHeader::hs256()).map_err(|_| AuthTokenError::PayloadParse)?;
        let payload = serde_json::to_vec(claims).map_err(|_| AuthTokenError::PayloadParse)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.sign(signing_input.as_bytes())?;
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    pub fn verify(&self, token: &str, reference_secs: u64) -> Result<SessionClaims, AuthTokenError> {
        let mut parts = token.split('.');
        let (header_b64, payload_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(AuthTokenError::InvalidFormat),
            };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| AuthTokenError::InvalidFormat)?;
        let header: JwtHeader =
            serde_json::from_slice(&header_bytes).map_err(|_| AuthTokenError::InvalidFormat)?;
        if header.alg != "HS256" {
            return Err(AuthTokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthTokenError::InvalidFormat)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AuthTokenError::InvalidSignature)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthTokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthTokenError::PayloadDecode)?;

        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthTokenError::PayloadParse)?;

        if claims.user_id.is_empty() {
            return Err(AuthTokenError::PayloadParse);
        }
        if claims.is_expired(reference_secs) {
            return Err(AuthTokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, bytes: &[u8]) -> Result<Vec<u8>, AuthTokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AuthTokenError::InvalidSignature)?;
        mac.update(bytes);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> AuthTokenService {
        AuthTokenService::new(
            b"01234567890123456789012345678901".to_vec(),
            Duration::from_secs(30),
        )
        .expect("valid service")
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let service = test_service();
        let token = service
            .issue_session_token("65f0c0ffee0123456789abcd", 1_000)
            .expect("issue token");

        assert_eq!(token.split('.').count(), 3);

        let claims = service.verify(&token, 1_010).expect("verify token");
        assert_eq!(claims.user_id, "65f0c0ffee0123456789abcd");
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_030);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn header_is_standard_hs256() {
        let service = test_service();
        let token = service.issue_session_token("u", 0).expect("issue token");
        let header_b64 = token.split('.').next().expect("header segment");
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");
    }

    #[test]
    fn rejects_tampered_token() {
        let service = test_service();
        let token = service
            .issue_session_token("user-a", 10)
            .expect("issue token");
        let segments: Vec<&str> = token.split('.').collect();

        let forged_claims = SessionClaims {
            user_id: "user-b".to_string(),
            iat: 10,
            exp: 10_000,
            jti: String::new(),
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let tampered = format!("{}.{}.{}", segments[0], forged_payload, segments[2]);

        assert!(matches!(
            service.verify(&tampered, 20),
            Err(AuthTokenError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let other = AuthTokenService::new(
            b"abcdefghijabcdefghijabcdefghijab".to_vec(),
            Duration::from_secs(30),
        )
        .expect("valid service");
        let token = other.issue_session_token("user-a", 10).expect("issue token");

        assert!(matches!(
            test_service().verify(&token, 20),
            Err(AuthTokenError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let service = test_service();
        let token = service
            .issue_session_token("user-a", 1_000)
            .expect("issue token");

        assert!(matches!(
            service.verify(&token, 1_030),
            Err(AuthTokenError::Expired)
        ));
    }

    #[test]
    fn rejects_malformed_tokens() {
        let service = test_service();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(service.verify(token, 0).is_err(), "accepted {token:?}");
        }
    }

    #[test]
    fn rejects_short_secret() {
        assert!(matches!(
            AuthTokenService::new(b"short".to_vec(), Duration::from_secs(1)),
            Err(AuthTokenError::SecretTooShort)
        ));
    }
}
