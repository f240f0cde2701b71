//! Signed response tokens ("magic links").
//!
//! A token binds one authorized responder to one work item for a bounded
//! window (end of the day after the deadline, UTC). Tokens are JWTs signed
//! with HMAC-SHA256 under a rotatable symmetric secret. Only the SHA-256
//! hash of the signed token is ever stored or logged; the plaintext exists
//! solely inside the link handed to the recipient.
//!
//! Revocation state lives in the store (`response_tokens.revoked`) and is
//! flipped atomically with response creation by the orchestrator; this crate
//! covers the cryptographic half: issuing, hashing, and verifying.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use cadence_core::ResponseToken;

/// Magic-link validation failures, each mapped to a distinct user-visible
/// prompt by the HTTP surface.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("this link has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("this link has already been used: {0}")]
    Revoked(String),

    #[error("token does not match this work item")]
    ResourceMismatch,
}

/// Claims carried inside a magic-link JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the authorized responder's resource id.
    pub sub: Uuid,
    /// The work item the response is for.
    pub wid: Uuid,
    /// The alert that triggered the link, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aid: Option<Uuid>,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Unique token id.
    pub jti: String,
    /// Token type discriminator.
    pub typ: String,
}

/// An issued token plus the store row describing it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The signed plaintext token. Never store or log this.
    pub token: String,
    /// The full link to hand to the recipient.
    pub url: String,
    /// The store row (hash only) to persist.
    pub record: ResponseToken,
}

/// SHA-256 hash of a signed token, hex-encoded, for storage and lookup.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Issues and verifies magic-link tokens.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    base_url: String,
}

impl TokenSigner {
    /// `secret` is the shared HMAC secret; `base_url` the frontend origin
    /// links are built against (e.g. `https://cadence.example.com`).
    #[must_use]
    pub fn new(secret: &str, base_url: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            base_url: base_url.into(),
        }
    }

    /// Token expiry: end of the day after the deadline, UTC. The extra day
    /// gives responders a grace window for end-of-day replies.
    #[must_use]
    pub fn expiry_for_deadline(deadline: NaiveDate) -> DateTime<Utc> {
        let day_after = deadline + Duration::days(1);
        day_after
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| day_after.and_hms_opt(0, 0, 0).expect("midnight is valid"))
            .and_utc()
    }

    /// Issue a token bound to `(resource, work item)` and build the response
    /// link.
    pub fn issue(
        &self,
        work_item_id: Uuid,
        resource_id: Uuid,
        deadline: NaiveDate,
        alert_id: Option<Uuid>,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let expires_at = Self::expiry_for_deadline(deadline);
        let claims = TokenClaims {
            sub: resource_id,
            wid: work_item_id,
            aid: alert_id,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
            typ: "magic_link".to_owned(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        let token_hash = hash_token(&token);
        let url = format!("{}/respond?token={token}", self.base_url);

        let record = ResponseToken {
            id: Uuid::new_v4(),
            token_hash,
            work_item_id,
            resource_id,
            alert_id,
            expires_at,
            revoked: false,
            revoked_at: None,
            revocation_reason: None,
            used_at: None,
            used_by_response_id: None,
            created_at: now,
        };

        Ok(IssuedToken { token, url, record })
    }

    /// Verify signature and expiry and return the claims.
    ///
    /// Store-side checks (revocation, hash lookup) are the caller's: a
    /// missing hash row is tolerated so that responses survive clock or
    /// replication gaps without token tracking.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        if data.claims.typ != "magic_link" {
            return Err(TokenError::Invalid(format!(
                "unexpected token type: {}",
                data.claims.typ
            )));
        }

        Ok(data.claims)
    }
}
