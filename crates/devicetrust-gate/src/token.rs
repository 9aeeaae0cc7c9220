//! Token issuance and validation
//!
//! Tokens are HS256 JWTs signed with a shared secret. The subject is the
//! fingerprint; device id, client IP and user agent ride along as auxiliary
//! claims. Expiry is checked against the gate's [`Clock`](crate::Clock)
//! rather than the wall clock, so tests can move time deterministically.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for token operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Encoding(String),

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired at {0}")]
    Expired(i64),

    #[error("Token subject does not match the presented fingerprint")]
    SubjectMismatch,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Claims carried by an issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Fingerprint the token is bound to
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "deviceId", default)]
    pub device_id: String,
    #[serde(default)]
    pub ip: String,
    #[serde(rename = "userAgent", default)]
    pub user_agent: String,
}

/// A minted token and its binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    /// Compact JWS representation
    pub token: String,
    pub fingerprint: String,
    #[serde(skip_serializing)]
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Signs and verifies tokens with a shared HS256 secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &"HS256")
            .field("expiration_secs", &self.expiration_secs)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8], expiration_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiration_secs,
        }
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }

    /// Mint a token for `fingerprint` valid from `now` for the configured lifetime
    pub fn issue(
        &self,
        fingerprint: &str,
        device_id: &str,
        ip: &str,
        user_agent: &str,
        now: i64,
    ) -> Result<IssuedToken, TokenError> {
        let claims = Claims {
            sub: fingerprint.to_string(),
            iat: now,
            exp: now + self.expiration_secs,
            device_id: device_id.to_string(),
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken {
            token,
            fingerprint: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    /// Decode and verify the signature, without any binding checks
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Verify signature, expiry at `now`, and that the subject is `fingerprint`
    pub fn verify(&self, token: &str, fingerprint: &str, now: i64) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;

        if now >= claims.exp {
            return Err(TokenError::Expired(claims.exp));
        }
        if claims.sub != fingerprint {
            return Err(TokenError::SubjectMismatch);
        }

        Ok(claims)
    }
}
