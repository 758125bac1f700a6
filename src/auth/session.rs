use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

const SESSION_AUDIENCE: &str = "seoflow-session";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("token is malformed or its signature does not match")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::Invalid,
        }
    }
}

/// Capability to mint and check session tokens.
pub trait SessionVerifier: Send + Sync + fmt::Debug {
    /// Issues a session token for `user_id`.
    fn issue(&self, user_id: Uuid) -> Result<String, SessionError>;

    /// Returns the user a token was issued to.
    fn verify(&self, token: &str) -> Result<Uuid, SessionError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: Uuid,
    aud: String,
    iat: i64,
    exp: i64,
    /// Makes two sessions issued in the same second distinct.
    jti: Uuid,
}

/// HS256-signed JWT sessions.
#[derive(Clone)]
pub struct JwtSessionVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtSessionVerifier {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }
}

impl fmt::Debug for JwtSessionVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSessionVerifier")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionVerifier for JwtSessionVerifier {
    fn issue(&self, user_id: Uuid) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id,
            aud: SESSION_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<Uuid, SessionError> {
        let mut validation = Validation::default();
        validation.set_audience(&[SESSION_AUDIENCE]);
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims.sub)
    }
}
