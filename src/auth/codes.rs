use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::SessionError;

const CODE_AUDIENCE: &str = "seoflow-wordpress-authorize";

/// Contents of a WordPress authorization code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCodeClaims {
    pub project_id: Uuid,
    aud: String,
    /// Issue time, seconds since the epoch
    pub iat: i64,
    pub exp: i64,
}

/// Signs the short-lived codes handed to the WordPress plugin.
///
/// Codes are self-contained: the project id and issue time travel inside
/// the signed token and nothing is stored server-side, so a code can be
/// redeemed more than once until it expires.
#[derive(Clone)]
pub struct AuthorizationCodeSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AuthorizationCodeSigner {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, project_id: Uuid) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = AuthorizationCodeClaims {
            project_id,
            aud: CODE_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    pub fn redeem(&self, code: &str) -> Result<AuthorizationCodeClaims, SessionError> {
        let mut validation = Validation::default();
        validation.set_audience(&[CODE_AUDIENCE]);
        validation.leeway = 0;

        Ok(decode::<AuthorizationCodeClaims>(code, &self.decoding, &validation)?.claims)
    }
}

impl fmt::Debug for AuthorizationCodeSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationCodeSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
