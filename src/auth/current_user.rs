use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use model::entities::user;
use sea_orm::EntityTrait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::schemas::AppState;

pub const SESSION_COOKIE: &str = "seoflow_session";

/// The authenticated caller.
///
/// Extracting this is what makes a route authenticated: requests without a
/// valid, unrevoked session for an existing user are rejected with 401
/// before the handler body runs.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
}

/// Session token from the session cookie, falling back to a bearer token.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
    })
    .filter(|token| !token.is_empty())
}

/// `Set-Cookie` value carrying a freshly issued session.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;

        if state.revoked_sessions.contains_key(&token) {
            debug!("Rejecting revoked session");
            return Err(ApiError::unauthorized());
        }

        let user_id = state.sessions.verify(&token).map_err(|e| {
            warn!("Session rejected: {}", e);
            ApiError::Unauthorized("Invalid or expired session".to_string())
        })?;

        // The session may outlive the account it was issued for
        match user::Entity::find_by_id(user_id).one(&state.db).await? {
            Some(_) => Ok(CurrentUser { id: user_id }),
            None => {
                warn!("Session refers to missing user {}", user_id);
                Err(ApiError::Unauthorized("Invalid or expired session".to_string()))
            }
        }
    }
}
