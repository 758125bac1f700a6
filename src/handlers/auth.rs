use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::{account, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    clear_session_cookie, hash_password, session_cookie, session_token, verify_password,
    CurrentUser, PasswordError,
};
use crate::error::{is_unique_violation, ApiError};
use crate::extract::ValidJson;
use crate::schemas::{ApiResponse, AppState};

type SessionHeaders = [(header::HeaderName, String); 1];

/// Request body for registering with email and password
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: String,
    /// Display name
    #[validate(length(max = 100))]
    pub name: Option<String>,
}

/// Request body for logging in
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            created_at: model.created_at,
        }
    }
}

/// Returned by register and login. The token is the same value set in the
/// session cookie, for clients that send `Authorization: Bearer`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub user: UserResponse,
    pub token: String,
}

/// A linked sign-in provider. Provider tokens are never returned.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LinkedAccountResponse {
    pub id: Uuid,
    pub provider: String,
    pub provider_account_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<account::Model> for LinkedAccountResponse {
    fn from(model: account::Model) -> Self {
        Self {
            id: model.id,
            provider: model.provider,
            provider_account_id: model.provider_account_id,
            expires_at: model.expires_at,
            created_at: model.created_at,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn password_failure(e: PasswordError) -> ApiError {
    ApiError::Internal(e.to_string())
}

/// The unique indexes on `users.email` and the provider account decide
/// whether an email is taken.
fn email_taken(e: DbErr) -> ApiError {
    if is_unique_violation(&e) {
        warn!("Registration rejected, email already in use");
        ApiError::Conflict("Email is already registered".to_string())
    } else {
        e.into()
    }
}

fn start_session(state: &AppState, user: user::Model) -> Result<(SessionHeaders, SessionResponse), ApiError> {
    let token = state
        .sessions
        .issue(user.id)
        .map_err(|e| ApiError::Internal(format!("failed to issue session: {}", e)))?;

    let cookie = session_cookie(
        &token,
        state.config.session_ttl_hours * 3600,
        state.config.cookie_secure,
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        SessionResponse {
            user: UserResponse::from(user),
            token,
        },
    ))
}

/// Register a new user with email and password
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered and signed in", body = ApiResponse<SessionResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, SessionHeaders, Json<ApiResponse<SessionResponse>>), ApiError> {
    trace!("Entering register function");
    let email = normalize_email(&request.email);
    let password_hash = hash_password(request.password).await.map_err(password_failure)?;

    let txn = state.db.begin().await?;
    let user_model = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.clone()),
        name: Set(request.name),
        password_hash: Set(password_hash),
        created_at: Set(Utc::now()),
    }
    .insert(&txn)
    .await
    .map_err(email_taken)?;

    account::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_model.id),
        provider: Set(account::CREDENTIALS_PROVIDER.to_string()),
        provider_account_id: Set(email),
        access_token: Set(None),
        refresh_token: Set(None),
        expires_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(&txn)
    .await
    .map_err(email_taken)?;
    txn.commit().await?;

    info!("Registered user {}", user_model.id);
    let (headers, session) = start_session(&state, user_model)?;
    Ok((
        StatusCode::CREATED,
        headers,
        Json(ApiResponse::new(session, "User registered successfully")),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<SessionResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Wrong email or password", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<(SessionHeaders, Json<ApiResponse<SessionResponse>>), ApiError> {
    trace!("Entering login function");

    let found = user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(&request.email)))
        .one(&state.db)
        .await?;

    let user_model = match found {
        Some(u) => {
            let matches = verify_password(request.password, u.password_hash.clone())
                .await
                .map_err(password_failure)?;
            matches.then_some(u)
        }
        None => None,
    };
    let Some(user_model) = user_model else {
        warn!("Login failed");
        return Err(ApiError::Unauthorized("Invalid email or password".to_string()));
    };

    info!("User {} logged in", user_model.id);
    let (headers, session) = start_session(&state, user_model)?;
    Ok((headers, Json(ApiResponse::new(session, "Logged in successfully"))))
}

/// Log out, revoking the presented session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Session cleared")
    )
)]
#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (SessionHeaders, Json<ApiResponse<()>>) {
    // Only tokens this server issued are worth remembering
    if let Some(token) = session_token(&headers) {
        match state.sessions.verify(&token) {
            Ok(user_id) => {
                debug!("Revoking session of user {}", user_id);
                state.revoked_sessions.insert(token, ()).await;
            }
            Err(e) => debug!("Nothing to revoke: {}", e),
        }
    }

    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(ApiResponse::new((), "Logged out successfully")),
    )
}

/// Current session's user
#[utoipa::path(
    get,
    path = "/api/auth/session",
    tag = "auth",
    responses(
        (status = 200, description = "Signed-in user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_session(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user_model = user::Entity::find_by_id(user.id)
        .one(&state.db)
        .await?
        .ok_or_else(ApiError::unauthorized)?;

    Ok(Json(ApiResponse::new(
        UserResponse::from(user_model),
        "Session retrieved successfully",
    )))
}

/// Sign-in providers linked to the current user
#[utoipa::path(
    get,
    path = "/api/auth/accounts",
    tag = "auth",
    responses(
        (status = 200, description = "Linked accounts", body = ApiResponse<Vec<LinkedAccountResponse>>),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_linked_accounts(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<LinkedAccountResponse>>>, ApiError> {
    let accounts = account::Entity::find()
        .filter(account::Column::UserId.eq(user.id))
        .order_by_asc(account::Column::CreatedAt)
        .all(&state.db)
        .await?;
    debug!("Found {} linked accounts", accounts.len());

    Ok(Json(ApiResponse::new(
        accounts.into_iter().map(LinkedAccountResponse::from).collect(),
        "Linked accounts retrieved successfully",
    )))
}
