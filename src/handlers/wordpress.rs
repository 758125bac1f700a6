use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{Duration, Utc};
use model::credentials::{PlatformCredentials, WordPressCredentials};
use model::entities::integration::{self, Platform};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::integrations::upsert_integration;
use super::projects::find_owned_project;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::{ValidJson, ValidQuery};
use crate::plugin::{build_plugin_archive, PluginError, ARCHIVE_FILENAME};
use crate::schemas::AppState;

const ACCESS_TOKEN_PREFIX: &str = "wpat_";
const REFRESH_TOKEN_PREFIX: &str = "wprt_";

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthorizeQuery {
    pub project_id: Uuid,
    /// Plugin callback the browser is sent back to
    #[validate(url)]
    pub redirect_uri: String,
    /// Opaque value echoed back to the plugin
    #[validate(length(max = 512))]
    pub state: Option<String>,
}

/// Token endpoint request
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct TokenRequest {
    /// `authorization_code` or `refresh_token`
    pub grant_type: String,
    pub code: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub integration_key: String,
    pub project_id: Uuid,
}

/// OAuth-style error body of the token endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

fn oauth_error(error: &str, description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(OAuthErrorResponse {
            error: error.to_string(),
            error_description: Some(description.to_string()),
        }),
    )
        .into_response()
}

fn mint_token(prefix: &str) -> String {
    format!("{}{}{}", prefix, Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Mints a new access/refresh pair for `integration` and stores it.
///
/// The write only lands if the stored refresh token is still the one read
/// with `integration`; `None` means another exchange rotated it first.
async fn rotate_tokens<C: ConnectionTrait>(
    db: &C,
    integration: integration::Model,
    access_ttl_secs: i64,
) -> Result<Option<TokenResponse>, DbErr> {
    let access_token = mint_token(ACCESS_TOKEN_PREFIX);
    let refresh_token = mint_token(REFRESH_TOKEN_PREFIX);
    let expires_at = Utc::now() + Duration::seconds(access_ttl_secs);

    let tokens = PlatformCredentials::Wordpress(WordPressCredentials {
        access_token: Some(access_token.clone()),
        refresh_token: Some(refresh_token.clone()),
        token_expires_at: Some(expires_at),
        ..Default::default()
    });
    let credentials = match integration.credentials.clone().merge(tokens) {
        Ok(merged) => merged,
        Err(e) => return Err(DbErr::Custom(e.to_string())),
    };

    let changes = integration::ActiveModel {
        credentials: Set(credentials),
        refresh_token: Set(Some(refresh_token.clone())),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    let expected = match &integration.refresh_token {
        Some(current) => integration::Column::RefreshToken.eq(current.as_str()),
        None => integration::Column::RefreshToken.is_null(),
    };

    let result = integration::Entity::update_many()
        .set(changes)
        .filter(integration::Column::Id.eq(integration.id))
        .filter(expected)
        .exec(db)
        .await?;

    if result.rows_affected != 1 {
        return Ok(None);
    }

    Ok(Some(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: access_ttl_secs,
        integration_key: integration.integration_key,
        project_id: integration.project_id,
    }))
}

/// Start the plugin authorization
///
/// Makes sure the project has a WordPress integration, then sends the
/// browser back to the plugin with a short-lived code.
#[utoipa::path(
    get,
    path = "/api/wordpress/authorize",
    tag = "wordpress",
    params(AuthorizeQuery),
    responses(
        (status = 302, description = "Redirect to redirect_uri with code and state"),
        (status = 400, description = "Invalid redirect_uri", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn authorize(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<AuthorizeQuery>,
) -> Result<Response, ApiError> {
    trace!("Entering authorize function");
    let project = find_owned_project(&state.db, user.id, query.project_id).await?;

    let mut redirect = Url::parse(&query.redirect_uri)
        .map_err(|e| ApiError::BadRequest(format!("Invalid redirect_uri: {}", e)))?;
    if !matches!(redirect.scheme(), "http" | "https") {
        warn!("Rejected redirect_uri with scheme {}", redirect.scheme());
        return Err(ApiError::BadRequest("redirect_uri must be an http(s) URL".to_string()));
    }

    let (integration, created) =
        upsert_integration(&state.db, project.id, PlatformCredentials::empty(Platform::Wordpress))
            .await?;
    debug!("Using integration {} (new: {})", integration.id, created);

    let code = state
        .codes
        .issue(project.id)
        .map_err(|e| ApiError::Internal(format!("failed to sign authorization code: {}", e)))?;

    {
        let mut pairs = redirect.query_pairs_mut();
        pairs.append_pair("code", &code);
        if let Some(client_state) = &query.state {
            pairs.append_pair("state", client_state);
        }
    }

    info!("Authorized WordPress plugin for project {}", project.id);
    Ok((StatusCode::FOUND, [(header::LOCATION, redirect.to_string())]).into_response())
}

/// Exchange an authorization code or refresh token for plugin tokens
#[utoipa::path(
    post,
    path = "/api/wordpress/token",
    tag = "wordpress",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 400, description = "invalid_grant, invalid_request or unsupported_grant_type", body = OAuthErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(grant_type = tracing::field::Empty))]
pub async fn exchange_token(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<TokenRequest>,
) -> Result<Response, ApiError> {
    tracing::Span::current().record("grant_type", request.grant_type.as_str());
    let ttl = state.config.access_token_ttl_secs;

    let integration = match request.grant_type.as_str() {
        "authorization_code" => {
            let Some(code) = request.code.as_deref() else {
                return Ok(oauth_error("invalid_request", "code is required"));
            };
            let claims = match state.codes.redeem(code) {
                Ok(claims) => claims,
                Err(e) => {
                    warn!("Authorization code rejected: {}", e);
                    return Ok(oauth_error("invalid_grant", "Authorization code is invalid or expired"));
                }
            };

            integration::Entity::find()
                .filter(integration::Column::ProjectId.eq(claims.project_id))
                .filter(integration::Column::Platform.eq(Platform::Wordpress))
                .one(&state.db)
                .await?
        }
        "refresh_token" => {
            let Some(refresh_token) = request.refresh_token.as_deref() else {
                return Ok(oauth_error("invalid_request", "refresh_token is required"));
            };

            integration::Entity::find()
                .filter(integration::Column::RefreshToken.eq(refresh_token))
                .filter(integration::Column::Platform.eq(Platform::Wordpress))
                .filter(integration::Column::IsActive.eq(true))
                .one(&state.db)
                .await?
        }
        other => {
            warn!("Unsupported grant type '{}'", other);
            return Ok(oauth_error(
                "unsupported_grant_type",
                "grant_type must be authorization_code or refresh_token",
            ));
        }
    };

    let Some(integration) = integration else {
        warn!("No WordPress integration matches the presented grant");
        return Ok(oauth_error("invalid_grant", "Grant does not match an integration"));
    };

    let integration_id = integration.id;
    match rotate_tokens(&state.db, integration, ttl).await? {
        Some(tokens) => {
            info!("Issued WordPress tokens for integration {}", integration_id);
            Ok(Json(tokens).into_response())
        }
        None => {
            warn!("Refresh token of integration {} rotated concurrently", integration_id);
            Ok(oauth_error("invalid_grant", "Grant was already used"))
        }
    }
}

/// Download the WordPress plugin
#[utoipa::path(
    get,
    path = "/api/wordpress/plugin",
    tag = "wordpress",
    responses(
        (status = 200, description = "Plugin archive", content_type = "application/zip"),
        (status = 404, description = "Plugin files are not installed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn download_plugin(State(state): State<AppState>) -> Result<Response, ApiError> {
    let dir = state.config.plugin_dir.clone();

    let archive = tokio::task::spawn_blocking(move || build_plugin_archive(&dir))
        .await
        .map_err(|e| ApiError::Internal(format!("plugin packaging task failed: {}", e)))?;

    let bytes = match archive {
        Ok(bytes) => bytes,
        Err(PluginError::MissingDirectory(path)) => {
            warn!("Plugin directory {} is missing", path.display());
            return Err(ApiError::NotFound("Plugin"));
        }
        Err(e) => {
            error!("Failed to build plugin archive: {}", e);
            return Err(ApiError::Internal(e.to_string()));
        }
    };

    info!("Serving plugin archive ({} bytes)", bytes.len());
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", ARCHIVE_FILENAME),
            ),
        ],
        bytes,
    )
        .into_response())
}
