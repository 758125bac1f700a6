use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use model::credentials::PlatformCredentials;
use model::entities::{
    integration::{self, generate_integration_key, Platform},
    project,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::projects::find_owned_project;
use crate::auth::CurrentUser;
use crate::error::{is_unique_violation, ApiError};
use crate::extract::{ValidJson, ValidQuery};
use crate::platforms::ConnectionReport;
use crate::schemas::{ApiResponse, AppState};

/// Header plugins use to present their integration key.
pub const INTEGRATION_KEY_HEADER: &str = "x-integration-key";

pub(crate) async fn find_owned_integration<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    integration_id: Uuid,
) -> Result<integration::Model, ApiError> {
    integration::Entity::find_by_id(integration_id)
        .inner_join(project::Entity)
        .filter(project::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Integration {} not found for user {}", integration_id, user_id);
            ApiError::NotFound("Integration")
        })
}

async fn find_by_platform<C: ConnectionTrait>(
    db: &C,
    project_id: Uuid,
    platform: Platform,
) -> Result<Option<integration::Model>, DbErr> {
    integration::Entity::find()
        .filter(integration::Column::ProjectId.eq(project_id))
        .filter(integration::Column::Platform.eq(platform))
        .one(db)
        .await
}

fn check_required(credentials: &PlatformCredentials) -> Result<(), ApiError> {
    credentials.check_required().map_err(|e| {
        warn!("Rejected incomplete credentials: {}", e);
        ApiError::BadRequest(e.to_string())
    })
}

/// Creates the (project, platform) integration or merges `incoming` into
/// the existing one. Returns the row and whether it was newly created.
///
/// A concurrent insert of the same pair loses on the unique index and is
/// folded into a merge. Non-empty `incoming` credentials must leave the
/// platform's required fields set.
pub(crate) async fn upsert_integration<C: ConnectionTrait>(
    db: &C,
    project_id: Uuid,
    incoming: PlatformCredentials,
) -> Result<(integration::Model, bool), ApiError> {
    let platform = incoming.platform();
    let supplied = !incoming.is_empty();

    if let Some(existing) = find_by_platform(db, project_id, platform).await? {
        return Ok((merge_credentials(db, existing, incoming, supplied).await?, false));
    }

    if supplied {
        check_required(&incoming)?;
    }

    let inserted = integration::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project_id),
        platform: Set(platform),
        credentials: Set(incoming.clone()),
        is_active: Set(true),
        integration_key: Set(generate_integration_key()),
        refresh_token: Set(None),
        last_sync_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(model) => {
            info!("Created {} integration {} for project {}", platform.as_str(), model.id, project_id);
            Ok((model, true))
        }
        Err(e) if is_unique_violation(&e) => {
            debug!("Lost insert race for {} integration, merging instead", platform.as_str());
            let existing = find_by_platform(db, project_id, platform)
                .await?
                .ok_or(ApiError::Database(e))?;
            Ok((merge_credentials(db, existing, incoming, supplied).await?, false))
        }
        Err(e) => Err(e.into()),
    }
}

async fn merge_credentials<C: ConnectionTrait>(
    db: &C,
    existing: integration::Model,
    incoming: PlatformCredentials,
    supplied: bool,
) -> Result<integration::Model, ApiError> {
    let merged = existing
        .credentials
        .clone()
        .merge(incoming)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if supplied {
        check_required(&merged)?;
    }

    let mut active: integration::ActiveModel = existing.into();
    active.credentials = Set(merged);
    Ok(active.update(db).await?)
}

fn parse_credentials(platform: Platform, credentials: Option<Value>) -> Result<PlatformCredentials, ApiError> {
    match credentials {
        Some(value) => PlatformCredentials::parse(platform, value).map_err(|e| {
            warn!("Rejected {} credentials: {}", platform.as_str(), e);
            ApiError::BadRequest(e.to_string())
        }),
        None => Ok(PlatformCredentials::empty(platform)),
    }
}

/// Request body for connecting a project to a platform
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct AttachIntegrationRequest {
    pub project_id: Uuid,
    pub platform: Platform,
    /// Platform-specific credential fields
    #[schema(value_type = Option<Object>)]
    pub credentials: Option<Value>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateIntegrationRequest {
    pub is_active: Option<bool>,
    /// Fields merged over the stored credentials
    #[schema(value_type = Option<Object>)]
    pub credentials: Option<Value>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IntegrationQuery {
    /// Only integrations of this project
    pub project_id: Option<Uuid>,
}

/// An integration with its secrets masked. The integration key is shown in
/// full since the owner has to paste it into the plugin.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IntegrationResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub platform: Platform,
    #[schema(value_type = Object)]
    pub credentials: Value,
    pub is_active: bool,
    pub integration_key: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<integration::Model> for IntegrationResponse {
    fn from(model: integration::Model) -> Self {
        let credentials = serde_json::to_value(model.credentials.redacted()).unwrap_or(Value::Null);
        Self {
            id: model.id,
            project_id: model.project_id,
            platform: model.platform,
            credentials,
            is_active: model.is_active,
            integration_key: model.integration_key,
            last_sync_at: model.last_sync_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct KeyQuery {
    /// Integration key, when not sent as a header
    pub key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct KeyProjectSummary {
    pub id: Uuid,
    pub name: String,
    pub website_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateKeyResponse {
    pub valid: bool,
    pub integration_id: Uuid,
    pub platform: Platform,
    /// Reported as stored; an inactive integration still has a valid key
    pub is_active: bool,
    pub project: KeyProjectSummary,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InvalidKeyResponse {
    pub valid: bool,
    pub error: String,
}

/// Key from `X-Integration-Key`, then `Authorization: Bearer`, then `?key=`.
fn presented_key(headers: &HeaderMap, query_key: Option<String>) -> Option<String> {
    let from_header = headers
        .get(INTEGRATION_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let from_bearer = || {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    };

    from_header
        .or_else(from_bearer)
        .or(query_key)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

fn invalid_key(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(InvalidKeyResponse {
            valid: false,
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Connect a project to a platform, or merge credentials into the existing connection
#[utoipa::path(
    post,
    path = "/api/integrations",
    tag = "integrations",
    request_body = AttachIntegrationRequest,
    responses(
        (status = 201, description = "Integration created", body = ApiResponse<IntegrationResponse>),
        (status = 200, description = "Existing integration updated", body = ApiResponse<IntegrationResponse>),
        (status = 400, description = "Credentials do not fit the platform", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn attach_integration(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<AttachIntegrationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<IntegrationResponse>>), ApiError> {
    trace!("Entering attach_integration function");
    debug!("Attaching {} to project {}", request.platform.as_str(), request.project_id);
    let project = find_owned_project(&state.db, user.id, request.project_id).await?;
    let incoming = parse_credentials(request.platform, request.credentials)?;

    let (model, created) = upsert_integration(&state.db, project.id, incoming).await?;
    let (status, message) = if created {
        (StatusCode::CREATED, "Integration created successfully")
    } else {
        (StatusCode::OK, "Integration updated successfully")
    };

    Ok((status, Json(ApiResponse::new(IntegrationResponse::from(model), message))))
}

/// List the current user's integrations
#[utoipa::path(
    get,
    path = "/api/integrations",
    tag = "integrations",
    params(IntegrationQuery),
    responses(
        (status = 200, description = "Integrations retrieved successfully", body = ApiResponse<Vec<IntegrationResponse>>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_integrations(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<IntegrationQuery>,
) -> Result<Json<ApiResponse<Vec<IntegrationResponse>>>, ApiError> {
    let mut select = integration::Entity::find()
        .inner_join(project::Entity)
        .filter(project::Column::UserId.eq(user.id));

    if let Some(project_id) = query.project_id {
        find_owned_project(&state.db, user.id, project_id).await?;
        select = select.filter(integration::Column::ProjectId.eq(project_id));
    }

    let integrations = select
        .order_by_asc(integration::Column::CreatedAt)
        .all(&state.db)
        .await?;

    info!("Retrieved {} integrations", integrations.len());
    Ok(Json(ApiResponse::new(
        integrations.into_iter().map(IntegrationResponse::from).collect(),
        "Integrations retrieved successfully",
    )))
}

/// Get an integration by ID
#[utoipa::path(
    get,
    path = "/api/integrations/{integration_id}",
    tag = "integrations",
    params(
        ("integration_id" = Uuid, Path, description = "Integration ID"),
    ),
    responses(
        (status = 200, description = "Integration retrieved successfully", body = ApiResponse<IntegrationResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Integration not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_integration(
    user: CurrentUser,
    Path(integration_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<IntegrationResponse>>, ApiError> {
    let integration = find_owned_integration(&state.db, user.id, integration_id).await?;
    Ok(Json(ApiResponse::new(
        IntegrationResponse::from(integration),
        "Integration retrieved successfully",
    )))
}

/// Toggle an integration or merge new credentials into it
#[utoipa::path(
    patch,
    path = "/api/integrations/{integration_id}",
    tag = "integrations",
    params(
        ("integration_id" = Uuid, Path, description = "Integration ID"),
    ),
    request_body = UpdateIntegrationRequest,
    responses(
        (status = 200, description = "Integration updated successfully", body = ApiResponse<IntegrationResponse>),
        (status = 400, description = "Credentials do not fit the platform", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Integration not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_integration(
    user: CurrentUser,
    Path(integration_id): Path<Uuid>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<UpdateIntegrationRequest>,
) -> Result<Json<ApiResponse<IntegrationResponse>>, ApiError> {
    trace!("Entering update_integration function for integration_id: {}", integration_id);
    let integration = find_owned_integration(&state.db, user.id, integration_id).await?;

    let credentials = match request.credentials {
        Some(value) => {
            let incoming = parse_credentials(integration.platform, Some(value))?;
            let merged = integration
                .credentials
                .clone()
                .merge(incoming)
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            check_required(&merged)?;
            Some(merged)
        }
        None => None,
    };

    let mut active: integration::ActiveModel = integration.into();
    if let Some(credentials) = credentials {
        active.credentials = Set(credentials);
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }

    let updated = active.update(&state.db).await?;
    info!("Integration {} updated, active: {}", updated.id, updated.is_active);
    Ok(Json(ApiResponse::new(
        IntegrationResponse::from(updated),
        "Integration updated successfully",
    )))
}

/// Disconnect a platform
#[utoipa::path(
    delete,
    path = "/api/integrations/{integration_id}",
    tag = "integrations",
    params(
        ("integration_id" = Uuid, Path, description = "Integration ID"),
    ),
    responses(
        (status = 200, description = "Integration deleted successfully"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Integration not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_integration(
    user: CurrentUser,
    Path(integration_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let integration = find_owned_integration(&state.db, user.id, integration_id).await?;
    integration.delete(&state.db).await?;

    info!("Integration {} deleted", integration_id);
    Ok(Json(ApiResponse::new((), "Integration deleted successfully")))
}

/// Replace an integration's key; the previous key stops working immediately
#[utoipa::path(
    post,
    path = "/api/integrations/{integration_id}/regenerate-key",
    tag = "integrations",
    params(
        ("integration_id" = Uuid, Path, description = "Integration ID"),
    ),
    responses(
        (status = 200, description = "Key regenerated", body = ApiResponse<IntegrationResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Integration not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn regenerate_integration_key(
    user: CurrentUser,
    Path(integration_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<IntegrationResponse>>, ApiError> {
    let integration = find_owned_integration(&state.db, user.id, integration_id).await?;

    let mut active: integration::ActiveModel = integration.into();
    active.integration_key = Set(generate_integration_key());
    let updated = active.update(&state.db).await?;

    info!("Regenerated key of integration {}", updated.id);
    Ok(Json(ApiResponse::new(
        IntegrationResponse::from(updated),
        "Integration key regenerated successfully",
    )))
}

/// Check the stored credentials against the platform
///
/// Platform failures are reported in the body with `success: false`; the
/// request itself still succeeds.
#[utoipa::path(
    post,
    path = "/api/integrations/{integration_id}/test",
    tag = "integrations",
    params(
        ("integration_id" = Uuid, Path, description = "Integration ID"),
    ),
    responses(
        (status = 200, description = "Connection test result", body = ConnectionReport),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Integration not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn test_integration(
    user: CurrentUser,
    Path(integration_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ConnectionReport>, ApiError> {
    trace!("Entering test_integration function for integration_id: {}", integration_id);
    let integration = find_owned_integration(&state.db, user.id, integration_id).await?;

    let report = match state.platforms.test_connection(&integration.credentials).await {
        Ok(report) => report,
        Err(e) => {
            warn!("Connection test for integration {} failed: {}", integration.id, e);
            ConnectionReport {
                success: false,
                message: e.to_string(),
                details: None,
            }
        }
    };

    if report.success {
        let mut active: integration::ActiveModel = integration.into();
        active.last_sync_at = Set(Some(Utc::now()));
        if let Err(e) = active.update(&state.db).await {
            error!("Failed to record sync time for integration {}: {}", integration_id, e);
            return Err(e.into());
        }
        info!("Connection test for integration {} succeeded", integration_id);
    }

    Ok(Json(report))
}

/// Check an integration key presented by an external plugin
#[utoipa::path(
    get,
    path = "/api/integrations/validate-key",
    tag = "integrations",
    params(
        KeyQuery,
        ("X-Integration-Key" = Option<String>, Header, description = "Integration key"),
    ),
    responses(
        (status = 200, description = "Key is valid", body = ValidateKeyResponse),
        (status = 401, description = "Key missing or unknown", body = InvalidKeyResponse)
    )
)]
#[instrument(skip(state, headers, query))]
pub async fn validate_integration_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Result<Response, ApiError> {
    let Some(key) = presented_key(&headers, query.key) else {
        warn!("Key validation without a key");
        return Ok(invalid_key("Integration key is required"));
    };

    let found = integration::Entity::find()
        .filter(integration::Column::IntegrationKey.eq(key))
        .find_also_related(project::Entity)
        .one(&state.db)
        .await?;

    match found {
        Some((integration, Some(project))) => {
            debug!("Key belongs to integration {}", integration.id);
            Ok(Json(ValidateKeyResponse {
                valid: true,
                integration_id: integration.id,
                platform: integration.platform,
                is_active: integration.is_active,
                project: KeyProjectSummary {
                    id: project.id,
                    name: project.name,
                    website_url: project.website_url,
                },
            })
            .into_response())
        }
        _ => {
            warn!("Unknown integration key presented");
            Ok(invalid_key("Invalid integration key"))
        }
    }
}
