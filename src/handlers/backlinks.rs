use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::{
    backlink::{self, BacklinkStatus},
    project,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::projects::find_owned_project;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::{double_option, ValidJson, ValidQuery};
use crate::schemas::{ApiResponse, AppState};

async fn find_owned_backlink<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    backlink_id: Uuid,
) -> Result<backlink::Model, ApiError> {
    backlink::Entity::find_by_id(backlink_id)
        .inner_join(project::Entity)
        .filter(project::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Backlink {} not found for user {}", backlink_id, user_id);
            ApiError::NotFound("Backlink")
        })
}

/// Request body for tracking a backlink
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateBacklinkRequest {
    pub project_id: Uuid,
    /// Page that links to the project
    #[validate(url)]
    pub source_url: String,
    /// Page of the project being linked to
    #[validate(url)]
    pub target_url: String,
    #[validate(length(max = 500))]
    pub anchor_text: Option<String>,
    pub status: Option<BacklinkStatus>,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateBacklinkRequest {
    #[validate(url)]
    pub source_url: Option<String>,
    #[validate(url)]
    pub target_url: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 500))]
    #[schema(value_type = Option<String>)]
    pub anchor_text: Option<Option<String>>,
    pub status: Option<BacklinkStatus>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BacklinkQuery {
    pub project_id: Uuid,
    pub status: Option<BacklinkStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BacklinkResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub source_url: String,
    pub target_url: String,
    pub anchor_text: Option<String>,
    pub status: BacklinkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<backlink::Model> for BacklinkResponse {
    fn from(model: backlink::Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            source_url: model.source_url,
            target_url: model.target_url,
            anchor_text: model.anchor_text,
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Track a new backlink
#[utoipa::path(
    post,
    path = "/api/backlinks",
    tag = "backlinks",
    request_body = CreateBacklinkRequest,
    responses(
        (status = 201, description = "Backlink created successfully", body = ApiResponse<BacklinkResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_backlink(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CreateBacklinkRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BacklinkResponse>>), ApiError> {
    trace!("Entering create_backlink function");
    let project = find_owned_project(&state.db, user.id, request.project_id).await?;

    let model = backlink::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project.id),
        source_url: Set(request.source_url),
        target_url: Set(request.target_url),
        anchor_text: Set(request.anchor_text),
        status: Set(request.status.unwrap_or(BacklinkStatus::Pending)),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Backlink created with ID: {}", model.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(BacklinkResponse::from(model), "Backlink created successfully")),
    ))
}

/// List a project's backlinks, newest first
#[utoipa::path(
    get,
    path = "/api/backlinks",
    tag = "backlinks",
    params(BacklinkQuery),
    responses(
        (status = 200, description = "Backlinks retrieved successfully", body = ApiResponse<Vec<BacklinkResponse>>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_backlinks(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<BacklinkQuery>,
) -> Result<Json<ApiResponse<Vec<BacklinkResponse>>>, ApiError> {
    let project = find_owned_project(&state.db, user.id, query.project_id).await?;

    let mut select = backlink::Entity::find().filter(backlink::Column::ProjectId.eq(project.id));
    if let Some(status) = query.status {
        select = select.filter(backlink::Column::Status.eq(status));
    }
    let backlinks = select
        .order_by_desc(backlink::Column::CreatedAt)
        .all(&state.db)
        .await?;

    info!("Retrieved {} backlinks", backlinks.len());
    Ok(Json(ApiResponse::new(
        backlinks.into_iter().map(BacklinkResponse::from).collect(),
        "Backlinks retrieved successfully",
    )))
}

/// Get a backlink by ID
#[utoipa::path(
    get,
    path = "/api/backlinks/{backlink_id}",
    tag = "backlinks",
    params(
        ("backlink_id" = Uuid, Path, description = "Backlink ID"),
    ),
    responses(
        (status = 200, description = "Backlink retrieved successfully", body = ApiResponse<BacklinkResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Backlink not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_backlink(
    user: CurrentUser,
    Path(backlink_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<BacklinkResponse>>, ApiError> {
    let backlink = find_owned_backlink(&state.db, user.id, backlink_id).await?;
    Ok(Json(ApiResponse::new(
        BacklinkResponse::from(backlink),
        "Backlink retrieved successfully",
    )))
}

/// Update a backlink
#[utoipa::path(
    patch,
    path = "/api/backlinks/{backlink_id}",
    tag = "backlinks",
    params(
        ("backlink_id" = Uuid, Path, description = "Backlink ID"),
    ),
    request_body = UpdateBacklinkRequest,
    responses(
        (status = 200, description = "Backlink updated successfully", body = ApiResponse<BacklinkResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Backlink not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_backlink(
    user: CurrentUser,
    Path(backlink_id): Path<Uuid>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<UpdateBacklinkRequest>,
) -> Result<Json<ApiResponse<BacklinkResponse>>, ApiError> {
    let backlink = find_owned_backlink(&state.db, user.id, backlink_id).await?;

    let mut active: backlink::ActiveModel = backlink.into();
    if let Some(source_url) = request.source_url {
        active.source_url = Set(source_url);
    }
    if let Some(target_url) = request.target_url {
        active.target_url = Set(target_url);
    }
    if let Some(anchor_text) = request.anchor_text {
        active.anchor_text = Set(anchor_text);
    }
    if let Some(status) = request.status {
        active.status = Set(status);
    }

    let updated = active.update(&state.db).await?;
    info!("Backlink {} updated", updated.id);
    Ok(Json(ApiResponse::new(
        BacklinkResponse::from(updated),
        "Backlink updated successfully",
    )))
}

/// Stop tracking a backlink
#[utoipa::path(
    delete,
    path = "/api/backlinks/{backlink_id}",
    tag = "backlinks",
    params(
        ("backlink_id" = Uuid, Path, description = "Backlink ID"),
    ),
    responses(
        (status = 200, description = "Backlink deleted successfully"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Backlink not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_backlink(
    user: CurrentUser,
    Path(backlink_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let backlink = find_owned_backlink(&state.db, user.id, backlink_id).await?;
    backlink.delete(&state.db).await?;

    info!("Backlink {} deleted", backlink_id);
    Ok(Json(ApiResponse::new((), "Backlink deleted successfully")))
}
