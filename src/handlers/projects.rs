use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::{
    article::{self, ArticleStatus},
    backlink::{self, BacklinkStatus},
    integration,
    keyword::{self, KeywordStatus},
    project,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::{double_option, ValidJson};
use crate::schemas::{ApiResponse, AppState};

/// Loads a project only if `user_id` owns it. A project owned by someone
/// else is indistinguishable from a missing one.
pub(crate) async fn find_owned_project<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    project_id: Uuid,
) -> Result<project::Model, ApiError> {
    project::Entity::find_by_id(project_id)
        .filter(project::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Project {} not found for user {}", project_id, user_id);
            ApiError::NotFound("Project")
        })
}

/// Request body for creating a project
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Public URL of the website
    #[validate(url)]
    pub website_url: String,
    /// Content language, defaults to "en"
    #[validate(length(min = 2, max = 35))]
    pub language: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub brand_voice: Option<Value>,
    pub onboarding_completed: Option<bool>,
}

/// Request body for updating a project. Omitted fields are left unchanged;
/// `brand_voice: null` clears the brand voice.
#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(url)]
    pub website_url: Option<String>,
    #[validate(length(min = 2, max = 35))]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Object>)]
    pub brand_voice: Option<Option<Value>>,
    pub onboarding_completed: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub website_url: String,
    pub language: String,
    #[schema(value_type = Option<Object>)]
    pub brand_voice: Option<Value>,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<project::Model> for ProjectResponse {
    fn from(model: project::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            website_url: model.website_url,
            language: model.language,
            brand_voice: model.brand_voice,
            onboarding_completed: model.onboarding_completed,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct KeywordCounts {
    pub total: u64,
    pub unplanned: u64,
    pub planned: u64,
    pub used: u64,
    pub starred: u64,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ArticleCounts {
    pub total: u64,
    pub draft: u64,
    pub scheduled: u64,
    pub published: u64,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct BacklinkCounts {
    pub total: u64,
    pub pending: u64,
    pub published: u64,
    pub rejected: u64,
}

/// Dashboard counters for one project
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectStatsResponse {
    pub project_id: Uuid,
    pub keywords: KeywordCounts,
    pub articles: ArticleCounts,
    pub backlinks: BacklinkCounts,
    pub integrations: u64,
}

/// Create a new project owned by the current user
#[utoipa::path(
    post,
    path = "/api/projects",
    tag = "projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created successfully", body = ApiResponse<ProjectResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_project(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProjectResponse>>), ApiError> {
    trace!("Entering create_project function");
    debug!("Creating project '{}' for {}", request.name, request.website_url);

    let model = project::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        name: Set(request.name),
        website_url: Set(request.website_url),
        language: Set(request.language.unwrap_or_else(|| "en".to_string())),
        brand_voice: Set(request.brand_voice),
        onboarding_completed: Set(request.onboarding_completed.unwrap_or(false)),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Project created with ID: {}", model.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(ProjectResponse::from(model), "Project created successfully")),
    ))
}

/// List the current user's projects, newest first
#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "projects",
    responses(
        (status = 200, description = "Projects retrieved successfully", body = ApiResponse<Vec<ProjectResponse>>),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_projects(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ProjectResponse>>>, ApiError> {
    trace!("Entering get_projects function");

    let projects = project::Entity::find()
        .filter(project::Column::UserId.eq(user.id))
        .order_by_desc(project::Column::CreatedAt)
        .all(&state.db)
        .await?;

    info!("Retrieved {} projects", projects.len());
    Ok(Json(ApiResponse::new(
        projects.into_iter().map(ProjectResponse::from).collect(),
        "Projects retrieved successfully",
    )))
}

/// Get a project by ID
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}",
    tag = "projects",
    params(
        ("project_id" = Uuid, Path, description = "Project ID"),
    ),
    responses(
        (status = 200, description = "Project retrieved successfully", body = ApiResponse<ProjectResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_project(
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ProjectResponse>>, ApiError> {
    let project = find_owned_project(&state.db, user.id, project_id).await?;
    Ok(Json(ApiResponse::new(
        ProjectResponse::from(project),
        "Project retrieved successfully",
    )))
}

/// Update a project
#[utoipa::path(
    patch,
    path = "/api/projects/{project_id}",
    tag = "projects",
    params(
        ("project_id" = Uuid, Path, description = "Project ID"),
    ),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated successfully", body = ApiResponse<ProjectResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_project(
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<UpdateProjectRequest>,
) -> Result<Json<ApiResponse<ProjectResponse>>, ApiError> {
    trace!("Entering update_project function for project_id: {}", project_id);
    let project = find_owned_project(&state.db, user.id, project_id).await?;

    let mut active: project::ActiveModel = project.into();
    if let Some(name) = request.name {
        active.name = Set(name);
    }
    if let Some(website_url) = request.website_url {
        active.website_url = Set(website_url);
    }
    if let Some(language) = request.language {
        active.language = Set(language);
    }
    if let Some(brand_voice) = request.brand_voice {
        active.brand_voice = Set(brand_voice);
    }
    if let Some(onboarding_completed) = request.onboarding_completed {
        active.onboarding_completed = Set(onboarding_completed);
    }

    let updated = active.update(&state.db).await?;
    info!("Project {} updated", updated.id);
    Ok(Json(ApiResponse::new(
        ProjectResponse::from(updated),
        "Project updated successfully",
    )))
}

/// Delete a project together with its keywords, articles, backlinks and integrations
#[utoipa::path(
    delete,
    path = "/api/projects/{project_id}",
    tag = "projects",
    params(
        ("project_id" = Uuid, Path, description = "Project ID"),
    ),
    responses(
        (status = 200, description = "Project deleted successfully"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_project(
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let project = find_owned_project(&state.db, user.id, project_id).await?;
    project.delete(&state.db).await?;

    info!("Project {} deleted", project_id);
    Ok(Json(ApiResponse::new((), "Project deleted successfully")))
}

/// Counters for the project dashboard
#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/stats",
    tag = "projects",
    params(
        ("project_id" = Uuid, Path, description = "Project ID"),
    ),
    responses(
        (status = 200, description = "Statistics computed", body = ApiResponse<ProjectStatsResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_project_stats(
    user: CurrentUser,
    Path(project_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ProjectStatsResponse>>, ApiError> {
    trace!("Entering get_project_stats function for project_id: {}", project_id);
    let project = find_owned_project(&state.db, user.id, project_id).await?;
    let db = &state.db;

    let keywords = || keyword::Entity::find().filter(keyword::Column::ProjectId.eq(project.id));
    let keyword_counts = KeywordCounts {
        total: keywords().count(db).await?,
        unplanned: keywords()
            .filter(keyword::Column::Status.eq(KeywordStatus::Unplanned))
            .count(db)
            .await?,
        planned: keywords()
            .filter(keyword::Column::Status.eq(KeywordStatus::Planned))
            .count(db)
            .await?,
        used: keywords()
            .filter(keyword::Column::Status.eq(KeywordStatus::Used))
            .count(db)
            .await?,
        starred: keywords().filter(keyword::Column::Starred.eq(true)).count(db).await?,
    };

    let articles = || article::Entity::find().filter(article::Column::ProjectId.eq(project.id));
    let article_counts = ArticleCounts {
        total: articles().count(db).await?,
        draft: articles()
            .filter(article::Column::Status.eq(ArticleStatus::Draft))
            .count(db)
            .await?,
        scheduled: articles()
            .filter(article::Column::Status.eq(ArticleStatus::Scheduled))
            .count(db)
            .await?,
        published: articles()
            .filter(article::Column::Status.eq(ArticleStatus::Published))
            .count(db)
            .await?,
    };

    let backlinks = || backlink::Entity::find().filter(backlink::Column::ProjectId.eq(project.id));
    let backlink_counts = BacklinkCounts {
        total: backlinks().count(db).await?,
        pending: backlinks()
            .filter(backlink::Column::Status.eq(BacklinkStatus::Pending))
            .count(db)
            .await?,
        published: backlinks()
            .filter(backlink::Column::Status.eq(BacklinkStatus::Published))
            .count(db)
            .await?,
        rejected: backlinks()
            .filter(backlink::Column::Status.eq(BacklinkStatus::Rejected))
            .count(db)
            .await?,
    };

    let integrations = integration::Entity::find()
        .filter(integration::Column::ProjectId.eq(project.id))
        .count(db)
        .await?;

    debug!(
        "Project {} has {} keywords, {} articles, {} backlinks",
        project.id, keyword_counts.total, article_counts.total, backlink_counts.total
    );
    Ok(Json(ApiResponse::new(
        ProjectStatsResponse {
            project_id: project.id,
            keywords: keyword_counts,
            articles: article_counts,
            backlinks: backlink_counts,
            integrations,
        },
        "Project statistics retrieved successfully",
    )))
}
