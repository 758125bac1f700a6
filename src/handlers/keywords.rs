use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use model::entities::{
    keyword::{self, KeywordStatus},
    project,
};
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr, NullOrdering},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, Order, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::projects::find_owned_project;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::{double_option, ValidJson, ValidQuery};
use crate::schemas::{ApiResponse, AppState};

const LIKE_ESCAPE: char = '\\';

/// Lower-cased `LIKE` pattern matching `search` as literal text.
fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Loads a keyword whose project is owned by `user_id`.
pub(crate) async fn find_owned_keyword<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    keyword_id: Uuid,
) -> Result<keyword::Model, ApiError> {
    keyword::Entity::find_by_id(keyword_id)
        .inner_join(project::Entity)
        .filter(project::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Keyword {} not found for user {}", keyword_id, user_id);
            ApiError::NotFound("Keyword")
        })
}

/// Request body for adding a keyword to a project
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateKeywordRequest {
    pub project_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub keyword: String,
    /// Estimated monthly searches
    #[validate(range(min = 0))]
    pub search_volume: Option<i32>,
    /// Ranking difficulty from 0 to 100
    #[validate(range(min = 0, max = 100))]
    pub difficulty: Option<i32>,
    pub planned_date: Option<NaiveDate>,
    /// Defaults to `planned` when a date is given, `unplanned` otherwise
    pub status: Option<KeywordStatus>,
    pub starred: Option<bool>,
}

/// One keyword of a bulk import
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct BulkKeywordItem {
    #[validate(length(min = 1, max = 255))]
    pub keyword: String,
    #[validate(range(min = 0))]
    pub search_volume: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub difficulty: Option<i32>,
}

/// Request body for importing many keywords into one project
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct BulkCreateKeywordsRequest {
    pub project_id: Uuid,
    #[validate(length(min = 1, max = 500), nested)]
    pub keywords: Vec<BulkKeywordItem>,
}

/// Request body for updating a keyword. `null` clears nullable fields.
#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateKeywordRequest {
    #[validate(length(min = 1, max = 255))]
    pub keyword: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0))]
    #[schema(value_type = Option<i32>)]
    pub search_volume: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0, max = 100))]
    #[schema(value_type = Option<i32>)]
    pub difficulty: Option<Option<i32>>,
    /// Setting a date plans an unplanned keyword; clearing it unplans a
    /// planned one, unless `status` is given explicitly
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = Date)]
    pub planned_date: Option<Option<NaiveDate>>,
    pub status: Option<KeywordStatus>,
    pub starred: Option<bool>,
}

/// Filters for listing keywords
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct KeywordQuery {
    pub project_id: Uuid,
    pub status: Option<KeywordStatus>,
    pub starred: Option<bool>,
    /// Case-insensitive substring of the keyword text
    #[validate(length(max = 255))]
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct KeywordResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub keyword: String,
    pub search_volume: Option<i32>,
    pub difficulty: Option<i32>,
    pub planned_date: Option<NaiveDate>,
    pub status: KeywordStatus,
    pub starred: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<keyword::Model> for KeywordResponse {
    fn from(model: keyword::Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            keyword: model.keyword,
            search_volume: model.search_volume,
            difficulty: model.difficulty,
            planned_date: model.planned_date,
            status: model.status,
            starred: model.starred,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Status a keyword moves to when its planned date changes and the caller
/// did not pick one.
fn status_after_date_change(current: KeywordStatus, planned_date: Option<NaiveDate>) -> KeywordStatus {
    match (current, planned_date) {
        (KeywordStatus::Unplanned, Some(_)) => KeywordStatus::Planned,
        (KeywordStatus::Planned, None) => KeywordStatus::Unplanned,
        (status, _) => status,
    }
}

/// Add a keyword to a project
#[utoipa::path(
    post,
    path = "/api/keywords",
    tag = "keywords",
    request_body = CreateKeywordRequest,
    responses(
        (status = 201, description = "Keyword created successfully", body = ApiResponse<KeywordResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_keyword(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CreateKeywordRequest>,
) -> Result<(StatusCode, Json<ApiResponse<KeywordResponse>>), ApiError> {
    trace!("Entering create_keyword function");
    let project = find_owned_project(&state.db, user.id, request.project_id).await?;

    let status = request.status.unwrap_or(match request.planned_date {
        Some(_) => KeywordStatus::Planned,
        None => KeywordStatus::Unplanned,
    });

    let model = keyword::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project.id),
        keyword: Set(request.keyword.trim().to_string()),
        search_volume: Set(request.search_volume),
        difficulty: Set(request.difficulty),
        planned_date: Set(request.planned_date),
        status: Set(status),
        starred: Set(request.starred.unwrap_or(false)),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Keyword '{}' created with ID: {}", model.keyword, model.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(KeywordResponse::from(model), "Keyword created successfully")),
    ))
}

/// Import many keywords into a project
///
/// Keywords already present in the project, and repeats within the
/// request, are skipped (compared case-insensitively).
#[utoipa::path(
    post,
    path = "/api/keywords/bulk",
    tag = "keywords",
    request_body = BulkCreateKeywordsRequest,
    responses(
        (status = 201, description = "Keywords created", body = ApiResponse<Vec<KeywordResponse>>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_keywords_bulk(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<BulkCreateKeywordsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<KeywordResponse>>>), ApiError> {
    trace!("Entering create_keywords_bulk function");
    let project = find_owned_project(&state.db, user.id, request.project_id).await?;

    let existing: Vec<String> = keyword::Entity::find()
        .select_only()
        .column(keyword::Column::Keyword)
        .filter(keyword::Column::ProjectId.eq(project.id))
        .into_tuple()
        .all(&state.db)
        .await?;
    let mut seen: HashSet<String> = existing.iter().map(|k| k.to_lowercase()).collect();

    let txn = state.db.begin().await?;
    let mut created = Vec::new();
    for item in request.keywords {
        let text = item.keyword.trim().to_string();
        if !seen.insert(text.to_lowercase()) {
            debug!("Skipping duplicate keyword '{}'", text);
            continue;
        }

        let model = keyword::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(project.id),
            keyword: Set(text),
            search_volume: Set(item.search_volume),
            difficulty: Set(item.difficulty),
            planned_date: Set(None),
            status: Set(KeywordStatus::Unplanned),
            starred: Set(false),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        created.push(KeywordResponse::from(model));
    }
    txn.commit().await?;

    info!("Imported {} keywords into project {}", created.len(), project.id);
    let message = format!("{} keywords created", created.len());
    Ok((StatusCode::CREATED, Json(ApiResponse::new(created, message))))
}

/// List a project's keywords
///
/// Starred keywords come first, then by planned date (undated last), then
/// newest first.
#[utoipa::path(
    get,
    path = "/api/keywords",
    tag = "keywords",
    params(KeywordQuery),
    responses(
        (status = 200, description = "Keywords retrieved successfully", body = ApiResponse<Vec<KeywordResponse>>),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_keywords(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<KeywordQuery>,
) -> Result<Json<ApiResponse<Vec<KeywordResponse>>>, ApiError> {
    trace!("Entering get_keywords function");
    let project = find_owned_project(&state.db, user.id, query.project_id).await?;

    let mut select = keyword::Entity::find().filter(keyword::Column::ProjectId.eq(project.id));
    if let Some(status) = query.status {
        select = select.filter(keyword::Column::Status.eq(status));
    }
    if let Some(starred) = query.starred {
        select = select.filter(keyword::Column::Starred.eq(starred));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        debug!("Filtering keywords by '{}'", search);
        select = select.filter(
            Expr::expr(Func::lower(Expr::col((keyword::Entity, keyword::Column::Keyword))))
                .like(LikeExpr::new(contains_pattern(search)).escape(LIKE_ESCAPE)),
        );
    }

    let keywords = select
        .order_by_desc(keyword::Column::Starred)
        .order_by_with_nulls(keyword::Column::PlannedDate, Order::Asc, NullOrdering::Last)
        .order_by_desc(keyword::Column::CreatedAt)
        .all(&state.db)
        .await?;

    info!("Retrieved {} keywords", keywords.len());
    Ok(Json(ApiResponse::new(
        keywords.into_iter().map(KeywordResponse::from).collect(),
        "Keywords retrieved successfully",
    )))
}

/// Get a keyword by ID
#[utoipa::path(
    get,
    path = "/api/keywords/{keyword_id}",
    tag = "keywords",
    params(
        ("keyword_id" = Uuid, Path, description = "Keyword ID"),
    ),
    responses(
        (status = 200, description = "Keyword retrieved successfully", body = ApiResponse<KeywordResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Keyword not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_keyword(
    user: CurrentUser,
    Path(keyword_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<KeywordResponse>>, ApiError> {
    let keyword = find_owned_keyword(&state.db, user.id, keyword_id).await?;
    Ok(Json(ApiResponse::new(
        KeywordResponse::from(keyword),
        "Keyword retrieved successfully",
    )))
}

/// Update a keyword
#[utoipa::path(
    patch,
    path = "/api/keywords/{keyword_id}",
    tag = "keywords",
    params(
        ("keyword_id" = Uuid, Path, description = "Keyword ID"),
    ),
    request_body = UpdateKeywordRequest,
    responses(
        (status = 200, description = "Keyword updated successfully", body = ApiResponse<KeywordResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Keyword not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_keyword(
    user: CurrentUser,
    Path(keyword_id): Path<Uuid>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<UpdateKeywordRequest>,
) -> Result<Json<ApiResponse<KeywordResponse>>, ApiError> {
    trace!("Entering update_keyword function for keyword_id: {}", keyword_id);
    let keyword = find_owned_keyword(&state.db, user.id, keyword_id).await?;
    let current_status = keyword.status;

    let mut status = request.status;
    let mut active: keyword::ActiveModel = keyword.into();
    if let Some(text) = request.keyword {
        active.keyword = Set(text.trim().to_string());
    }
    if let Some(search_volume) = request.search_volume {
        active.search_volume = Set(search_volume);
    }
    if let Some(difficulty) = request.difficulty {
        active.difficulty = Set(difficulty);
    }
    if let Some(planned_date) = request.planned_date {
        active.planned_date = Set(planned_date);
        if status.is_none() {
            status = Some(status_after_date_change(current_status, planned_date));
        }
    }
    if let Some(status) = status {
        active.status = Set(status);
    }
    if let Some(starred) = request.starred {
        active.starred = Set(starred);
    }

    let updated = active.update(&state.db).await?;
    info!("Keyword {} updated, status {:?}", updated.id, updated.status);
    Ok(Json(ApiResponse::new(
        KeywordResponse::from(updated),
        "Keyword updated successfully",
    )))
}

/// Delete a keyword. Articles targeting it keep existing without a keyword.
#[utoipa::path(
    delete,
    path = "/api/keywords/{keyword_id}",
    tag = "keywords",
    params(
        ("keyword_id" = Uuid, Path, description = "Keyword ID"),
    ),
    responses(
        (status = 200, description = "Keyword deleted successfully"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Keyword not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_keyword(
    user: CurrentUser,
    Path(keyword_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let keyword = find_owned_keyword(&state.db, user.id, keyword_id).await?;
    keyword.delete(&state.db).await?;

    info!("Keyword {} deleted", keyword_id);
    Ok(Json(ApiResponse::new((), "Keyword deleted successfully")))
}
