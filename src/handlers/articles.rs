use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::{
    article::{self, count_words, ArticleStatus},
    keyword::{self, KeywordStatus},
    project,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::projects::find_owned_project;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::{double_option, ValidJson, ValidQuery};
use crate::schemas::{ApiResponse, AppState};

async fn find_owned_article<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    article_id: Uuid,
) -> Result<article::Model, ApiError> {
    article::Entity::find_by_id(article_id)
        .inner_join(project::Entity)
        .filter(project::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Article {} not found for user {}", article_id, user_id);
            ApiError::NotFound("Article")
        })
}

/// Marks `keyword_id` as used after checking it belongs to `project_id`.
async fn attach_keyword<C: ConnectionTrait>(
    db: &C,
    project_id: Uuid,
    keyword_id: Uuid,
) -> Result<(), ApiError> {
    let keyword = keyword::Entity::find_by_id(keyword_id)
        .filter(keyword::Column::ProjectId.eq(project_id))
        .one(db)
        .await?
        .ok_or_else(|| {
            warn!("Keyword {} is not part of project {}", keyword_id, project_id);
            ApiError::BadRequest("Keyword does not belong to this project".to_string())
        })?;

    if keyword.status != KeywordStatus::Used {
        debug!("Marking keyword {} as used", keyword.id);
        let mut active: keyword::ActiveModel = keyword.into();
        active.status = Set(KeywordStatus::Used);
        active.update(db).await?;
    }
    Ok(())
}

fn check_schedule(status: ArticleStatus, scheduled_at: Option<DateTime<Utc>>) -> Result<(), ApiError> {
    if status == ArticleStatus::Scheduled && scheduled_at.is_none() {
        return Err(ApiError::BadRequest(
            "scheduled_at is required for scheduled articles".to_string(),
        ));
    }
    Ok(())
}

/// Request body for creating an article
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateArticleRequest {
    pub project_id: Uuid,
    /// Keyword the article targets; must belong to the same project
    pub keyword_id: Option<Uuid>,
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    /// HTML or plain text body
    #[serde(default)]
    pub content: String,
    pub status: Option<ArticleStatus>,
    #[validate(range(min = 0, max = 100))]
    pub seo_score: Option<i32>,
    #[validate(url)]
    pub featured_image_url: Option<String>,
    /// Required when `status` is `scheduled`
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Request body for updating an article. `null` clears nullable fields.
#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateArticleRequest {
    #[validate(length(min = 1, max = 300))]
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<ArticleStatus>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub keyword_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0, max = 100))]
    #[schema(value_type = Option<i32>)]
    pub seo_score: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(url)]
    #[schema(value_type = Option<String>)]
    pub featured_image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
}

/// Filters for listing articles
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ArticleQuery {
    pub project_id: Uuid,
    pub status: Option<ArticleStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ArticleResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub keyword_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub status: ArticleStatus,
    pub seo_score: Option<i32>,
    pub word_count: i32,
    pub featured_image_url: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<article::Model> for ArticleResponse {
    fn from(model: article::Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            keyword_id: model.keyword_id,
            title: model.title,
            content: model.content,
            status: model.status,
            seo_score: model.seo_score,
            word_count: model.word_count,
            featured_image_url: model.featured_image_url,
            scheduled_at: model.scheduled_at,
            published_at: model.published_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Create an article
#[utoipa::path(
    post,
    path = "/api/articles",
    tag = "articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Article created successfully", body = ApiResponse<ArticleResponse>),
        (status = 400, description = "Invalid request or foreign keyword", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_article(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<CreateArticleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ArticleResponse>>), ApiError> {
    trace!("Entering create_article function");
    debug!("Creating article '{}' in project {}", request.title, request.project_id);
    let project = find_owned_project(&state.db, user.id, request.project_id).await?;

    let status = request.status.unwrap_or(ArticleStatus::Draft);
    check_schedule(status, request.scheduled_at)?;
    let published_at = (status == ArticleStatus::Published).then(Utc::now);

    let txn = state.db.begin().await?;
    if let Some(keyword_id) = request.keyword_id {
        attach_keyword(&txn, project.id, keyword_id).await?;
    }

    let model = article::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project.id),
        keyword_id: Set(request.keyword_id),
        title: Set(request.title),
        word_count: Set(count_words(&request.content)),
        content: Set(request.content),
        status: Set(status),
        seo_score: Set(request.seo_score),
        featured_image_url: Set(request.featured_image_url),
        scheduled_at: Set(request.scheduled_at),
        published_at: Set(published_at),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!("Article created with ID: {}, {} words", model.id, model.word_count);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(ArticleResponse::from(model), "Article created successfully")),
    ))
}

/// List a project's articles, newest first
#[utoipa::path(
    get,
    path = "/api/articles",
    tag = "articles",
    params(ArticleQuery),
    responses(
        (status = 200, description = "Articles retrieved successfully", body = ApiResponse<Vec<ArticleResponse>>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_articles(
    user: CurrentUser,
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ArticleQuery>,
) -> Result<Json<ApiResponse<Vec<ArticleResponse>>>, ApiError> {
    let project = find_owned_project(&state.db, user.id, query.project_id).await?;

    let mut select = article::Entity::find().filter(article::Column::ProjectId.eq(project.id));
    if let Some(status) = query.status {
        select = select.filter(article::Column::Status.eq(status));
    }
    let articles = select
        .order_by_desc(article::Column::CreatedAt)
        .all(&state.db)
        .await?;

    info!("Retrieved {} articles", articles.len());
    Ok(Json(ApiResponse::new(
        articles.into_iter().map(ArticleResponse::from).collect(),
        "Articles retrieved successfully",
    )))
}

/// Get an article by ID
#[utoipa::path(
    get,
    path = "/api/articles/{article_id}",
    tag = "articles",
    params(
        ("article_id" = Uuid, Path, description = "Article ID"),
    ),
    responses(
        (status = 200, description = "Article retrieved successfully", body = ApiResponse<ArticleResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Article not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_article(
    user: CurrentUser,
    Path(article_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ArticleResponse>>, ApiError> {
    let article = find_owned_article(&state.db, user.id, article_id).await?;
    Ok(Json(ApiResponse::new(
        ArticleResponse::from(article),
        "Article retrieved successfully",
    )))
}

/// Update an article
#[utoipa::path(
    patch,
    path = "/api/articles/{article_id}",
    tag = "articles",
    params(
        ("article_id" = Uuid, Path, description = "Article ID"),
    ),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Article updated successfully", body = ApiResponse<ArticleResponse>),
        (status = 400, description = "Invalid request or foreign keyword", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Article not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_article(
    user: CurrentUser,
    Path(article_id): Path<Uuid>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<UpdateArticleRequest>,
) -> Result<Json<ApiResponse<ArticleResponse>>, ApiError> {
    trace!("Entering update_article function for article_id: {}", article_id);
    let article = find_owned_article(&state.db, user.id, article_id).await?;

    let status = request.status.unwrap_or(article.status);
    let scheduled_at = request.scheduled_at.unwrap_or(article.scheduled_at);
    check_schedule(status, scheduled_at)?;

    let txn = state.db.begin().await?;
    if let Some(Some(keyword_id)) = request.keyword_id {
        if article.keyword_id != Some(keyword_id) {
            attach_keyword(&txn, article.project_id, keyword_id).await?;
        }
    }

    let stamp_published = status == ArticleStatus::Published && article.published_at.is_none();
    let mut active: article::ActiveModel = article.into();
    if let Some(title) = request.title {
        active.title = Set(title);
    }
    if let Some(content) = request.content {
        active.word_count = Set(count_words(&content));
        active.content = Set(content);
    }
    if let Some(keyword_id) = request.keyword_id {
        active.keyword_id = Set(keyword_id);
    }
    if let Some(seo_score) = request.seo_score {
        active.seo_score = Set(seo_score);
    }
    if let Some(featured_image_url) = request.featured_image_url {
        active.featured_image_url = Set(featured_image_url);
    }
    active.status = Set(status);
    active.scheduled_at = Set(scheduled_at);
    if stamp_published {
        active.published_at = Set(Some(Utc::now()));
    }

    let updated = active.update(&txn).await?;
    txn.commit().await?;

    info!("Article {} updated, status {:?}", updated.id, updated.status);
    Ok(Json(ApiResponse::new(
        ArticleResponse::from(updated),
        "Article updated successfully",
    )))
}

/// Delete an article
#[utoipa::path(
    delete,
    path = "/api/articles/{article_id}",
    tag = "articles",
    params(
        ("article_id" = Uuid, Path, description = "Article ID"),
    ),
    responses(
        (status = 200, description = "Article deleted successfully"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Article not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_article(
    user: CurrentUser,
    Path(article_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let article = find_owned_article(&state.db, user.id, article_id).await?;
    article.delete(&state.db).await?;

    info!("Article {} deleted", article_id);
    Ok(Json(ApiResponse::new((), "Article deleted successfully")))
}
