use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Json,
};
use chrono::Utc;
use model::entities::integration::{self, Platform};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::schemas::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WebhookQuery {
    /// Integration the event belongs to
    pub integration_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    PostPublished,
    PostUpdated,
    PostDeleted,
}

/// The post an event refers to, as WordPress describes it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemotePost {
    /// WordPress post ID
    pub id: i64,
    pub title: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    /// Last modification time as reported by WordPress
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    pub event: WebhookEvent,
    pub post: RemotePost,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    pub event: WebhookEvent,
    pub integration_id: Uuid,
}

/// Receive a content event from the WordPress plugin
///
/// The integration is resolved before the body is read. Events only touch
/// the integration's sync time, so a replayed event has the same effect as
/// the first delivery.
#[utoipa::path(
    post,
    path = "/api/webhooks/wordpress",
    tag = "webhooks",
    params(WebhookQuery),
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Malformed event", body = ErrorResponse),
        (status = 401, description = "integration_id missing", body = ErrorResponse),
        (status = 404, description = "Integration not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, body))]
pub async fn wordpress_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let Some(raw_id) = query.integration_id.filter(|id| !id.is_empty()) else {
        warn!("Webhook without integration_id");
        return Err(ApiError::Unauthorized("integration_id is required".to_string()));
    };
    let integration_id = Uuid::parse_str(&raw_id).map_err(|_| {
        warn!("Webhook with malformed integration_id '{}'", raw_id);
        ApiError::NotFound("Integration")
    })?;

    let integration = integration::Entity::find_by_id(integration_id)
        .filter(integration::Column::Platform.eq(Platform::Wordpress))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("Webhook for unknown integration {}", integration_id);
            ApiError::NotFound("Integration")
        })?;

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        warn!("Malformed webhook body for integration {}: {}", integration_id, e);
        ApiError::BadRequest(format!("Invalid webhook payload: {}", e))
    })?;
    debug!("Webhook payload: {:?}", payload);

    if !integration.is_active {
        debug!("Integration {} is inactive, recording event anyway", integration_id);
    }

    let mut active: integration::ActiveModel = integration.into();
    active.last_sync_at = Set(Some(Utc::now()));
    active.update(&state.db).await?;

    info!(
        event = ?payload.event,
        post_id = payload.post.id,
        "WordPress event received for integration {}",
        integration_id
    );
    Ok(Json(WebhookAck {
        received: true,
        event: payload.event,
        integration_id,
    }))
}
