use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::auth::{AuthorizationCodeSigner, SessionVerifier};
use crate::config::AppConfig;
use crate::platforms::{ConnectionReport, PlatformClient};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    /// Issues and verifies session tokens
    pub sessions: Arc<dyn SessionVerifier>,
    /// Signs WordPress authorization codes
    pub codes: AuthorizationCodeSigner,
    /// Outbound client for publishing platforms
    pub platforms: Arc<dyn PlatformClient>,
    /// Session tokens revoked by logout
    pub revoked_sessions: Cache<String, ()>,
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Field-level detail for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::get_session,
        crate::handlers::auth::get_linked_accounts,
        crate::handlers::projects::create_project,
        crate::handlers::projects::get_projects,
        crate::handlers::projects::get_project,
        crate::handlers::projects::update_project,
        crate::handlers::projects::delete_project,
        crate::handlers::projects::get_project_stats,
        crate::handlers::keywords::create_keyword,
        crate::handlers::keywords::create_keywords_bulk,
        crate::handlers::keywords::get_keywords,
        crate::handlers::keywords::get_keyword,
        crate::handlers::keywords::update_keyword,
        crate::handlers::keywords::delete_keyword,
        crate::handlers::articles::create_article,
        crate::handlers::articles::get_articles,
        crate::handlers::articles::get_article,
        crate::handlers::articles::update_article,
        crate::handlers::articles::delete_article,
        crate::handlers::backlinks::create_backlink,
        crate::handlers::backlinks::get_backlinks,
        crate::handlers::backlinks::get_backlink,
        crate::handlers::backlinks::update_backlink,
        crate::handlers::backlinks::delete_backlink,
        crate::handlers::integrations::attach_integration,
        crate::handlers::integrations::get_integrations,
        crate::handlers::integrations::get_integration,
        crate::handlers::integrations::update_integration,
        crate::handlers::integrations::delete_integration,
        crate::handlers::integrations::regenerate_integration_key,
        crate::handlers::integrations::test_integration,
        crate::handlers::integrations::validate_integration_key,
        crate::handlers::wordpress::authorize,
        crate::handlers::wordpress::exchange_token,
        crate::handlers::wordpress::download_plugin,
        crate::handlers::webhooks::wordpress_webhook,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            ConnectionReport,
            model::entities::keyword::KeywordStatus,
            model::entities::article::ArticleStatus,
            model::entities::backlink::BacklinkStatus,
            model::entities::integration::Platform,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::UserResponse,
            crate::handlers::auth::SessionResponse,
            crate::handlers::auth::LinkedAccountResponse,
            crate::handlers::projects::CreateProjectRequest,
            crate::handlers::projects::UpdateProjectRequest,
            crate::handlers::projects::ProjectResponse,
            crate::handlers::projects::ProjectStatsResponse,
            crate::handlers::projects::KeywordCounts,
            crate::handlers::projects::ArticleCounts,
            crate::handlers::projects::BacklinkCounts,
            crate::handlers::keywords::CreateKeywordRequest,
            crate::handlers::keywords::BulkCreateKeywordsRequest,
            crate::handlers::keywords::BulkKeywordItem,
            crate::handlers::keywords::UpdateKeywordRequest,
            crate::handlers::keywords::KeywordResponse,
            crate::handlers::articles::CreateArticleRequest,
            crate::handlers::articles::UpdateArticleRequest,
            crate::handlers::articles::ArticleResponse,
            crate::handlers::backlinks::CreateBacklinkRequest,
            crate::handlers::backlinks::UpdateBacklinkRequest,
            crate::handlers::backlinks::BacklinkResponse,
            crate::handlers::integrations::AttachIntegrationRequest,
            crate::handlers::integrations::UpdateIntegrationRequest,
            crate::handlers::integrations::IntegrationResponse,
            crate::handlers::integrations::ValidateKeyResponse,
            crate::handlers::integrations::InvalidKeyResponse,
            crate::handlers::integrations::KeyProjectSummary,
            crate::handlers::wordpress::TokenRequest,
            crate::handlers::wordpress::TokenResponse,
            crate::handlers::wordpress::OAuthErrorResponse,
            crate::handlers::webhooks::WebhookPayload,
            crate::handlers::webhooks::WebhookEvent,
            crate::handlers::webhooks::RemotePost,
            crate::handlers::webhooks::WebhookAck,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and sessions"),
        (name = "projects", description = "Tracked websites"),
        (name = "keywords", description = "Keyword research and planning"),
        (name = "articles", description = "Article drafts and publishing state"),
        (name = "backlinks", description = "Backlink tracking"),
        (name = "integrations", description = "Publishing platform integrations and keys"),
        (name = "wordpress", description = "WordPress plugin authorization and download"),
        (name = "webhooks", description = "Inbound platform events"),
    ),
    info(
        title = "SeoFlow API",
        description = "SEO workspace API - projects, keyword planning, articles, backlinks and publishing integrations",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
