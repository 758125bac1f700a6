use crate::handlers::{
    articles::{create_article, delete_article, get_article, get_articles, update_article},
    auth::{get_linked_accounts, get_session, login, logout, register},
    backlinks::{create_backlink, delete_backlink, get_backlink, get_backlinks, update_backlink},
    health::health_check,
    integrations::{
        attach_integration, delete_integration, get_integration, get_integrations,
        regenerate_integration_key, test_integration, update_integration,
        validate_integration_key,
    },
    keywords::{
        create_keyword, create_keywords_bulk, delete_keyword, get_keyword, get_keywords,
        update_keyword,
    },
    projects::{
        create_project, delete_project, get_project, get_project_stats, get_projects,
        update_project,
    },
    webhooks::wordpress_webhook,
    wordpress::{authorize, download_plugin, exchange_token},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Auth
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(get_session))
        .route("/api/auth/accounts", get(get_linked_accounts))
        // Projects
        .route("/api/projects", get(get_projects).post(create_project))
        .route(
            "/api/projects/:project_id",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/api/projects/:project_id/stats", get(get_project_stats))
        // Keywords
        .route("/api/keywords", get(get_keywords).post(create_keyword))
        .route("/api/keywords/bulk", post(create_keywords_bulk))
        .route(
            "/api/keywords/:keyword_id",
            get(get_keyword).patch(update_keyword).delete(delete_keyword),
        )
        // Articles
        .route("/api/articles", get(get_articles).post(create_article))
        .route(
            "/api/articles/:article_id",
            get(get_article).patch(update_article).delete(delete_article),
        )
        // Backlinks
        .route("/api/backlinks", get(get_backlinks).post(create_backlink))
        .route(
            "/api/backlinks/:backlink_id",
            get(get_backlink).patch(update_backlink).delete(delete_backlink),
        )
        // Integrations
        .route("/api/integrations", get(get_integrations).post(attach_integration))
        .route(
            "/api/integrations/validate-key",
            get(validate_integration_key).post(validate_integration_key),
        )
        .route(
            "/api/integrations/:integration_id",
            get(get_integration)
                .patch(update_integration)
                .delete(delete_integration),
        )
        .route(
            "/api/integrations/:integration_id/regenerate-key",
            post(regenerate_integration_key),
        )
        .route("/api/integrations/:integration_id/test", post(test_integration))
        // WordPress plugin
        .route("/api/wordpress/authorize", get(authorize))
        .route("/api/wordpress/token", post(exchange_token))
        .route("/api/wordpress/plugin", get(download_plugin))
        // Webhooks
        .route("/api/webhooks/wordpress", post(wordpress_webhook))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
