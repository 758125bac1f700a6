#[cfg(test)]
pub mod test_utils {
    use crate::auth::{AuthorizationCodeSigner, JwtSessionVerifier};
    use crate::config::AppConfig;
    use crate::platforms::{ConnectionReport, PlatformClient, PlatformError};
    use crate::router::create_router;
    use crate::schemas::AppState;
    use async_trait::async_trait;
    use axum::http::{header, HeaderName, HeaderValue};
    use axum::Router;
    use axum_test::{TestRequest, TestServer};
    use migration::{Migrator, MigratorTrait};
    use model::credentials::PlatformCredentials;
    use moka::future::Cache;
    use sea_orm::{Database, DatabaseConnection};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    pub const TEST_SECRET: &str = "test-secret";

    /// Platform client that answers without network access.
    #[derive(Debug, Clone, Copy)]
    pub struct StubPlatformClient {
        pub succeed: bool,
    }

    #[async_trait]
    impl PlatformClient for StubPlatformClient {
        async fn test_connection(
            &self,
            credentials: &PlatformCredentials,
        ) -> Result<ConnectionReport, PlatformError> {
            if self.succeed {
                Ok(ConnectionReport {
                    success: true,
                    message: format!("Connected to {}", credentials.platform().as_str()),
                    details: None,
                })
            } else {
                Err(PlatformError::Rejected {
                    platform: credentials.platform().as_str(),
                    status: 401,
                })
            }
        }
    }

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            session_secret: TEST_SECRET.to_string(),
            ..AppConfig::default()
        }
    }

    /// Create AppState for testing with the given configuration and platform client
    pub async fn setup_test_app_state_with(config: AppConfig, platforms: StubPlatformClient) -> AppState {
        let db = setup_test_db().await;

        AppState {
            db,
            sessions: Arc::new(JwtSessionVerifier::new(
                config.session_secret.as_bytes(),
                chrono::Duration::hours(config.session_ttl_hours),
            )),
            codes: AuthorizationCodeSigner::new(
                config.session_secret.as_bytes(),
                chrono::Duration::seconds(config.authorization_code_ttl_secs),
            ),
            config: Arc::new(config),
            platforms: Arc::new(platforms),
            revoked_sessions: Cache::new(100),
        }
    }

    pub async fn setup_test_app_state() -> AppState {
        setup_test_app_state_with(test_config(), StubPlatformClient { succeed: true }).await
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is taken from RUST_LOG and defaults to WARN.
    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> Router {
        let _guard = init_test_tracing();
        create_router(setup_test_app_state().await)
    }

    pub async fn setup_test_server() -> TestServer {
        TestServer::new(setup_test_app().await).unwrap()
    }

    pub fn server_for(state: AppState) -> TestServer {
        TestServer::new(create_router(state)).unwrap()
    }

    /// `Authorization: Bearer` header for a session token.
    pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
        (
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
    }

    /// Sends the request as the session's user.
    pub fn with_session(request: TestRequest, token: &str) -> TestRequest {
        let (name, value) = bearer(token);
        request.add_header(name, value)
    }

    /// Registers a user and returns their session token.
    pub async fn register_user(server: &TestServer, email: &str) -> String {
        let response = server
            .post("/api/auth/register")
            .json(&json!({ "email": email, "password": "correct horse battery" }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Creates a project for the session and returns its id.
    pub async fn create_project(server: &TestServer, token: &str, name: &str) -> String {
        let response = with_session(server.post("/api/projects"), token)
            .json(&json!({ "name": name, "website_url": "https://run.example.com" }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        body["data"]["id"].as_str().unwrap().to_string()
    }
}
