use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use moka::future::Cache;
use sea_orm::Database;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::auth::{AuthorizationCodeSigner, JwtSessionVerifier};
use crate::platforms::HttpPlatformClient;
use crate::schemas::AppState;

const DEFAULT_SESSION_SECRET: &str = "insecure-development-secret-change-me";

/// Runtime configuration.
///
/// Values are layered: built-in defaults, then an optional `seoflow.toml`
/// (or any format the `config` crate understands) in the working directory,
/// then `SEOFLOW_*` environment variables, e.g. `SEOFLOW_DATABASE_URL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    /// HMAC secret for session cookies and WordPress authorization codes.
    pub session_secret: String,
    pub session_ttl_hours: i64,
    /// Adds the `Secure` attribute to the session cookie.
    pub cookie_secure: bool,
    /// Directory zipped up by the WordPress plugin download endpoint.
    pub plugin_dir: PathBuf,
    pub authorization_code_ttl_secs: i64,
    pub access_token_ttl_secs: i64,
    /// Timeout for outbound calls to publishing platforms.
    pub platform_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://seoflow.db?mode=rwc".to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            session_secret: DEFAULT_SESSION_SECRET.to_string(),
            session_ttl_hours: 24 * 30,
            cookie_secure: false,
            plugin_dir: PathBuf::from("plugins/wordpress"),
            authorization_code_ttl_secs: 600,
            access_token_ttl_secs: 3600,
            platform_timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, file and environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config: AppConfig = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("seoflow").required(false))
            .add_source(Environment::with_prefix("SEOFLOW").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.session_secret == DEFAULT_SESSION_SECRET {
            warn!("SEOFLOW_SESSION_SECRET is not set, using the insecure development secret");
        }

        Ok(config)
    }
}

/// Initialize application state from a loaded configuration
pub async fn initialize_app_state(config: AppConfig) -> Result<AppState> {
    info!("Connecting to database: {}", config.database_url);
    let db = Database::connect(&config.database_url).await?;

    let sessions = JwtSessionVerifier::new(
        config.session_secret.as_bytes(),
        chrono::Duration::hours(config.session_ttl_hours),
    );
    let codes = AuthorizationCodeSigner::new(
        config.session_secret.as_bytes(),
        chrono::Duration::seconds(config.authorization_code_ttl_secs),
    );
    let platforms = HttpPlatformClient::new(Duration::from_secs(config.platform_timeout_secs))?;

    // Logged-out sessions stay revoked for as long as they could still verify
    let revoked_sessions = Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(config.session_ttl_hours.max(1) as u64 * 3600))
        .build();

    debug!("Application state initialized");
    Ok(AppState {
        db,
        config: Arc::new(config),
        sessions: Arc::new(sessions),
        codes,
        platforms: Arc::new(platforms),
        revoked_sessions,
    })
}
