//! Thin clients for the publishing platforms. The only operation is a
//! connection test that proves stored credentials work.

mod shopify;
mod webflow;
mod wordpress;

use async_trait::async_trait;
use model::credentials::PlatformCredentials;
use serde::Serialize;
use serde_json::Value;
use std::{fmt, time::Duration};
use thiserror::Error;
use tracing::{debug, instrument};
use utoipa::ToSchema;

/// Outcome of a connection test.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
    /// Whatever the platform told us about the connected site
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("missing credential field '{0}'")]
    MissingField(&'static str),

    #[error("request to {platform} failed: {source}")]
    Http {
        platform: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{platform} rejected the credentials with status {status}")]
    Rejected { platform: &'static str, status: u16 },
}

#[async_trait]
pub trait PlatformClient: Send + Sync + fmt::Debug {
    async fn test_connection(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<ConnectionReport, PlatformError>;
}

/// reqwest-backed client talking to the real platform APIs.
#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    http: reqwest::Client,
}

impl HttpPlatformClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("seoflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    #[instrument(skip(self, credentials), fields(platform = credentials.platform().as_str()))]
    async fn test_connection(
        &self,
        credentials: &PlatformCredentials,
    ) -> Result<ConnectionReport, PlatformError> {
        debug!("Testing platform connection");
        match credentials {
            PlatformCredentials::Wordpress(c) => wordpress::test_connection(&self.http, c).await,
            PlatformCredentials::Shopify(c) => shopify::test_connection(&self.http, c).await,
            PlatformCredentials::Webflow(c) => webflow::test_connection(&self.http, c).await,
        }
    }
}

/// Turns a non-success status into [`PlatformError::Rejected`] and parses
/// the JSON body of a successful one.
async fn json_or_rejected(
    platform: &'static str,
    response: reqwest::Response,
) -> Result<Value, PlatformError> {
    let status = response.status();
    if !status.is_success() {
        return Err(PlatformError::Rejected {
            platform,
            status: status.as_u16(),
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|source| PlatformError::Http { platform, source })
}
