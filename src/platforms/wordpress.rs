use model::credentials::WordPressCredentials;
use serde_json::json;

use super::{json_or_rejected, ConnectionReport, PlatformError};

const PLATFORM: &str = "wordpress";

/// With an application password the authenticated user endpoint is queried,
/// otherwise only the public REST index is checked.
pub(super) async fn test_connection(
    http: &reqwest::Client,
    credentials: &WordPressCredentials,
) -> Result<ConnectionReport, PlatformError> {
    let site_url = credentials
        .site_url
        .as_deref()
        .ok_or(PlatformError::MissingField("site_url"))?
        .trim_end_matches('/');

    match (&credentials.username, &credentials.application_password) {
        (Some(username), Some(password)) => {
            let response = http
                .get(format!("{}/wp-json/wp/v2/users/me", site_url))
                .basic_auth(username, Some(password))
                .send()
                .await
                .map_err(|source| PlatformError::Http { platform: PLATFORM, source })?;
            let body = json_or_rejected(PLATFORM, response).await?;

            Ok(ConnectionReport {
                success: true,
                message: format!("Connected to {} as {}", site_url, username),
                details: Some(json!({
                    "user_id": body.get("id"),
                    "user_name": body.get("name"),
                })),
            })
        }
        _ => {
            let response = http
                .get(format!("{}/wp-json/", site_url))
                .send()
                .await
                .map_err(|source| PlatformError::Http { platform: PLATFORM, source })?;
            let body = json_or_rejected(PLATFORM, response).await?;

            Ok(ConnectionReport {
                success: true,
                message: format!("WordPress REST API reachable at {}", site_url),
                details: Some(json!({
                    "site_name": body.get("name"),
                    "authenticated": false,
                })),
            })
        }
    }
}
