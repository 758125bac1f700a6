use model::credentials::WebflowCredentials;
use serde_json::json;

use super::{json_or_rejected, ConnectionReport, PlatformError};

const PLATFORM: &str = "webflow";
const API_BASE: &str = "https://api.webflow.com/v2";

pub(super) async fn test_connection(
    http: &reqwest::Client,
    credentials: &WebflowCredentials,
) -> Result<ConnectionReport, PlatformError> {
    let api_token = credentials
        .api_token
        .as_deref()
        .ok_or(PlatformError::MissingField("api_token"))?;

    let url = match &credentials.site_id {
        Some(site_id) => format!("{}/sites/{}", API_BASE, site_id),
        None => format!("{}/sites", API_BASE),
    };

    let response = http
        .get(url)
        .bearer_auth(api_token)
        .send()
        .await
        .map_err(|source| PlatformError::Http { platform: PLATFORM, source })?;
    let body = json_or_rejected(PLATFORM, response).await?;

    let details = match &credentials.site_id {
        Some(_) => json!({ "site_name": body.get("displayName") }),
        None => json!({
            "sites": body
                .get("sites")
                .and_then(|sites| sites.as_array())
                .map(|sites| sites.len())
                .unwrap_or(0),
        }),
    };

    Ok(ConnectionReport {
        success: true,
        message: "Connected to Webflow".to_string(),
        details: Some(details),
    })
}
