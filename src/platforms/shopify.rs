use model::credentials::ShopifyCredentials;
use serde_json::json;

use super::{json_or_rejected, ConnectionReport, PlatformError};

const PLATFORM: &str = "shopify";
const DEFAULT_API_VERSION: &str = "2024-01";

pub(super) async fn test_connection(
    http: &reqwest::Client,
    credentials: &ShopifyCredentials,
) -> Result<ConnectionReport, PlatformError> {
    let shop_domain = credentials
        .shop_domain
        .as_deref()
        .ok_or(PlatformError::MissingField("shop_domain"))?;
    let access_token = credentials
        .access_token
        .as_deref()
        .ok_or(PlatformError::MissingField("access_token"))?;
    let api_version = credentials.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION);

    let response = http
        .get(format!("https://{}/admin/api/{}/shop.json", shop_domain, api_version))
        .header("X-Shopify-Access-Token", access_token)
        .send()
        .await
        .map_err(|source| PlatformError::Http { platform: PLATFORM, source })?;
    let body = json_or_rejected(PLATFORM, response).await?;

    Ok(ConnectionReport {
        success: true,
        message: format!("Connected to Shopify store {}", shop_domain),
        details: Some(json!({
            "shop_name": body.pointer("/shop/name"),
            "plan": body.pointer("/shop/plan_name"),
        })),
    })
}
