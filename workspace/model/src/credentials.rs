//! Per-platform credential shapes stored in `integrations.credentials`.
//!
//! Each platform has its own struct and the stored JSON carries a `platform`
//! tag, so a row can never hold WordPress fields under a Shopify integration.
//! Incoming payloads are parsed against the integration's platform at write
//! time; unknown fields are rejected.

use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::entities::integration::Platform;

/// Errors raised while parsing or merging credentials.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("credentials must be a JSON object")]
    NotAnObject,

    #[error("credentials are tagged '{found}' but the integration platform is '{expected}'")]
    PlatformMismatch { expected: String, found: String },

    #[error("invalid {platform} credentials: {message}")]
    Shape { platform: String, message: String },

    #[error("'{field}' is issued by the server and cannot be supplied")]
    ServerManaged { field: &'static str },

    #[error("{platform} credentials require '{field}'")]
    MissingField { platform: String, field: &'static str },
}

/// WordPress fields minted by the token endpoint. The stored refresh token
/// must match the indexed `integrations.refresh_token` column.
const WORDPRESS_SERVER_FIELDS: [&str; 3] = ["access_token", "refresh_token", "token_expires_at"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WordPressCredentials {
    pub site_url: Option<String>,
    pub username: Option<String>,
    pub application_password: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShopifyCredentials {
    pub shop_domain: Option<String>,
    pub access_token: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebflowCredentials {
    pub site_id: Option<String>,
    pub api_token: Option<String>,
}

/// Credentials of one integration, tagged by platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PlatformCredentials {
    Wordpress(WordPressCredentials),
    Shopify(ShopifyCredentials),
    Webflow(WebflowCredentials),
}

impl PlatformCredentials {
    /// Empty credentials for a freshly attached integration.
    pub fn empty(platform: Platform) -> Self {
        match platform {
            Platform::Wordpress => Self::Wordpress(WordPressCredentials::default()),
            Platform::Shopify => Self::Shopify(ShopifyCredentials::default()),
            Platform::Webflow => Self::Webflow(WebflowCredentials::default()),
        }
    }

    /// Parses an untrusted JSON object as credentials for `platform`.
    ///
    /// A `platform` key inside the object is optional, but when present it
    /// must agree with the integration's platform. WordPress plugin tokens
    /// are rejected here; only the token endpoint writes them.
    pub fn parse(platform: Platform, value: Value) -> Result<Self, CredentialsError> {
        let Value::Object(mut fields) = value else {
            return Err(CredentialsError::NotAnObject);
        };

        if let Some(tag) = fields.remove("platform") {
            let found = tag.as_str().unwrap_or_default().to_string();
            if found != platform.as_str() {
                return Err(CredentialsError::PlatformMismatch {
                    expected: platform.as_str().to_string(),
                    found,
                });
            }
        }

        if platform == Platform::Wordpress {
            if let Some(field) = WORDPRESS_SERVER_FIELDS
                .iter()
                .copied()
                .find(|field| fields.contains_key(*field))
            {
                return Err(CredentialsError::ServerManaged { field });
            }
        }

        let shape_error = |e: serde_json::Error| CredentialsError::Shape {
            platform: platform.as_str().to_string(),
            message: e.to_string(),
        };
        let fields = Value::Object(fields);

        let parsed = match platform {
            Platform::Wordpress => {
                Self::Wordpress(serde_json::from_value(fields).map_err(shape_error)?)
            }
            Platform::Shopify => Self::Shopify(serde_json::from_value(fields).map_err(shape_error)?),
            Platform::Webflow => Self::Webflow(serde_json::from_value(fields).map_err(shape_error)?),
        };

        parsed.check_urls()?;
        Ok(parsed)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty(self.platform())
    }

    /// Checks the fields a platform cannot be reached without.
    ///
    /// Integrations start out empty, so this only applies once a client has
    /// supplied credentials.
    pub fn check_required(&self) -> Result<(), CredentialsError> {
        let missing = match self {
            Self::Wordpress(c) if c.site_url.is_none() => Some("site_url"),
            Self::Shopify(c) if c.shop_domain.is_none() => Some("shop_domain"),
            _ => None,
        };
        match missing {
            Some(field) => Err(CredentialsError::MissingField {
                platform: self.platform().as_str().to_string(),
                field,
            }),
            None => Ok(()),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Self::Wordpress(_) => Platform::Wordpress,
            Self::Shopify(_) => Platform::Shopify,
            Self::Webflow(_) => Platform::Webflow,
        }
    }

    /// Merges `incoming` over `self`: every field set in `incoming` wins,
    /// every field it leaves unset keeps its stored value.
    pub fn merge(self, incoming: PlatformCredentials) -> Result<Self, CredentialsError> {
        match (self, incoming) {
            (Self::Wordpress(old), Self::Wordpress(new)) => Ok(Self::Wordpress(WordPressCredentials {
                site_url: new.site_url.or(old.site_url),
                username: new.username.or(old.username),
                application_password: new.application_password.or(old.application_password),
                access_token: new.access_token.or(old.access_token),
                refresh_token: new.refresh_token.or(old.refresh_token),
                token_expires_at: new.token_expires_at.or(old.token_expires_at),
            })),
            (Self::Shopify(old), Self::Shopify(new)) => Ok(Self::Shopify(ShopifyCredentials {
                shop_domain: new.shop_domain.or(old.shop_domain),
                access_token: new.access_token.or(old.access_token),
                api_version: new.api_version.or(old.api_version),
            })),
            (Self::Webflow(old), Self::Webflow(new)) => Ok(Self::Webflow(WebflowCredentials {
                site_id: new.site_id.or(old.site_id),
                api_token: new.api_token.or(old.api_token),
            })),
            (old, new) => Err(CredentialsError::PlatformMismatch {
                expected: old.platform().as_str().to_string(),
                found: new.platform().as_str().to_string(),
            }),
        }
    }

    /// Copy safe to return to clients: secrets are masked down to their
    /// last four characters.
    pub fn redacted(&self) -> Self {
        match self {
            Self::Wordpress(c) => Self::Wordpress(WordPressCredentials {
                site_url: c.site_url.clone(),
                username: c.username.clone(),
                application_password: c.application_password.as_deref().map(mask),
                access_token: c.access_token.as_deref().map(mask),
                refresh_token: c.refresh_token.as_deref().map(mask),
                token_expires_at: c.token_expires_at,
            }),
            Self::Shopify(c) => Self::Shopify(ShopifyCredentials {
                shop_domain: c.shop_domain.clone(),
                access_token: c.access_token.as_deref().map(mask),
                api_version: c.api_version.clone(),
            }),
            Self::Webflow(c) => Self::Webflow(WebflowCredentials {
                site_id: c.site_id.clone(),
                api_token: c.api_token.as_deref().map(mask),
            }),
        }
    }

    fn check_urls(&self) -> Result<(), CredentialsError> {
        if let Self::Wordpress(WordPressCredentials { site_url: Some(url), .. }) = self {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(CredentialsError::Shape {
                    platform: Platform::Wordpress.as_str().to_string(),
                    message: format!("site_url '{}' must be an http(s) URL", url),
                });
            }
        }
        Ok(())
    }
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
