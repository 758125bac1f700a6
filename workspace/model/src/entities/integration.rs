use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::credentials::PlatformCredentials;

/// Prefix of every minted integration key.
pub const INTEGRATION_KEY_PREFIX: &str = "sfk_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[sea_orm(string_value = "wordpress")]
    Wordpress,
    #[sea_orm(string_value = "shopify")]
    Shopify,
    #[sea_orm(string_value = "webflow")]
    Webflow,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Wordpress => "wordpress",
            Platform::Shopify => "shopify",
            Platform::Webflow => "webflow",
        }
    }
}

/// Binding of a project to one publishing platform.
///
/// At most one row exists per (project, platform). `integration_key` is the
/// bearer credential handed to external plugins; `refresh_token` mirrors the
/// WordPress refresh token so the token endpoint can look it up by index.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "integrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub platform: Platform,
    #[sea_orm(column_type = "Json")]
    pub credentials: PlatformCredentials,
    pub is_active: bool,
    #[sea_orm(unique)]
    pub integration_key: String,
    #[sea_orm(unique)]
    pub refresh_token: Option<String>,
    pub last_sync_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "Cascade"
    )]
    Project,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();
        if insert {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

/// Mints a fresh integration key: the prefix followed by 64 hex characters
/// drawn from two v4 UUIDs (244 random bits).
pub fn generate_integration_key() -> String {
    format!(
        "{}{}{}",
        INTEGRATION_KEY_PREFIX,
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}
