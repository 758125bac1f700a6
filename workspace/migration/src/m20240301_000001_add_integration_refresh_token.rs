use sea_orm_migration::prelude::*;

use crate::m20240115_000001_create_integrations::Integrations;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Lifts the WordPress refresh token out of the credentials JSON into its
/// own uniquely indexed column so the token endpoint can find it directly.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Integrations::Table)
                    .add_column(ColumnDef::new(Alias::new("refresh_token")).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_integrations_refresh_token")
                    .table(Integrations::Table)
                    .col(Alias::new("refresh_token"))
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_integrations_refresh_token")
                    .table(Integrations::Table)
                    .to_owned(),
            )
            .await?;

        // Note: SQLite only supports DROP COLUMN from 3.35 onwards
        manager
            .alter_table(
                Table::alter()
                    .table(Integrations::Table)
                    .drop_column(Alias::new("refresh_token"))
                    .to_owned(),
            )
            .await
    }
}
