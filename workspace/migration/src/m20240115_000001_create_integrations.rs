use sea_orm_migration::{prelude::*, schema::*};

use crate::m20240101_000001_create_users_and_projects::Projects;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Integrations::Table)
                    .if_not_exists()
                    .col(pk_uuid(Integrations::Id))
                    .col(uuid(Integrations::ProjectId))
                    .col(string_len(Integrations::Platform, 20))
                    .col(json(Integrations::Credentials))
                    .col(boolean(Integrations::IsActive).default(true))
                    .col(string(Integrations::IntegrationKey).unique_key())
                    .col(timestamp_with_time_zone_null(Integrations::LastSyncAt))
                    .col(timestamp_with_time_zone(Integrations::CreatedAt))
                    .col(timestamp_with_time_zone(Integrations::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_integration_project")
                            .from(Integrations::Table, Integrations::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One integration per (project, platform)
        manager
            .create_index(
                Index::create()
                    .name("idx_integrations_project_platform")
                    .table(Integrations::Table)
                    .col(Integrations::ProjectId)
                    .col(Integrations::Platform)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Integrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Integrations {
    Table,
    Id,
    ProjectId,
    Platform,
    Credentials,
    IsActive,
    IntegrationKey,
    LastSyncAt,
    CreatedAt,
    UpdatedAt,
}
