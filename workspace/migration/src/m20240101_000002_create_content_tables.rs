use sea_orm_migration::{prelude::*, schema::*};

use crate::m20240101_000001_create_users_and_projects::Projects;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create keywords table
        manager
            .create_table(
                Table::create()
                    .table(Keywords::Table)
                    .if_not_exists()
                    .col(pk_uuid(Keywords::Id))
                    .col(uuid(Keywords::ProjectId))
                    .col(string(Keywords::Keyword))
                    .col(integer_null(Keywords::SearchVolume))
                    .col(integer_null(Keywords::Difficulty))
                    .col(date_null(Keywords::PlannedDate))
                    .col(string_len(Keywords::Status, 20).default("unplanned"))
                    .col(boolean(Keywords::Starred).default(false))
                    .col(timestamp_with_time_zone(Keywords::CreatedAt))
                    .col(timestamp_with_time_zone(Keywords::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_keyword_project")
                            .from(Keywords::Table, Keywords::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_keywords_project_status")
                    .table(Keywords::Table)
                    .col(Keywords::ProjectId)
                    .col(Keywords::Status)
                    .to_owned(),
            )
            .await?;

        // Create articles table
        manager
            .create_table(
                Table::create()
                    .table(Articles::Table)
                    .if_not_exists()
                    .col(pk_uuid(Articles::Id))
                    .col(uuid(Articles::ProjectId))
                    .col(uuid_null(Articles::KeywordId))
                    .col(string(Articles::Title))
                    .col(text(Articles::Content))
                    .col(string_len(Articles::Status, 20).default("draft"))
                    .col(integer_null(Articles::SeoScore))
                    .col(integer(Articles::WordCount).default(0))
                    .col(string_null(Articles::FeaturedImageUrl))
                    .col(timestamp_with_time_zone_null(Articles::ScheduledAt))
                    .col(timestamp_with_time_zone_null(Articles::PublishedAt))
                    .col(timestamp_with_time_zone(Articles::CreatedAt))
                    .col(timestamp_with_time_zone(Articles::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_article_project")
                            .from(Articles::Table, Articles::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_article_keyword")
                            .from(Articles::Table, Articles::KeywordId)
                            .to(Keywords::Table, Keywords::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create backlinks table
        manager
            .create_table(
                Table::create()
                    .table(Backlinks::Table)
                    .if_not_exists()
                    .col(pk_uuid(Backlinks::Id))
                    .col(uuid(Backlinks::ProjectId))
                    .col(string(Backlinks::SourceUrl))
                    .col(string(Backlinks::TargetUrl))
                    .col(string_null(Backlinks::AnchorText))
                    .col(string_len(Backlinks::Status, 20).default("pending"))
                    .col(timestamp_with_time_zone(Backlinks::CreatedAt))
                    .col(timestamp_with_time_zone(Backlinks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_backlink_project")
                            .from(Backlinks::Table, Backlinks::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Backlinks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Articles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Keywords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Keywords {
    Table,
    Id,
    ProjectId,
    Keyword,
    SearchVolume,
    Difficulty,
    PlannedDate,
    Status,
    Starred,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Articles {
    Table,
    Id,
    ProjectId,
    KeywordId,
    Title,
    Content,
    Status,
    SeoScore,
    WordCount,
    FeaturedImageUrl,
    ScheduledAt,
    PublishedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Backlinks {
    Table,
    Id,
    ProjectId,
    SourceUrl,
    TargetUrl,
    AnchorText,
    Status,
    CreatedAt,
    UpdatedAt,
}
