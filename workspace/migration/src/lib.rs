pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_and_projects;
mod m20240101_000002_create_content_tables;
mod m20240115_000001_create_integrations;
mod m20240301_000001_add_integration_refresh_token;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_and_projects::Migration),
            Box::new(m20240101_000002_create_content_tables::Migration),
            Box::new(m20240115_000001_create_integrations::Migration),
            Box::new(m20240301_000001_add_integration_refresh_token::Migration),
        ]
    }
}
