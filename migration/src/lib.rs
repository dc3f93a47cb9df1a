pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_users;
mod m20260301_000002_create_uploads;
mod m20260301_000003_create_charts;
mod m20260301_000004_create_admin_settings;
mod m20260301_000005_create_usage_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_users::Migration),
            Box::new(m20260301_000002_create_uploads::Migration),
            Box::new(m20260301_000003_create_charts::Migration),
            Box::new(m20260301_000004_create_admin_settings::Migration),
            Box::new(m20260301_000005_create_usage_logs::Migration),
        ]
    }
}
