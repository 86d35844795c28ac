pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_profiles_table;
mod m20250301_000002_create_refresh_tokens_table;
mod m20250302_000003_create_projects_table;
mod m20250303_000004_create_files_table;
mod m20250303_000005_create_file_versions_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_profiles_table::Migration),
            Box::new(m20250301_000002_create_refresh_tokens_table::Migration),
            Box::new(m20250302_000003_create_projects_table::Migration),
            Box::new(m20250303_000004_create_files_table::Migration),
            Box::new(m20250303_000005_create_file_versions_table::Migration),
        ]
    }
}
