pub use sea_orm_migration::prelude::*;

mod m20260219_000001_create_contractors;
mod m20260219_000002_create_app_users;
mod m20260302_000003_index_contractor_status;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260219_000001_create_contractors::Migration),
            Box::new(m20260219_000002_create_app_users::Migration),
            Box::new(m20260302_000003_index_contractor_status::Migration),
        ]
    }
}
