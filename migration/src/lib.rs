//! Database migrations using SeaORM

pub use sea_orm_migration::prelude::*;

mod m20260901_000001_create_users;
mod m20260901_000002_create_giveaways;
mod m20260901_000003_create_entries;
mod m20260901_000004_create_prizes;
mod m20260905_000005_create_pre_winners;
mod m20260905_000006_create_locks;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260901_000001_create_users::Migration),
      Box::new(m20260901_000002_create_giveaways::Migration),
      Box::new(m20260901_000003_create_entries::Migration),
      Box::new(m20260901_000004_create_prizes::Migration),
      Box::new(m20260905_000005_create_pre_winners::Migration),
      Box::new(m20260905_000006_create_locks::Migration),
    ]
  }
}
