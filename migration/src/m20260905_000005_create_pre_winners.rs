use sea_orm_migration::prelude::*;

use super::m20260901_000002_create_giveaways::Giveaways;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(PreWinners::Table)
          .if_not_exists()
          .col(ColumnDef::new(PreWinners::GiveawayId).big_integer().not_null())
          .col(ColumnDef::new(PreWinners::UserId).big_integer().not_null())
          .col(ColumnDef::new(PreWinners::Position).integer().not_null())
          .col(ColumnDef::new(PreWinners::Username).string().null())
          .col(ColumnDef::new(PreWinners::Avatar).string().null())
          .col(ColumnDef::new(PreWinners::ExpiresAt).date_time().not_null())
          .primary_key(
            Index::create()
              .col(PreWinners::GiveawayId)
              .col(PreWinners::UserId),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_pre_winners_giveaway")
              .from(PreWinners::Table, PreWinners::GiveawayId)
              .to(Giveaways::Table, Giveaways::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(PreWinners::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum PreWinners {
  Table,
  GiveawayId,
  UserId,
  Position,
  Username,
  Avatar,
  ExpiresAt,
}
