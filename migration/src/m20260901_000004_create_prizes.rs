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
          .table(Prizes::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Prizes::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Prizes::OwnerId).big_integer().not_null())
          .col(ColumnDef::new(Prizes::Name).string().not_null())
          .col(ColumnDef::new(Prizes::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(Wins::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Wins::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Wins::GiveawayId).big_integer().not_null())
          .col(ColumnDef::new(Wins::UserId).big_integer().not_null())
          .col(ColumnDef::new(Wins::PrizeId).big_integer().not_null())
          .col(ColumnDef::new(Wins::Place).integer().not_null())
          .col(
            ColumnDef::new(Wins::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Wins::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Wins::ReceivedAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_wins_giveaway")
              .from(Wins::Table, Wins::GiveawayId)
              .to(Giveaways::Table, Giveaways::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_wins_giveaway_place")
          .table(Wins::Table)
          .col(Wins::GiveawayId)
          .col(Wins::Place)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(Transfers::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Transfers::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Transfers::WinId).big_integer().not_null())
          .col(ColumnDef::new(Transfers::PrizeId).big_integer().not_null())
          .col(ColumnDef::new(Transfers::FromUser).big_integer().not_null())
          .col(ColumnDef::new(Transfers::ToUser).big_integer().not_null())
          .col(ColumnDef::new(Transfers::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_transfers_win")
              .from(Transfers::Table, Transfers::WinId)
              .to(Wins::Table, Wins::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Transfers::Table).to_owned()).await?;
    manager.drop_table(Table::drop().table(Wins::Table).to_owned()).await?;
    manager.drop_table(Table::drop().table(Prizes::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Prizes {
  Table,
  Id,
  OwnerId,
  Name,
  CreatedAt,
}

#[derive(DeriveIden)]
pub enum Wins {
  Table,
  Id,
  GiveawayId,
  UserId,
  PrizeId,
  Place,
  Status,
  CreatedAt,
  ReceivedAt,
}

#[derive(DeriveIden)]
pub enum Transfers {
  Table,
  Id,
  WinId,
  PrizeId,
  FromUser,
  ToUser,
  CreatedAt,
}
