use sea_orm_migration::prelude::*;

use super::m20260901_000002_create_giveaways::Giveaways;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    // user profiles are a cache, so entries carry no foreign key to `users`
    manager
      .create_table(
        Table::create()
          .table(Participants::Table)
          .if_not_exists()
          .col(ColumnDef::new(Participants::GiveawayId).big_integer().not_null())
          .col(ColumnDef::new(Participants::UserId).big_integer().not_null())
          .col(ColumnDef::new(Participants::JoinedAt).date_time().not_null())
          .primary_key(
            Index::create()
              .col(Participants::GiveawayId)
              .col(Participants::UserId),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_participants_giveaway")
              .from(Participants::Table, Participants::GiveawayId)
              .to(Giveaways::Table, Giveaways::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(Tickets::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Tickets::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Tickets::GiveawayId).big_integer().not_null())
          .col(ColumnDef::new(Tickets::UserId).big_integer().not_null())
          .col(ColumnDef::new(Tickets::Count).big_integer().not_null().default(0))
          .foreign_key(
            ForeignKey::create()
              .name("fk_tickets_giveaway")
              .from(Tickets::Table, Tickets::GiveawayId)
              .to(Giveaways::Table, Giveaways::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_tickets_giveaway_user")
          .table(Tickets::Table)
          .col(Tickets::GiveawayId)
          .col(Tickets::UserId)
          .unique()
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Tickets::Table).to_owned()).await?;
    manager
      .drop_table(Table::drop().table(Participants::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Participants {
  Table,
  GiveawayId,
  UserId,
  JoinedAt,
}

#[derive(DeriveIden)]
pub enum Tickets {
  Table,
  Id,
  GiveawayId,
  UserId,
  Count,
}
