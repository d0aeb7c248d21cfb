use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Giveaways::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Giveaways::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Giveaways::CreatorId).big_integer().not_null())
          .col(ColumnDef::new(Giveaways::Title).string().not_null())
          .col(ColumnDef::new(Giveaways::Description).text().null())
          .col(ColumnDef::new(Giveaways::StartedAt).date_time().not_null())
          .col(
            ColumnDef::new(Giveaways::DurationSeconds).big_integer().not_null(),
          )
          .col(ColumnDef::new(Giveaways::EndsAt).date_time().not_null())
          .col(
            ColumnDef::new(Giveaways::MaxParticipants)
              .integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Giveaways::WinnersCount).integer().not_null())
          .col(
            ColumnDef::new(Giveaways::Status)
              .string()
              .not_null()
              .default("active"),
          )
          .col(
            ColumnDef::new(Giveaways::AutoDistribute)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(Giveaways::AllowTickets)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Giveaways::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Giveaways::UpdatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_giveaways_status_ends_at")
          .table(Giveaways::Table)
          .col(Giveaways::Status)
          .col(Giveaways::EndsAt)
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(GiveawayPrizes::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(GiveawayPrizes::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(GiveawayPrizes::GiveawayId).big_integer().not_null(),
          )
          .col(ColumnDef::new(GiveawayPrizes::Place).integer().not_null())
          .col(ColumnDef::new(GiveawayPrizes::PrizeId).big_integer().not_null())
          .col(ColumnDef::new(GiveawayPrizes::PrizeType).string().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_giveaway_prizes_giveaway")
              .from(GiveawayPrizes::Table, GiveawayPrizes::GiveawayId)
              .to(Giveaways::Table, Giveaways::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(Requirements::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Requirements::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Requirements::GiveawayId).big_integer().not_null())
          .col(ColumnDef::new(Requirements::Kind).string().not_null())
          .col(ColumnDef::new(Requirements::Channel).string().null())
          .col(ColumnDef::new(Requirements::Description).text().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_requirements_giveaway")
              .from(Requirements::Table, Requirements::GiveawayId)
              .to(Giveaways::Table, Giveaways::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Requirements::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(GiveawayPrizes::Table).to_owned())
      .await?;
    manager.drop_table(Table::drop().table(Giveaways::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Giveaways {
  Table,
  Id,
  CreatorId,
  Title,
  Description,
  StartedAt,
  DurationSeconds,
  EndsAt,
  MaxParticipants,
  WinnersCount,
  Status,
  AutoDistribute,
  AllowTickets,
  CreatedAt,
  UpdatedAt,
}

#[derive(DeriveIden)]
pub enum GiveawayPrizes {
  Table,
  Id,
  GiveawayId,
  Place,
  PrizeId,
  PrizeType,
}

#[derive(DeriveIden)]
pub enum Requirements {
  Table,
  Id,
  GiveawayId,
  Kind,
  Channel,
  Description,
}
