use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
  Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum WinStatus {
  #[sea_orm(string_value = "pending")]
  Pending,
  #[sea_orm(string_value = "distributed")]
  Distributed,
  #[sea_orm(string_value = "cancelled")]
  Cancelled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wins")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub giveaway_id: i64,
  pub user_id: i64,
  pub prize_id: i64,
  pub place: i32,
  pub status: WinStatus,
  pub created_at: DateTime,
  pub received_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
