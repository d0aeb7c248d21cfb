use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Slot place matching every place that has no slot of its own.
pub const ALL_PLACES: i32 = 0;

#[derive(
  Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PrizeKind {
  /// Held by the platform and transferable without the creator.
  #[sea_orm(string_value = "internal")]
  Internal,
  /// Delivered outside the platform, recorded only.
  #[sea_orm(string_value = "external")]
  External,
  /// Hand-delivered by the creator.
  #[sea_orm(string_value = "custom")]
  Custom,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "giveaway_prizes")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub giveaway_id: i64,
  pub place: i32,
  pub prize_id: i64,
  pub prize_type: PrizeKind,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
