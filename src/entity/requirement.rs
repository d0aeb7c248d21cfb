use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
  Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
  #[sea_orm(string_value = "subscription")]
  Subscription,
  #[sea_orm(string_value = "boost")]
  Boost,
  #[sea_orm(string_value = "custom")]
  Custom,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "requirements")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub giveaway_id: i64,
  pub kind: RequirementKind,
  /// `@username` or numeric chat id of the channel to check
  pub channel: Option<String>,
  pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
