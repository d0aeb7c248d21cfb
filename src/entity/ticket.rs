use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Draw weight of a participant; the row id fixes the weighted pool order.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub giveaway_id: i64,
  pub user_id: i64,
  pub count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
