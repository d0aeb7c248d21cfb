use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pre_winners")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub giveaway_id: i64,
  #[sea_orm(primary_key, auto_increment = false)]
  pub user_id: i64,
  /// Upload order, becomes the winner place.
  pub position: i32,
  pub username: Option<String>,
  pub avatar: Option<String>,
  pub expires_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
