use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger row of an internal prize handed from creator to winner.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub win_id: i64,
  pub prize_id: i64,
  pub from_user: i64,
  pub to_user: i64,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
