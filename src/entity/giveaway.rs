use chrono::TimeDelta;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
  Clone,
  Copy,
  Debug,
  PartialEq,
  Eq,
  Hash,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum GiveawayStatus {
  #[sea_orm(string_value = "active")]
  Active,
  /// Waiting for the creator to curate winners of a custom requirement.
  #[sea_orm(string_value = "pending_custom")]
  PendingCustom,
  #[sea_orm(string_value = "completed")]
  Completed,
  #[sea_orm(string_value = "cancelled")]
  Cancelled,
  #[sea_orm(string_value = "history")]
  History,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "giveaways")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub creator_id: i64,
  pub title: String,
  pub description: Option<String>,
  pub started_at: DateTime,
  pub duration_seconds: i64,
  /// Denormalized `started_at + duration_seconds`, indexed for discovery.
  pub ends_at: DateTime,
  /// 0 means unlimited
  pub max_participants: i32,
  pub winners_count: i32,
  pub status: GiveawayStatus,
  pub auto_distribute: bool,
  pub allow_tickets: bool,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

impl Model {
  pub fn end(&self) -> DateTime {
    self.started_at + TimeDelta::seconds(self.duration_seconds)
  }

  pub fn has_ended(&self, now: DateTime) -> bool {
    self.end() <= now
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
