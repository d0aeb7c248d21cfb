use sea_orm::sea_query::{Expr, Query};

use crate::{
  entity::{GiveawayStatus, giveaway, pre_winner},
  prelude::*,
};

/// A user the creator hand-picked, with the profile snapshot taken at upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub user_id: i64,
  pub username: Option<String>,
  pub avatar: Option<String>,
}

pub struct PreWinner<'a, C> {
  conn: &'a C,
}

impl<'a, C: ConnectionTrait> PreWinner<'a, C> {
  pub fn new(conn: &'a C) -> Self {
    Self { conn }
  }

  /// Replaces the stored list; upload order becomes the position.
  pub async fn replace(
    &self,
    giveaway_id: i64,
    candidates: &[Candidate],
    expires_at: DateTime,
  ) -> Result<()> {
    self.delete(giveaway_id).await?;

    if candidates.is_empty() {
      return Ok(());
    }

    let rows = candidates.iter().enumerate().map(|(i, candidate)| {
      pre_winner::ActiveModel {
        giveaway_id: Set(giveaway_id),
        user_id: Set(candidate.user_id),
        position: Set(i as i32 + 1),
        username: Set(candidate.username.clone()),
        avatar: Set(candidate.avatar.clone()),
        expires_at: Set(expires_at),
      }
    });

    pre_winner::Entity::insert_many(rows)
      .exec_without_returning(self.conn)
      .await?;

    Ok(())
  }

  /// The unexpired list in upload order; empty when none is stored.
  pub async fn get(
    &self,
    giveaway_id: i64,
    now: DateTime,
  ) -> Result<Vec<pre_winner::Model>> {
    let list = pre_winner::Entity::find()
      .filter(pre_winner::Column::GiveawayId.eq(giveaway_id))
      .filter(pre_winner::Column::ExpiresAt.gt(now))
      .order_by_asc(pre_winner::Column::Position)
      .all(self.conn)
      .await?;
    Ok(list)
  }

  pub async fn delete(&self, giveaway_id: i64) -> Result<u64> {
    let deleted = pre_winner::Entity::delete_many()
      .filter(pre_winner::Column::GiveawayId.eq(giveaway_id))
      .exec(self.conn)
      .await?;
    Ok(deleted.rows_affected)
  }

  pub async fn purge_expired(&self, now: DateTime) -> Result<u64> {
    let deleted = pre_winner::Entity::delete_many()
      .filter(pre_winner::Column::ExpiresAt.lte(now))
      .exec(self.conn)
      .await?;
    Ok(deleted.rows_affected)
  }

  /// Drops lists whose giveaway no longer waits for curation.
  pub async fn purge_settled(&self) -> Result<u64> {
    let pending = Query::select()
      .column(giveaway::Column::Id)
      .from(giveaway::Entity)
      .and_where(
        Expr::col(giveaway::Column::Status).eq(GiveawayStatus::PendingCustom),
      )
      .to_owned();

    let deleted = pre_winner::Entity::delete_many()
      .filter(pre_winner::Column::GiveawayId.not_in_subquery(pending))
      .exec(self.conn)
      .await?;
    Ok(deleted.rows_affected)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{self, base_time};

  fn candidate(user_id: i64) -> Candidate {
    Candidate { user_id, username: Some(format!("user{user_id}")), avatar: None }
  }

  #[tokio::test]
  async fn test_replace_keeps_upload_order() {
    let db = testing::setup_db().await;
    let sv = PreWinner::new(&db);
    let expires = base_time() + TimeDelta::hours(24);

    sv.replace(7, &[candidate(1), candidate(2)], expires).await.unwrap();
    sv.replace(7, &[candidate(30), candidate(10)], expires).await.unwrap();

    let list = sv.get(7, base_time()).await.unwrap();
    let order: Vec<_> =
      list.iter().map(|entry| (entry.user_id, entry.position)).collect();
    assert_eq!(order, vec![(30, 1), (10, 2)]);
  }

  #[tokio::test]
  async fn test_expired_list_is_invisible() {
    let db = testing::setup_db().await;
    let sv = PreWinner::new(&db);
    let expires = base_time() + TimeDelta::hours(24);

    sv.replace(7, &[candidate(1)], expires).await.unwrap();

    assert_eq!(sv.get(7, expires - TimeDelta::seconds(1)).await.unwrap().len(), 1);
    assert!(sv.get(7, expires).await.unwrap().is_empty());
    assert_eq!(sv.purge_expired(expires).await.unwrap(), 1);
  }
}
