use sea_orm::sea_query::OnConflict;

use crate::{
  entity::{GiveawayStatus, giveaway, participant, ticket},
  prelude::*,
};

/// Upper bound on the tickets a single participant may hold.
pub const MAX_TICKETS: i64 = 1_000_000;

/// Participation and ticket bookkeeping of a giveaway.
pub struct Entry<'a, C> {
  conn: &'a C,
}

impl<'a, C: ConnectionTrait> Entry<'a, C> {
  pub fn new(conn: &'a C) -> Self {
    Self { conn }
  }

  pub async fn join(
    &self,
    giveaway: &giveaway::Model,
    user_id: i64,
    now: DateTime,
  ) -> Result<participant::Model> {
    if giveaway.creator_id == user_id {
      return Err(Error::Validation(
        "creator cannot join own giveaway".into(),
      ));
    }
    if giveaway.status != GiveawayStatus::Active || giveaway.has_ended(now) {
      return Err(Error::Validation(format!(
        "giveaway {} is closed",
        giveaway.id
      )));
    }
    if self.is_participant(giveaway.id, user_id).await? {
      return Err(Error::Validation(format!(
        "user {user_id} already joined giveaway {}",
        giveaway.id
      )));
    }
    if giveaway.max_participants > 0
      && self.count(giveaway.id).await? >= giveaway.max_participants as u64
    {
      return Err(Error::Validation(format!(
        "giveaway {} is full",
        giveaway.id
      )));
    }

    let participant = participant::ActiveModel {
      giveaway_id: Set(giveaway.id),
      user_id: Set(user_id),
      joined_at: Set(now),
    };

    Ok(participant.insert(self.conn).await?)
  }

  /// Participants in join order.
  pub async fn participants(&self, giveaway_id: i64) -> Result<Vec<i64>> {
    let ids = participant::Entity::find()
      .select_only()
      .column(participant::Column::UserId)
      .filter(participant::Column::GiveawayId.eq(giveaway_id))
      .order_by_asc(participant::Column::JoinedAt)
      .order_by_asc(participant::Column::UserId)
      .into_tuple()
      .all(self.conn)
      .await?;
    Ok(ids)
  }

  pub async fn count(&self, giveaway_id: i64) -> Result<u64> {
    let count = participant::Entity::find()
      .filter(participant::Column::GiveawayId.eq(giveaway_id))
      .count(self.conn)
      .await?;
    Ok(count)
  }

  pub async fn is_participant(
    &self,
    giveaway_id: i64,
    user_id: i64,
  ) -> Result<bool> {
    let found = participant::Entity::find_by_id((giveaway_id, user_id))
      .one(self.conn)
      .await?;
    Ok(found.is_some())
  }

  pub async fn set_tickets(
    &self,
    giveaway_id: i64,
    user_id: i64,
    count: i64,
  ) -> Result<()> {
    if count < 0 {
      return Err(Error::Validation("ticket count cannot be negative".into()));
    }
    if count > MAX_TICKETS {
      return Err(Error::Validation(format!(
        "ticket count {count} exceeds the limit of {MAX_TICKETS}"
      )));
    }

    let tickets = ticket::ActiveModel {
      giveaway_id: Set(giveaway_id),
      user_id: Set(user_id),
      count: Set(count),
      ..Default::default()
    };

    ticket::Entity::insert(tickets)
      .on_conflict(
        OnConflict::columns([ticket::Column::GiveawayId, ticket::Column::UserId])
          .update_column(ticket::Column::Count)
          .to_owned(),
      )
      .exec_without_returning(self.conn)
      .await?;

    Ok(())
  }

  /// Ticket holdings in insertion order, which is the weighted pool order.
  pub async fn tickets(&self, giveaway_id: i64) -> Result<Vec<ticket::Model>> {
    let tickets = ticket::Entity::find()
      .filter(ticket::Column::GiveawayId.eq(giveaway_id))
      .order_by_asc(ticket::Column::Id)
      .all(self.conn)
      .await?;
    Ok(tickets)
  }
}

#[cfg(test)]
mod tests {
  use tokio_test::assert_ok;

  use super::*;
  use crate::{
    sv::{Giveaway, NewGiveaway},
    testing::{self, base_time},
  };

  async fn open(
    db: &DatabaseConnection,
    max_participants: i32,
  ) -> giveaway::Model {
    Giveaway::new(db)
      .create(
        NewGiveaway {
          creator_id: 1,
          title: "Lottery".into(),
          description: None,
          started_at: base_time(),
          duration_seconds: 3600,
          max_participants,
          winners_count: 1,
          auto_distribute: false,
          allow_tickets: true,
        },
        base_time(),
      )
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_join_rules() {
    let db = testing::setup_db().await;
    let giveaway = open(&db, 2).await;
    let sv = Entry::new(&db);
    let now = base_time() + TimeDelta::minutes(1);

    assert!(matches!(
      sv.join(&giveaway, giveaway.creator_id, now).await,
      Err(Error::Validation(_))
    ));

    assert_ok!(sv.join(&giveaway, 10, now).await);
    assert!(matches!(
      sv.join(&giveaway, 10, now).await,
      Err(Error::Validation(_))
    ));

    assert_ok!(sv.join(&giveaway, 11, now).await);
    assert!(matches!(
      sv.join(&giveaway, 12, now).await,
      Err(Error::Validation(_))
    ));

    assert_eq!(sv.participants(giveaway.id).await.unwrap(), vec![10, 11]);
    assert_eq!(sv.count(giveaway.id).await.unwrap(), 2);
  }

  #[tokio::test]
  async fn test_join_after_end() {
    let db = testing::setup_db().await;
    let giveaway = open(&db, 0).await;

    let late = base_time() + TimeDelta::hours(1);
    assert!(matches!(
      Entry::new(&db).join(&giveaway, 10, late).await,
      Err(Error::Validation(_))
    ));
  }

  #[tokio::test]
  async fn test_set_tickets_keeps_order() {
    let db = testing::setup_db().await;
    let giveaway = open(&db, 0).await;
    let sv = Entry::new(&db);

    assert_ok!(sv.set_tickets(giveaway.id, 20, 3).await);
    assert_ok!(sv.set_tickets(giveaway.id, 10, 1).await);
    assert_ok!(sv.set_tickets(giveaway.id, 20, 5).await);

    let tickets = sv.tickets(giveaway.id).await.unwrap();
    let holdings: Vec<_> =
      tickets.iter().map(|ticket| (ticket.user_id, ticket.count)).collect();
    assert_eq!(holdings, vec![(20, 5), (10, 1)]);

    assert!(matches!(
      sv.set_tickets(giveaway.id, 10, -1).await,
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      sv.set_tickets(giveaway.id, 10, MAX_TICKETS + 1).await,
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      sv.set_tickets(giveaway.id, 10, i64::MAX).await,
      Err(Error::Validation(_))
    ));
    assert_ok!(sv.set_tickets(giveaway.id, 10, MAX_TICKETS).await);
    assert_eq!(sv.tickets(giveaway.id).await.unwrap()[1].count, MAX_TICKETS);
  }
}
