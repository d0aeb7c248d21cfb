use sea_orm::sea_query::Expr;

use crate::{
  entity::{
    GiveawayStatus, PrizeKind, RequirementKind, giveaway, giveaway_prize,
    requirement,
  },
  prelude::*,
};

/// Creator-supplied settings of a new giveaway.
#[derive(Debug, Clone)]
pub struct NewGiveaway {
  pub creator_id: i64,
  pub title: String,
  pub description: Option<String>,
  pub started_at: DateTime,
  pub duration_seconds: i64,
  pub max_participants: i32,
  pub winners_count: i32,
  pub auto_distribute: bool,
  pub allow_tickets: bool,
}

pub struct Giveaway<'a, C> {
  conn: &'a C,
}

impl<'a, C: ConnectionTrait> Giveaway<'a, C> {
  pub fn new(conn: &'a C) -> Self {
    Self { conn }
  }

  pub async fn create(
    &self,
    new: NewGiveaway,
    now: DateTime,
  ) -> Result<giveaway::Model> {
    if new.winners_count < 1 {
      return Err(Error::Validation("winners count must be at least 1".into()));
    }
    if new.duration_seconds <= 0 {
      return Err(Error::Validation("duration must be positive".into()));
    }
    if new.max_participants < 0 {
      return Err(Error::Validation("max participants cannot be negative".into()));
    }
    if new.max_participants > 0 && new.winners_count > new.max_participants {
      return Err(Error::Validation(format!(
        "winners count {} exceeds max participants {}",
        new.winners_count, new.max_participants
      )));
    }

    let ends_at = new.started_at + TimeDelta::seconds(new.duration_seconds);
    let giveaway = giveaway::ActiveModel {
      creator_id: Set(new.creator_id),
      title: Set(new.title),
      description: Set(new.description),
      started_at: Set(new.started_at),
      duration_seconds: Set(new.duration_seconds),
      ends_at: Set(ends_at),
      max_participants: Set(new.max_participants),
      winners_count: Set(new.winners_count),
      status: Set(GiveawayStatus::Active),
      auto_distribute: Set(new.auto_distribute),
      allow_tickets: Set(new.allow_tickets),
      created_at: Set(now),
      updated_at: Set(now),
      ..Default::default()
    };

    Ok(giveaway.insert(self.conn).await?)
  }

  pub async fn add_prize(
    &self,
    giveaway_id: i64,
    place: i32,
    prize_id: i64,
    kind: PrizeKind,
  ) -> Result<giveaway_prize::Model> {
    if place < giveaway_prize::ALL_PLACES {
      return Err(Error::Validation(format!("invalid prize place {place}")));
    }

    let slot = giveaway_prize::ActiveModel {
      giveaway_id: Set(giveaway_id),
      place: Set(place),
      prize_id: Set(prize_id),
      prize_type: Set(kind),
      ..Default::default()
    };

    Ok(slot.insert(self.conn).await?)
  }

  pub async fn add_requirement(
    &self,
    giveaway_id: i64,
    kind: RequirementKind,
    channel: Option<String>,
    description: Option<String>,
  ) -> Result<requirement::Model> {
    match kind {
      RequirementKind::Subscription | RequirementKind::Boost
        if channel.is_none() =>
      {
        return Err(Error::Validation(format!(
          "{kind:?} requirement needs a channel"
        )));
      }
      RequirementKind::Custom if description.is_none() => {
        return Err(Error::Validation(
          "custom requirement needs a description".into(),
        ));
      }
      _ => {}
    }

    let requirement = requirement::ActiveModel {
      giveaway_id: Set(giveaway_id),
      kind: Set(kind),
      channel: Set(channel),
      description: Set(description),
      ..Default::default()
    };

    Ok(requirement.insert(self.conn).await?)
  }

  pub async fn by_id(&self, id: i64) -> Result<Option<giveaway::Model>> {
    Ok(giveaway::Entity::find_by_id(id).one(self.conn).await?)
  }

  /// Exclusive read of the row; `FOR UPDATE` where the backend supports it.
  pub async fn for_update(&self, id: i64) -> Result<Option<giveaway::Model>> {
    let giveaway = giveaway::Entity::find_by_id(id)
      .lock_exclusive()
      .one(self.conn)
      .await?;
    Ok(giveaway)
  }

  pub async fn requirements(
    &self,
    giveaway_id: i64,
  ) -> Result<Vec<requirement::Model>> {
    let requirements = requirement::Entity::find()
      .filter(requirement::Column::GiveawayId.eq(giveaway_id))
      .order_by_asc(requirement::Column::Id)
      .all(self.conn)
      .await?;
    Ok(requirements)
  }

  pub async fn prize_slots(
    &self,
    giveaway_id: i64,
  ) -> Result<Vec<giveaway_prize::Model>> {
    let slots = giveaway_prize::Entity::find()
      .filter(giveaway_prize::Column::GiveawayId.eq(giveaway_id))
      .order_by_asc(giveaway_prize::Column::Place)
      .order_by_asc(giveaway_prize::Column::Id)
      .all(self.conn)
      .await?;
    Ok(slots)
  }

  /// Active giveaways whose window closed at or before `now`, oldest first.
  pub async fn expired(&self, now: DateTime, limit: u64) -> Result<Vec<i64>> {
    let ids = giveaway::Entity::find()
      .select_only()
      .column(giveaway::Column::Id)
      .filter(giveaway::Column::Status.eq(GiveawayStatus::Active))
      .filter(giveaway::Column::EndsAt.lte(now))
      .order_by_asc(giveaway::Column::EndsAt)
      .limit(limit)
      .into_tuple()
      .all(self.conn)
      .await?;
    Ok(ids)
  }

  /// Giveaways awaiting curation since at or before `cutoff`.
  pub async fn overdue(&self, cutoff: DateTime, limit: u64) -> Result<Vec<i64>> {
    let ids = giveaway::Entity::find()
      .select_only()
      .column(giveaway::Column::Id)
      .filter(giveaway::Column::Status.eq(GiveawayStatus::PendingCustom))
      .filter(giveaway::Column::UpdatedAt.lte(cutoff))
      .order_by_asc(giveaway::Column::UpdatedAt)
      .limit(limit)
      .into_tuple()
      .all(self.conn)
      .await?;
    Ok(ids)
  }

  pub async fn transition(
    &self,
    giveaway: giveaway::Model,
    status: GiveawayStatus,
    now: DateTime,
  ) -> Result<giveaway::Model> {
    let giveaway = giveaway::ActiveModel {
      status: Set(status),
      updated_at: Set(now),
      ..giveaway.into()
    }
    .update(self.conn)
    .await?;
    Ok(giveaway)
  }

  /// Final transition of a drawn giveaway; the winner count only shrinks.
  pub async fn finish(
    &self,
    giveaway: giveaway::Model,
    status: GiveawayStatus,
    winners_count: i32,
    now: DateTime,
  ) -> Result<giveaway::Model> {
    let winners_count = winners_count.min(giveaway.winners_count).max(1);
    let giveaway = giveaway::ActiveModel {
      status: Set(status),
      winners_count: Set(winners_count),
      updated_at: Set(now),
      ..giveaway.into()
    }
    .update(self.conn)
    .await?;
    Ok(giveaway)
  }

  /// Moves a completed giveaway to history.
  pub async fn archive(&self, id: i64, now: DateTime) -> Result<giveaway::Model> {
    let updated = giveaway::Entity::update_many()
      .col_expr(giveaway::Column::Status, Expr::value(GiveawayStatus::History))
      .col_expr(giveaway::Column::UpdatedAt, Expr::value(now))
      .filter(giveaway::Column::Id.eq(id))
      .filter(giveaway::Column::Status.eq(GiveawayStatus::Completed))
      .exec(self.conn)
      .await?;

    let giveaway = self.by_id(id).await?.ok_or(Error::GiveawayNotFound(id))?;
    if updated.rows_affected == 0 && giveaway.status != GiveawayStatus::History
    {
      return Err(Error::Validation(format!(
        "giveaway {id} is {:?}, only completed giveaways can be archived",
        giveaway.status
      )));
    }

    Ok(giveaway)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{self, base_time};

  fn new_giveaway(winners_count: i32, max_participants: i32) -> NewGiveaway {
    NewGiveaway {
      creator_id: 1,
      title: "Sticker pack".into(),
      description: None,
      started_at: base_time(),
      duration_seconds: 3600,
      max_participants,
      winners_count,
      auto_distribute: false,
      allow_tickets: false,
    }
  }

  #[tokio::test]
  async fn test_create_computes_end() {
    let db = testing::setup_db().await;
    let giveaway = Giveaway::new(&db)
      .create(new_giveaway(2, 0), base_time())
      .await
      .unwrap();

    assert_eq!(giveaway.status, GiveawayStatus::Active);
    assert_eq!(giveaway.ends_at, giveaway.end());
    assert_eq!(giveaway.ends_at, base_time() + TimeDelta::hours(1));
  }

  #[tokio::test]
  async fn test_create_rejects_bad_winner_counts() {
    let db = testing::setup_db().await;
    let sv = Giveaway::new(&db);

    assert!(matches!(
      sv.create(new_giveaway(0, 0), base_time()).await,
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      sv.create(new_giveaway(5, 3), base_time()).await,
      Err(Error::Validation(_))
    ));
  }

  #[tokio::test]
  async fn test_expired_skips_running_and_finished() {
    let db = testing::setup_db().await;
    let sv = Giveaway::new(&db);

    let ended = sv.create(new_giveaway(1, 0), base_time()).await.unwrap();
    let running = sv
      .create(
        NewGiveaway { duration_seconds: 86_400, ..new_giveaway(1, 0) },
        base_time(),
      )
      .await
      .unwrap();
    let done = sv.create(new_giveaway(1, 0), base_time()).await.unwrap();
    sv.transition(done, GiveawayStatus::Completed, base_time()).await.unwrap();

    let now = base_time() + TimeDelta::hours(2);
    let ids = sv.expired(now, 10).await.unwrap();

    assert_eq!(ids, vec![ended.id]);
    assert!(!ids.contains(&running.id));
  }

  #[tokio::test]
  async fn test_overdue_uses_updated_at() {
    let db = testing::setup_db().await;
    let sv = Giveaway::new(&db);

    let giveaway = sv.create(new_giveaway(1, 0), base_time()).await.unwrap();
    let entered = base_time() + TimeDelta::hours(1);
    let giveaway = sv
      .transition(giveaway, GiveawayStatus::PendingCustom, entered)
      .await
      .unwrap();

    let before = entered + TimeDelta::hours(23);
    let cutoff = before - TimeDelta::hours(24);
    assert!(sv.overdue(cutoff, 10).await.unwrap().is_empty());

    let after = entered + TimeDelta::hours(24);
    assert_eq!(
      sv.overdue(after - TimeDelta::hours(24), 10).await.unwrap(),
      vec![giveaway.id]
    );
  }

  #[tokio::test]
  async fn test_finish_clamps_winner_count() {
    let db = testing::setup_db().await;
    let sv = Giveaway::new(&db);
    let now = base_time() + TimeDelta::hours(1);

    let giveaway = sv.create(new_giveaway(3, 0), base_time()).await.unwrap();
    let done = sv
      .finish(giveaway.clone(), GiveawayStatus::Completed, 5, now)
      .await
      .unwrap();
    assert_eq!(done.winners_count, 3);
    let done = sv.finish(giveaway, GiveawayStatus::Completed, 0, now).await;
    assert_eq!(done.unwrap().winners_count, 1);

    // rows written outside `create` may carry a zero count
    let legacy = sv.create(new_giveaway(2, 0), base_time()).await.unwrap();
    let legacy = giveaway::ActiveModel {
      winners_count: Set(0),
      ..legacy.into()
    }
    .update(&db)
    .await
    .unwrap();
    let done = sv.finish(legacy, GiveawayStatus::Completed, 4, now).await;
    assert_eq!(done.unwrap().winners_count, 1);
  }

  #[tokio::test]
  async fn test_archive_only_from_completed() {
    let db = testing::setup_db().await;
    let sv = Giveaway::new(&db);

    let giveaway = sv.create(new_giveaway(1, 0), base_time()).await.unwrap();
    assert!(matches!(
      sv.archive(giveaway.id, base_time()).await,
      Err(Error::Validation(_))
    ));

    sv.transition(giveaway.clone(), GiveawayStatus::Completed, base_time())
      .await
      .unwrap();
    let archived = sv.archive(giveaway.id, base_time()).await.unwrap();
    assert_eq!(archived.status, GiveawayStatus::History);

    assert!(matches!(
      sv.archive(404, base_time()).await,
      Err(Error::GiveawayNotFound(404))
    ));
  }

  #[tokio::test]
  async fn test_requirement_needs_channel_or_description() {
    let db = testing::setup_db().await;
    let sv = Giveaway::new(&db);
    let giveaway = sv.create(new_giveaway(1, 0), base_time()).await.unwrap();

    assert!(matches!(
      sv.add_requirement(giveaway.id, RequirementKind::Boost, None, None).await,
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      sv.add_requirement(giveaway.id, RequirementKind::Custom, None, None).await,
      Err(Error::Validation(_))
    ));
    sv.add_requirement(
      giveaway.id,
      RequirementKind::Subscription,
      Some("@news".into()),
      None,
    )
    .await
    .unwrap();
  }
}
