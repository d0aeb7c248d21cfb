use crate::{
  entity::{WinStatus, transfer, win},
  prelude::*,
};

pub struct Win<'a, C> {
  conn: &'a C,
}

impl<'a, C: ConnectionTrait> Win<'a, C> {
  pub fn new(conn: &'a C) -> Self {
    Self { conn }
  }

  pub async fn create(
    &self,
    giveaway_id: i64,
    user_id: i64,
    prize_id: i64,
    place: i32,
    now: DateTime,
  ) -> Result<win::Model> {
    let win = win::ActiveModel {
      giveaway_id: Set(giveaway_id),
      user_id: Set(user_id),
      prize_id: Set(prize_id),
      place: Set(place),
      status: Set(WinStatus::Pending),
      created_at: Set(now),
      received_at: Set(None),
      ..Default::default()
    };

    Ok(win.insert(self.conn).await?)
  }

  pub async fn by_giveaway(&self, giveaway_id: i64) -> Result<Vec<win::Model>> {
    let wins = win::Entity::find()
      .filter(win::Column::GiveawayId.eq(giveaway_id))
      .order_by_asc(win::Column::Place)
      .all(self.conn)
      .await?;
    Ok(wins)
  }
}

impl<'a, C: ConnectionTrait + TransactionTrait> Win<'a, C> {
  /// Hands an internal prize to the winner. Runs in its own (nested)
  /// transaction so a failed transfer leaves the win pending.
  pub async fn distribute(
    &self,
    win: win::Model,
    from_user: i64,
    now: DateTime,
  ) -> Result<win::Model> {
    if win.status != WinStatus::Pending {
      return Err(Error::Validation(format!(
        "win {} is already {:?}",
        win.id, win.status
      )));
    }

    let txn = self.conn.begin().await?;
    match hand_over(&txn, win, from_user, now).await {
      Ok(win) => {
        txn.commit().await?;
        Ok(win)
      }
      Err(err) => {
        txn.rollback().await?;
        Err(err)
      }
    }
  }
}

async fn hand_over(
  txn: &DatabaseTransaction,
  win: win::Model,
  from_user: i64,
  now: DateTime,
) -> Result<win::Model> {
  transfer::ActiveModel {
    win_id: Set(win.id),
    prize_id: Set(win.prize_id),
    from_user: Set(from_user),
    to_user: Set(win.user_id),
    created_at: Set(now),
    ..Default::default()
  }
  .insert(txn)
  .await?;

  let win = win::ActiveModel {
    status: Set(WinStatus::Distributed),
    received_at: Set(Some(now)),
    ..win.into()
  }
  .update(txn)
  .await?;

  Ok(win)
}

#[cfg(test)]
mod tests {
  use tokio_test::assert_ok;

  use super::*;
  use crate::testing::{self, base_time};

  #[tokio::test]
  async fn test_distribute_records_transfer() {
    let db = testing::setup_db().await;
    let sv = Win::new(&db);

    let win = sv.create(1, 42, 9, 1, base_time()).await.unwrap();
    let later = base_time() + TimeDelta::minutes(5);
    let win = sv.distribute(win, 7, later).await.unwrap();

    assert_eq!(win.status, WinStatus::Distributed);
    assert_eq!(win.received_at, Some(later));

    let transfers = transfer::Entity::find().all(&db).await.unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!((transfers[0].from_user, transfers[0].to_user), (7, 42));

    assert!(matches!(
      sv.distribute(win, 7, later).await,
      Err(Error::Validation(_))
    ));
  }

  #[tokio::test]
  async fn test_failed_transfer_keeps_win_pending() {
    let db = testing::setup_db().await;
    db.execute_unprepared(
      "CREATE TRIGGER block_transfer BEFORE INSERT ON transfers \
       WHEN NEW.to_user = 42 BEGIN SELECT RAISE(ABORT, 'blocked'); END",
    )
    .await
    .unwrap();

    let txn = db.begin().await.unwrap();
    let sv = Win::new(&txn);
    let blocked = sv.create(1, 42, 9, 1, base_time()).await.unwrap();
    let other = sv.create(1, 43, 9, 2, base_time()).await.unwrap();

    assert!(sv.distribute(blocked, 7, base_time()).await.is_err());
    assert_ok!(sv.distribute(other, 7, base_time()).await);
    txn.commit().await.unwrap();

    let wins = Win::new(&db).by_giveaway(1).await.unwrap();
    assert_eq!(wins[0].status, WinStatus::Pending);
    assert_eq!(wins[0].received_at, None);
    assert_eq!(wins[1].status, WinStatus::Distributed);
    assert_eq!(transfer::Entity::find().all(&db).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_by_giveaway_orders_by_place() {
    let db = testing::setup_db().await;
    let sv = Win::new(&db);

    sv.create(1, 10, 9, 2, base_time()).await.unwrap();
    sv.create(1, 11, 9, 1, base_time()).await.unwrap();
    sv.create(2, 12, 9, 1, base_time()).await.unwrap();

    let places: Vec<_> = sv
      .by_giveaway(1)
      .await
      .unwrap()
      .into_iter()
      .map(|win| (win.place, win.user_id))
      .collect();
    assert_eq!(places, vec![(1, 11), (2, 10)]);
  }
}
