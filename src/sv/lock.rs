use sea_orm::{DbErr, SqlErr};

use crate::{entity::lock, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
  Acquired,
  Held,
}

/// Short-lived keyed lease shared by every worker on the same database.
pub struct Lock<'a, C> {
  conn: &'a C,
}

impl<'a, C: ConnectionTrait> Lock<'a, C> {
  pub fn new(conn: &'a C) -> Self {
    Self { conn }
  }

  pub async fn acquire(
    &self,
    key: &str,
    owner: &str,
    ttl: TimeDelta,
    now: DateTime,
  ) -> Result<Acquire> {
    // A lease left behind by a crashed worker must not block forever.
    lock::Entity::delete_many()
      .filter(lock::Column::Key.eq(key))
      .filter(lock::Column::ExpiresAt.lte(now))
      .exec(self.conn)
      .await?;

    let lease = lock::ActiveModel {
      key: Set(key.to_string()),
      owner: Set(owner.to_string()),
      expires_at: Set(now + ttl),
    };

    match lock::Entity::insert(lease).exec_without_returning(self.conn).await {
      Ok(_) => Ok(Acquire::Acquired),
      Err(err) if is_unique_violation(&err) => Ok(Acquire::Held),
      Err(err) => Err(err.into()),
    }
  }

  /// Releases the lease only if `owner` still holds it.
  pub async fn release(&self, key: &str, owner: &str) -> Result<bool> {
    let deleted = lock::Entity::delete_many()
      .filter(lock::Column::Key.eq(key))
      .filter(lock::Column::Owner.eq(owner))
      .exec(self.conn)
      .await?;
    Ok(deleted.rows_affected > 0)
  }

  pub async fn purge_expired(&self, now: DateTime) -> Result<u64> {
    let deleted = lock::Entity::delete_many()
      .filter(lock::Column::ExpiresAt.lte(now))
      .exec(self.conn)
      .await?;
    Ok(deleted.rows_affected)
  }
}

fn is_unique_violation(err: &DbErr) -> bool {
  matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
