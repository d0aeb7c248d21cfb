use sea_orm::sea_query::OnConflict;

use crate::{entity::user, prelude::*};

/// Ids bound per `IN (..)` lookup; SQLite caps bound variables at 32766.
const LOOKUP_CHUNK: usize = 1000;

pub struct User<'a, C> {
  conn: &'a C,
}

impl<'a, C: ConnectionTrait> User<'a, C> {
  pub fn new(conn: &'a C) -> Self {
    Self { conn }
  }

  pub async fn upsert(
    &self,
    tg_user_id: i64,
    username: Option<String>,
    avatar: Option<String>,
    now: DateTime,
  ) -> Result<()> {
    let user = user::ActiveModel {
      tg_user_id: Set(tg_user_id),
      username: Set(username),
      avatar: Set(avatar),
      updated_at: Set(now),
    };

    user::Entity::insert(user)
      .on_conflict(
        OnConflict::column(user::Column::TgUserId)
          .update_columns([
            user::Column::Username,
            user::Column::Avatar,
            user::Column::UpdatedAt,
          ])
          .to_owned(),
      )
      .exec_without_returning(self.conn)
      .await?;

    Ok(())
  }

  /// Profiles keyed by user id; ids without a stored profile are absent.
  pub async fn by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, user::Model>> {
    let mut profiles = HashMap::with_capacity(ids.len());

    for chunk in ids.chunks(LOOKUP_CHUNK) {
      let users = user::Entity::find()
        .filter(user::Column::TgUserId.is_in(chunk.iter().copied()))
        .all(self.conn)
        .await?;
      profiles.extend(users.into_iter().map(|user| (user.tg_user_id, user)));
    }

    Ok(profiles)
  }
}
