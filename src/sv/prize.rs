use crate::{entity::prize, prelude::*};

pub struct Prize<'a, C> {
  conn: &'a C,
}

impl<'a, C: ConnectionTrait> Prize<'a, C> {
  pub fn new(conn: &'a C) -> Self {
    Self { conn }
  }

  pub async fn create(
    &self,
    owner_id: i64,
    name: impl Into<String>,
    now: DateTime,
  ) -> Result<prize::Model> {
    let prize = prize::ActiveModel {
      owner_id: Set(owner_id),
      name: Set(name.into()),
      created_at: Set(now),
      ..Default::default()
    };

    Ok(prize.insert(self.conn).await?)
  }

  pub async fn by_id(&self, id: i64) -> Result<Option<prize::Model>> {
    Ok(prize::Entity::find_by_id(id).one(self.conn).await?)
  }
}
