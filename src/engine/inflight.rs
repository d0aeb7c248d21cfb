use crate::prelude::*;

/// Giveaway ids currently owned by a worker of this process.
#[derive(Clone, Default)]
pub struct InFlight {
  ids: Arc<DashSet<i64>>,
}

impl InFlight {
  /// Claims `id`; `None` if another worker already holds it.
  pub fn claim(&self, id: i64) -> Option<Claim> {
    self.ids.insert(id).then(|| Claim { ids: self.ids.clone(), id })
  }
}

/// Releases the claim when dropped, whatever way the worker exits.
pub struct Claim {
  ids: Arc<DashSet<i64>>,
  id: i64,
}

impl Drop for Claim {
  fn drop(&mut self) {
    self.ids.remove(&self.id);
  }
}
