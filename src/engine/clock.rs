use crate::prelude::*;

/// Source of "now" for every deadline the engine evaluates.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime {
    Utc::now().naive_utc()
  }
}
