use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;

use crate::{prelude::*, state::AppState};

/// Drives discovery on the short interval and the consistency sweep on the
/// long one.
pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let mut poll = time::interval(app.config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut sweep = time::interval(app.config.sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
      "Scheduler polling every {:?}, sweeping every {:?}",
      app.config.poll_interval, app.config.sweep_interval
    );

    loop {
      tokio::select! {
        _ = app.shutdown.cancelled() => {
          info!("Scheduler stopped");
          return Ok(());
        }
        _ = poll.tick() => match app.engine.dispatch().await {
          Ok(batch) if batch.discovered > 0 => {
            debug!("Dispatched {} due giveaway(s)", batch.discovered);
          }
          Ok(_) => {}
          Err(err) => error!("Discovery failed: {err}"),
        },
        _ = sweep.tick() => {
          if let Err(err) = app.engine.sweep().await {
            error!("Sweep failed: {err}");
          }
        }
      }
    }
  }
}
