pub mod scheduler;
pub mod server;

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::state::AppState;

#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new() }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  /// Starts every plugin, restarting crashed ones until shutdown. The
  /// returned tracker finishes once all of them have stopped.
  pub fn run(self, app: Arc<AppState>) -> TaskTracker {
    let tracker = TaskTracker::new();

    for plugin in self.plugins {
      let app = app.clone();

      tracker.spawn(async move {
        let name = plugin.name();
        info!("SYSTEM: Service `{}` initialized", name);

        loop {
          let handle = tokio::spawn({
            let app = app.clone();
            let plugin = plugin.clone();
            async move { plugin.start(app).await }
          });

          match handle.await {
            Ok(Ok(())) if app.shutdown.is_cancelled() => {
              info!("Service `{name}` shutdown.");
              break;
            }
            Ok(Ok(())) => {
              warn!("Service `{name}` stopped unexpectedly (Ok).",);
            }
            Ok(Err(err)) => {
              error!("Service `{name}` crashed with error: {err:#}.",);
            }
            Err(join_err) => {
              if join_err.is_cancelled() {
                info!("Service `{}` shutdown.", name);
                break;
              } else {
                error!("Service `{}` PANICKED!", name);
              }
            }
          }

          tokio::select! {
            _ = app.shutdown.cancelled() => break,
            _ = sleep(Duration::from_secs(5)) => {}
          }
          info!("SYSTEM: Restarting service `{}`...", name);
        }
      });
    }

    tracker.close();
    tracker
  }
}
