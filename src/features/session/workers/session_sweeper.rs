use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};

use crate::features::session::services::SessionRegistry;

/// Background worker that signs out idle sessions.
pub struct SessionSweeper {
    registry: Arc<SessionRegistry>,
    check_interval: Duration,
}

impl SessionSweeper {
    pub fn new(registry: Arc<SessionRegistry>, check_interval: Duration) -> Self {
        Self {
            registry,
            check_interval,
        }
    }

    /// Run the sweeper loop for the lifetime of the service
    pub async fn run(&self) {
        tracing::info!(
            "Starting session sweeper (every {}s, idle timeout {}s)",
            self.check_interval.as_secs(),
            self.registry.idle_timeout().num_seconds()
        );

        let mut ticker = interval_at(Instant::now() + self.check_interval, self.check_interval);

        loop {
            ticker.tick().await;

            let expired = self.registry.sweep().await;
            if !expired.is_empty() {
                tracing::info!("Signed out {} idle session(s)", expired.len());
            }
        }
    }
}
