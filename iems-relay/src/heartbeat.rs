//! Self-ping keeping the hosting platform from idling the relay out.
//!
//! The free tiers of Render-like platforms shut a service down after a few
//! minutes without traffic; a periodic GET against our own public URL keeps
//! the process warm. The loop never propagates an error and stops cleanly on
//! the shutdown signal.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(180);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn spawn_heartbeat(
    client: reqwest::Client,
    url: String,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::task::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("heartbeat started towards {url}");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match client.get(&url).timeout(HEARTBEAT_TIMEOUT).send().await {
                        Ok(resp) if resp.status().is_success() => {
                            debug!("heartbeat ok ({})", resp.status());
                        }
                        Ok(resp) => warn!("heartbeat returned {}", resp.status()),
                        Err(e) => warn!("heartbeat failed: {e}"),
                    }
                }
                // changed() rend aussi la main si l'émetteur est droppé.
                _ = shutdown.changed() => {
                    info!("heartbeat stopped");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn shutdown_signal_stops_the_loop() {
        let (tx, rx) = watch::channel(false);
        // Le premier tick part immédiatement vers un port mort : refus rapide,
        // la boucle doit quand même s'arrêter sur le signal.
        let handle = spawn_heartbeat(reqwest::Client::new(), "http://127.0.0.1:9".into(), rx);

        let started = Instant::now();
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
