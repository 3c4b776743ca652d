//! Reachability probe gating every upstream call.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::warn;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connexion TCP vers l'adresse sonde (DNS public par défaut).
/// false sur toute erreur ou timeout, jamais de panique.
pub async fn is_reachable(addr: &str) -> bool {
    match timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            warn!("no route to {addr}: {e}");
            false
        }
        Err(_) => {
            warn!("probe to {addr} timed out");
            false
        }
    }
}
