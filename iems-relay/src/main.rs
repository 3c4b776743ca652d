/**
 * IEMS RELAY - Point d'entrée du service relais télémétrie
 *
 * RÔLE : Orchestration des modules : config, clients HTTP, heartbeat, API REST.
 * Le relais s'authentifie auprès de ThingsBoard, normalise les clés vendeur
 * et re-expose les mesures du compteur via un petit contrat JSON stable.
 *
 * ARCHITECTURE : état partagé en lecture seule (Arc<RelayConfig> + pool
 * reqwest), une seule tâche de fond (heartbeat annulable), arrêt propre
 * sur ctrl-c.
 */

mod auth;
mod config;
mod heartbeat;
mod http;
mod keys;
mod models;
mod net;
mod shape;
mod telemetry;
#[cfg(test)]
mod test_utils;

use crate::auth::Authenticator;
use crate::config::RelayConfig;
use crate::http::AppState;
use crate::telemetry::TelemetryClient;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok(); // Ok si .env n'existe pas
    tracing_subscriber::fmt().init();

    let cfg = match RelayConfig::from_env() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("invalid configuration: {e:#}");
            std::process::exit(1);
        }
    };

    // Client HTTP unique, partagé entre auth, télémétrie et heartbeat
    // (pool de connexions interne, sûr en usage concurrent).
    let client = reqwest::Client::new();
    let auth = Authenticator::new(client.clone(), cfg.clone());
    let telemetry = TelemetryClient::new(client.clone(), cfg.clone(), auth.clone());

    // Heartbeat anti-idle, seulement si une URL publique est configurée
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    match &cfg.public_url {
        Some(url) => {
            let _hb = heartbeat::spawn_heartbeat(client, url.clone(), shutdown_rx.clone());
        }
        None => info!("no RELAY_PUBLIC_URL configured, heartbeat disabled"),
    }

    let app = http::build_router(AppState {
        cfg: cfg.clone(),
        auth,
        telemetry,
    });

    let listener = match TcpListener::bind(&cfg.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("cannot bind {}: {e}", cfg.bind_addr);
            std::process::exit(1);
        }
    };
    info!("relay listening on http://{}", cfg.bind_addr);

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        // Réveille le heartbeat pour qu'il sorte de sa boucle.
        let _ = shutdown_tx.send(true);
    });
    if let Err(e) = serve.await {
        error!("server error: {e}");
    }
}
