//! ThingsBoard JWT authentication.
//!
//! - Static token override via `TB_JWT_TOKEN` (short-circuits login entirely)
//! - Login with exponential backoff; invalid credentials are terminal
//! - No transport-level retry on the POST (not idempotent): 3 requests max

use crate::config::RelayConfig;
use crate::net;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);
const LOGIN_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Clone)]
pub struct Authenticator {
    client: reqwest::Client,
    cfg: Arc<RelayConfig>,
}

impl Authenticator {
    pub fn new(client: reqwest::Client, cfg: Arc<RelayConfig>) -> Self {
        Self { client, cfg }
    }

    /// Jeton courant : override statique tel quel, sinon login ThingsBoard.
    /// None si le réseau est injoignable ou l'authentification refusée.
    pub async fn token(&self) -> Option<String> {
        if let Some(t) = &self.cfg.jwt_token {
            return Some(t.clone());
        }
        if !net::is_reachable(&self.cfg.probe_addr).await {
            return None;
        }

        let url = format!("{}/api/auth/login", self.cfg.tb_host);
        let body = serde_json::json!({
            "username": self.cfg.username.as_deref().unwrap_or_default(),
            "password": self.cfg.password.as_deref().unwrap_or_default(),
        });

        for attempt in 0..LOGIN_ATTEMPTS {
            match self
                .client
                .post(&url)
                .timeout(LOGIN_TIMEOUT)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => {
                    // Identifiants invalides : réessayer n'y changera rien.
                    error!("ThingsBoard rejected credentials (401)");
                    return None;
                }
                Ok(resp) => match resp.error_for_status() {
                    Ok(ok) => match ok.json::<LoginResponse>().await {
                        Ok(login) => return Some(login.token),
                        Err(e) => warn!("auth attempt {} failed: bad login body: {e}", attempt + 1),
                    },
                    Err(e) => warn!("auth attempt {} failed: {e}", attempt + 1),
                },
                Err(e) => warn!("auth attempt {} failed: {e}", attempt + 1),
            }
            // Backoff 1s, 2s ; pas de sleep après la dernière tentative.
            if attempt + 1 < LOGIN_ATTEMPTS {
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
        }
        None
    }
}
