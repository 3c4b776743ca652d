//! Time-series queries against the ThingsBoard device API.
//!
//! Layered retries, bounded by construction:
//! - transport level: idempotent GETs replay on 408/429/500/502/503/504 and
//!   connection errors, up to [`TRANSPORT_ATTEMPTS`] sends (1s / 2s delays)
//! - session level: a single 401 triggers one re-authentication and one replay
//!
//! Worst case for one `fetch`: 2 × 3 telemetry GETs + 3 login POSTs.

use crate::auth::Authenticator;
use crate::config::RelayConfig;
use crate::keys::{self, RawPayload};
use crate::net;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const TRANSPORT_ATTEMPTS: u32 = 3;
/// Statuts rejouables au niveau transport (GET idempotents uniquement).
const RETRY_STATUS: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Debug, Error)]
enum FetchError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token refresh failed")]
    Refresh,
    #[error("upstream returned {0}")]
    Status(StatusCode),
}

/// Paramètres optionnels de la requête time-series, passés tels quels à l'amont.
#[derive(Debug, Default, Clone)]
pub struct FetchParams {
    pub keys: Option<Vec<String>>,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
    pub interval: Option<i64>,
    pub limit: Option<u32>,
}

#[derive(Clone)]
pub struct TelemetryClient {
    client: reqwest::Client,
    cfg: Arc<RelayConfig>,
    auth: Authenticator,
}

impl TelemetryClient {
    pub fn new(client: reqwest::Client, cfg: Arc<RelayConfig>, auth: Authenticator) -> Self {
        Self { client, cfg, auth }
    }

    /// Interroge l'endpoint time-series de l'appareil configuré.
    /// None si jeton absent, réseau injoignable, ou échec après les rejeux.
    pub async fn fetch(&self, token: &str, params: &FetchParams) -> Option<RawPayload> {
        if token.is_empty() || !net::is_reachable(&self.cfg.probe_addr).await {
            return None;
        }
        match self.fetch_inner(token, params).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                error!("telemetry fetch failed: {e}");
                None
            }
        }
    }

    async fn fetch_inner(&self, token: &str, params: &FetchParams) -> Result<RawPayload, FetchError> {
        let url = format!(
            "{}/api/plugins/telemetry/DEVICE/{}/values/timeseries",
            self.cfg.tb_host, self.cfg.device_id
        );
        let query = build_query(params);

        let mut resp = self.get_with_retry(&url, &query, token).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            // Jeton expiré : une seule ré-authentification, un seul rejeu.
            info!("token rejected upstream, refreshing");
            let fresh = self.auth.token().await.ok_or(FetchError::Refresh)?;
            resp = self.get_with_retry(&url, &query, &fresh).await?;
        }
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }
        Ok(resp.json::<RawPayload>().await?)
    }

    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: &str,
    ) -> Result<reqwest::Response, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .client
                .get(url)
                .query(query)
                .header("X-Authorization", format!("Bearer {token}"))
                .timeout(FETCH_TIMEOUT)
                .send()
                .await;
            match result {
                Ok(resp) if !RETRY_STATUS.contains(&resp.status().as_u16()) => return Ok(resp),
                Ok(resp) if attempt >= TRANSPORT_ATTEMPTS => return Ok(resp),
                Ok(resp) => warn!("upstream {} (attempt {attempt}), retrying", resp.status()),
                Err(e) if attempt >= TRANSPORT_ATTEMPTS => return Err(e.into()),
                Err(e) => warn!("transport error (attempt {attempt}): {e}"),
            }
            tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
        }
    }
}

/// Construit la query string : alias développés et dédupliqués, bornes passées
/// telles quelles. L'ordre des alias n'est pas contractuel (l'amont matche par nom).
fn build_query(params: &FetchParams) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(requested) = &params.keys {
        let mut expanded: Vec<String> = Vec::new();
        for key in requested {
            for variant in keys::expand_key(key) {
                if !expanded.contains(&variant) {
                    expanded.push(variant);
                }
            }
        }
        query.push(("keys", expanded.join(",")));
    }
    if let Some(ts) = params.start_ts {
        query.push(("startTs", ts.to_string()));
    }
    if let Some(ts) = params.end_ts {
        query.push(("endTs", ts.to_string()));
    }
    if let Some(interval) = params.interval {
        query.push(("interval", interval.to_string()));
    }
    if let Some(limit) = params.limit {
        query.push(("limit", limit.to_string()));
    }
    query
}
