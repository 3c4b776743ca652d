/**
 * API REST IEMS - Surface HTTP exposée au dashboard
 *
 * RÔLE :
 * Ce module expose le contrat JSON consommé par le dashboard : instantané
 * temps réel, séries hebdo/mensuelles et état de santé du relais.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, état partagé en lecture seule (config + clients)
 * - Chaque route encapsule toute défaillance dans l'un des deux corps
 *   d'erreur documentés : jamais de panique remontée à la couche HTTP
 * - 401 {"error":"Authentication failed","online":false} si pas de jeton
 * - 500 {"error":"Could not fetch telemetry","online":false} si fetch échoue
 *
 * UTILITÉ DANS IEMS :
 * 🎯 Découplage dashboard ↔ ThingsBoard : schéma stable côté client
 * 🎯 /health interrogeable sans authentification par la supervision
 */

use crate::auth::Authenticator;
use crate::config::RelayConfig;
use crate::keys::{Metric, TUNNEL_ALIASES};
use crate::models::{HealthStatus, RangeResponse, TelemetrySnapshot};
use crate::net;
use crate::shape::{self, DAY_MS, HOUR_MS};
use crate::telemetry::{FetchParams, TelemetryClient};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Local;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<RelayConfig>,
    pub auth: Authenticator,
    pub telemetry: TelemetryClient,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn auth_failed() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Authentication failed", "online": false })),
    )
}

fn fetch_failed() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Could not fetch telemetry", "online": false })),
    )
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/telemetry", get(get_telemetry))
        .route("/api/telemetry/weekly", get(get_weekly))
        .route("/api/telemetry/monthly", get(get_monthly))
        .with_state(app_state)
}

// GET /api/telemetry (instantané mono-point)
async fn get_telemetry(State(app): State<AppState>) -> Result<Json<TelemetrySnapshot>, ApiError> {
    let token = app.auth.token().await.ok_or_else(auth_failed)?;

    // Les sept métriques canoniques + les variantes de l'URL tunnel, pour que
    // l'amont renvoie celle-ci quelle que soit la casse publiée par l'appareil.
    let mut keys: Vec<String> = Metric::ALL.iter().map(|m| m.canonical().to_string()).collect();
    keys.extend(TUNNEL_ALIASES.iter().map(|a| a.to_string()));

    let params = FetchParams { keys: Some(keys), ..FetchParams::default() };
    let payload = app.telemetry.fetch(&token, &params).await.ok_or_else(fetch_failed)?;
    Ok(Json(shape::snapshot(&payload)))
}

// GET /api/telemetry/weekly (7 jours, buckets horaires)
async fn get_weekly(State(app): State<AppState>) -> Result<Json<RangeResponse>, ApiError> {
    range_data(app, 7, HOUR_MS, 168).await
}

// GET /api/telemetry/monthly (30 jours, buckets journaliers)
async fn get_monthly(State(app): State<AppState>) -> Result<Json<RangeResponse>, ApiError> {
    range_data(app, 30, DAY_MS, 30).await
}

async fn range_data(
    app: AppState,
    days: i64,
    interval: i64,
    limit: u32,
) -> Result<Json<RangeResponse>, ApiError> {
    let token = app.auth.token().await.ok_or_else(auth_failed)?;
    let (start_ts, end_ts) = shape::time_range(days);

    let params = FetchParams {
        keys: Some(Metric::ALL.iter().map(|m| m.canonical().to_string()).collect()),
        start_ts: Some(start_ts),
        end_ts: Some(end_ts),
        interval: Some(interval),
        limit: Some(limit),
    };
    let payload = app.telemetry.fetch(&token, &params).await.ok_or_else(fetch_failed)?;
    Ok(Json(shape::range(&payload, start_ts, end_ts, days)))
}

// GET /health (supervision, indépendant de l'état d'auth)
async fn health(State(app): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "running",
        thingsboard_accessible: net::is_reachable(&app.cfg.probe_addr).await,
        timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}
