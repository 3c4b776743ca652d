/*!
Stub ThingsBoard pour les tests d'intégration

Monte un petit serveur axum local qui imite /api/auth/login et l'endpoint
time-series, avec compteurs d'appels pour les assertions de comportement
(nombre de tentatives, ré-authentification, expansion des alias).

Chaque script est une file de statuts à renvoyer avant le 200 final :
`with_login_script(&[500])` ⇒ un 500 puis des 200.
*/

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use crate::config::RelayConfig;

#[derive(Clone)]
pub struct StubUpstream {
    pub login_hits: Arc<AtomicUsize>,
    pub fetch_hits: Arc<AtomicUsize>,
    pub last_keys: Arc<Mutex<Option<String>>>,
    pub last_query: Arc<Mutex<Option<HashMap<String, String>>>>,
    pub last_auth: Arc<Mutex<Option<String>>>,
    login_script: Arc<Mutex<Vec<u16>>>,
    fetch_script: Arc<Mutex<Vec<u16>>>,
    payload: Value,
}

impl StubUpstream {
    /// Jeton renvoyé par le login du stub.
    pub const TOKEN: &'static str = "fresh-token";

    pub fn new(payload: Value) -> Self {
        Self {
            login_hits: Arc::new(AtomicUsize::new(0)),
            fetch_hits: Arc::new(AtomicUsize::new(0)),
            last_keys: Arc::new(Mutex::new(None)),
            last_query: Arc::new(Mutex::new(None)),
            last_auth: Arc::new(Mutex::new(None)),
            login_script: Arc::new(Mutex::new(Vec::new())),
            fetch_script: Arc::new(Mutex::new(Vec::new())),
            payload,
        }
    }

    pub fn with_login_script(self, statuses: &[u16]) -> Self {
        *self.login_script.lock().unwrap() = statuses.to_vec();
        self
    }

    pub fn with_fetch_script(self, statuses: &[u16]) -> Self {
        *self.fetch_script.lock().unwrap() = statuses.to_vec();
        self
    }

    fn next_scripted(script: &Mutex<Vec<u16>>) -> Option<StatusCode> {
        let mut script = script.lock().unwrap();
        if script.is_empty() {
            None
        } else {
            StatusCode::from_u16(script.remove(0)).ok()
        }
    }

    pub async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route(
                "/api/plugins/telemetry/DEVICE/{device_id}/values/timeseries",
                get(fetch),
            )
            .with_state(self.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

async fn login(State(stub): State<StubUpstream>) -> (StatusCode, Json<Value>) {
    stub.login_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(status) = StubUpstream::next_scripted(&stub.login_script) {
        return (status, Json(json!({})));
    }
    (StatusCode::OK, Json(json!({ "token": StubUpstream::TOKEN })))
}

async fn fetch(
    State(stub): State<StubUpstream>,
    Path(_device_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    stub.fetch_hits.fetch_add(1, Ordering::SeqCst);
    *stub.last_keys.lock().unwrap() = query.get("keys").cloned();
    *stub.last_auth.lock().unwrap() = headers
        .get("x-authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    *stub.last_query.lock().unwrap() = Some(query);

    if let Some(status) = StubUpstream::next_scripted(&stub.fetch_script) {
        return (status, Json(json!({})));
    }
    (StatusCode::OK, Json(stub.payload.clone()))
}

/// Config pointant vers le stub, sonde vivante (le stub écoute).
pub fn test_cfg(upstream: SocketAddr) -> RelayConfig {
    RelayConfig {
        tb_host: format!("http://{upstream}"),
        username: Some("tester@iems.local".to_string()),
        password: Some("secret".to_string()),
        device_id: "dev-0001".to_string(),
        jwt_token: None,
        bind_addr: "127.0.0.1:0".to_string(),
        probe_addr: upstream.to_string(),
        public_url: None,
    }
}

/// Config dont la sonde vise un port fermé : tout appel amont court-circuite.
pub fn unreachable_cfg() -> RelayConfig {
    RelayConfig {
        tb_host: "http://127.0.0.1:9".to_string(),
        username: Some("tester@iems.local".to_string()),
        password: Some("secret".to_string()),
        device_id: "dev-0001".to_string(),
        jwt_token: None,
        bind_addr: "127.0.0.1:0".to_string(),
        probe_addr: "127.0.0.1:9".to_string(),
        public_url: None,
    }
}
