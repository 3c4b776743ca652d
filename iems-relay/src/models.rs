use serde::Serialize;

/// Instantané mono-point renvoyé au dashboard. Chaque métrique porte sa
/// valeur et le timestamp (ms) de l'échantillon source, null si absent.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub power: f64,
    pub power_ts: Option<i64>,
    pub voltage: f64,
    pub voltage_ts: Option<i64>,
    pub current: f64,
    pub current_ts: Option<i64>,
    pub frequency: f64,
    pub frequency_ts: Option<i64>,
    pub rmp: f64,
    pub rmp_ts: Option<i64>,
    pub energy: f64,
    pub energy_ts: Option<i64>,
    pub powerfactor: f64,
    pub powerfactor_ts: Option<i64>,
    /// Heure de capture côté relais (pas celle des échantillons).
    pub timestamp: i64,
    pub online: bool,
    pub ngrok_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangePoint {
    pub timestamp: Option<i64>,
    pub power: f64,
    pub voltage: f64,
    pub current: f64,
    pub frequency: f64,
    pub rmp: f64,
    pub energy: f64,
    pub powerfactor: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeResponse {
    pub data: Vec<RangePoint>,
    pub start_date: String,
    pub end_date: String,
    pub interval: &'static str,
    pub online: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub thingsboard_accessible: bool,
    pub timestamp: String,
}
