/**
 * MISE EN FORME DES RÉPONSES - Payload brut → contrat JSON du dashboard
 *
 * RÔLE :
 * Assemble les métriques normalisées en deux vues : instantané mono-point
 * (/api/telemetry) et série datée (weekly / monthly).
 *
 * FONCTIONNEMENT :
 * - Snapshot : élément 0 de chaque série + timestamp de capture + URL tunnel
 * - Série : autant de points que la plus longue série résolue, valeurs
 *   manquantes à 0.0 ; le timestamp de chaque point vient de la série power
 *   (quirk historique conservé pour compatibilité dashboard, voir DESIGN.md)
 */

use crate::keys::{self, Metric, RawPayload, RawSample, TUNNEL_ALIASES};
use crate::models::{RangePoint, RangeResponse, TelemetrySnapshot};
use chrono::{Local, TimeZone, Utc};

pub const DAY_MS: i64 = 86_400_000;
pub const HOUR_MS: i64 = 3_600_000;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Fenêtre `[now - days, now]` en millisecondes epoch.
pub fn time_range(days: i64) -> (i64, i64) {
    let end = now_ms();
    (end - days * DAY_MS, end)
}

/// Vue mono-point : les sept métriques canoniques résolues contre un payload.
/// `online` vaut true sans condition : la route court-circuite avant d'arriver
/// ici quand le fetch a échoué.
pub fn snapshot(payload: &RawPayload) -> TelemetrySnapshot {
    let power = keys::resolve(payload, Metric::Power);
    let voltage = keys::resolve(payload, Metric::Voltage);
    let current = keys::resolve(payload, Metric::Current);
    let frequency = keys::resolve(payload, Metric::Frequency);
    let rmp = keys::resolve(payload, Metric::Rmp);
    let energy = keys::resolve(payload, Metric::Energy);
    let powerfactor = keys::resolve(payload, Metric::PowerFact);

    TelemetrySnapshot {
        power: power.value,
        power_ts: power.ts,
        voltage: voltage.value,
        voltage_ts: voltage.ts,
        current: current.value,
        current_ts: current.ts,
        frequency: frequency.value,
        frequency_ts: frequency.ts,
        rmp: rmp.value,
        rmp_ts: rmp.ts,
        energy: energy.value,
        energy_ts: energy.ts,
        powerfactor: powerfactor.value,
        powerfactor_ts: powerfactor.ts,
        timestamp: now_ms(),
        online: true,
        ngrok_url: keys::resolve_url(payload, &TUNNEL_ALIASES),
    }
}

fn series<'a>(payload: &'a RawPayload, metric: Metric) -> Option<&'a [RawSample]> {
    keys::find_actual_key(payload, metric.aliases())
        .and_then(|k| payload.get(k))
        .map(Vec::as_slice)
}

fn value_at(series: Option<&[RawSample]>, i: usize) -> f64 {
    series
        .and_then(|s| s.get(i))
        .map(keys::numeric_value)
        .unwrap_or(0.0)
}

/// Vue série : un point par index d'échantillon, longueur = plus longue
/// série résolue. Dates humaines dérivées de la fenêtre demandée.
pub fn range(payload: &RawPayload, start_ts: i64, end_ts: i64, days: i64) -> RangeResponse {
    let power = series(payload, Metric::Power);
    let voltage = series(payload, Metric::Voltage);
    let current = series(payload, Metric::Current);
    let frequency = series(payload, Metric::Frequency);
    let rmp = series(payload, Metric::Rmp);
    let energy = series(payload, Metric::Energy);
    let powerfactor = series(payload, Metric::PowerFact);

    let max_len = [power, voltage, current, frequency, rmp, energy, powerfactor]
        .iter()
        .flatten()
        .map(|s| s.len())
        .max()
        .unwrap_or(0);

    let data = (0..max_len)
        .map(|i| RangePoint {
            // Le timestamp du point vient de la série power, y compris pour
            // les autres métriques (compatibilité sortie historique).
            timestamp: power.and_then(|s| s.get(i)).and_then(|raw| raw.ts),
            power: value_at(power, i),
            voltage: value_at(voltage, i),
            current: value_at(current, i),
            frequency: value_at(frequency, i),
            rmp: value_at(rmp, i),
            energy: value_at(energy, i),
            powerfactor: value_at(powerfactor, i),
        })
        .collect();

    RangeResponse {
        data,
        start_date: format_date(start_ts),
        end_date: format_date(end_ts),
        interval: if days <= 7 { "hourly" } else { "daily" },
        online: true,
    }
}

fn format_date(ts_ms: i64) -> String {
    Local
        .timestamp_millis_opt(ts_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: serde_json::Value) -> RawPayload {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn snapshot_resolves_all_metrics_and_tunnel_url() {
        let p = payload(json!({
            "Voltage": [{"value": "231.4", "ts": 100}],
            "current": [{"value": "2.5", "ts": 101}],
            "POWER": [{"value": 578.0, "ts": 102}],
            "Energy": [{"value": "12.7", "ts": 103}],
            "Frequency": [{"value": "50.01", "ts": 104}],
            "PF": [{"value": "0.98", "ts": 105}],
            "ngrok_url": [{"value": "https://tunnel.example", "ts": 106}],
        }));
        let snap = snapshot(&p);
        assert_eq!(snap.voltage, 231.4);
        assert_eq!(snap.current, 2.5);
        assert_eq!(snap.power, 578.0);
        assert_eq!(snap.power_ts, Some(102));
        assert_eq!(snap.energy, 12.7);
        assert_eq!(snap.frequency, 50.01);
        assert_eq!(snap.powerfactor, 0.98);
        // rmp absent du payload : zéro, timestamp null.
        assert_eq!(snap.rmp, 0.0);
        assert_eq!(snap.rmp_ts, None);
        assert!(snap.online);
        assert_eq!(snap.ngrok_url.as_deref(), Some("https://tunnel.example"));
        assert!(snap.timestamp > 0);
    }

    #[test]
    fn snapshot_serializes_powerfactor_field() {
        let snap = snapshot(&payload(json!({ "PF": [{"value": "0.9", "ts": 1}] })));
        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["powerfactor"], json!(0.9));
        assert!(v.get("powerfact").is_none());
        assert_eq!(v["ngrok_url"], json!(null));
    }

    #[test]
    fn range_pads_short_series_and_keeps_power_timestamps() {
        let p = payload(json!({
            "Power": [{"value": 10, "ts": 100}, {"value": 20, "ts": 200}],
            "Voltage": [{"value": 230, "ts": 999}],
        }));
        let out = range(&p, 0, DAY_MS, 7);

        assert_eq!(out.data.len(), 2);
        assert_eq!(out.data[0].timestamp, Some(100));
        assert_eq!(out.data[0].power, 10.0);
        assert_eq!(out.data[0].voltage, 230.0);
        // Point 1 : voltage déborde de sa série ⇒ 0.0, mais le timestamp
        // vient toujours de l'élément 1 de power.
        assert_eq!(out.data[1].timestamp, Some(200));
        assert_eq!(out.data[1].power, 20.0);
        assert_eq!(out.data[1].voltage, 0.0);
        assert!(out.online);
    }

    #[test]
    fn range_without_any_resolved_key_is_empty() {
        let out = range(&payload(json!({ "unknown": [{"value": 1, "ts": 1}] })), 0, 1, 7);
        assert!(out.data.is_empty());
    }

    #[test]
    fn interval_label_follows_day_count() {
        let p = payload(json!({}));
        assert_eq!(range(&p, 0, 1, 7).interval, "hourly");
        assert_eq!(range(&p, 0, 1, 30).interval, "daily");
    }

    #[test]
    fn time_range_spans_requested_days() {
        let (start, end) = time_range(7);
        assert_eq!(end - start, 7 * DAY_MS);
        assert!(end <= now_ms());
    }

    #[test]
    fn dates_format_as_year_month_day() {
        let out = range(&payload(json!({})), 0, DAY_MS, 30);
        // Epoch 0 en heure locale : 1970-01-01 ou 1969-12-31 selon le fuseau.
        assert!(out.start_date.starts_with("19"), "{}", out.start_date);
        assert_eq!(out.start_date.len(), 10);
        assert_eq!(&out.start_date[4..5], "-");
        assert_eq!(&out.start_date[7..8], "-");
        assert_eq!(out.end_date.len(), 10);
    }
}
