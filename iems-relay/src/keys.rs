/**
 * NORMALISATION DES CLÉS TÉLÉMÉTRIE - Table d'alias vendeur → schéma stable
 *
 * RÔLE :
 * Les firmwares des compteurs publient les mêmes mesures sous des graphies
 * différentes (Voltage / voltage / VOLTAGE...). Ce module fait correspondre
 * chaque clé canonique du dashboard à ses variantes observées côté vendeur
 * et extrait les paires valeur + timestamp du payload brut.
 *
 * FONCTIONNEMENT :
 * - Table statique ordonnée : la première variante présente dans le payload gagne,
 *   même si sa série est vide (on ne continue pas le scan)
 * - Correspondance exacte sensible à la casse, aucun case-folding du payload
 * - Résolution dégradée : clé absente ou valeur invalide ⇒ 0.0, timestamp absent
 *
 * UTILITÉ DANS IEMS :
 * 🎯 Schéma stable côté dashboard quelles que soient les variantes firmware
 * 🎯 Jamais d'erreur propagée : une mesure manquante vaut zéro, resolved à false
 */

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Un enregistrement brut ThingsBoard : valeur (chaîne ou nombre) + timestamp ms.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSample {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub ts: Option<i64>,
}

/// Payload time-series natif : clé vendeur → série ordonnée (plus récent d'abord).
pub type RawPayload = HashMap<String, Vec<RawSample>>;

/// Variantes de graphie sous lesquelles l'URL tunnel peut apparaître.
pub const TUNNEL_ALIASES: [&str; 3] = ["ngrok_url", "Ngrok_Url", "NGROK_URL"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Voltage,
    Current,
    Power,
    Energy,
    Frequency,
    PowerFact,
    Rmp,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Voltage,
        Metric::Current,
        Metric::Power,
        Metric::Energy,
        Metric::Frequency,
        Metric::PowerFact,
        Metric::Rmp,
    ];

    /// Identifiant canonique stable, utilisé dans les requêtes amont.
    pub fn canonical(self) -> &'static str {
        match self {
            Metric::Voltage => "voltage",
            Metric::Current => "current",
            Metric::Power => "power",
            Metric::Energy => "energy",
            Metric::Frequency => "frequency",
            Metric::PowerFact => "powerfact",
            Metric::Rmp => "rmp",
        }
    }

    /// Nom du champ JSON sortant. Historiquement `powerfact` sort en `powerfactor`.
    pub fn field_name(self) -> &'static str {
        match self {
            Metric::PowerFact => "powerfactor",
            m => m.canonical(),
        }
    }

    /// Variantes vendeur, vérifiées dans l'ordre listé.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Metric::Voltage => &["Voltage", "voltage", "VOLTAGE"],
            Metric::Current => &["Current", "current", "CURRENT"],
            Metric::Power => &["Power", "power", "POWER"],
            Metric::Energy => &["Energy", "energy", "ENERGY"],
            Metric::Frequency => &["Frequency", "frequency", "FREQUENCY"],
            Metric::PowerFact => &["PowerFact", "PF", "powerfactor", "Power_Factor"],
            Metric::Rmp => &["RMP", "rmp", "Rmp"],
        }
    }

    pub fn from_canonical(key: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.canonical() == key)
    }
}

/// Mesure normalisée. `resolved` distingue "l'appareil a rapporté zéro"
/// de "clé absente ou série vide" (les deux valent 0.0 côté valeur).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub ts: Option<i64>,
    pub resolved: bool,
}

impl Sample {
    const MISSING: Sample = Sample { value: 0.0, ts: None, resolved: false };
}

/// Développe une clé de requête en ses variantes vendeur (repli : la clé littérale).
pub fn expand_key(key: &str) -> Vec<String> {
    match Metric::from_canonical(key.to_ascii_lowercase().as_str()) {
        Some(m) => m.aliases().iter().map(|a| a.to_string()).collect(),
        None => vec![key.to_string()],
    }
}

/// Première variante présente comme clé du payload, dans l'ordre listé.
pub fn find_actual_key<'a>(payload: &'a RawPayload, aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .find_map(|a| payload.get_key_value(*a).map(|(k, _)| k.as_str()))
}

/// Résout une métrique canonique en `Sample`. Ne panique jamais.
pub fn resolve(payload: &RawPayload, metric: Metric) -> Sample {
    let Some(actual) = find_actual_key(payload, metric.aliases()) else {
        return Sample::MISSING;
    };
    let Some(first) = payload[actual].first() else {
        // Variante présente mais série vide : on ne regarde pas les suivantes.
        return Sample::MISSING;
    };
    Sample {
        value: numeric_value(first),
        ts: first.ts,
        resolved: true,
    }
}

/// Valeur d'un échantillon brut en f64 ; 0.0 sur tout échec de parse.
pub fn numeric_value(raw: &RawSample) -> f64 {
    match &raw.value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Première variante présente avec une série non vide dont la valeur est une
/// chaîne non vide (utilisé pour l'URL tunnel).
pub fn resolve_url(payload: &RawPayload, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        let Some(series) = payload.get(*alias) else { continue };
        let Some(first) = series.first() else { continue };
        if let Value::String(s) = &first.value {
            if !s.is_empty() {
                return Some(s.clone());
            }
        }
    }
    None
}
