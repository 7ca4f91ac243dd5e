// ============================================================================
// Settings : configuration persistée
// ============================================================================
// Stockage clé / valeur en JSON :
// - Linux : ~/.config/cryptoverlay/settings.json
// - macOS : ~/Library/Application Support/cryptoverlay/settings.json
// - Windows : C:\Users\<user>\AppData\Roaming\cryptoverlay\settings.json
//
// La variable d'environnement CRYPTOVERLAY_SETTINGS remplace ce chemin.
//
// Les listes sont stockées comme du texte saisi par l'utilisateur
// ("bitcoin, dogecoin") et normalisées à la lecture.
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::models::{parse_alarm_lines, Alarm, ChartRange};

pub const DEFAULT_COIN: &str = "dogecoin";
pub const DEFAULT_CURRENCY: &str = "usd";

/// Intervalle de rafraîchissement par défaut (ms)
pub const DEFAULT_REFRESH_MS: u64 = 1_990_000;
/// Bornes de l'intervalle de rafraîchissement (ms)
pub const MIN_REFRESH_MS: u64 = 10_000;
pub const MAX_REFRESH_MS: u64 = 3_600_000;

const SETTINGS_ENV: &str = "CRYPTOVERLAY_SETTINGS";

/// Settings de l'application
///
/// CONCEPT : Défauts clé par clé
/// - Une clé absente ou mal typée prend la valeur de Settings::default()
/// - Les autres clés du fichier sont conservées
/// - Un fichier d'une ancienne version reste lisible
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Coins séparés par des virgules
    pub coins: String,

    /// Devises séparées par des virgules
    pub vs: String,

    /// Intervalle de rafraîchissement en millisecondes
    pub refresh: u64,

    /// Position de l'overlay (colonne, ligne)
    pub posx: i32,
    pub posy: i32,

    /// Alarmes, une par ligne : "coin,currency,threshold"
    pub alarms: String,

    /// true : endpoint markets (prix + variations), false : simple/price
    pub show_changes: bool,

    /// Plage du graphique en jours
    pub chart_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coins: DEFAULT_COIN.to_string(),
            vs: DEFAULT_CURRENCY.to_string(),
            refresh: DEFAULT_REFRESH_MS,
            posx: 20,
            posy: 300,
            alarms: String::new(),
            show_changes: true,
            chart_days: ChartRange::default().days(),
        }
    }
}

/// Découpe une liste "a, B,,c" en ["a", "b", "c"]
///
/// Liste vide après nettoyage : `fallback` seul
pub fn parse_id_list(text: &str, fallback: &str) -> Vec<String> {
    let ids: Vec<String> = text
        .split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .collect();

    if ids.is_empty() {
        vec![fallback.to_string()]
    } else {
        ids
    }
}

/// Borne un intervalle de rafraîchissement dans [MIN_REFRESH_MS, MAX_REFRESH_MS]
pub fn clamp_refresh(ms: u64) -> u64 {
    ms.clamp(MIN_REFRESH_MS, MAX_REFRESH_MS)
}

/// Lit une clé, `default` si elle est absente ou du mauvais type
fn field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str, default: T) -> T {
    let Some(value) = map.get(key) else {
        return default;
    };
    match T::deserialize(value) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(key, %value, error = %e, "Invalid settings value, using default");
            default
        }
    }
}

impl Settings {
    /// Construit les settings depuis un document JSON
    ///
    /// Document qui n'est pas un objet : valeurs par défaut
    pub fn from_json(document: &Value) -> Self {
        let defaults = Self::default();
        let Some(map) = document.as_object() else {
            warn!("Settings document is not a JSON object, using defaults");
            return defaults;
        };

        Self {
            coins: field(map, "coins", defaults.coins),
            vs: field(map, "vs", defaults.vs),
            refresh: field(map, "refresh", defaults.refresh),
            posx: field(map, "posx", defaults.posx),
            posy: field(map, "posy", defaults.posy),
            alarms: field(map, "alarms", defaults.alarms),
            show_changes: field(map, "show_changes", defaults.show_changes),
            chart_days: field(map, "chart_days", defaults.chart_days),
        }
    }

    pub fn coin_list(&self) -> Vec<String> {
        parse_id_list(&self.coins, DEFAULT_COIN)
    }

    pub fn currency_list(&self) -> Vec<String> {
        parse_id_list(&self.vs, DEFAULT_CURRENCY)
    }

    pub fn refresh_ms(&self) -> u64 {
        clamp_refresh(self.refresh)
    }

    pub fn alarm_list(&self) -> Vec<Alarm> {
        parse_alarm_lines(self.alarms.split('\n'))
    }

    /// Plage du graphique, 7 jours si la valeur stockée n'est pas supportée
    pub fn chart_range(&self) -> ChartRange {
        ChartRange::from_days(self.chart_days).unwrap_or_default()
    }
}

// ============================================================================
// SettingsStore : lecture / écriture du fichier
// ============================================================================

/// Fichier de settings
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store à un chemin explicite
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store à l'emplacement par défaut (ou CRYPTOVERLAY_SETTINGS)
    pub fn default_location() -> Self {
        if let Some(path) = std::env::var_os(SETTINGS_ENV) {
            return Self::at(path);
        }

        let dir = dirs::config_dir()
            .map(|dir| dir.join("cryptoverlay"))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::at(dir.join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lit les settings
    ///
    /// - Fichier absent : valeurs par défaut
    /// - Fichier illisible ou JSON invalide : erreur
    /// - Clé absente ou mal typée : valeur par défaut pour cette clé seulement
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No settings file, using defaults");
            return Ok(Settings::default());
        }

        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Échec de la lecture de {}", self.path.display()))?;
        let document: Value = serde_json::from_str(&text)
            .with_context(|| format!("Settings invalides dans {}", self.path.display()))?;
        let settings = Settings::from_json(&document);

        info!(path = ?self.path, "Settings loaded");
        Ok(settings)
    }

    /// Lit les settings, valeurs par défaut en cas d'erreur
    pub fn load_or_default(&self) -> Settings {
        self.load().unwrap_or_else(|e| {
            warn!(error = ?e, "Failed to load settings, using defaults");
            Settings::default()
        })
    }

    /// Écrit le document complet (crée les répertoires parents)
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Échec de la création du répertoire de settings")?;
        }

        let text = serde_json::to_string_pretty(settings).context("Échec de la sérialisation des settings")?;
        fs::write(&self.path, text)
            .with_context(|| format!("Échec de l'écriture de {}", self.path.display()))?;

        info!(path = ?self.path, "Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> SettingsStore {
        let dir = std::env::temp_dir().join(format!("cryptoverlay-test-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        SettingsStore::at(dir.join("nested").join("settings.json"))
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.coin_list(), vec!["dogecoin"]);
        assert_eq!(settings.currency_list(), vec!["usd"]);
        assert_eq!(settings.refresh_ms(), 1_990_000);
        assert_eq!((settings.posx, settings.posy), (20, 300));
        assert!(settings.alarm_list().is_empty());
        assert_eq!(settings.chart_range(), ChartRange::OneWeek);
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list(" Bitcoin, ,ETHEREUM,,", "x"), vec!["bitcoin", "ethereum"]);
        assert_eq!(parse_id_list(" , ", "usd"), vec!["usd"]);
        assert_eq!(parse_id_list("", "dogecoin"), vec!["dogecoin"]);
    }

    #[test]
    fn test_refresh_is_clamped() {
        assert_eq!(clamp_refresh(5), MIN_REFRESH_MS);
        assert_eq!(clamp_refresh(99_999_999), MAX_REFRESH_MS);
        assert_eq!(clamp_refresh(60_000), 60_000);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let settings = Settings::from_json(&serde_json::json!({"coins": "bitcoin", "refresh": 30000}));
        assert_eq!(settings.coin_list(), vec!["bitcoin"]);
        assert_eq!(settings.refresh_ms(), 30_000);
        assert_eq!(settings.vs, "usd");
        assert!(settings.show_changes);
    }

    #[test]
    fn test_wrongly_typed_key_keeps_the_others() {
        let settings = Settings::from_json(&serde_json::json!({
            "coins": "bitcoin",
            "vs": "eur",
            "refresh": "fast",
            "posx": 12,
            "alarms": "bitcoin,eur,50000",
        }));
        assert_eq!(settings.coins, "bitcoin");
        assert_eq!(settings.vs, "eur");
        assert_eq!(settings.refresh, DEFAULT_REFRESH_MS);
        assert_eq!(settings.posx, 12);
        assert_eq!(settings.alarm_list(), vec![Alarm::new("bitcoin", "eur", 50000.0)]);

        let settings = Settings::from_json(&serde_json::json!({"refresh": -5, "show_changes": "yes"}));
        assert_eq!(settings.refresh, DEFAULT_REFRESH_MS);
        assert!(settings.show_changes);

        assert_eq!(Settings::from_json(&serde_json::json!([1, 2])), Settings::default());
    }

    #[test]
    fn test_store_bad_key_does_not_reset_alarms() {
        let store = temp_store("badkey");
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"coins":"bitcoin","vs":"eur","refresh":"fast","alarms":"bitcoin,eur,1"}"#,
        )
        .unwrap();

        let settings = store.load_or_default();
        assert_eq!(settings.coins, "bitcoin");
        assert_eq!(settings.vs, "eur");
        assert_eq!(settings.refresh_ms(), DEFAULT_REFRESH_MS);
        assert_eq!(settings.alarms, "bitcoin,eur,1");
    }

    #[test]
    fn test_alarm_list_from_text() {
        let settings = Settings {
            alarms: "bitcoin,usd,70000\nbroken line\ndogecoin,eur,0.5".to_string(),
            ..Settings::default()
        };
        let alarms = settings.alarm_list();
        assert_eq!(alarms.len(), 2);
        assert_eq!(alarms[1], Alarm::new("dogecoin", "eur", 0.5));
    }

    #[test]
    fn test_store_missing_file_gives_defaults() {
        let store = temp_store("missing");
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_store_save_then_load() {
        let store = temp_store("save");
        let settings = Settings {
            coins: "bitcoin,ethereum".to_string(),
            vs: "usd,eur".to_string(),
            refresh: 60_000,
            posx: 4,
            posy: 2,
            alarms: "bitcoin,usd,70000".to_string(),
            show_changes: false,
            chart_days: 30,
        };

        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_store_invalid_json() {
        let store = temp_store("invalid");
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().is_err());
        assert_eq!(store.load_or_default(), Settings::default());
    }
}
