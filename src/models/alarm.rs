// ============================================================================
// Structure : Alarm
// ============================================================================
// Alarme de prix : (coin, devise, seuil), déclenchée quand prix >= seuil
//
// Format texte (une alarme par ligne) : "coin,currency,threshold"
// Exemple : "bitcoin,usd,70000"
// ============================================================================

use crate::models::quote::format_price;

/// Alarme de prix
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    /// Id du coin (minuscules, ex: "bitcoin")
    pub coin: String,

    /// Code devise (minuscules, ex: "usd")
    pub currency: String,

    /// Seuil de déclenchement
    pub threshold: f64,
}

/// Alarme déclenchée, prête à être notifiée
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmHit {
    pub coin: String,
    pub currency: String,
    pub price: f64,
    pub threshold: f64,
}

impl Alarm {
    pub fn new(coin: &str, currency: &str, threshold: f64) -> Self {
        Self {
            coin: coin.trim().to_lowercase(),
            currency: currency.trim().to_lowercase(),
            threshold,
        }
    }

    /// Parse une ligne "coin,currency,threshold"
    ///
    /// CONCEPT RUST : Option et early return avec ?
    /// - Moins de 3 morceaux non vides : None
    /// - Seuil non numérique : None
    /// - Les morceaux au-delà du troisième sont ignorés
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split(',').filter(|part| !part.is_empty());
        let coin = parts.next()?;
        let currency = parts.next()?;
        let threshold = parts.next()?.trim().parse::<f64>().ok()?;

        Some(Self::new(coin, currency, threshold))
    }

    /// Ligne texte équivalente
    pub fn to_line(&self) -> String {
        format!("{},{},{}", self.coin, self.currency, self.threshold)
    }

    /// Vérifie si l'alarme concerne ce couple coin / devise
    pub fn matches(&self, coin: &str, currency: &str) -> bool {
        self.coin == coin && self.currency == currency
    }
}

impl AlarmHit {
    /// Message de notification
    ///
    /// Format : "bitcoin USD reached 70500 (threshold 70000)"
    pub fn message(&self) -> String {
        format!(
            "{} {} reached {} (threshold {})",
            self.coin,
            self.currency.to_uppercase(),
            format_price(self.price),
            format_price(self.threshold)
        )
    }
}

/// Parse une suite de lignes d'alarmes, les lignes invalides sont ignorées
///
/// CONCEPT RUST : Iterator + filter_map
/// - filter_map garde les Some et jette les None en une seule passe
pub fn parse_alarm_lines<'a, I>(lines: I) -> Vec<Alarm>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter(|line| !line.is_empty())
        .filter_map(Alarm::parse_line)
        .collect()
}

/// Convertit des alarmes en lignes texte
pub fn alarm_lines(alarms: &[Alarm]) -> Vec<String> {
    alarms.iter().map(Alarm::to_line).collect()
}

/// Évalue les alarmes pour un prix reçu
///
/// Une alarme est déclenchée à chaque évaluation tant que prix >= seuil.
/// Un prix non fini (NaN) ne déclenche jamais rien.
pub fn evaluate(alarms: &[Alarm], coin: &str, currency: &str, price: f64) -> Vec<AlarmHit> {
    if !price.is_finite() {
        return Vec::new();
    }

    alarms
        .iter()
        .filter(|alarm| alarm.matches(coin, currency) && price >= alarm.threshold)
        .map(|alarm| AlarmHit {
            coin: coin.to_string(),
            currency: currency.to_string(),
            price,
            threshold: alarm.threshold,
        })
        .collect()
}
