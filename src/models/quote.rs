// ============================================================================
// Structure : Quote
// ============================================================================
// Cotation d'un coin dans une devise : prix + variations 1h / 24h / 7d
//
// CONCEPTS RUST :
// 1. Option<f64> : une valeur absente ou `null` dans le JSON devient None
// 2. HashMap : les réponses de l'API sont indexées par id de coin
// ============================================================================

use std::collections::HashMap;

/// Cotation d'un coin pour une devise donnée
///
/// Tous les champs sont optionnels : l'API peut omettre un champ ou le
/// renvoyer à `null` (coin trop récent, pas de données 7d, etc.)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quote {
    /// Prix courant dans la devise
    pub price: Option<f64>,

    /// Variation sur 1 heure en pourcentage
    pub change_1h: Option<f64>,

    /// Variation sur 24 heures en pourcentage
    pub change_24h: Option<f64>,

    /// Variation sur 7 jours en pourcentage
    pub change_7d: Option<f64>,
}

impl Quote {
    /// Crée une cotation avec seulement un prix (endpoint simple/price)
    pub fn with_price(price: f64) -> Self {
        Self {
            price: Some(price),
            ..Self::default()
        }
    }

    /// Prix exploitable : présent et fini
    ///
    /// CONCEPT RUST : Option::filter
    /// - Some(NaN) ou Some(inf) deviennent None
    pub fn usable_price(&self) -> Option<f64> {
        self.price.filter(|p| p.is_finite())
    }
}

/// Réponse de l'API pour une devise, une fois le corps parsé
///
/// CONCEPT : Séparer "erreur réseau" et "réponse inattendue"
/// - Une erreur réseau remonte en `Err` (affiche "Error")
/// - Un corps qui n'a pas la forme attendue donne `Unexpected` (affiche "N/A")
#[derive(Debug, Clone, PartialEq)]
pub enum PriceReply {
    /// Cotations indexées par id de coin
    Quotes(HashMap<String, Quote>),

    /// Corps illisible ou de mauvaise forme
    Unexpected,
}

/// Chiffres significatifs affichés pour un prix
const SIGNIFICANT_DIGITS: usize = 6;

/// Formatte un prix pour l'affichage, comme `%g` en C
///
/// - 6 chiffres significatifs, zéros de fin retirés
/// - Notation scientifique si l'exposant est < -4 ou >= 6
///
/// 0.1234 → "0.1234", 65000.0 → "65000", 1234567.8 → "1.23457e+06"
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return price.to_string();
    }
    if price == 0.0 {
        return "0".to_string();
    }

    // L'arrondi est fait ici : l'exposant lu tient compte des retenues
    let scientific = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, price);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS as i32 - 1 - exponent).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, price)).to_string()
    }
}

fn trim_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Formatte une variation en pourcentage : "2.35% ↑", "1.20% ↓" ou "N/A"
pub fn format_change(change: Option<f64>) -> String {
    match change.filter(|c| !c.is_nan()) {
        Some(pct) => {
            let arrow = if pct >= 0.0 { "↑" } else { "↓" };
            format!("{:.2}% {}", pct.abs(), arrow)
        }
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_change() {
        assert_eq!(format_change(Some(2.345)), "2.35% ↑");
        assert_eq!(format_change(Some(-1.2)), "1.20% ↓");
        assert_eq!(format_change(Some(0.0)), "0.00% ↑");
        assert_eq!(format_change(None), "N/A");
        assert_eq!(format_change(Some(f64::NAN)), "N/A");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0.1234), "0.1234");
        assert_eq!(format_price(65000.0), "65000");
        assert_eq!(format_price(0.0), "0");
        assert_eq!(format_price(-2.5), "-2.5");
    }

    #[test]
    fn test_format_price_six_significant_digits() {
        assert_eq!(format_price(123456.7), "123457");
        assert_eq!(format_price(1234.56789), "1234.57");
        assert_eq!(format_price(0.0001), "0.0001");
        assert_eq!(format_price(0.000012345678), "1.23457e-05");
        assert_eq!(format_price(1234567.8), "1.23457e+06");
        // Retenue : 999999.7 arrondi à 1e+06
        assert_eq!(format_price(999999.7), "1e+06");
    }

    #[test]
    fn test_usable_price() {
        assert_eq!(Quote::with_price(1.5).usable_price(), Some(1.5));
        assert_eq!(Quote::with_price(f64::NAN).usable_price(), None);
        assert_eq!(Quote::default().usable_price(), None);
    }
}
