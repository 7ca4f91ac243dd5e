// ============================================================================
// Structure : PriceSeries
// ============================================================================
// Série historique (timestamp, prix) pour le graphique ligne
//
// CONCEPTS RUST :
// 1. DateTime<Utc> : timestamps de l'API (millisecondes) convertis par chrono
// 2. fold() : min / max en un seul passage
// ============================================================================

use chrono::{DateTime, Utc};

/// Plage du graphique historique (paramètre `days` de l'API)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartRange {
    OneDay,
    TwoDays,
    OneWeek,
    TwoWeeks,
    OneMonth,
    ThreeMonths,
    OneYear,
}

impl ChartRange {
    const ALL: [ChartRange; 7] = [
        ChartRange::OneDay,
        ChartRange::TwoDays,
        ChartRange::OneWeek,
        ChartRange::TwoWeeks,
        ChartRange::OneMonth,
        ChartRange::ThreeMonths,
        ChartRange::OneYear,
    ];

    /// Nombre de jours demandés à l'API
    pub fn days(&self) -> u32 {
        match self {
            ChartRange::OneDay => 1,
            ChartRange::TwoDays => 2,
            ChartRange::OneWeek => 7,
            ChartRange::TwoWeeks => 14,
            ChartRange::OneMonth => 30,
            ChartRange::ThreeMonths => 90,
            ChartRange::OneYear => 365,
        }
    }

    /// Label court pour l'affichage
    pub fn label(&self) -> &'static str {
        match self {
            ChartRange::OneDay => "1D",
            ChartRange::TwoDays => "2D",
            ChartRange::OneWeek => "7D",
            ChartRange::TwoWeeks => "14D",
            ChartRange::OneMonth => "1M",
            ChartRange::ThreeMonths => "3M",
            ChartRange::OneYear => "1Y",
        }
    }

    /// Retrouve une plage depuis un nombre de jours (settings)
    pub fn from_days(days: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|range| range.days() == days)
    }

    fn position(&self) -> usize {
        Self::ALL.iter().position(|range| range == self).unwrap_or(0)
    }

    /// Plage suivante (cycle : 1Y → 1D)
    pub fn next(&self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    /// Plage précédente (cycle : 1D → 1Y)
    pub fn previous(&self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl Default for ChartRange {
    /// 7 jours, comme le bouton "Load Chart"
    fn default() -> Self {
        ChartRange::OneWeek
    }
}

/// Point du graphique
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    /// Construit un point depuis un timestamp en millisecondes
    pub fn from_millis(millis: i64, price: f64) -> Option<Self> {
        let timestamp = DateTime::from_timestamp_millis(millis)?;
        Some(Self { timestamp, price })
    }
}

/// Série de prix pour un couple coin / devise
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub coin: String,
    pub currency: String,
    pub days: u32,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(coin: String, currency: String, days: u32) -> Self {
        Self {
            coin,
            currency,
            days,
            points: Vec::new(),
        }
    }

    pub fn push(&mut self, point: PricePoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bornes (min, max) des prix
    ///
    /// Si min ≈ max (série plate), on élargit de ±0.1% pour que la ligne
    /// ne soit pas écrasée sur un bord
    pub fn price_bounds(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?.price;
        let (mut min, mut max) = self.points.iter().fold((first, first), |(min, max), point| {
            (min.min(point.price), max.max(point.price))
        });

        if fuzzy_eq(min, max) {
            min *= 0.999;
            max *= 1.001;
        }
        Some((min, max))
    }

    /// Premier et dernier timestamp (ordre de réception)
    pub fn time_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.points.first()?.timestamp, self.points.last()?.timestamp))
    }

    /// Points (x = timestamp ms, y = prix) pour le widget Chart
    pub fn chart_points(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|point| (point.timestamp.timestamp_millis() as f64, point.price))
            .collect()
    }

    /// Variation entre le premier et le dernier point, en pourcentage
    pub fn change_percent(&self) -> Option<f64> {
        let first = self.points.first()?.price;
        let last = self.points.last()?.price;
        if first == 0.0 {
            return None;
        }
        Some((last - first) / first * 100.0)
    }
}

/// Égalité relative (précision ~12 chiffres significatifs)
fn fuzzy_eq(a: f64, b: f64) -> bool {
    (a - b).abs() * 1e12 <= a.abs().min(b.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(prices: &[(i64, f64)]) -> PriceSeries {
        let mut s = PriceSeries::new("bitcoin".to_string(), "usd".to_string(), 7);
        for &(t, p) in prices {
            s.push(PricePoint::from_millis(t, p).unwrap());
        }
        s
    }

    #[test]
    fn test_chart_range_cycle() {
        assert_eq!(ChartRange::default().days(), 7);
        assert_eq!(ChartRange::OneYear.next(), ChartRange::OneDay);
        assert_eq!(ChartRange::OneDay.previous(), ChartRange::OneYear);
        assert_eq!(ChartRange::OneWeek.next(), ChartRange::TwoWeeks);
        assert_eq!(ChartRange::from_days(30), Some(ChartRange::OneMonth));
        assert_eq!(ChartRange::from_days(3), None);
    }

    #[test]
    fn test_price_bounds() {
        let s = series(&[(1_000, 10.0), (2_000, 12.5), (3_000, 9.0)]);
        assert_eq!(s.price_bounds(), Some((9.0, 12.5)));
        assert!(PriceSeries::default().price_bounds().is_none());
    }

    #[test]
    fn test_flat_series_bounds_are_widened() {
        let s = series(&[(1_000, 100.0), (2_000, 100.0)]);
        let (min, max) = s.price_bounds().unwrap();
        assert!((min - 99.9).abs() < 1e-9);
        assert!((max - 100.1).abs() < 1e-9);
    }

    #[test]
    fn test_time_bounds_and_points() {
        let s = series(&[(1_700_000_000_000, 1.0), (1_700_000_360_000, 2.0)]);
        let (start, end) = s.time_bounds().unwrap();
        assert_eq!(start.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(end.timestamp_millis(), 1_700_000_360_000);
        assert_eq!(s.chart_points()[1], (1_700_000_360_000.0, 2.0));
        assert_eq!(s.change_percent(), Some(100.0));
    }
}
