// ============================================================================
// Structure : PriceGrid
// ============================================================================
// Grille coin × devise affichée par l'overlay
//
// ORGANISATION :
// - coins C[0..n), devises V[0..m)
// - slots rangés ligne par ligne : index = ci * m + vi
//
// CONCEPT : Réponses asynchrones et configuration mutable
// - Une requête part par devise, la réponse arrive plus tard
// - Entre-temps l'utilisateur a pu changer les coins ou les devises
// - On recalcule donc la colonne au moment où la réponse est appliquée,
//   et chaque écriture passe par get_mut() (jamais d'index hors limites)
// - Les réponses arrivent dans n'importe quel ordre : chaque case retient le
//   numéro du rafraîchissement qui l'a écrite, une réponse plus ancienne ne
//   l'écrase jamais
// ============================================================================

use anyhow::Result;
use tracing::{debug, warn};

use crate::models::alarm::{self, Alarm, AlarmHit};
use crate::models::quote::{format_change, format_price, PriceReply, Quote};

/// État d'une case de la grille
#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    /// En attente de la première réponse
    Pending,

    /// La requête a échoué (réseau, HTTP)
    Error,

    /// Réponse reçue mais illisible
    Unavailable,

    /// Le coin n'apparaît pas dans la réponse (id invalide ?)
    Missing,

    /// Le coin est présent mais sans prix
    NoPrice,

    /// Cotation complète
    Quoted(Quote),
}

impl SlotState {
    /// Texte affiché pour cette case
    pub fn text(&self, coin: &str, currency: &str) -> String {
        let cur = currency.to_uppercase();
        match self {
            SlotState::Pending => format!("{} ({}): ...", coin, cur),
            SlotState::Error => "Error".to_string(),
            SlotState::Unavailable => "N/A".to_string(),
            SlotState::Missing => format!("{} ({}): N/A", coin, cur),
            SlotState::NoPrice => format!("{} ({}): -", coin, cur),
            SlotState::Quoted(quote) => format!(
                "{} ({})\nPrice: {}\n1h: {}\n24h: {}\n7d: {}",
                coin,
                cur,
                quote.usable_price().map(format_price).unwrap_or_else(|| "-".to_string()),
                format_change(quote.change_1h),
                format_change(quote.change_24h),
                format_change(quote.change_7d),
            ),
        }
    }

    /// Variation 24h si disponible (utilisée pour la couleur)
    pub fn change_24h(&self) -> Option<f64> {
        match self {
            SlotState::Quoted(quote) => quote.change_24h,
            _ => None,
        }
    }
}

/// Case de la grille vue par le rendu
#[derive(Debug, Clone, Copy)]
pub struct Slot<'a> {
    pub coin: &'a str,
    pub currency: &'a str,
    pub state: &'a SlotState,
}

impl Slot<'_> {
    pub fn text(&self) -> String {
        self.state.text(self.coin, self.currency)
    }
}

/// Grille des prix
#[derive(Debug, Clone)]
pub struct PriceGrid {
    coins: Vec<String>,
    currencies: Vec<String>,
    slots: Vec<SlotState>,
    /// Numéro du rafraîchissement qui a écrit chaque case (0 : jamais écrite)
    written_by: Vec<u64>,
}

impl PriceGrid {
    pub fn new(coins: Vec<String>, currencies: Vec<String>) -> Self {
        let mut grid = Self {
            coins,
            currencies,
            slots: Vec::new(),
            written_by: Vec::new(),
        };
        grid.rebuild();
        grid
    }

    pub fn coins(&self) -> &[String] {
        &self.coins
    }

    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    /// Remplace la liste des coins (toutes les cases repassent en attente)
    pub fn set_coins(&mut self, coins: Vec<String>) {
        self.coins = coins;
        self.rebuild();
    }

    /// Remplace la liste des devises (toutes les cases repassent en attente)
    pub fn set_currencies(&mut self, currencies: Vec<String>) {
        self.currencies = currencies;
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let expected = self.coins.len() * self.currencies.len();
        self.slots = vec![SlotState::Pending; expected];
        self.written_by = vec![0; expected];
    }

    /// Nombre de cases
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index linéaire d'une case (None si hors de la grille)
    pub fn slot_index(&self, coin_index: usize, currency_index: usize) -> Option<usize> {
        if coin_index >= self.coins.len() || currency_index >= self.currencies.len() {
            return None;
        }
        let index = coin_index * self.currencies.len() + currency_index;
        (index < self.slots.len()).then_some(index)
    }

    /// État d'une case
    pub fn state(&self, coin_index: usize, currency_index: usize) -> Option<&SlotState> {
        self.slot_index(coin_index, currency_index)
            .and_then(|index| self.slots.get(index))
    }

    /// Cases dans l'ordre d'affichage (coin par coin, puis devise)
    pub fn slots(&self) -> impl Iterator<Item = Slot<'_>> {
        let width = self.currencies.len();
        self.slots.iter().enumerate().filter_map(move |(index, state)| {
            let coin = self.coins.get(index / width.max(1))?;
            let currency = self.currencies.get(index % width.max(1))?;
            Some(Slot {
                coin: coin.as_str(),
                currency: currency.as_str(),
                state,
            })
        })
    }

    /// Devises à interroger lors d'un rafraîchissement
    ///
    /// Vide si aucun coin ou aucune devise : aucune requête ne part
    pub fn refresh_targets(&self) -> Vec<String> {
        if self.coins.is_empty() || self.currencies.is_empty() {
            return Vec::new();
        }
        self.currencies.clone()
    }

    /// Écrit une case si la réponse n'est pas plus ancienne que son contenu
    fn write_slot(&mut self, index: usize, sequence: u64, state: SlotState) -> bool {
        match (self.slots.get_mut(index), self.written_by.get_mut(index)) {
            (Some(slot), Some(written_by)) if sequence >= *written_by => {
                *slot = state;
                *written_by = sequence;
                true
            }
            _ => false,
        }
    }

    /// Index des coins à écrire : configurés ET présents dans la requête
    fn requested_rows(&self, requested: &[String]) -> Vec<usize> {
        self.coins
            .iter()
            .enumerate()
            .filter(|(_, coin)| requested.contains(*coin))
            .map(|(coin_index, _)| coin_index)
            .collect()
    }

    /// Applique la réponse reçue pour une devise
    ///
    /// CONCEPT : Matching au moment de la réponse
    /// - La colonne est retrouvée par nom de devise dans la config actuelle
    /// - Devise retirée entre-temps : réponse ignorée
    /// - Seuls les coins demandés par la requête ET encore configurés sont
    ///   écrits, cherchés par id dans la réponse
    /// - `sequence` est le numéro du rafraîchissement : une case déjà écrite
    ///   par un rafraîchissement plus récent est laissée telle quelle
    ///
    /// Retourne les alarmes déclenchées par les prix écrits
    pub fn apply_reply(
        &mut self,
        currency: &str,
        sequence: u64,
        requested: &[String],
        reply: Result<PriceReply>,
        alarms: &[Alarm],
    ) -> Vec<AlarmHit> {
        let Some(currency_index) = self.currencies.iter().position(|c| c == currency) else {
            debug!(currency = %currency, "Dropping reply for a currency no longer configured");
            return Vec::new();
        };
        let rows = self.requested_rows(requested);

        let quotes = match reply {
            Err(e) => {
                warn!(currency = %currency, error = %e, "Price request failed");
                self.fill_rows(&rows, currency_index, sequence, SlotState::Error);
                return Vec::new();
            }
            Ok(PriceReply::Unexpected) => {
                warn!(currency = %currency, "Unexpected price response");
                self.fill_rows(&rows, currency_index, sequence, SlotState::Unavailable);
                return Vec::new();
            }
            Ok(PriceReply::Quotes(quotes)) => quotes,
        };

        let mut hits = Vec::new();
        let mut stale = 0;
        for coin_index in rows {
            let Some(index) = self.slot_index(coin_index, currency_index) else {
                continue;
            };
            let coin = self.coins[coin_index].clone();

            let (state, price) = match quotes.get(&coin) {
                None => (SlotState::Missing, None),
                Some(quote) => match quote.usable_price() {
                    None => (SlotState::NoPrice, None),
                    Some(price) => (SlotState::Quoted(quote.clone()), Some(price)),
                },
            };

            if !self.write_slot(index, sequence, state) {
                stale += 1;
                continue;
            }
            if let Some(price) = price {
                hits.extend(alarm::evaluate(alarms, &coin, currency, price));
            }
        }

        debug!(
            currency = %currency,
            sequence,
            quotes = quotes.len(),
            stale,
            alarms = hits.len(),
            "Applied price reply"
        );
        hits
    }

    /// Écrit le même état dans les cases d'une colonne
    fn fill_rows(&mut self, rows: &[usize], currency_index: usize, sequence: u64, state: SlotState) {
        for &coin_index in rows {
            if let Some(index) = self.slot_index(coin_index, currency_index) {
                self.write_slot(index, sequence, state.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn full_quote(price: f64) -> Quote {
        Quote {
            price: Some(price),
            change_1h: Some(0.5),
            change_24h: Some(-2.0),
            change_7d: None,
        }
    }

    fn reply(entries: &[(&str, Quote)]) -> Result<PriceReply> {
        let map: HashMap<String, Quote> = entries
            .iter()
            .map(|(id, q)| (id.to_string(), q.clone()))
            .collect();
        Ok(PriceReply::Quotes(map))
    }

    #[test]
    fn test_grid_layout_row_major() {
        let grid = PriceGrid::new(strings(&["bitcoin", "dogecoin"]), strings(&["usd", "eur", "gbp"]));
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.slot_index(0, 0), Some(0));
        assert_eq!(grid.slot_index(1, 2), Some(5));
        assert_eq!(grid.slot_index(2, 0), None);
        assert_eq!(grid.slot_index(0, 3), None);

        let labels: Vec<String> = grid.slots().map(|s| s.text()).collect();
        assert_eq!(labels[0], "bitcoin (USD): ...");
        assert_eq!(labels[4], "dogecoin (EUR): ...");
    }

    #[test]
    fn test_refresh_targets_empty_lists() {
        let grid = PriceGrid::new(Vec::new(), strings(&["usd"]));
        assert!(grid.refresh_targets().is_empty());

        let grid = PriceGrid::new(strings(&["bitcoin"]), strings(&["usd", "eur"]));
        assert_eq!(grid.refresh_targets(), strings(&["usd", "eur"]));
    }

    #[test]
    fn test_apply_reply_fills_only_its_column() {
        let mut grid = PriceGrid::new(strings(&["bitcoin", "dogecoin"]), strings(&["usd", "eur"]));
        let coins = grid.coins().to_vec();
        let hits = grid.apply_reply(
            "eur",
            1,
            &coins,
            reply(&[("bitcoin", full_quote(60000.0)), ("dogecoin", Quote::default())]),
            &[],
        );
        assert!(hits.is_empty());

        assert_eq!(grid.state(0, 0), Some(&SlotState::Pending));
        assert_eq!(grid.state(0, 1), Some(&SlotState::Quoted(full_quote(60000.0))));
        assert_eq!(grid.state(1, 1), Some(&SlotState::NoPrice));
        assert_eq!(grid.state(1, 0), Some(&SlotState::Pending));
    }

    #[test]
    fn test_apply_reply_missing_coin() {
        let mut grid = PriceGrid::new(strings(&["bitcoin", "notacoin"]), strings(&["usd"]));
        let coins = grid.coins().to_vec();
        grid.apply_reply("usd", 1, &coins, reply(&[("bitcoin", full_quote(1.0))]), &[]);
        assert_eq!(grid.state(1, 0).unwrap().text("notacoin", "usd"), "notacoin (USD): N/A");
    }

    #[test]
    fn test_apply_reply_error_and_unexpected() {
        let mut grid = PriceGrid::new(strings(&["bitcoin", "dogecoin"]), strings(&["usd", "eur"]));
        let coins = grid.coins().to_vec();

        grid.apply_reply("usd", 1, &coins, Err(anyhow::anyhow!("timeout")), &[]);
        assert_eq!(grid.state(0, 0), Some(&SlotState::Error));
        assert_eq!(grid.state(1, 0), Some(&SlotState::Error));
        assert_eq!(grid.state(0, 1), Some(&SlotState::Pending));

        grid.apply_reply("eur", 1, &coins, Ok(PriceReply::Unexpected), &[]);
        assert_eq!(grid.state(0, 1).unwrap().text("bitcoin", "eur"), "N/A");
        assert_eq!(grid.state(1, 1), Some(&SlotState::Unavailable));
    }

    #[test]
    fn test_reply_for_removed_currency_is_ignored() {
        let mut grid = PriceGrid::new(strings(&["bitcoin"]), strings(&["usd", "eur"]));
        // La config change pendant que la requête "eur" est en vol
        grid.set_currencies(strings(&["usd"]));

        let alarms = vec![Alarm::new("bitcoin", "eur", 1.0)];
        let hits = grid.apply_reply("eur", 1, &strings(&["bitcoin"]), reply(&[("bitcoin", full_quote(50000.0))]), &alarms);

        assert!(hits.is_empty());
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.state(0, 0), Some(&SlotState::Pending));
    }

    #[test]
    fn test_reply_after_currency_reorder_uses_current_column() {
        let mut grid = PriceGrid::new(strings(&["bitcoin"]), strings(&["usd", "eur"]));
        grid.set_currencies(strings(&["eur", "usd"]));

        grid.apply_reply("usd", 1, &strings(&["bitcoin"]), reply(&[("bitcoin", full_quote(2.0))]), &[]);
        assert_eq!(grid.state(0, 0), Some(&SlotState::Pending));
        assert_eq!(grid.state(0, 1), Some(&SlotState::Quoted(full_quote(2.0))));
    }

    #[test]
    fn test_reply_after_coin_change_matches_by_id() {
        let mut grid = PriceGrid::new(strings(&["bitcoin", "dogecoin"]), strings(&["usd"]));
        grid.set_coins(strings(&["dogecoin"]));

        grid.apply_reply(
            "usd",
            1,
            &strings(&["bitcoin", "dogecoin"]),
            reply(&[("bitcoin", full_quote(1.0)), ("dogecoin", full_quote(0.2))]),
            &[],
        );
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.state(0, 0), Some(&SlotState::Quoted(full_quote(0.2))));
    }

    #[test]
    fn test_apply_reply_triggers_alarms() {
        let mut grid = PriceGrid::new(strings(&["bitcoin", "dogecoin"]), strings(&["usd"]));
        let alarms = vec![
            Alarm::new("bitcoin", "usd", 50000.0),
            Alarm::new("dogecoin", "usd", 1.0),
        ];

        let coins = grid.coins().to_vec();
        let hits = grid.apply_reply(
            "usd",
            1,
            &coins,
            reply(&[("bitcoin", full_quote(60000.0)), ("dogecoin", full_quote(0.2))]),
            &alarms,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].coin, "bitcoin");
        assert_eq!(hits[0].price, 60000.0);
    }

    #[test]
    fn test_older_reply_after_coin_change_keeps_fresh_quote() {
        let mut grid = PriceGrid::new(strings(&["bitcoin"]), strings(&["usd"]));
        let old_coins = grid.coins().to_vec();
        grid.set_coins(strings(&["dogecoin"]));
        let new_coins = grid.coins().to_vec();

        // La réponse du nouveau rafraîchissement arrive la première
        grid.apply_reply("usd", 2, &new_coins, reply(&[("dogecoin", full_quote(0.2))]), &[]);
        // Puis celle de l'ancien, qui ne connaît pas dogecoin
        grid.apply_reply("usd", 1, &old_coins, reply(&[("bitcoin", full_quote(60000.0))]), &[]);
        assert_eq!(grid.state(0, 0), Some(&SlotState::Quoted(full_quote(0.2))));

        grid.apply_reply("usd", 1, &old_coins, Err(anyhow::anyhow!("timeout")), &[]);
        assert_eq!(grid.state(0, 0), Some(&SlotState::Quoted(full_quote(0.2))));
    }

    #[test]
    fn test_older_reply_does_not_overwrite_newer_one() {
        let mut grid = PriceGrid::new(strings(&["bitcoin"]), strings(&["usd"]));
        let coins = grid.coins().to_vec();
        let alarms = vec![Alarm::new("bitcoin", "usd", 1.0)];

        let hits = grid.apply_reply("usd", 5, &coins, reply(&[("bitcoin", full_quote(61000.0))]), &alarms);
        assert_eq!(hits.len(), 1);

        let hits = grid.apply_reply("usd", 4, &coins, reply(&[("bitcoin", full_quote(59000.0))]), &alarms);
        assert!(hits.is_empty());
        assert_eq!(grid.state(0, 0), Some(&SlotState::Quoted(full_quote(61000.0))));

        grid.apply_reply("usd", 4, &coins, Ok(PriceReply::Unexpected), &[]);
        assert_eq!(grid.state(0, 0), Some(&SlotState::Quoted(full_quote(61000.0))));

        // Même rafraîchissement ou plus récent : écrit
        grid.apply_reply("usd", 6, &coins, Err(anyhow::anyhow!("timeout")), &[]);
        assert_eq!(grid.state(0, 0), Some(&SlotState::Error));
    }

    #[test]
    fn test_quoted_text() {
        let state = SlotState::Quoted(full_quote(0.25));
        assert_eq!(
            state.text("dogecoin", "usd"),
            "dogecoin (USD)\nPrice: 0.25\n1h: 0.50% ↑\n24h: 2.00% ↓\n7d: N/A"
        );
    }
}
