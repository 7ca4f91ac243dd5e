// ============================================================================
// API Client : CoinGecko
// ============================================================================
// Récupère les prix depuis l'API publique CoinGecko (sans clé)
//
// ENDPOINTS :
// 1. /simple/price          : prix seuls, plusieurs coins × devises
// 2. /coins/markets         : prix + variations 1h / 24h / 7d, une devise
// 3. /coins/{id}/market_chart : série historique (timestamp ms, prix)
//
// CONCEPT : Parsing tolérant
// - Les corps sont lus en texte puis parsés à part (fonctions testables)
// - Un champ absent ou null ne fait jamais échouer toute la réponse
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::models::{PricePoint, PriceReply, PriceSeries, Quote};

const API_BASE: &str = "https://api.coingecko.com/api/v3";

/// Timeout d'une requête : au-delà, la case passe en "Error"
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// Structures pour parser la réponse JSON de /coins/markets
// ============================================================================
// CONCEPT RUST : Option<f64> + serde
// - Champ absent : None (grâce à #[serde(default)])
// - Champ à null : None
// ============================================================================

/// Entrée de la réponse /coins/markets
#[derive(Debug, Deserialize)]
struct MarketEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    price_change_percentage_1h_in_currency: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h_in_currency: Option<f64>,
    #[serde(default)]
    price_change_percentage_7d_in_currency: Option<f64>,
}

impl From<MarketEntry> for Quote {
    fn from(entry: MarketEntry) -> Self {
        Quote {
            price: entry.current_price,
            change_1h: entry.price_change_percentage_1h_in_currency,
            change_24h: entry.price_change_percentage_24h_in_currency,
            change_7d: entry.price_change_percentage_7d_in_currency,
        }
    }
}

// ============================================================================
// Construction des URLs
// ============================================================================

/// URL /simple/price (ids et devises séparés par des virgules)
pub fn simple_price_url(ids: &str, vs_currencies: &str) -> String {
    format!(
        "{}/simple/price?ids={}&vs_currencies={}",
        API_BASE, ids, vs_currencies
    )
}

/// URL /coins/markets avec les variations 1h, 24h et 7d
pub fn markets_url(vs_currency: &str, ids: &str) -> String {
    format!(
        "{}/coins/markets?vs_currency={}&ids={}&price_change_percentage=1h,24h,7d",
        API_BASE, vs_currency, ids
    )
}

/// URL /coins/{id}/market_chart
pub fn market_chart_url(id: &str, vs_currency: &str, days: u32) -> String {
    format!(
        "{}/coins/{}/market_chart?vs_currency={}&days={}",
        API_BASE, id, vs_currency, days
    )
}

// ============================================================================
// Client HTTP partagé
// ============================================================================

/// Client HTTP unique pour toute l'application
///
/// CONCEPT RUST : OnceLock
/// - Initialisé au premier appel, partagé ensuite (thread-safe)
/// - reqwest::Client garde un pool de connexions : on ne le recrée pas
fn client() -> Result<&'static reqwest::Client> {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

    if let Some(client) = CLIENT.get() {
        return Ok(client);
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("cryptoverlay/", env!("CARGO_PKG_VERSION")))
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Échec de la création du client HTTP")?;

    Ok(CLIENT.get_or_init(|| client))
}

/// GET et lecture du corps en texte
///
/// Un statut HTTP hors 2xx est une erreur (comme une erreur réseau)
async fn get_text(url: &str) -> Result<String> {
    debug!(url = %url, "Sending HTTP request to CoinGecko");
    let response = client()?
        .get(url)
        .send()
        .await
        .context("Échec de la requête HTTP vers CoinGecko")?;

    let status = response.status();
    debug!(status = %status, "Received HTTP response");

    if !status.is_success() {
        error!(status = %status, "CoinGecko returned error status");
        anyhow::bail!("CoinGecko a retourné une erreur : HTTP {}", status);
    }

    response
        .text()
        .await
        .context("Échec de la lecture de la réponse CoinGecko")
}

// ============================================================================
// Fonctions publiques de l'API
// ============================================================================

/// Récupère prix et variations de plusieurs coins pour une devise
///
/// # Retourne
/// * `Err` : échec réseau ou HTTP
/// * `Ok(PriceReply::Unexpected)` : corps qui n'est pas un tableau JSON
/// * `Ok(PriceReply::Quotes)` : cotations indexées par id
#[instrument(skip(coins), fields(coins = coins.len()))]
pub async fn fetch_markets(currency: &str, coins: &[String]) -> Result<PriceReply> {
    let url = markets_url(currency, &coins.join(","));
    let body = get_text(&url).await?;
    let reply = parse_markets_body(&body);

    if let PriceReply::Quotes(quotes) = &reply {
        info!(quotes = quotes.len(), "Fetched market quotes");
    }
    Ok(reply)
}

/// Récupère les prix seuls (sans variations) pour une devise
#[instrument(skip(coins), fields(coins = coins.len()))]
pub async fn fetch_simple_prices(currency: &str, coins: &[String]) -> Result<PriceReply> {
    let url = simple_price_url(&coins.join(","), currency);
    let body = get_text(&url).await?;
    let reply = parse_simple_body(&body, currency);

    if let PriceReply::Quotes(quotes) = &reply {
        info!(quotes = quotes.len(), "Fetched simple prices");
    }
    Ok(reply)
}

/// Récupère la série historique d'un coin
#[instrument]
pub async fn fetch_market_chart(coin: &str, currency: &str, days: u32) -> Result<PriceSeries> {
    let url = market_chart_url(coin, currency, days);
    let body = get_text(&url).await?;
    let series = parse_market_chart_body(&body, coin, currency, days)?;

    info!(points = series.len(), "Fetched market chart");
    Ok(series)
}

// ============================================================================
// Parsing des réponses
// ============================================================================

/// Parse le corps de /coins/markets
///
/// CONCEPT : Tolérance élément par élément
/// - Le document doit être un tableau, sinon Unexpected
/// - Les éléments qui ne sont pas des objets, ou sans id, sont ignorés
pub fn parse_markets_body(body: &str) -> PriceReply {
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(body) else {
        warn!("Markets response is not a JSON array");
        return PriceReply::Unexpected;
    };

    let mut quotes = HashMap::new();
    let mut skipped = 0;
    for value in entries {
        if !value.is_object() {
            skipped += 1;
            continue;
        }
        match serde_json::from_value::<MarketEntry>(value) {
            Ok(entry) if !entry.id.is_empty() => {
                quotes.insert(entry.id.clone(), Quote::from(entry));
            }
            Ok(_) => skipped += 1,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable market entry");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "Skipped market entries");
    }
    PriceReply::Quotes(quotes)
}

/// Parse le corps de /simple/price : {"bitcoin": {"usd": 65000.0}, ...}
pub fn parse_simple_body(body: &str, currency: &str) -> PriceReply {
    let Ok(Value::Object(coins)) = serde_json::from_str::<Value>(body) else {
        warn!("Simple price response is not a JSON object");
        return PriceReply::Unexpected;
    };

    let quotes = coins
        .into_iter()
        .map(|(id, prices)| {
            let price = prices.get(currency).and_then(Value::as_f64);
            (id, Quote { price, ..Quote::default() })
        })
        .collect();

    PriceReply::Quotes(quotes)
}

/// Parse le corps de /coins/{id}/market_chart
///
/// - JSON invalide : erreur
/// - Pas de tableau "prices" : série vide
/// - Paires invalides ([t] seul, valeurs non numériques) : ignorées
pub fn parse_market_chart_body(body: &str, coin: &str, currency: &str, days: u32) -> Result<PriceSeries> {
    let document: Value =
        serde_json::from_str(body).context("Échec du parsing JSON du graphique")?;

    let mut series = PriceSeries::new(coin.to_string(), currency.to_string(), days);

    let Some(prices) = document.get("prices").and_then(Value::as_array) else {
        warn!("Market chart response has no prices array");
        return Ok(series);
    };

    let mut skipped = 0;
    for pair in prices {
        let point = pair
            .as_array()
            .filter(|pair| pair.len() >= 2)
            .and_then(|pair| {
                let millis = pair[0].as_f64()? as i64;
                let price = pair[1].as_f64()?;
                PricePoint::from_millis(millis, price)
            });

        match point {
            Some(point) => series.push(point),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, total = prices.len(), "Skipped invalid chart points");
    }
    Ok(series)
}

// ============================================================================
// Tests unitaires
// ============================================================================
