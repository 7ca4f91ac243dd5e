// ============================================================================
// Module : api
// ============================================================================
// Client de l'API de prix CoinGecko
// ============================================================================

pub mod coingecko; // Client API CoinGecko

// Re-export des fonctions principales
pub use coingecko::{fetch_market_chart, fetch_markets, fetch_simple_prices};
