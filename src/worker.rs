// ============================================================================
// Worker - Requêtes HTTP en arrière-plan
// ============================================================================
// Reçoit les commandes de l'event loop, exécute les requêtes CoinGecko et
// renvoie les résultats
//
// CONCEPT : Fire-and-forget
// - Chaque commande devient une tâche tokio indépendante
// - Plusieurs requêtes (une par devise) peuvent être en vol en même temps
// - Chaque tâche renvoie son résultat sur result_tx, dans l'ordre d'arrivée
//
// CONCEPT RUST : Trait pour la source des prix
// - PriceFetcher abstrait les trois appels HTTP
// - CoinGecko les délègue à crate::api, les tests injectent un faux fetcher
// ============================================================================

use std::future::Future;
use std::sync::{mpsc, Arc};

use anyhow::Result;
use tracing::{debug, error, info};

use crate::api;
use crate::app::{ChartRequest, PriceRequest, PriceSource};
use crate::models::{PriceReply, PriceSeries};

/// Commandes envoyées au worker thread
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Prix d'une devise pour tous les coins configurés
    FetchPrices(PriceRequest),

    /// Série historique du premier coin / première devise
    FetchChart(ChartRequest),
}

/// Résultats renvoyés par le worker thread
#[derive(Debug)]
pub enum AppResult {
    /// Réponse (ou échec) d'une requête de prix, avec la requête d'origine
    PricesLoaded {
        request: PriceRequest,
        reply: Result<PriceReply>,
    },

    /// Série reçue (vide en cas d'échec)
    ChartLoaded { series: PriceSeries },
}

/// Source des prix
///
/// Les futures sont `Send` : elles tournent dans des tâches tokio
pub trait PriceFetcher {
    fn markets(&self, currency: &str, coins: &[String]) -> impl Future<Output = Result<PriceReply>> + Send;

    fn simple_prices(&self, currency: &str, coins: &[String]) -> impl Future<Output = Result<PriceReply>> + Send;

    fn market_chart(&self, coin: &str, currency: &str, days: u32) -> impl Future<Output = Result<PriceSeries>> + Send;
}

/// L'API publique CoinGecko
#[derive(Debug, Clone, Copy, Default)]
pub struct CoinGecko;

impl PriceFetcher for CoinGecko {
    fn markets(&self, currency: &str, coins: &[String]) -> impl Future<Output = Result<PriceReply>> + Send {
        api::fetch_markets(currency, coins)
    }

    fn simple_prices(&self, currency: &str, coins: &[String]) -> impl Future<Output = Result<PriceReply>> + Send {
        api::fetch_simple_prices(currency, coins)
    }

    fn market_chart(&self, coin: &str, currency: &str, days: u32) -> impl Future<Output = Result<PriceSeries>> + Send {
        api::fetch_market_chart(coin, currency, days)
    }
}

/// Exécute une commande et construit le résultat à renvoyer
///
/// - Prix : endpoint choisi selon `request.source`, l'erreur est transmise
///   telle quelle (la grille affichera "Error")
/// - Graphique : une erreur devient une série vide ("No chart data")
pub async fn execute<F: PriceFetcher>(fetcher: &F, command: AppCommand) -> AppResult {
    match command {
        AppCommand::FetchPrices(request) => {
            let reply = match request.source {
                PriceSource::Markets => fetcher.markets(&request.currency, &request.coins).await,
                PriceSource::Simple => fetcher.simple_prices(&request.currency, &request.coins).await,
            };
            if let Err(e) = &reply {
                error!(currency = %request.currency, error = ?e, "Failed to fetch prices");
            }
            AppResult::PricesLoaded { request, reply }
        }

        AppCommand::FetchChart(request) => {
            let series = match fetcher.market_chart(&request.coin, &request.currency, request.days).await {
                Ok(series) => series,
                Err(e) => {
                    error!(coin = %request.coin, error = ?e, "Failed to fetch market chart");
                    PriceSeries::new(request.coin, request.currency, request.days)
                }
            };
            AppResult::ChartLoaded { series }
        }
    }
}

/// Lance le worker thread avec son propre runtime tokio
pub fn spawn_background_worker<F>(fetcher: F, command_rx: mpsc::Receiver<AppCommand>, result_tx: mpsc::Sender<AppResult>)
where
    F: PriceFetcher + Send + Sync + 'static,
{
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = ?e, "Failed to create tokio runtime, worker not started");
                return;
            }
        };
        let fetcher = Arc::new(fetcher);

        while let Ok(command) = command_rx.recv() {
            debug!(?command, "Worker received command");
            let result_tx = result_tx.clone();
            let fetcher = Arc::clone(&fetcher);

            runtime.spawn(async move {
                let result = execute(fetcher.as_ref(), command).await;
                let _ = result_tx.send(result);
            });
        }

        info!("Worker thread exiting (channel closed)");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PricePoint, Quote};
    use std::collections::HashMap;
    use std::time::Duration;

    /// Fetcher hors ligne : "markets" renvoie des variations, "simple" non
    struct OfflineFetcher {
        chart_fails: bool,
    }

    fn one_quote(coin: &str, quote: Quote) -> PriceReply {
        let mut quotes = HashMap::new();
        quotes.insert(coin.to_string(), quote);
        PriceReply::Quotes(quotes)
    }

    impl PriceFetcher for OfflineFetcher {
        fn markets(&self, _currency: &str, coins: &[String]) -> impl Future<Output = Result<PriceReply>> + Send {
            let quote = Quote {
                change_24h: Some(1.5),
                ..Quote::with_price(2.0)
            };
            std::future::ready(Ok(one_quote(&coins[0], quote)))
        }

        fn simple_prices(&self, _currency: &str, coins: &[String]) -> impl Future<Output = Result<PriceReply>> + Send {
            std::future::ready(Ok(one_quote(&coins[0], Quote::with_price(1.0))))
        }

        fn market_chart(&self, coin: &str, currency: &str, days: u32) -> impl Future<Output = Result<PriceSeries>> + Send {
            let result = if self.chart_fails {
                Err(anyhow::anyhow!("HTTP 429"))
            } else {
                let mut series = PriceSeries::new(coin.to_string(), currency.to_string(), days);
                if let Some(point) = PricePoint::from_millis(1_700_000_000_000, 0.2) {
                    series.push(point);
                }
                Ok(series)
            };
            std::future::ready(result)
        }
    }

    fn price_request(source: PriceSource) -> PriceRequest {
        PriceRequest {
            currency: "usd".to_string(),
            coins: vec!["dogecoin".to_string()],
            source,
            sequence: 3,
        }
    }

    fn chart_request() -> ChartRequest {
        ChartRequest {
            coin: "bitcoin".to_string(),
            currency: "eur".to_string(),
            days: 30,
        }
    }

    fn loaded_quote(result: AppResult) -> (PriceRequest, Quote) {
        match result {
            AppResult::PricesLoaded {
                request,
                reply: Ok(PriceReply::Quotes(mut quotes)),
            } => {
                let quote = quotes.remove("dogecoin").unwrap();
                (request, quote)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_source_selects_endpoint() {
        let fetcher = OfflineFetcher { chart_fails: false };

        let result = execute(&fetcher, AppCommand::FetchPrices(price_request(PriceSource::Simple))).await;
        let (request, quote) = loaded_quote(result);
        assert_eq!(quote, Quote::with_price(1.0));
        assert_eq!(request.sequence, 3);

        let result = execute(&fetcher, AppCommand::FetchPrices(price_request(PriceSource::Markets))).await;
        let (_, quote) = loaded_quote(result);
        assert_eq!(quote.change_24h, Some(1.5));
    }

    #[tokio::test]
    async fn test_chart_failure_gives_empty_series() {
        let fetcher = OfflineFetcher { chart_fails: true };

        match execute(&fetcher, AppCommand::FetchChart(chart_request())).await {
            AppResult::ChartLoaded { series } => {
                assert!(series.is_empty());
                assert_eq!(series.coin, "bitcoin");
                assert_eq!(series.currency, "eur");
                assert_eq!(series.days, 30);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chart_success_keeps_points() {
        let fetcher = OfflineFetcher { chart_fails: false };

        match execute(&fetcher, AppCommand::FetchChart(chart_request())).await {
            AppResult::ChartLoaded { series } => assert_eq!(series.len(), 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_background_worker_round_trip() {
        let (command_tx, command_rx) = mpsc::channel();
        let (result_tx, result_rx) = mpsc::channel();
        spawn_background_worker(OfflineFetcher { chart_fails: true }, command_rx, result_tx);

        command_tx.send(AppCommand::FetchChart(chart_request())).unwrap();
        match result_rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            AppResult::ChartLoaded { series } => assert!(series.is_empty()),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
