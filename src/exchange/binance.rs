use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use super::{BracketOrder, Exchange, MarketFill};
use crate::error::{BotError, Result};
use crate::models::{Candle, Side};

const BINANCE_API_BASE: &str = "https://api.binance.com";
const RATE_LIMIT_RPS: u32 = 10;
const RECV_WINDOW_MS: u64 = 5000;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

type HmacSha256 = Hmac<Sha256>;

// Type alias for the rate limiter to simplify signatures
type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Binance spot REST client
///
/// Public endpoints serve market data; account and order endpoints are
/// signed with HMAC-SHA256 over the query string. All clones share one
/// rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    rate_limiter: Arc<DirectRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct TickerPriceResponse {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    #[serde(default)]
    executed_qty: Option<String>,
    #[serde(default)]
    cummulative_quote_qty: Option<String>,
    #[serde(default)]
    fills: Vec<OrderFill>,
}

#[derive(Debug, Deserialize)]
struct OrderFill {
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcoResponse {
    order_list_id: i64,
}

impl BinanceClient {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self::with_base_url(api_key, api_secret, BINANCE_API_BASE.to_string())
    }

    /// Point the client at a different host (testnet, mock server in tests)
    pub fn with_base_url(api_key: String, api_secret: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        let quota = Quota::per_second(NonZeroU32::new(RATE_LIMIT_RPS).unwrap());

        Self {
            client,
            base_url,
            api_key,
            api_secret,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Append timestamp, recvWindow and the signature to a query string.
    fn signed_query(&self, query: &str) -> String {
        let timestamp = Utc::now().timestamp_millis();
        let query = if query.is_empty() {
            format!("timestamp={}&recvWindow={}", timestamp, RECV_WINDOW_MS)
        } else {
            format!("{}&timestamp={}&recvWindow={}", query, timestamp, RECV_WINDOW_MS)
        };
        let signature = self.sign(&query);
        format!("{}&signature={}", query, signature)
    }

    // Transport helpers return the raw reqwest error; each endpoint maps it
    // into the matching failure class (market data / balance / order).

    async fn get_public(
        &self,
        path: &str,
        query: &str,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        self.rate_limiter.until_ready().await;
        let url = format!("{}{}?{}", self.base_url, path, query);
        self.client.get(&url).send().await
    }

    async fn get_signed(
        &self,
        path: &str,
        query: &str,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        self.rate_limiter.until_ready().await;
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(query));
        self.client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
    }

    async fn post_signed(
        &self,
        path: &str,
        query: &str,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        self.rate_limiter.until_ready().await;
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(query));
        self.client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("HTTP {}: {}", status, body)
    }

    async fn fetch_candles_once(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let query = format!("symbol={}&interval={}&limit={}", symbol, interval, limit);
        let response = self
            .get_public("/api/v3/klines", &query)
            .await
            .map_err(|e| BotError::MarketDataUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::MarketDataUnavailable(
                Self::error_body(response).await,
            ));
        }

        // Klines come back as raw positional arrays
        let rows: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| BotError::MarketDataUnavailable(e.to_string()))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(candle) = parse_kline_row(row) {
                candles.push(candle);
            }
        }

        if candles.is_empty() && !rows.is_empty() {
            return Err(BotError::MarketDataUnavailable(
                "klines response could not be parsed".to_string(),
            ));
        }

        Ok(candles)
    }
}

/// Parse one positional kline row:
/// [open_time, open, high, low, close, volume, close_time, ...]
fn parse_kline_row(row: &[serde_json::Value]) -> Option<Candle> {
    let ts_ms = row.first()?.as_i64()?;
    let field = |i: usize| row.get(i)?.as_str()?.parse::<f64>().ok();

    Some(Candle {
        timestamp: DateTime::<Utc>::from_timestamp_millis(ts_ms)?,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}

#[async_trait]
impl Exchange for BinanceClient {
    async fn price(&self, symbol: &str) -> Result<f64> {
        let query = format!("symbol={}", symbol);
        let response = self
            .get_public("/api/v3/ticker/price", &query)
            .await
            .map_err(|e| BotError::MarketDataUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::MarketDataUnavailable(
                Self::error_body(response).await,
            ));
        }

        let ticker: TickerPriceResponse = response
            .json()
            .await
            .map_err(|e| BotError::MarketDataUnavailable(e.to_string()))?;
        ticker
            .price
            .parse()
            .map_err(|_| BotError::MarketDataUnavailable(format!("bad price '{}'", ticker.price)))
    }

    async fn recent_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        // Market-data fetches retry with backoff; order placement never does
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.fetch_candles_once(symbol, interval, limit).await {
                Ok(candles) => return Ok(candles),
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                        tracing::warn!(
                            "Kline fetch attempt {}/{} for {} failed: {}. Retrying in {}ms",
                            attempt,
                            MAX_RETRIES,
                            symbol,
                            e,
                            backoff_ms
                        );
                        sleep(Duration::from_millis(backoff_ms)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| BotError::MarketDataUnavailable("retries exhausted".into())))
    }

    async fn free_balance(&self, asset: &str) -> Result<f64> {
        let response = self
            .get_signed("/api/v3/account", "")
            .await
            .map_err(|e| BotError::BalanceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::BalanceUnavailable(
                Self::error_body(response).await,
            ));
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| BotError::BalanceUnavailable(e.to_string()))?;

        let entry = account
            .balances
            .iter()
            .find(|b| b.asset == asset)
            .ok_or_else(|| BotError::BalanceUnavailable(format!("no balance for {}", asset)))?;

        entry
            .free
            .parse()
            .map_err(|_| BotError::BalanceUnavailable(format!("bad balance '{}'", entry.free)))
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> Result<MarketFill> {
        let query = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&newClientOrderId={}&newOrderRespType=FULL",
            symbol,
            side.as_str(),
            quantity,
            Uuid::new_v4()
        );

        let response = self
            .post_signed("/api/v3/order", &query)
            .await
            .map_err(|e| BotError::OrderRejected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::OrderRejected(Self::error_body(response).await));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| BotError::OrderRejected(e.to_string()))?;

        // Realized price comes from the first reported fill; fall back to the
        // volume-weighted average when the fills list is absent
        let fill_price = match order.fills.first() {
            Some(fill) => fill
                .price
                .parse()
                .map_err(|_| BotError::OrderRejected(format!("bad fill price '{}'", fill.price)))?,
            None => {
                let executed: f64 = order
                    .executed_qty
                    .as_deref()
                    .and_then(|q| q.parse().ok())
                    .unwrap_or(0.0);
                let quote: f64 = order
                    .cummulative_quote_qty
                    .as_deref()
                    .and_then(|q| q.parse().ok())
                    .unwrap_or(0.0);
                if executed <= 0.0 {
                    return Err(BotError::OrderRejected(
                        "order accepted but reported no fills".to_string(),
                    ));
                }
                quote / executed
            }
        };

        tracing::info!(
            symbol = %symbol,
            side = %side,
            quantity = quantity,
            fill_price = fill_price,
            order_id = order.order_id,
            "Market order filled"
        );

        Ok(MarketFill {
            order_id: order.order_id.to_string(),
            fill_price,
        })
    }

    async fn place_bracket_order(&self, order: &BracketOrder) -> Result<String> {
        let query = format!(
            "symbol={}&side={}&quantity={}&price={}&stopPrice={}&stopLimitPrice={}\
             &stopLimitTimeInForce=GTC&listClientOrderId={}",
            order.symbol,
            order.side.as_str(),
            order.quantity,
            order.limit_price,
            order.stop_trigger_price,
            order.stop_limit_price,
            Uuid::new_v4()
        );

        let response = self
            .post_signed("/api/v3/order/oco", &query)
            .await
            .map_err(|e| BotError::OrderRejected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::OrderRejected(Self::error_body(response).await));
        }

        let oco: OcoResponse = response
            .json()
            .await
            .map_err(|e| BotError::OrderRejected(e.to_string()))?;

        tracing::info!(
            symbol = %order.symbol,
            side = %order.side,
            limit = order.limit_price,
            stop = order.stop_trigger_price,
            order_list_id = oco.order_list_id,
            "Bracket order placed"
        );

        Ok(oco.order_list_id.to_string())
    }
}
