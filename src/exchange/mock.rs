//! Scripted exchange double for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{BracketOrder, Exchange, MarketFill};
use crate::error::{BotError, Result};
use crate::models::{Candle, Side};

#[derive(Debug, Clone)]
pub enum OrderScript {
    Fill { price: f64 },
    Reject(String),
}

#[derive(Debug, Clone)]
pub enum BracketScript {
    Accept(String),
    Fail(String),
}

/// Exchange whose responses are queued up front and whose calls are recorded.
pub struct MockExchange {
    pub prices: Mutex<VecDeque<Result<f64>>>,
    pub candle_batches: Mutex<VecDeque<Result<Vec<Candle>>>>,
    pub balance: Mutex<Result<f64>>,
    pub order_script: Mutex<OrderScript>,
    pub bracket_script: Mutex<BracketScript>,
    pub market_orders: Mutex<Vec<(String, Side, f64)>>,
    pub bracket_orders: Mutex<Vec<BracketOrder>>,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self {
            prices: Mutex::new(VecDeque::new()),
            candle_batches: Mutex::new(VecDeque::new()),
            balance: Mutex::new(Ok(1000.0)),
            order_script: Mutex::new(OrderScript::Fill { price: 100.0 }),
            bracket_script: Mutex::new(BracketScript::Accept("1".to_string())),
            market_orders: Mutex::new(Vec::new()),
            bracket_orders: Mutex::new(Vec::new()),
        }
    }
}

impl MockExchange {
    pub fn push_price(&self, price: f64) {
        self.prices.lock().unwrap().push_back(Ok(price));
    }

    pub fn push_candles(&self, batch: Result<Vec<Candle>>) {
        self.candle_batches.lock().unwrap().push_back(batch);
    }

    pub fn set_balance(&self, balance: Result<f64>) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn script_order(&self, script: OrderScript) {
        *self.order_script.lock().unwrap() = script;
    }

    pub fn script_bracket(&self, script: BracketScript) {
        *self.bracket_script.lock().unwrap() = script;
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn price(&self, _symbol: &str) -> Result<f64> {
        self.prices
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BotError::MarketDataUnavailable("no scripted price".into())))
    }

    async fn recent_candles(
        &self,
        _symbol: &str,
        _interval: &str,
        _limit: u32,
    ) -> Result<Vec<Candle>> {
        self.candle_batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BotError::MarketDataUnavailable(
                "no scripted candles".into(),
            )))
    }

    async fn free_balance(&self, _asset: &str) -> Result<f64> {
        match &*self.balance.lock().unwrap() {
            Ok(balance) => Ok(*balance),
            Err(e) => Err(BotError::BalanceUnavailable(e.to_string())),
        }
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> Result<MarketFill> {
        self.market_orders
            .lock()
            .unwrap()
            .push((symbol.to_string(), side, quantity));

        match &*self.order_script.lock().unwrap() {
            OrderScript::Fill { price } => Ok(MarketFill {
                order_id: "entry-1".to_string(),
                fill_price: *price,
            }),
            OrderScript::Reject(reason) => Err(BotError::OrderRejected(reason.clone())),
        }
    }

    async fn place_bracket_order(&self, order: &BracketOrder) -> Result<String> {
        self.bracket_orders.lock().unwrap().push(order.clone());

        match &*self.bracket_script.lock().unwrap() {
            BracketScript::Accept(id) => Ok(id.clone()),
            BracketScript::Fail(reason) => Err(BotError::OrderRejected(reason.clone())),
        }
    }
}
