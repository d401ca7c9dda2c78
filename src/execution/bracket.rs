use crate::error::{BotError, Result};
use crate::exchange::{BracketOrder, Exchange};
use crate::models::{BracketOrderResult, Side};

/// Exit prices use a fixed 2-decimal rounding; tick-size filters are NOT
/// consulted (known gap, matching the reference behavior).
const PRICE_DECIMALS: i32 = 2;

fn round_price(value: f64) -> f64 {
    let factor = 10f64.powi(PRICE_DECIMALS);
    (value * factor).round() / factor
}

/// Exit prices derived from a realized entry fill
fn exit_prices(side: Side, fill_price: f64, tp_percent: f64, sl_percent: f64) -> (f64, f64) {
    let (tp, sl) = match side {
        Side::Buy => (
            fill_price * (1.0 + tp_percent / 100.0),
            fill_price * (1.0 - sl_percent / 100.0),
        ),
        Side::Sell => (
            fill_price * (1.0 - tp_percent / 100.0),
            fill_price * (1.0 + sl_percent / 100.0),
        ),
    };
    (round_price(tp), round_price(sl))
}

/// Enter a position with a market order and protect it with a
/// take-profit/stop-loss bracket.
///
/// The two exchange calls are sequential and not atomic. An entry failure
/// aborts cleanly (`OrderRejected`, no exit attempted). A bracket failure
/// after a successful entry leaves the position unprotected and surfaces as
/// `PartialExecution` carrying the fill details; the exit leg is never
/// retried here, since a duplicate bracket cannot be ruled out.
pub async fn execute_bracket<E: Exchange + ?Sized>(
    exchange: &E,
    symbol: &str,
    side: Side,
    quantity: f64,
    tp_percent: f64,
    sl_percent: f64,
) -> Result<BracketOrderResult> {
    let fill = exchange
        .place_market_order(symbol, side, quantity)
        .await
        .map_err(|e| match e {
            e @ BotError::OrderRejected(_) => e,
            // Unclassified entry failures fail closed as rejections
            other => BotError::OrderRejected(other.to_string()),
        })?;

    let (take_profit_price, stop_loss_price) =
        exit_prices(side, fill.fill_price, tp_percent, sl_percent);

    let exit = BracketOrder {
        symbol: symbol.to_string(),
        side: side.opposite(),
        quantity,
        limit_price: take_profit_price,
        stop_trigger_price: stop_loss_price,
        stop_limit_price: stop_loss_price,
    };

    if let Err(e) = exchange.place_bracket_order(&exit).await {
        tracing::error!(
            symbol = %symbol,
            side = %side,
            quantity = quantity,
            fill_price = fill.fill_price,
            "Entry filled but bracket placement failed: {}",
            e
        );
        return Err(BotError::PartialExecution {
            side,
            quantity,
            fill_price: fill.fill_price,
            reason: e.to_string(),
        });
    }

    Ok(BracketOrderResult {
        side,
        quantity,
        entry_fill_price: fill.fill_price,
        take_profit_price,
        stop_loss_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::{BracketScript, MockExchange, OrderScript};

    #[tokio::test]
    async fn test_buy_bracket_prices_and_exit_side() {
        let exchange = MockExchange::default();
        exchange.script_order(OrderScript::Fill { price: 100.0 });

        let result = execute_bracket(&exchange, "BTCUSDT", Side::Buy, 0.5, 3.0, 2.0)
            .await
            .unwrap();

        assert_eq!(result.entry_fill_price, 100.0);
        assert_eq!(result.take_profit_price, 103.0);
        assert_eq!(result.stop_loss_price, 98.0);
        assert_eq!(result.side, Side::Buy);

        let brackets = exchange.bracket_orders.lock().unwrap();
        assert_eq!(brackets.len(), 1);
        assert_eq!(brackets[0].side, Side::Sell);
        assert_eq!(brackets[0].limit_price, 103.0);
        assert_eq!(brackets[0].stop_trigger_price, 98.0);
        assert_eq!(brackets[0].stop_limit_price, 98.0);
    }

    #[tokio::test]
    async fn test_sell_bracket_prices_and_exit_side() {
        let exchange = MockExchange::default();
        exchange.script_order(OrderScript::Fill { price: 100.0 });

        let result = execute_bracket(&exchange, "BTCUSDT", Side::Sell, 0.5, 3.0, 2.0)
            .await
            .unwrap();

        assert_eq!(result.take_profit_price, 97.0);
        assert_eq!(result.stop_loss_price, 102.0);

        let brackets = exchange.bracket_orders.lock().unwrap();
        assert_eq!(brackets[0].side, Side::Buy);
    }

    #[tokio::test]
    async fn test_exit_prices_rounded_to_cents() {
        let exchange = MockExchange::default();
        exchange.script_order(OrderScript::Fill { price: 123.456 });

        let result = execute_bracket(&exchange, "BTCUSDT", Side::Buy, 1.0, 3.0, 2.0)
            .await
            .unwrap();

        // 123.456 * 1.03 = 127.15968 -> 127.16; * 0.98 = 120.98688 -> 120.99
        assert_eq!(result.take_profit_price, 127.16);
        assert_eq!(result.stop_loss_price, 120.99);
    }

    #[tokio::test]
    async fn test_entry_rejection_attempts_no_bracket() {
        let exchange = MockExchange::default();
        exchange.script_order(OrderScript::Reject("insufficient balance".into()));

        let err = execute_bracket(&exchange, "BTCUSDT", Side::Buy, 0.5, 3.0, 2.0)
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::OrderRejected(_)));
        assert!(exchange.bracket_orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bracket_failure_is_partial_execution_with_fill() {
        let exchange = MockExchange::default();
        exchange.script_order(OrderScript::Fill { price: 100.0 });
        exchange.script_bracket(BracketScript::Fail("oco endpoint down".into()));

        let err = execute_bracket(&exchange, "BTCUSDT", Side::Buy, 0.5, 3.0, 2.0)
            .await
            .unwrap_err();

        match err {
            BotError::PartialExecution {
                side,
                quantity,
                fill_price,
                ..
            } => {
                assert_eq!(side, Side::Buy);
                assert_eq!(quantity, 0.5);
                assert_eq!(fill_price, 100.0);
            }
            other => panic!("expected PartialExecution, got {:?}", other),
        }

        // The filled entry must be visible, and the bracket attempted once
        assert_eq!(exchange.market_orders.lock().unwrap().len(), 1);
        assert_eq!(exchange.bracket_orders.lock().unwrap().len(), 1);
    }
}
