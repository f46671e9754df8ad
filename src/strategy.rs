//! The market-making control loop: order-lifecycle state machine, inventory-aware sizing,
//! depth-based re-quoting, and position reconciliation.

use serde_json::Value;

use crate::book::Book;
use crate::error::Error;
use crate::params;
use crate::session::{Session, StrategyHooks};

/// JSON-RPC error codes the strategy reconciles locally rather than treating as fatal.
const ORDER_NOT_OPEN: i64 = 11_044;
const ORDER_ALREADY_CLOSED: i64 = 10_010;
const IGNORED_ERROR: i64 = 13_777;

/// Tunable parameters of the quoting policy.
#[derive(Debug, Clone)]
pub struct MmConfig {
    /// Instrument to quote, e.g. `BTC-PERPETUAL`.
    pub instrument: String,
    /// Book/changes channel frequency suffix. Defaults to `"raw"`.
    pub frequency: String,
    /// Depth (in base-currency units) used for the "closer to best" edit-trigger bound.
    pub min_depth: f64,
    /// Depth used to compute the quoted price itself.
    pub mid_depth: f64,
    /// Depth used for the "further into the book" edit-trigger bound.
    pub max_depth: f64,
    /// Nominal per-order size, before inventory skew.
    pub order_amount: f64,
    /// Absolute position cap (USD) past which that side stops quoting.
    pub max_position_usd: f64,
}

impl Default for MmConfig {
    fn default() -> Self {
        Self {
            instrument: "BTC-PERPETUAL".to_owned(),
            frequency: "raw".to_owned(),
            min_depth: 0.0,
            mid_depth: 0.0,
            max_depth: 0.0,
            order_amount: 0.0,
            max_position_usd: 0.0,
        }
    }
}

/// One side's resting order, or the lack of one.
#[derive(Debug, Clone, Default)]
pub struct Order {
    /// Quoted price. Meaningless while `id` is empty.
    pub price: f64,
    /// Quoted quantity. Meaningless while `id` is empty.
    pub quantity: f64,
    /// Venue order id. Empty means "no live order on this side".
    pub id: String,
    /// `true` once a `buy`/`sell` request has been sent but not yet confirmed.
    pub wait: bool,
}

impl Order {
    fn is_live(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Clamps the inventory-skewed order size to a multiple of 10 within `[0, 2*order_amount]`.
///
/// `sign` is `-1.0` for the buy side (reduce buying when long) and `+1.0` for the sell side.
fn sized(order_amount: f64, max_position_usd: f64, position_usd: f64, sign: f64) -> f64 {
    let raw = 10.0 * (order_amount * (1.0 + sign * position_usd / max_position_usd) / 10.0).floor();
    raw.clamp(0.0, 2.0 * order_amount)
}

/// Single-instrument market maker: quotes both sides of `config.instrument`, skewing size against
/// accumulated inventory and reconciling fills against the locally tracked position.
#[derive(Debug)]
pub struct MarketMaker {
    config: MmConfig,
    book: Book,
    buy_order: Order,
    sell_order: Order,
    /// Position in USD. `NAN` until `private/get_position` replies.
    position_usd: f64,
    book_channel: String,
    changes_channel: String,
}

impl MarketMaker {
    /// Builds a strategy with no live session activity yet; call [`MarketMaker::bootstrap`] once a
    /// [`Session`] is connected.
    #[must_use]
    pub fn new(config: MmConfig) -> Self {
        let book_channel = format!("book.{}.{}", config.instrument, config.frequency);
        let changes_channel = format!("user.changes.{}.{}", config.instrument, config.frequency);

        Self {
            config,
            book: Book::default(),
            buy_order: Order::default(),
            sell_order: Order::default(),
            position_usd: f64::NAN,
            book_channel,
            changes_channel,
        }
    }

    /// Seeds position, checks clock skew, arms the heartbeat, and subscribes to the book and
    /// user-changes channels. Must be called once, before [`Session::run`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if any of the bootstrap requests could not be sent.
    pub async fn bootstrap(&mut self, session: &mut Session) -> Result<(), Error> {
        session
            .send(
                "private/get_position",
                &params! { "instrument_name" => self.config.instrument.clone() },
            )
            .await?;

        session.send_empty("public/get_time").await?;

        session
            .send("public/set_heartbeat", &params! { "interval" => 10i64 })
            .await?;

        session
            .subscribe(vec![self.book_channel.clone(), self.changes_channel.clone()])
            .await?;

        Ok(())
    }

    /// Current tracked position in USD, or `None` if not yet seeded.
    #[must_use]
    pub fn position_usd(&self) -> Option<f64> {
        (!self.position_usd.is_nan()).then_some(self.position_usd)
    }

    async fn on_book_update(&mut self, session: &mut Session, data: &Value) -> Result<(), Error> {
        let update = serde_json::from_value(data.clone())?;
        self.book.update(&update)?;

        if self.position_usd.is_nan() {
            return Ok(());
        }

        self.requote_buy(session).await?;
        self.requote_sell(session).await?;

        Ok(())
    }

    async fn requote_buy(&mut self, session: &mut Session) -> Result<(), Error> {
        if !self.buy_order.is_live() {
            if self.buy_order.wait {
                return Ok(());
            }

            let Some(buy_price) = self.book.bids.price_depth(self.config.mid_depth) else {
                return Ok(());
            };

            if self.position_usd >= self.config.max_position_usd {
                return Ok(());
            }

            let qty = sized(
                self.config.order_amount,
                self.config.max_position_usd,
                self.position_usd,
                -1.0,
            );

            log::info!("sending order to buy at {buy_price}");

            session
                .send(
                    "private/buy",
                    &params! {
                        "instrument_name" => self.config.instrument.clone(),
                        "amount" => qty,
                        "type" => "limit",
                        "label" => format!("buy_{}", self.config.instrument),
                        "price" => buy_price,
                        "post_only" => "true",
                    },
                )
                .await?;

            self.buy_order.price = buy_price;
            self.buy_order.quantity = qty;
            self.buy_order.wait = true;
        } else {
            let buy_price = self.book.bids.price_depth_excluding(
                self.config.mid_depth,
                self.buy_order.price,
                self.buy_order.quantity,
            );
            let min_buy_price = self.book.bids.price_depth_excluding(
                self.config.max_depth,
                self.buy_order.price,
                self.buy_order.quantity,
            );
            let max_buy_price = self.book.bids.price_depth_excluding(
                self.config.min_depth,
                self.buy_order.price,
                self.buy_order.quantity,
            );

            let outside_band = buy_price.is_none()
                || max_buy_price.is_some_and(|p| self.buy_order.price > p)
                || min_buy_price.is_some_and(|p| self.buy_order.price < p);

            if outside_band {
                if let Some(buy_price) = buy_price {
                    let qty = sized(
                        self.config.order_amount,
                        self.config.max_position_usd,
                        self.position_usd,
                        -1.0,
                    );

                    session
                        .send(
                            "private/edit",
                            &params! {
                                "order_id" => self.buy_order.id.clone(),
                                "amount" => qty,
                                "price" => buy_price,
                            },
                        )
                        .await?;

                    self.buy_order.price = buy_price;
                    self.buy_order.quantity = qty;
                }
            }
        }

        Ok(())
    }

    async fn requote_sell(&mut self, session: &mut Session) -> Result<(), Error> {
        if !self.sell_order.is_live() {
            if self.sell_order.wait {
                return Ok(());
            }

            let Some(sell_price) = self.book.asks.price_depth(self.config.mid_depth) else {
                return Ok(());
            };

            if self.position_usd <= -self.config.max_position_usd {
                return Ok(());
            }

            let qty = sized(
                self.config.order_amount,
                self.config.max_position_usd,
                self.position_usd,
                1.0,
            );

            log::info!("sending order to sell at {sell_price}");

            session
                .send(
                    "private/sell",
                    &params! {
                        "instrument_name" => self.config.instrument.clone(),
                        "amount" => qty,
                        "type" => "limit",
                        "label" => format!("sell_{}", self.config.instrument),
                        "price" => sell_price,
                        "post_only" => "true",
                    },
                )
                .await?;

            self.sell_order.price = sell_price;
            self.sell_order.quantity = qty;
            self.sell_order.wait = true;
        } else {
            let sell_price = self.book.asks.price_depth_excluding(
                self.config.mid_depth,
                self.sell_order.price,
                self.sell_order.quantity,
            );
            let max_sell_price = self.book.asks.price_depth_excluding(
                self.config.max_depth,
                self.sell_order.price,
                self.sell_order.quantity,
            );
            let min_sell_price = self.book.asks.price_depth_excluding(
                self.config.min_depth,
                self.sell_order.price,
                self.sell_order.quantity,
            );

            let outside_band = sell_price.is_none()
                || max_sell_price.is_some_and(|p| self.sell_order.price > p)
                || min_sell_price.is_some_and(|p| self.sell_order.price < p);

            if outside_band {
                if let Some(sell_price) = sell_price {
                    let qty = sized(
                        self.config.order_amount,
                        self.config.max_position_usd,
                        self.position_usd,
                        1.0,
                    );

                    session
                        .send(
                            "private/edit",
                            &params! {
                                "order_id" => self.sell_order.id.clone(),
                                "amount" => qty,
                                "price" => sell_price,
                            },
                        )
                        .await?;

                    self.sell_order.price = sell_price;
                    self.sell_order.quantity = qty;
                }
            }
        }

        Ok(())
    }

    fn on_trades(&mut self, data: &Value) -> Result<(), Error> {
        let Some(trades) = data.get("trades").and_then(Value::as_array) else {
            return Ok(());
        };

        for trade in trades {
            let direction = trade.get("direction").and_then(Value::as_str).unwrap_or_default();
            let state = trade.get("state").and_then(Value::as_str).unwrap_or_default();
            let amount = trade.get("amount").and_then(Value::as_f64).unwrap_or_default();

            let sign = match direction {
                "buy" => 1.0,
                "sell" => -1.0,
                other => return Err(Error::InvalidDirection(other.to_owned())),
            };

            match state {
                "filled" => {
                    self.position_usd += sign * amount;
                    let order = if direction == "buy" { &mut self.buy_order } else { &mut self.sell_order };
                    order.id.clear();
                    order.wait = false;
                }
                "open" => {
                    self.position_usd += sign * amount;
                }
                other => return Err(Error::UnexpectedState(other.to_owned())),
            }
        }

        Ok(())
    }
}

impl StrategyHooks for MarketMaker {
    async fn on_notification(
        &mut self,
        session: &mut Session,
        method: &str,
        params: &Value,
    ) -> Result<(), Error> {
        match method {
            "subscription" => {
                let channel = params.get("channel").and_then(Value::as_str).unwrap_or_default();
                let data = params.get("data").cloned().unwrap_or(Value::Null);

                if channel == self.book_channel {
                    self.on_book_update(session, &data).await?;
                } else if channel == self.changes_channel {
                    self.on_trades(&data)?;
                }
            }
            "heartbeat" => {
                if params.get("type").and_then(Value::as_str) == Some("test_request") {
                    session.send_empty("public/test").await?;
                    session.send_empty("public/get_time").await?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    async fn on_response(
        &mut self,
        _session: &mut Session,
        method: &str,
        _request_params: &Value,
        result: &Value,
    ) -> Result<(), Error> {
        match method {
            "private/buy" => {
                self.buy_order.id = result
                    .get("order")
                    .and_then(|o| o.get("order_id"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                self.buy_order.wait = false;
                log::info!("received buy order confirmation");
            }
            "private/sell" => {
                self.sell_order.id = result
                    .get("order")
                    .and_then(|o| o.get("order_id"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                self.sell_order.wait = false;
                log::info!("received sell order confirmation");
            }
            "private/edit" => {
                let order = result.get("order");
                let direction = order.and_then(|o| o.get("direction")).and_then(Value::as_str);
                let order_id = order.and_then(|o| o.get("order_id")).and_then(Value::as_str);

                match direction {
                    Some("buy") => debug_assert_eq!(order_id, Some(self.buy_order.id.as_str())),
                    Some("sell") => debug_assert_eq!(order_id, Some(self.sell_order.id.as_str())),
                    Some(other) => return Err(Error::InvalidDirection(other.to_owned())),
                    None => {}
                }
            }
            "private/get_position" => {
                let server_position = result.get("size").and_then(Value::as_f64).unwrap_or(0.0);

                if self.position_usd.is_nan() {
                    self.position_usd = server_position;
                    log::info!("initial position: {server_position}");
                } else if (self.position_usd - server_position).abs() > f64::EPSILON {
                    return Err(Error::PositionMismatch {
                        local: self.position_usd,
                        server: server_position,
                    });
                }
            }
            "public/get_time" => {
                let server_time = result.as_i64().unwrap_or_default();
                let system_time = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis();
                log::info!("system time: {system_time}, server time: {server_time}");
            }
            _ => {}
        }

        Ok(())
    }

    async fn on_error(
        &mut self,
        _session: &mut Session,
        _method: &str,
        request_params: &Value,
        code: i64,
        message: &str,
    ) -> Result<(), Error> {
        if code == ORDER_NOT_OPEN || code == ORDER_ALREADY_CLOSED {
            log::info!("received error message: ({code}) {message}");

            let order_id = request_params.get("order_id").and_then(Value::as_str).unwrap_or_default();

            if order_id == self.buy_order.id {
                self.buy_order.id.clear();
                self.buy_order.wait = false;
            } else if order_id == self.sell_order.id {
                self.sell_order.id.clear();
                self.sell_order.wait = false;
            }

            Ok(())
        } else if code == IGNORED_ERROR {
            Ok(())
        } else {
            Err(Error::UnexpectedError {
                code,
                message: message.to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizing_is_multiple_of_10_and_bounded() {
        for position in [-40_000.0, -1.0, 0.0, 1.0, 12_345.0, 49_999.0] {
            let qty = sized(5000.0, 50_000.0, position, -1.0);
            assert_eq!(qty % 10.0, 0.0);
            assert!((0.0..=10_000.0).contains(&qty));
        }
    }

    #[test]
    fn sizing_decreases_monotonically_with_position_on_buy_side() {
        let sizes: Vec<f64> = [-10_000.0, 0.0, 10_000.0, 20_000.0]
            .iter()
            .map(|&p| sized(5000.0, 50_000.0, p, -1.0))
            .collect();

        for pair in sizes.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn s4_quote_placement_scenario() {
        let mut mm = MarketMaker::new(MmConfig {
            instrument: "BTC-PERPETUAL".to_owned(),
            frequency: "raw".to_owned(),
            min_depth: 0.0,
            mid_depth: 2000.0,
            max_depth: 0.0,
            order_amount: 5000.0,
            max_position_usd: 50_000.0,
        });
        mm.position_usd = 0.0;

        mm.book
            .bids
            .apply_changes(&[
                crate::book::PriceChange("new".into(), 100.0, 1000.0),
                crate::book::PriceChange("new".into(), 99.0, 1500.0),
                crate::book::PriceChange("new".into(), 98.0, 3000.0),
            ])
            .unwrap();

        assert_eq!(mm.book.bids.price_depth(2000.0), Some(99.0));
        assert_eq!(sized(5000.0, 50_000.0, 0.0, -1.0), 5000.0);
    }

    #[test]
    fn s5_fill_clears_order_and_updates_position() {
        let mut mm = MarketMaker::new(MmConfig::default());
        mm.position_usd = 0.0;
        mm.buy_order = Order {
            price: 99.0,
            quantity: 5000.0,
            id: "B1".to_owned(),
            wait: false,
        };

        mm.on_trades(&serde_json::json!({
            "trades": [{"direction": "buy", "state": "filled", "amount": 5000.0}]
        }))
        .unwrap();

        assert_eq!(mm.position_usd, 5000.0);
        assert_eq!(mm.buy_order.id, "");
        assert!(!mm.buy_order.wait);
    }

    #[test]
    fn unknown_trade_direction_is_an_error() {
        let mut mm = MarketMaker::new(MmConfig::default());
        mm.position_usd = 0.0;

        let err = mm
            .on_trades(&serde_json::json!({"trades": [{"direction": "hold", "state": "filled", "amount": 1.0}]}))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidDirection(_)));
    }

    #[test]
    fn unknown_trade_state_is_an_error() {
        let mut mm = MarketMaker::new(MmConfig::default());
        mm.position_usd = 0.0;

        let err = mm
            .on_trades(&serde_json::json!({"trades": [{"direction": "buy", "state": "cancelled", "amount": 1.0}]}))
            .unwrap_err();

        assert!(matches!(err, Error::UnexpectedState(_)));
    }
}
