//! OKX Perpetuals/Swap Trading Adapter

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::okx::account::{OkxAuth, OkxRestClient, OKX_REQUEST_TIMEOUT, OKX_REST_URL};
use crate::okx::instruments::InstrumentCatalog;
use crate::okx::symbols;
use crate::traits::{
    AccountBalance, FuturesTrader, OrderAck, PerpPosition, PositionSide, Price, Quantity,
};
use crate::utils::cache::TtlCache;
use crate::utils::retry::RetryConfig;

/// Tuning knobs for [`OkxPerpsTrader`]. `Default` is the production profile;
/// tests shrink the durations and point `base_url` at a stub server.
#[derive(Clone, Debug)]
pub struct OkxTraderConfig {
    pub base_url: String,
    /// Transport timeout per attempt
    pub request_timeout: Duration,
    /// Freshness window for the balance and positions caches
    pub cache_ttl: Duration,
    /// Venue-imposed wait after switching leverage
    pub leverage_cooldown: Duration,
    pub retry: RetryConfig,
}

impl Default for OkxTraderConfig {
    fn default() -> Self {
        Self {
            base_url: OKX_REST_URL.to_string(),
            request_timeout: OKX_REQUEST_TIMEOUT,
            cache_ttl: Duration::from_secs(15),
            leverage_cooldown: Duration::from_secs(3),
            retry: RetryConfig::default(),
        }
    }
}

/// Perpetual-futures trading client for OKX.
///
/// One instance per credential set. Balance and positions are served from
/// short-TTL caches; instrument specifications are cached for the process
/// lifetime. All methods take `&self` and the client is safe to share
/// behind an `Arc` across tasks.
pub struct OkxPerpsTrader {
    rest: OkxRestClient,
    instruments: InstrumentCatalog,
    balance_cache: TtlCache<AccountBalance>,
    positions_cache: TtlCache<Vec<PerpPosition>>,
    leverage_cooldown: Duration,
}

impl OkxPerpsTrader {
    /// Creates a trader for live (or, with `testnet`, demo) trading.
    /// Fails when any credential is empty.
    pub fn new(
        api_key: String,
        api_secret: String,
        passphrase: String,
        testnet: bool,
    ) -> Result<Self> {
        let auth = if testnet {
            OkxAuth::simulated(api_key, api_secret, passphrase)
        } else {
            OkxAuth::new(api_key, api_secret, passphrase)
        };
        Self::with_config(auth, OkxTraderConfig::default())
    }

    /// Creates a trader from `OKX_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::with_config(OkxAuth::from_env()?, OkxTraderConfig::default())
    }

    pub fn with_config(auth: OkxAuth, config: OkxTraderConfig) -> Result<Self> {
        if auth.is_incomplete() {
            bail!("OKX API key, secret, and passphrase must all be provided");
        }
        if auth.simulated {
            info!("OKX demo-trading mode: requests will carry x-simulated-trading");
        }

        let rest = OkxRestClient::with_config(
            auth,
            config.base_url.clone(),
            config.request_timeout,
            config.retry.clone(),
        );

        Ok(Self {
            instruments: InstrumentCatalog::new(rest.clone()),
            balance_cache: TtlCache::new(config.cache_ttl),
            positions_cache: TtlCache::new(config.cache_ttl),
            leverage_cooldown: config.leverage_cooldown,
            rest,
        })
    }

    // =========================================================================
    // Order submission
    // =========================================================================

    async fn submit_market_order(
        &self,
        symbol: &str,
        inst_id: &str,
        side: &'static str,
        size: &str,
        reduce_only: bool,
    ) -> Result<OrderAck> {
        let request = OrderRequest {
            inst_id,
            td_mode: "cross",
            side,
            ord_type: "market",
            sz: size,
            reduce_only: reduce_only.then_some(true),
        };

        let data = self.rest.post("/api/v5/trade/order", &request).await?;
        let results: Vec<OrderResult> =
            serde_json::from_value(data).context("Failed to parse order response")?;
        let result = results.first().context("Empty order response")?;
        if result.s_code != "0" {
            bail!("Order rejected [{}]: {}", result.s_code, result.s_msg);
        }

        info!(
            %symbol,
            side,
            size,
            order_id = %result.ord_id,
            reduce_only,
            "market order placed"
        );

        Ok(OrderAck {
            order_id: result.ord_id.clone(),
            symbol: symbol.to_string(),
            // Market orders fill immediately from the caller's perspective.
            status: "FILLED".to_string(),
        })
    }

    async fn open_position(
        &self,
        symbol: &str,
        side: &'static str,
        quantity: Quantity,
        leverage: u32,
    ) -> Result<OrderAck> {
        let inst_id = symbols::to_inst_id(symbol);

        // Clear leftover orders (old stops and takes) before re-entering.
        if let Err(error) = self.cancel_all_orders(symbol).await {
            warn!(%symbol, error = %format!("{error:#}"), "pre-open order cleanup failed");
        }

        self.set_leverage_inner(symbol, leverage).await?;

        let size = self.instruments.format_quantity(symbol, quantity).await?;
        if size.parse::<f64>().unwrap_or(0.0) <= 0.0 {
            bail!("Quantity too small: {quantity} formats to {size}");
        }

        self.submit_market_order(symbol, &inst_id, side, &size, false)
            .await
    }

    async fn close_position(
        &self,
        symbol: &str,
        position_side: PositionSide,
        quantity: Quantity,
    ) -> Result<OrderAck> {
        let inst_id = symbols::to_inst_id(symbol);

        let quantity = if quantity == 0.0 {
            let positions = self.get_positions().await?;
            let held = positions
                .iter()
                .find(|p| p.symbol == symbol && p.side == position_side)
                .map(|p| p.position_amt)
                .unwrap_or(0.0);
            if held == 0.0 {
                bail!("No open {position_side} position for {symbol}");
            }
            held
        } else {
            quantity
        };

        let size = self.instruments.format_quantity(symbol, quantity).await?;
        let order_side = match position_side {
            PositionSide::Long => "sell",
            PositionSide::Short => "buy",
        };

        self.submit_market_order(symbol, &inst_id, order_side, &size, true)
            .await
    }

    // =========================================================================
    // Leverage
    // =========================================================================

    async fn set_leverage_inner(&self, symbol: &str, leverage: u32) -> Result<()> {
        let inst_id = symbols::to_inst_id(symbol);

        // Skip the call when the venue already reports the target leverage.
        if let Ok(positions) = self.get_positions().await {
            if let Some(position) = positions.iter().find(|p| p.symbol == symbol) {
                if position.leverage as u32 == leverage {
                    debug!(%symbol, leverage, "leverage already set, skipping");
                    return Ok(());
                }
            }
        }

        let request = LeverageRequest {
            inst_id: &inst_id,
            lever: leverage.to_string(),
            mgn_mode: "cross",
        };

        if let Err(error) = self.rest.post("/api/v5/account/set-leverage", &request).await {
            let text = format!("{error:#}");
            if text.contains("already") || text.contains("same") {
                debug!(%symbol, leverage, "leverage unchanged on venue");
                return Ok(());
            }
            return Err(error.context("Failed to set leverage"));
        }

        info!(%symbol, leverage, "leverage updated, waiting out venue cooldown");
        tokio::time::sleep(self.leverage_cooldown).await;
        Ok(())
    }

    // =========================================================================
    // Trigger orders
    // =========================================================================

    async fn place_trigger_order(
        &self,
        symbol: &str,
        position_side: PositionSide,
        quantity: Quantity,
        trigger_price: Price,
        take_profit: bool,
    ) -> Result<()> {
        let inst_id = symbols::to_inst_id(symbol);
        let size = self.instruments.format_quantity(symbol, quantity).await?;
        let trigger = self.instruments.format_price(symbol, trigger_price).await?;

        // Trigger orders close the position, so the order side is opposite.
        let side = match position_side {
            PositionSide::Long => "sell",
            PositionSide::Short => "buy",
        };

        let request = AlgoOrderRequest {
            inst_id: &inst_id,
            td_mode: "cross",
            side,
            ord_type: "conditional",
            sz: &size,
            sl_trigger_px: (!take_profit).then_some(trigger.as_str()),
            sl_trigger_px_type: (!take_profit).then_some("last"),
            tp_trigger_px: take_profit.then_some(trigger.as_str()),
            tp_trigger_px_type: take_profit.then_some("last"),
            reduce_only: true,
        };

        self.rest
            .post("/api/v5/trade/order-algo", &request)
            .await
            .with_context(|| {
                if take_profit {
                    "Failed to place take-profit order"
                } else {
                    "Failed to place stop-loss order"
                }
            })?;

        info!(
            %symbol,
            %position_side,
            trigger = %trigger,
            size = %size,
            kind = if take_profit { "take-profit" } else { "stop-loss" },
            "trigger order placed"
        );
        Ok(())
    }

    /// Cancels pending conditional orders of one kind. Per-order failures
    /// are logged and skipped.
    async fn cancel_trigger_orders(&self, symbol: &str, take_profit: bool) -> Result<()> {
        let inst_id = symbols::to_inst_id(symbol);

        let data = self
            .rest
            .get(&format!(
                "/api/v5/trade/orders-algo-pending?instId={inst_id}&ordType=conditional"
            ))
            .await
            .context("Failed to list pending trigger orders")?;
        let orders: Vec<AlgoOrder> =
            serde_json::from_value(data).context("Failed to parse trigger order list")?;

        for order in orders {
            let trigger = if take_profit {
                &order.tp_trigger_px
            } else {
                &order.sl_trigger_px
            };
            if trigger.is_empty() || trigger == "0" {
                continue;
            }

            let request = CancelAlgoRequest {
                inst_id: &inst_id,
                algo_id: &order.algo_id,
                ord_type: "conditional",
            };
            if let Err(error) = self.rest.post("/api/v5/trade/cancel-algo", &request).await {
                warn!(
                    %symbol,
                    algo_id = %order.algo_id,
                    error = %format!("{error:#}"),
                    "failed to cancel trigger order"
                );
                continue;
            }
            debug!(%symbol, algo_id = %order.algo_id, "trigger order cancelled");
        }

        Ok(())
    }
}

// =============================================================================
// Trader interface
// =============================================================================

#[async_trait::async_trait]
impl FuturesTrader for OkxPerpsTrader {
    async fn get_balance(&self) -> Result<AccountBalance> {
        if let Some(balance) = self.balance_cache.get() {
            debug!(age_ms = self.balance_cache.age().map(|a| a.as_millis() as u64), "balance served from cache");
            return Ok(balance);
        }

        debug!("balance cache stale, querying venue");
        let data = self
            .rest
            .get("/api/v5/account/balance?ccy=USDT")
            .await
            .context("Failed to fetch account balance")?;
        let accounts: Vec<BalanceData> =
            serde_json::from_value(data).context("Failed to parse balance data")?;

        let balance = normalize_balance(&accounts)?;
        debug!(
            total_equity = balance.total_equity,
            wallet = balance.total_wallet_balance,
            upl = balance.total_unrealized_profit,
            available = balance.available_balance,
            "balance refreshed"
        );

        self.balance_cache.store(balance.clone());
        Ok(balance)
    }

    async fn get_positions(&self) -> Result<Vec<PerpPosition>> {
        if let Some(positions) = self.positions_cache.get() {
            debug!(age_ms = self.positions_cache.age().map(|a| a.as_millis() as u64), "positions served from cache");
            return Ok(positions);
        }

        debug!("positions cache stale, querying venue");
        let data = self
            .rest
            .get("/api/v5/account/positions")
            .await
            .context("Failed to fetch positions")?;
        let raw: Vec<PositionData> =
            serde_json::from_value(data).context("Failed to parse position data")?;

        let positions = normalize_positions(raw);
        info!(count = positions.len(), "positions refreshed");

        // An empty book is a valid snapshot and is cached like any other.
        self.positions_cache.store(positions.clone());
        Ok(positions)
    }

    async fn get_market_price(&self, symbol: &str) -> Result<Price> {
        let inst_id = symbols::to_inst_id(symbol);
        let data = self
            .rest
            .get(&format!("/api/v5/market/ticker?instId={inst_id}"))
            .await
            .context("Failed to fetch market price")?;
        let tickers: Vec<TickerData> =
            serde_json::from_value(data).context("Failed to parse ticker data")?;
        let ticker = tickers
            .first()
            .with_context(|| format!("No ticker for {inst_id}"))?;

        ticker
            .last
            .parse()
            .or_else(|_| ticker.mark_px.parse())
            .context("Failed to parse ticker price")
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        self.set_leverage_inner(symbol, leverage).await
    }

    async fn set_margin_mode(&self, symbol: &str, is_cross: bool) -> Result<()> {
        // Margin mode is chosen per order on this venue via tdMode; nothing
        // to configure account-side.
        info!(
            %symbol,
            mode = if is_cross { "cross" } else { "isolated" },
            "margin mode recorded; applied per order via tdMode"
        );
        Ok(())
    }

    async fn open_long(&self, symbol: &str, quantity: Quantity, leverage: u32) -> Result<OrderAck> {
        self.open_position(symbol, "buy", quantity, leverage)
            .await
            .context("Failed to open long position")
    }

    async fn open_short(
        &self,
        symbol: &str,
        quantity: Quantity,
        leverage: u32,
    ) -> Result<OrderAck> {
        self.open_position(symbol, "sell", quantity, leverage)
            .await
            .context("Failed to open short position")
    }

    async fn close_long(&self, symbol: &str, quantity: Quantity) -> Result<OrderAck> {
        self.close_position(symbol, PositionSide::Long, quantity)
            .await
            .context("Failed to close long position")
    }

    async fn close_short(&self, symbol: &str, quantity: Quantity) -> Result<OrderAck> {
        self.close_position(symbol, PositionSide::Short, quantity)
            .await
            .context("Failed to close short position")
    }

    async fn set_stop_loss(
        &self,
        symbol: &str,
        position_side: PositionSide,
        quantity: Quantity,
        stop_price: Price,
    ) -> Result<()> {
        self.place_trigger_order(symbol, position_side, quantity, stop_price, false)
            .await
    }

    async fn set_take_profit(
        &self,
        symbol: &str,
        position_side: PositionSide,
        quantity: Quantity,
        take_profit_price: Price,
    ) -> Result<()> {
        self.place_trigger_order(symbol, position_side, quantity, take_profit_price, true)
            .await
    }

    async fn cancel_stop_loss_orders(&self, symbol: &str) -> Result<()> {
        self.cancel_trigger_orders(symbol, false).await
    }

    async fn cancel_take_profit_orders(&self, symbol: &str) -> Result<()> {
        self.cancel_trigger_orders(symbol, true).await
    }

    async fn cancel_stop_orders(&self, symbol: &str) -> Result<()> {
        if let Err(error) = self.cancel_stop_loss_orders(symbol).await {
            warn!(%symbol, error = %format!("{error:#}"), "failed to cancel stop-loss orders");
        }
        if let Err(error) = self.cancel_take_profit_orders(symbol).await {
            warn!(%symbol, error = %format!("{error:#}"), "failed to cancel take-profit orders");
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<()> {
        let inst_id = symbols::to_inst_id(symbol);

        // Batch cancel first; fall back to cancelling one by one.
        let batch = CancelAllRequest { inst_id: &inst_id };
        if let Err(error) = self
            .rest
            .post("/api/v5/trade/cancel-all-after", &batch)
            .await
        {
            debug!(
                %symbol,
                error = %format!("{error:#}"),
                "batch cancel unavailable, falling back to per-order cancels"
            );

            match self
                .rest
                .get(&format!("/api/v5/trade/orders-pending?instId={inst_id}"))
                .await
                .and_then(|data| {
                    serde_json::from_value::<Vec<PendingOrder>>(data)
                        .context("Failed to parse pending order list")
                }) {
                Ok(orders) => {
                    for order in orders {
                        let request = CancelOrderRequest {
                            inst_id: &inst_id,
                            ord_id: &order.ord_id,
                        };
                        if let Err(error) =
                            self.rest.post("/api/v5/trade/cancel-order", &request).await
                        {
                            warn!(
                                %symbol,
                                ord_id = %order.ord_id,
                                error = %format!("{error:#}"),
                                "failed to cancel order"
                            );
                            continue;
                        }
                        debug!(%symbol, ord_id = %order.ord_id, "order cancelled");
                    }
                }
                Err(error) => {
                    warn!(%symbol, error = %format!("{error:#}"), "failed to list pending orders");
                }
            }
        }

        // Sweep conditional orders as well.
        if let Err(error) = self.cancel_stop_loss_orders(symbol).await {
            warn!(%symbol, error = %format!("{error:#}"), "failed to cancel stop-loss orders");
        }
        if let Err(error) = self.cancel_take_profit_orders(symbol).await {
            warn!(%symbol, error = %format!("{error:#}"), "failed to cancel take-profit orders");
        }

        debug!(%symbol, "open orders cleared");
        Ok(())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct OrderRequest<'a> {
    #[serde(rename = "instId")]
    inst_id: &'a str,
    #[serde(rename = "tdMode")]
    td_mode: &'static str,
    side: &'static str,
    #[serde(rename = "ordType")]
    ord_type: &'static str,
    sz: &'a str,
    #[serde(rename = "reduceOnly", skip_serializing_if = "Option::is_none")]
    reduce_only: Option<bool>,
}

#[derive(Deserialize)]
struct OrderResult {
    #[serde(rename = "ordId", default)]
    ord_id: String,
    #[serde(rename = "sCode", default)]
    s_code: String,
    #[serde(rename = "sMsg", default)]
    s_msg: String,
}

#[derive(Serialize)]
struct LeverageRequest<'a> {
    #[serde(rename = "instId")]
    inst_id: &'a str,
    lever: String,
    #[serde(rename = "mgnMode")]
    mgn_mode: &'static str,
}

#[derive(Serialize)]
struct AlgoOrderRequest<'a> {
    #[serde(rename = "instId")]
    inst_id: &'a str,
    #[serde(rename = "tdMode")]
    td_mode: &'static str,
    side: &'static str,
    #[serde(rename = "ordType")]
    ord_type: &'static str,
    sz: &'a str,
    #[serde(rename = "slTriggerPx", skip_serializing_if = "Option::is_none")]
    sl_trigger_px: Option<&'a str>,
    #[serde(rename = "slTriggerPxType", skip_serializing_if = "Option::is_none")]
    sl_trigger_px_type: Option<&'static str>,
    #[serde(rename = "tpTriggerPx", skip_serializing_if = "Option::is_none")]
    tp_trigger_px: Option<&'a str>,
    #[serde(rename = "tpTriggerPxType", skip_serializing_if = "Option::is_none")]
    tp_trigger_px_type: Option<&'static str>,
    #[serde(rename = "reduceOnly")]
    reduce_only: bool,
}

#[derive(Deserialize)]
struct AlgoOrder {
    #[serde(rename = "algoId", default)]
    algo_id: String,
    #[serde(rename = "slTriggerPx", default)]
    sl_trigger_px: String,
    #[serde(rename = "tpTriggerPx", default)]
    tp_trigger_px: String,
}

#[derive(Serialize)]
struct CancelAlgoRequest<'a> {
    #[serde(rename = "instId")]
    inst_id: &'a str,
    #[serde(rename = "algoId")]
    algo_id: &'a str,
    #[serde(rename = "ordType")]
    ord_type: &'static str,
}

#[derive(Serialize)]
struct CancelAllRequest<'a> {
    #[serde(rename = "instId")]
    inst_id: &'a str,
}

#[derive(Deserialize)]
struct PendingOrder {
    #[serde(rename = "ordId", default)]
    ord_id: String,
}

#[derive(Serialize)]
struct CancelOrderRequest<'a> {
    #[serde(rename = "instId")]
    inst_id: &'a str,
    #[serde(rename = "ordId")]
    ord_id: &'a str,
}

#[derive(Deserialize)]
struct BalanceData {
    #[serde(rename = "totalEq", default)]
    total_eq: String,
    #[serde(default)]
    details: Vec<BalanceDetail>,
}

#[derive(Deserialize)]
struct BalanceDetail {
    #[serde(default)]
    bal: String,
    #[serde(rename = "availBal", default)]
    avail_bal: String,
    #[serde(default)]
    eq: String,
    #[serde(rename = "availEq", default)]
    avail_eq: String,
    #[serde(default)]
    upl: String,
}

#[derive(Deserialize)]
struct PositionData {
    #[serde(rename = "instId", default)]
    inst_id: String,
    #[serde(default)]
    pos: String,
    #[serde(rename = "avgPx", default)]
    avg_px: String,
    #[serde(rename = "markPx", default)]
    mark_px: String,
    #[serde(rename = "liqPx", default)]
    liq_px: String,
    #[serde(default)]
    upl: String,
    #[serde(default)]
    margin: String,
    #[serde(default)]
    lever: String,
    #[serde(rename = "mgnMode", default)]
    mgn_mode: String,
    #[serde(rename = "notionalUsd", default)]
    notional_usd: String,
}

#[derive(Deserialize)]
struct TickerData {
    #[serde(default)]
    last: String,
    #[serde(rename = "markPx", default)]
    mark_px: String,
}

// =============================================================================
// Normalization
// =============================================================================

fn num(value: &str) -> f64 {
    value.parse().unwrap_or(0.0)
}

/// First account, first currency detail, mapped to the canonical balance
/// shape. Wallet balance excludes unrealized PnL.
fn normalize_balance(accounts: &[BalanceData]) -> Result<AccountBalance> {
    let account = accounts.first().context("No balance information returned")?;
    let detail = account
        .details
        .first()
        .context("No balance information returned")?;

    let total_eq = num(&account.total_eq);
    let avail_eq = num(&detail.avail_eq);
    let upl = num(&detail.upl);

    Ok(AccountBalance {
        total_wallet_balance: total_eq - upl,
        available_balance: avail_eq,
        total_unrealized_profit: upl,
        total_balance: total_eq,
        available_equity: avail_eq,
        balance: num(&detail.bal),
        available_balance_ccy: num(&detail.avail_bal),
        equity: num(&detail.eq),
        total_equity: total_eq,
    })
}

/// Drops flat positions, splits signed quantity into side + magnitude, and
/// reverse-translates symbols.
fn normalize_positions(raw: Vec<PositionData>) -> Vec<PerpPosition> {
    let mut positions = Vec::new();
    for record in raw {
        let pos = num(&record.pos);
        if pos == 0.0 {
            continue;
        }

        let (side, amount) = if pos < 0.0 {
            (PositionSide::Short, -pos)
        } else {
            (PositionSide::Long, pos)
        };

        positions.push(PerpPosition {
            symbol: symbols::from_inst_id(&record.inst_id),
            position_amt: amount,
            entry_price: num(&record.avg_px),
            mark_price: num(&record.mark_px),
            unrealized_profit: num(&record.upl),
            unrealized_pnl: num(&record.upl),
            leverage: num(&record.lever),
            margin: num(&record.margin),
            notional: num(&record.notional_usd),
            liquidation_price: num(&record.liq_px),
            side,
            position_side: side,
            margin_mode: record.mgn_mode.clone(),
            margin_type: record.mgn_mode,
        });
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_normalization_from_venue_payload() {
        let payload = r#"[{
            "totalEq": "1000.5",
            "details": [{
                "ccy": "USDT",
                "bal": "900.0",
                "availBal": "380.25",
                "eq": "1000.5",
                "availEq": "400.75",
                "upl": "50.5"
            }]
        }]"#;
        let accounts: Vec<BalanceData> = serde_json::from_str(payload).unwrap();
        let balance = normalize_balance(&accounts).unwrap();

        assert_eq!(balance.total_wallet_balance, 950.0);
        assert_eq!(balance.available_balance, 400.75);
        assert_eq!(balance.total_unrealized_profit, 50.5);
        assert_eq!(balance.total_balance, 1000.5);
        assert_eq!(balance.available_equity, 400.75);
        assert_eq!(balance.balance, 900.0);
        assert_eq!(balance.available_balance_ccy, 380.25);
        assert_eq!(balance.equity, 1000.5);
        assert_eq!(balance.total_equity, 1000.5);
    }

    #[test]
    fn balance_requires_a_detail_record() {
        let accounts: Vec<BalanceData> =
            serde_json::from_str(r#"[{"totalEq": "0", "details": []}]"#).unwrap();
        assert!(normalize_balance(&accounts).is_err());
        assert!(normalize_balance(&[]).is_err());
    }

    #[test]
    fn positions_drop_flat_and_split_sides() {
        let payload = r#"[
            {"instId": "BTC-USDT-SWAP", "pos": "0", "avgPx": "97000", "markPx": "97100",
             "liqPx": "0", "upl": "0", "margin": "0", "lever": "10", "mgnMode": "cross",
             "notionalUsd": "0"},
            {"instId": "ETH-USDT-SWAP", "pos": "-4", "avgPx": "2500", "markPx": "2480",
             "liqPx": "2750", "upl": "80", "margin": "1000", "lever": "10",
             "mgnMode": "cross", "notionalUsd": "10000"},
            {"instId": "SOL-USDT-SWAP", "pos": "12", "avgPx": "150", "markPx": "151",
             "liqPx": "120", "upl": "12", "margin": "180", "lever": "5",
             "mgnMode": "cross", "notionalUsd": "1800"}
        ]"#;
        let raw: Vec<PositionData> = serde_json::from_str(payload).unwrap();
        let positions = normalize_positions(raw);

        assert_eq!(positions.len(), 2);

        let short = &positions[0];
        assert_eq!(short.symbol, "ETHUSDT");
        assert_eq!(short.side, PositionSide::Short);
        assert_eq!(short.position_amt, 4.0);
        assert_eq!(short.unrealized_profit, 80.0);
        assert_eq!(short.margin_mode, "cross");
        assert_eq!(short.margin_type, "cross");

        let long = &positions[1];
        assert_eq!(long.symbol, "SOLUSDT");
        assert_eq!(long.side, PositionSide::Long);
        assert_eq!(long.position_amt, 12.0);
        assert_eq!(long.leverage, 5.0);
    }

    #[test]
    fn empty_position_list_normalizes_to_empty() {
        assert!(normalize_positions(Vec::new()).is_empty());
    }

    #[test]
    fn order_request_wire_shape() {
        let request = OrderRequest {
            inst_id: "BTC-USDT-SWAP",
            td_mode: "cross",
            side: "buy",
            ord_type: "market",
            sz: "1",
            reduce_only: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"instId":"BTC-USDT-SWAP","tdMode":"cross","side":"buy","ordType":"market","sz":"1"}"#
        );

        let request = OrderRequest {
            reduce_only: Some(true),
            side: "sell",
            ..request
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["reduceOnly"], true);
        assert_eq!(json["side"], "sell");
    }

    #[test]
    fn algo_request_carries_one_trigger_kind() {
        let request = AlgoOrderRequest {
            inst_id: "ETH-USDT-SWAP",
            td_mode: "cross",
            side: "sell",
            ord_type: "conditional",
            sz: "4",
            sl_trigger_px: Some("2400.5"),
            sl_trigger_px_type: Some("last"),
            tp_trigger_px: None,
            tp_trigger_px_type: None,
            reduce_only: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["slTriggerPx"], "2400.5");
        assert_eq!(json["slTriggerPxType"], "last");
        assert!(json.get("tpTriggerPx").is_none());
        assert_eq!(json["reduceOnly"], true);
        assert_eq!(json["ordType"], "conditional");
    }

    #[test]
    fn construction_rejects_missing_credentials() {
        assert!(OkxPerpsTrader::new(
            String::new(),
            "secret".to_string(),
            "phrase".to_string(),
            false
        )
        .is_err());
        assert!(OkxPerpsTrader::new(
            "key".to_string(),
            String::new(),
            "phrase".to_string(),
            false
        )
        .is_err());
        assert!(OkxPerpsTrader::new(
            "key".to_string(),
            "secret".to_string(),
            String::new(),
            false
        )
        .is_err());
        assert!(OkxPerpsTrader::new(
            "key".to_string(),
            "secret".to_string(),
            "phrase".to_string(),
            true
        )
        .is_ok());
    }
}
