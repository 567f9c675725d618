use anyhow::Result;
use serde::Serialize;

pub type Price = f64;
pub type Quantity = f64;

// ============================================================================
// Balance & Positions
// ============================================================================

/// Normalized futures account balance.
///
/// Field names follow the canonical (Binance-flavored) vocabulary shared by
/// all venue adapters; the snake_case aliases are kept so strategy code
/// written against either naming keeps parsing.
#[derive(Clone, Debug, Serialize)]
pub struct AccountBalance {
    /// Wallet balance excluding unrealized PnL (`equity − upl`).
    #[serde(rename = "totalWalletBalance")]
    pub total_wallet_balance: f64,
    #[serde(rename = "availableBalance")]
    pub available_balance: f64,
    /// May be negative.
    #[serde(rename = "totalUnrealizedProfit")]
    pub total_unrealized_profit: f64,
    // Compatibility aliases.
    pub total_balance: f64,
    #[serde(rename = "available_balance")]
    pub available_equity: f64,
    pub balance: f64,
    pub available_balance_ccy: f64,
    pub equity: f64,
    pub total_equity: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized open position. One record per non-flat exchange position;
/// `position_amt` is always positive with the direction carried by `side`.
#[derive(Clone, Debug, Serialize)]
pub struct PerpPosition {
    /// Caller-format symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    #[serde(rename = "positionAmt")]
    pub position_amt: Quantity,
    #[serde(rename = "entryPrice")]
    pub entry_price: Price,
    #[serde(rename = "markPrice")]
    pub mark_price: Price,
    #[serde(rename = "unRealizedProfit")]
    pub unrealized_profit: f64,
    /// Alias of `unRealizedProfit`.
    #[serde(rename = "unrealizedPnl")]
    pub unrealized_pnl: f64,
    pub leverage: f64,
    pub margin: f64,
    pub notional: f64,
    #[serde(rename = "liquidationPrice")]
    pub liquidation_price: Price,
    pub side: PositionSide,
    /// Alias of `side`.
    #[serde(rename = "positionSide")]
    pub position_side: PositionSide,
    #[serde(rename = "marginMode")]
    pub margin_mode: String,
    /// Alias of `marginMode`.
    #[serde(rename = "marginType")]
    pub margin_type: String,
}

// ============================================================================
// Orders
// ============================================================================

/// Acknowledgement returned for market open/close orders.
#[derive(Clone, Debug, Serialize)]
pub struct OrderAck {
    #[serde(rename = "orderId")]
    pub order_id: String,
    pub symbol: String,
    /// Market orders are reported as `FILLED`.
    pub status: String,
}

// ============================================================================
// Trader interface
// ============================================================================

/// Venue-neutral perpetual-futures trading interface.
///
/// Implementations own every venue-specific concern: symbol formats,
/// authentication, precision rules, and field-name translation. Nothing
/// venue-native leaks through this boundary.
#[async_trait::async_trait]
pub trait FuturesTrader: Send + Sync {
    /// Account balance in the settlement currency. Implementations may serve
    /// a recent cached snapshot.
    async fn get_balance(&self) -> Result<AccountBalance>;

    /// All open positions. An empty list is a valid result, not an error.
    /// Implementations may serve a recent cached snapshot.
    async fn get_positions(&self) -> Result<Vec<PerpPosition>>;

    /// Latest traded price for the symbol. Never cached.
    async fn get_market_price(&self, symbol: &str) -> Result<Price>;

    /// Sets leverage for the symbol. A no-op when the venue already reports
    /// the requested value.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()>;

    /// Selects cross vs isolated margin. Venues that choose the margin mode
    /// per order implement this as a no-op.
    async fn set_margin_mode(&self, symbol: &str, is_cross: bool) -> Result<()>;

    async fn open_long(&self, symbol: &str, quantity: Quantity, leverage: u32) -> Result<OrderAck>;
    async fn open_short(&self, symbol: &str, quantity: Quantity, leverage: u32)
        -> Result<OrderAck>;

    /// Closes (part of) a long position. `quantity == 0` closes the full
    /// position; fails when no long position exists.
    async fn close_long(&self, symbol: &str, quantity: Quantity) -> Result<OrderAck>;

    /// Closes (part of) a short position. `quantity == 0` closes the full
    /// position; fails when no short position exists.
    async fn close_short(&self, symbol: &str, quantity: Quantity) -> Result<OrderAck>;

    /// Places a reduce-only stop-loss trigger order closing `position_side`.
    async fn set_stop_loss(
        &self,
        symbol: &str,
        position_side: PositionSide,
        quantity: Quantity,
        stop_price: Price,
    ) -> Result<()>;

    /// Places a reduce-only take-profit trigger order closing `position_side`.
    async fn set_take_profit(
        &self,
        symbol: &str,
        position_side: PositionSide,
        quantity: Quantity,
        take_profit_price: Price,
    ) -> Result<()>;

    /// Cancels pending stop-loss trigger orders. Best-effort: individual
    /// cancel failures are logged and skipped.
    async fn cancel_stop_loss_orders(&self, symbol: &str) -> Result<()>;

    /// Cancels pending take-profit trigger orders. Best-effort.
    async fn cancel_take_profit_orders(&self, symbol: &str) -> Result<()>;

    /// Cancels both stop-loss and take-profit trigger orders. Best-effort.
    async fn cancel_stop_orders(&self, symbol: &str) -> Result<()>;

    /// Cancels every pending order for the symbol, regular and trigger.
    /// Best-effort.
    async fn cancel_all_orders(&self, symbol: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_serializes_canonical_and_alias_keys() {
        let balance = AccountBalance {
            total_wallet_balance: 950.0,
            available_balance: 400.0,
            total_unrealized_profit: 50.0,
            total_balance: 1000.0,
            available_equity: 400.0,
            balance: 900.0,
            available_balance_ccy: 380.0,
            equity: 1000.0,
            total_equity: 1000.0,
        };

        let json = serde_json::to_value(&balance).unwrap();
        for key in [
            "totalWalletBalance",
            "availableBalance",
            "totalUnrealizedProfit",
            "total_balance",
            "available_balance",
            "balance",
            "available_balance_ccy",
            "equity",
            "total_equity",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["totalWalletBalance"], 950.0);
    }

    #[test]
    fn position_serializes_binance_flavored_names() {
        let position = PerpPosition {
            symbol: "ETHUSDT".to_string(),
            position_amt: 4.0,
            entry_price: 2500.0,
            mark_price: 2480.0,
            unrealized_profit: -80.0,
            unrealized_pnl: -80.0,
            leverage: 10.0,
            margin: 1000.0,
            notional: 10000.0,
            liquidation_price: 2750.0,
            side: PositionSide::Short,
            position_side: PositionSide::Short,
            margin_mode: "cross".to_string(),
            margin_type: "cross".to_string(),
        };

        let json = serde_json::to_value(&position).unwrap();
        assert_eq!(json["side"], "short");
        assert_eq!(json["positionSide"], "short");
        assert_eq!(json["unRealizedProfit"], -80.0);
        assert_eq!(json["unrealizedPnl"], -80.0);
        assert_eq!(json["positionAmt"], 4.0);
    }
}
