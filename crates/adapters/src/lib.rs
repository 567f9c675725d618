//! Exchange adapters for perpetual-futures trading.
//!
//! Each venue module implements the venue-neutral [`traits::FuturesTrader`]
//! interface so strategy code can drive any supported exchange through one
//! vocabulary:
//!
//! - **Symbol translation**: callers use concatenated symbols (`BTCUSDT`);
//!   each adapter owns the mapping to its venue's native identifiers.
//! - **Normalized account state**: balances and positions come back in one
//!   canonical shape regardless of what the venue calls its fields.
//! - **Contract-specification handling**: order quantities and prices are
//!   quantized to each instrument's lot size, tick size, and minimum before
//!   they reach the wire.
//!
//! # Available Adapters
//!
//! - [`okx::OkxPerpsTrader`] - OKX USDT-margined perpetual swaps

pub mod okx;
pub mod traits;
pub mod utils;

pub use traits::FuturesTrader;
