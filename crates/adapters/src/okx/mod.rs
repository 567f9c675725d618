//! OKX Exchange Adapter
//!
//! Perpetual/swap futures trading against the OKX v5 REST API.
//!
//! # Authentication
//!
//! OKX uses HMAC-SHA256 signing with Base64 encoding:
//! - Requires API key, secret key, and passphrase
//! - Signature: Base64(HMAC-SHA256(timestamp + method + requestPath + body))
//! - Headers: OK-ACCESS-KEY, OK-ACCESS-SIGN, OK-ACCESS-TIMESTAMP, OK-ACCESS-PASSPHRASE
//!
//! # Symbols
//!
//! Callers use concatenated symbols (`BTCUSDT`); the adapter translates to
//! native instrument IDs (`BTC-USDT-SWAP`) on the way out and back.
//!
//! # API Documentation
//!
//! - REST API: <https://www.okx.com/docs-v5/en/#rest-api>

pub mod account;
pub mod instruments;
pub mod perps;
pub mod symbols;

pub use account::{OkxAuth, OkxRestClient, OkxResponse, OKX_REST_URL};
pub use instruments::{Instrument, InstrumentCatalog, SymbolPrecision};
pub use perps::{OkxPerpsTrader, OkxTraderConfig};
