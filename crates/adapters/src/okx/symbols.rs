//! Symbol translation between caller format and OKX instrument IDs
//!
//! Callers use concatenated symbols (`BTCUSDT`); OKX swaps are identified by
//! hyphenated instrument IDs (`BTC-USDT-SWAP`). Both directions are total
//! functions.

/// Caller symbol → OKX instrument ID.
///
/// Inputs already containing `-` are assumed to be native instrument IDs and
/// pass through unchanged. A trailing `USDT` quote is preferred over `USD`;
/// anything else defaults to a USDT-margined swap.
pub fn to_inst_id(symbol: &str) -> String {
    if symbol.contains('-') {
        return symbol.to_string();
    }
    if let Some(base) = symbol.strip_suffix("USDT") {
        return format!("{base}-USDT-SWAP");
    }
    if let Some(base) = symbol.strip_suffix("USD") {
        return format!("{base}-USD-SWAP");
    }
    format!("{symbol}-USDT-SWAP")
}

/// OKX instrument ID → caller symbol (`BTC-USDT-SWAP` → `BTCUSDT`).
pub fn from_inst_id(inst_id: &str) -> String {
    inst_id
        .strip_suffix("-SWAP")
        .unwrap_or(inst_id)
        .replace('-', "")
}
