//! Instrument specifications and order precision
//!
//! OKX publishes per-instrument contract rules (lot size, tick size, minimum
//! order size) as decimal strings. Quantities and prices must be quantized
//! to those steps before they reach the order endpoints. Specifications are
//! stable, so parsed precision entries are cached for the process lifetime.

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::okx::account::OkxRestClient;
use crate::okx::symbols;

/// Instrument record from `/api/v5/public/instruments`. Numeric fields are
/// decimal strings on the wire.
#[derive(Clone, Debug, Deserialize)]
pub struct Instrument {
    #[serde(rename = "instId")]
    pub inst_id: String,
    /// Order quantity step (contract count)
    #[serde(rename = "lotSz", default)]
    pub lot_sz: String,
    /// Price step
    #[serde(rename = "tickSz", default)]
    pub tick_sz: String,
    /// Minimum order quantity
    #[serde(rename = "minSz", default)]
    pub min_sz: String,
    /// Contract value in the base currency
    #[serde(rename = "ctVal", default)]
    pub ct_val: String,
    #[serde(rename = "baseCcy", default)]
    pub base_ccy: String,
    #[serde(rename = "quoteCcy", default)]
    pub quote_ccy: String,
    #[serde(rename = "instType", default)]
    pub inst_type: String,
    #[serde(default)]
    pub state: String,
}

/// Parsed precision rules for one instrument
#[derive(Clone, Copy, Debug, Default)]
pub struct SymbolPrecision {
    /// Decimal places implied by the tick size
    pub price_precision: u32,
    /// Decimal places implied by the lot size
    pub quantity_precision: u32,
    pub tick_size: f64,
    pub step_size: f64,
    pub min_size: f64,
}

impl SymbolPrecision {
    pub fn from_instrument(instrument: &Instrument) -> Self {
        let step_size: f64 = instrument.lot_sz.parse().unwrap_or(0.0);
        let tick_size: f64 = instrument.tick_sz.parse().unwrap_or(0.0);
        let min_size: f64 = instrument.min_sz.parse().unwrap_or(0.0);

        Self {
            price_precision: decimal_places(tick_size),
            quantity_precision: decimal_places(step_size),
            tick_size,
            step_size,
            min_size,
        }
    }
}

/// Decimal places of a step value, from a fixed-precision rendering with
/// trailing zeros trimmed. `0.010` → 2, `1.0` → 0.
fn decimal_places(step: f64) -> u32 {
    if step <= 0.0 {
        return 0;
    }
    let rendered = format!("{step:.10}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    match trimmed.find('.') {
        Some(dot) => (trimmed.len() - dot - 1) as u32,
        None => 0,
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Read-through instrument-spec cache keyed by instrument ID.
/// Entries never expire.
pub struct InstrumentCatalog {
    rest: OkxRestClient,
    precision: RwLock<HashMap<String, SymbolPrecision>>,
}

impl InstrumentCatalog {
    pub fn new(rest: OkxRestClient) -> Self {
        Self {
            rest,
            precision: RwLock::new(HashMap::new()),
        }
    }

    /// Fetches the instrument record for a caller-format symbol. Fails when
    /// the venue returns an empty list.
    pub async fn instrument(&self, symbol: &str) -> Result<Instrument> {
        let inst_id = symbols::to_inst_id(symbol);
        let data = self
            .rest
            .get(&format!(
                "/api/v5/public/instruments?instType=SWAP&instId={inst_id}"
            ))
            .await?;

        let instruments: Vec<Instrument> =
            serde_json::from_value(data).context("Failed to parse instrument data")?;
        instruments
            .into_iter()
            .next()
            .with_context(|| format!("Instrument {inst_id} not found"))
    }

    /// Precision rules for a symbol, fetched once and cached forever.
    pub async fn precision(&self, symbol: &str) -> Result<SymbolPrecision> {
        let inst_id = symbols::to_inst_id(symbol);
        if let Some(precision) = self.precision.read().get(&inst_id) {
            return Ok(*precision);
        }

        // Fetch outside the guard; a concurrent miss may fetch too, the
        // values are identical.
        let instrument = self.instrument(symbol).await?;
        let precision = SymbolPrecision::from_instrument(&instrument);
        debug!(
            %inst_id,
            tick_size = precision.tick_size,
            step_size = precision.step_size,
            min_size = precision.min_size,
            "cached instrument precision"
        );
        self.precision.write().insert(inst_id, precision);
        Ok(precision)
    }

    /// Formats an order quantity as the integer contract count the venue
    /// expects: clamped to the instrument minimum and floored to a lot-size
    /// multiple. Falls back to a default precision when the specification
    /// cannot be fetched.
    pub async fn format_quantity(&self, symbol: &str, quantity: f64) -> Result<String> {
        if quantity <= 0.0 {
            bail!("Quantity must be positive, got {quantity}");
        }

        let precision = match self.precision(symbol).await {
            Ok(precision) => precision,
            Err(error) => {
                warn!(
                    %symbol,
                    error = %format!("{error:#}"),
                    "instrument specification unavailable, using default precision"
                );
                return Ok(fallback_quantity(symbol, quantity));
            }
        };

        Ok(render_quantity(quantize_quantity(quantity, &precision)))
    }

    /// Formats a price floored to the instrument tick, with trailing zeros
    /// trimmed.
    pub async fn format_price(&self, symbol: &str, price: f64) -> Result<String> {
        let precision = self.precision(symbol).await?;
        Ok(render_price(
            quantize_price(price, &precision),
            precision.price_precision,
        ))
    }
}

// =============================================================================
// Quantization
// =============================================================================

/// Clamps to the instrument minimum, then floors to a lot-size multiple,
/// re-clamping if the floor lands below the minimum.
pub(crate) fn quantize_quantity(quantity: f64, precision: &SymbolPrecision) -> f64 {
    let min_size = if precision.min_size > 0.0 {
        precision.min_size
    } else {
        1.0
    };

    let mut quantity = quantity;
    if quantity < min_size {
        warn!(
            quantity,
            min_size, "quantity below instrument minimum, clamping"
        );
        quantity = min_size;
    }

    if precision.step_size > 0.0 {
        quantity = (quantity / precision.step_size).floor() * precision.step_size;
        if quantity < min_size {
            quantity = min_size;
        }
    }

    quantity
}

/// Contract counts are integers on this venue.
pub(crate) fn render_quantity(quantity: f64) -> String {
    format!("{:.0}", quantity.floor())
}

/// Floors to a tick multiple, or to the derived decimal places when the
/// instrument reports no tick.
pub(crate) fn quantize_price(price: f64, precision: &SymbolPrecision) -> f64 {
    if precision.tick_size > 0.0 {
        (price / precision.tick_size).floor() * precision.tick_size
    } else {
        let multiplier = 10f64.powi(precision.price_precision as i32);
        (price * multiplier).floor() / multiplier
    }
}

pub(crate) fn render_price(price: f64, decimals: u32) -> String {
    let rendered = format!("{:.*}", decimals as usize, price);
    if rendered.contains('.') {
        rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        rendered
    }
}

/// Degraded rendering used when the specification fetch fails: two decimals
/// for majors, three otherwise.
fn fallback_quantity(symbol: &str, quantity: f64) -> String {
    if symbol.contains("BTC") || symbol.contains("ETH") {
        format!("{:.2}", (quantity * 100.0).round() / 100.0)
    } else {
        format!("{:.3}", (quantity * 1000.0).round() / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn precision(tick: f64, step: f64, min: f64) -> SymbolPrecision {
        SymbolPrecision {
            price_precision: decimal_places(tick),
            quantity_precision: decimal_places(step),
            tick_size: tick,
            step_size: step,
            min_size: min,
        }
    }

    #[test]
    fn decimal_places_from_step_values() {
        assert_eq!(decimal_places(0.1), 1);
        assert_eq!(decimal_places(0.01), 2);
        assert_eq!(decimal_places(0.0001), 4);
        assert_eq!(decimal_places(1.0), 0);
        assert_eq!(decimal_places(10.0), 0);
        assert_eq!(decimal_places(0.0), 0);
    }

    #[test]
    fn quantity_below_minimum_snaps_to_minimum() {
        let p = precision(0.1, 1.0, 1.0);
        assert_eq!(quantize_quantity(0.873, &p), 1.0);
        assert_eq!(render_quantity(quantize_quantity(0.873, &p)), "1");
    }

    #[test]
    fn quantity_floors_to_lot_multiple() {
        let p = precision(0.1, 1.0, 1.0);
        assert_eq!(quantize_quantity(5.7, &p), 5.0);

        let p = precision(0.1, 10.0, 10.0);
        assert_eq!(quantize_quantity(37.0, &p), 30.0);
    }

    #[test]
    fn quantity_invariants_hold() {
        let specs = [
            precision(0.1, 1.0, 1.0),
            precision(0.01, 10.0, 10.0),
            precision(0.5, 2.0, 4.0),
        ];
        for p in &specs {
            for qty in [0.3, 1.0, 2.7, 15.2, 99.9] {
                let quantized = quantize_quantity(qty, p);
                assert!(quantized >= p.min_size, "qty {qty} rules {p:?}");
                let lots = quantized / p.step_size;
                assert!(
                    (lots - lots.round()).abs() < 1e-9 || quantized == p.min_size,
                    "qty {qty} rules {p:?} gave {quantized}"
                );
                if qty < p.min_size {
                    assert_eq!(quantized, p.min_size);
                }
            }
        }
    }

    #[test]
    fn missing_minimum_defaults_to_one_contract() {
        let p = precision(0.1, 1.0, 0.0);
        assert_eq!(quantize_quantity(0.4, &p), 1.0);
    }

    #[test]
    fn price_floors_to_tick() {
        let p = precision(0.1, 1.0, 1.0);
        assert_eq!(render_price(quantize_price(43250.1734, &p), p.price_precision), "43250.1");

        let p = precision(0.5, 1.0, 1.0);
        assert_eq!(render_price(quantize_price(2000.74, &p), p.price_precision), "2000.5");
    }

    #[test]
    fn price_never_rounds_up() {
        let p = precision(0.01, 1.0, 1.0);
        for px in [99.999, 1234.5678, 0.087, 50000.004] {
            let quantized = quantize_price(px, &p);
            assert!(quantized <= px);
            let ticks = quantized / p.tick_size;
            assert!((ticks - ticks.round()).abs() < 1e-6);
        }
    }

    #[test]
    fn price_rendering_trims_trailing_zeros() {
        assert_eq!(render_price(2000.0, 1), "2000");
        assert_eq!(render_price(0.0500, 4), "0.05");
        // integer renderings are left alone
        assert_eq!(render_price(90.0, 0), "90");
    }

    #[test]
    fn fallback_precision_by_symbol() {
        assert_eq!(fallback_quantity("BTCUSDT", 0.8734), "0.87");
        assert_eq!(fallback_quantity("ETHUSDT", 1.2399), "1.24");
        assert_eq!(fallback_quantity("SOLUSDT", 2.0015), "2.002");
    }

    #[test]
    fn precision_parses_instrument_strings() {
        let instrument = Instrument {
            inst_id: "BTC-USDT-SWAP".to_string(),
            lot_sz: "1".to_string(),
            tick_sz: "0.1".to_string(),
            min_sz: "1".to_string(),
            ct_val: "0.01".to_string(),
            base_ccy: "BTC".to_string(),
            quote_ccy: "USDT".to_string(),
            inst_type: "SWAP".to_string(),
            state: "live".to_string(),
        };
        let p = SymbolPrecision::from_instrument(&instrument);
        assert_eq!(p.step_size, 1.0);
        assert_eq!(p.tick_size, 0.1);
        assert_eq!(p.min_size, 1.0);
        assert_eq!(p.price_precision, 1);
        assert_eq!(p.quantity_precision, 0);
    }
}
