use serde::{Deserialize, Serialize};

use crate::error::ChartError;

/// Tolerance used when matching candles that round-tripped through the server.
/// Prices are multipliers computed server-side in floating point, so the same
/// candle can come back with a different last digit.
pub const DEFAULT_MATCH_EPSILON: f64 = 1e-4;

/// One fixed-size tick window of price action, expressed as a multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, rename = "isFlatCandle")]
    pub is_flat: bool,
    #[serde(default, rename = "isRugCandle")]
    pub is_rug: bool,
    /// Fade-in alpha; rendering only, never compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            is_flat: false,
            is_rug: false,
            opacity: None,
        }
    }

    /// Zero-range placeholder opened at `price` on a tick boundary.
    pub fn flat(price: f64) -> Self {
        Self {
            is_flat: true,
            ..Self::new(price, price, price, price)
        }
    }

    /// Copy of `self` marked as the terminal candle of a rugged round.
    pub fn as_rug(&self) -> Self {
        Self {
            is_rug: true,
            opacity: None,
            ..*self
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    pub fn is_degenerate(&self) -> bool {
        self.open == self.close && self.open == self.high && self.open == self.low
    }

    /// All four price fields within `eps` of `other`.
    pub fn matches_ohlc(&self, other: &Candle, eps: f64) -> bool {
        (self.open - other.open).abs() < eps && self.matches_close_range(other, eps)
    }

    /// `close`, `high` and `low` within `eps`; `open` is ignored because the
    /// server may re-open the terminal candle at the previous close.
    pub fn matches_close_range(&self, other: &Candle, eps: f64) -> bool {
        (self.close - other.close).abs() < eps
            && (self.high - other.high).abs() < eps
            && (self.low - other.low).abs() < eps
    }

    pub fn all_finite(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

/// Candle as delivered by the transport. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCandle {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    #[serde(default, rename = "isFlatCandle")]
    pub is_flat: Option<bool>,
    #[serde(default, rename = "isRugCandle")]
    pub is_rug: Option<bool>,
}

impl From<Candle> for RawCandle {
    fn from(c: Candle) -> Self {
        Self {
            open: Some(c.open),
            high: Some(c.high),
            low: Some(c.low),
            close: Some(c.close),
            is_flat: Some(c.is_flat),
            is_rug: Some(c.is_rug),
        }
    }
}

/// A usable price: finite and not negative.
pub fn checked_price(price: f64) -> Result<f64, ChartError> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(ChartError::InvalidPrice(price))
    }
}

fn require_price(field: &str, value: Option<f64>) -> Result<f64, ChartError> {
    match value {
        None => Err(ChartError::MalformedCandle(format!("missing {field}"))),
        Some(v) if !v.is_finite() => {
            Err(ChartError::MalformedCandle(format!("{field} is not finite")))
        }
        Some(v) if v < 0.0 => Err(ChartError::MalformedCandle(format!("{field} is negative"))),
        Some(v) => Ok(v),
    }
}

impl TryFrom<&RawCandle> for Candle {
    type Error = ChartError;

    /// Rejects missing, non-finite and negative prices. A wick that does not
    /// enclose the body is widened rather than rejected.
    fn try_from(raw: &RawCandle) -> Result<Self, Self::Error> {
        let open = require_price("open", raw.open)?;
        let close = require_price("close", raw.close)?;
        let high = require_price("high", raw.high)?;
        let low = require_price("low", raw.low)?;
        Ok(Self {
            open,
            high: high.max(open).max(close),
            low: low.min(open).min(close),
            close,
            is_flat: raw.is_flat.unwrap_or(false),
            is_rug: raw.is_rug.unwrap_or(false),
            opacity: None,
        })
    }
}

/// Validate a transport window, dropping the records that cannot be coerced.
/// Returns the surviving candles in order and the number dropped.
pub fn sanitize_window(raw: &[RawCandle]) -> (Vec<Candle>, usize) {
    let mut out = Vec::with_capacity(raw.len());
    let mut dropped = 0;
    for (index, rc) in raw.iter().enumerate() {
        match Candle::try_from(rc) {
            Ok(c) => out.push(c),
            Err(e) => {
                dropped += 1;
                tracing::warn!(index, error = %e, "Dropping malformed candle");
            }
        }
    }
    (out, dropped)
}

/// Aggregates price ticks into the in-progress candle of a tick window.
#[derive(Debug, Clone)]
pub struct CandleBuilder {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub ticks: u32,
}

impl CandleBuilder {
    pub fn new(price: f64) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            ticks: 0,
        }
    }

    pub fn update(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.ticks += 1;
    }

    pub fn finish(&self) -> Candle {
        Candle::new(self.open, self.high, self.low, self.close)
    }
}
