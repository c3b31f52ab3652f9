use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// A single buy or sell by one player during the round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub player_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub tick_index: u64,
    pub price: f64,
    #[serde(rename = "type")]
    pub side: TradeSide,
    #[serde(default)]
    pub coin_address: String,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub proceeds: Option<f64>,
}

impl Trade {
    pub fn id(&self) -> TradeId {
        TradeId::of(self)
    }

    /// Cost for buys, proceeds for sells. `None` when the transport left it
    /// out or sent something unusable.
    pub fn amount(&self) -> Option<f64> {
        let amount = match self.side {
            TradeSide::Buy => self.cost,
            TradeSide::Sell => self.proceeds,
        }?;
        (amount.is_finite() && amount >= 0.0).then_some(amount)
    }
}

/// Deterministic identity of a trade, used to animate it at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradeId(String);

impl TradeId {
    pub fn of(trade: &Trade) -> Self {
        Self(format!(
            "{}-{}-{}-{}-{}",
            trade.player_id,
            trade.tick_index,
            trade.price,
            trade.side.as_str(),
            trade.coin_address
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
