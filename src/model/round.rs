use serde::{Deserialize, Serialize};

/// Phase of the current round. Cycles `PreRound -> Active -> Rugged -> PreRound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Entry window before trading starts.
    #[default]
    PreRound,
    Active,
    /// The round crashed; terminal within the round.
    Rugged,
}

impl RoundPhase {
    pub fn is_trading(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PreRound => "PRE-ROUND",
            Self::Active => "LIVE",
            Self::Rugged => "RUGGED",
        }
    }
}

/// The local player's standing, captured into the round snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionState {
    pub position_qty: f64,
    #[serde(rename = "cumulativePnL")]
    pub cumulative_pnl: f64,
    pub pnl_percent: f64,
}
