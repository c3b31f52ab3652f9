pub mod candle;
pub mod round;
pub mod trade;

pub use candle::{Candle, CandleBuilder, RawCandle};
pub use round::{PositionState, RoundPhase};
pub use trade::{Trade, TradeId, TradeSide};
