use crate::chart::interpolation::InterpolatedFrame;
use crate::chart::markers::AnimatingTradeMarker;
use crate::model::candle::Candle;
use crate::model::round::RoundPhase;
use crate::model::trade::{Trade, TradeSide};

/// Price shown before the first tick of a round.
pub const DEFAULT_PRICE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Vertical pixel for `price` on a surface `height` tall (0 at the top).
    pub fn y_for(&self, price: f64, height: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 || height <= 0.0 {
            return height;
        }
        height - (price - self.min) * (height / span)
    }
}

/// Axis bounds covering every displayed OHLC value and `price`, with a fixed
/// floor/ceiling so a fresh round does not zoom in on noise.
pub fn price_range(candles: &[Candle], price: f64) -> PriceRange {
    let (data_min, data_max) = candles
        .iter()
        .flat_map(|c| [c.open, c.high, c.low, c.close])
        .chain(std::iter::once(price))
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !data_min.is_finite() || !data_max.is_finite() {
        return PriceRange { min: 0.5, max: 2.0 };
    }

    let mut min = 0.5_f64.min(data_min * 0.9);
    let mut max = 2.0_f64.max(data_max * 1.1);
    if max - min < 0.1 {
        let mid = (min + max) / 2.0;
        min = (mid - 0.1).max(0.0);
        max = mid + 0.1;
    }
    PriceRange { min, max }
}

/// Result of combining neighbouring candles so at most `max` remain.
#[derive(Debug, Clone, PartialEq)]
pub struct Compacted {
    pub candles: Vec<Candle>,
    /// `index_map[i]` is the compacted index of original candle `i`.
    pub index_map: Vec<usize>,
    pub group_size: usize,
}

pub fn compact(candles: &[Candle], max: usize) -> Compacted {
    let max = max.max(1);
    if candles.len() <= max {
        return Compacted {
            candles: candles.to_vec(),
            index_map: (0..candles.len()).collect(),
            group_size: 1,
        };
    }

    let group_size = candles.len().div_ceil(max);
    let mut out = Vec::with_capacity(max);
    let mut index_map = Vec::with_capacity(candles.len());
    for (group_index, group) in candles.chunks(group_size).enumerate() {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let opacity = group
            .iter()
            .filter_map(|c| c.opacity)
            .fold(None, |acc: Option<f64>, o| Some(acc.map_or(o, |a| a.max(o))));
        out.push(Candle {
            open: first.open,
            high: group.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max),
            low: group.iter().map(|c| c.low).fold(f64::INFINITY, f64::min),
            close: last.close,
            is_flat: group.iter().all(|c| c.is_flat),
            is_rug: group.iter().any(|c| c.is_rug),
            opacity,
        });
        index_map.extend(std::iter::repeat(group_index).take(group.len()));
    }
    Compacted {
        candles: out,
        index_map,
        group_size,
    }
}

/// Candle a trade belongs to, clamped onto the displayed range.
pub fn marker_candle_index(tick_index: u64, ticks_per_candle: u64, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let raw = tick_index / ticks_per_candle.max(1);
    Some(usize::try_from(raw).map_or(len - 1, |i| i.min(len - 1)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMarker {
    pub trade: Trade,
    /// Index into [`DisplayState::candles`].
    pub candle_index: usize,
    pub price: f64,
    pub side: TradeSide,
    pub opacity: f64,
}

/// Everything the rendering surface needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub phase: RoundPhase,
    pub candles: Vec<Candle>,
    pub price: f64,
    pub range: PriceRange,
    pub markers: Vec<PlacedMarker>,
    pub progress: f64,
    pub group_size: usize,
    pub mobile: bool,
}

pub struct DisplayInputs<'a> {
    pub phase: RoundPhase,
    pub frame: InterpolatedFrame,
    pub markers: &'a [AnimatingTradeMarker],
    pub ticks_per_candle: u64,
    pub max_candles: usize,
    pub mobile: bool,
}

pub fn assemble(inputs: DisplayInputs<'_>) -> DisplayState {
    let DisplayInputs {
        phase,
        frame,
        markers,
        ticks_per_candle,
        max_candles,
        mobile,
    } = inputs;

    let mut candles = frame.candles;
    if phase == RoundPhase::Rugged {
        if let Some(last) = candles.last_mut() {
            last.is_rug = true;
        }
    }
    let price = frame
        .price
        .filter(|p| p.is_finite())
        .or_else(|| candles.last().map(|c| c.close))
        .unwrap_or(DEFAULT_PRICE);

    let compacted = compact(&candles, max_candles);
    let placed = markers
        .iter()
        .filter_map(|m| {
            let original =
                marker_candle_index(m.trade.tick_index, ticks_per_candle, candles.len())?;
            let candle_index = *compacted.index_map.get(original)?;
            Some(PlacedMarker {
                trade: m.trade.clone(),
                candle_index,
                price: m.trade.price,
                side: m.trade.side,
                opacity: m.opacity,
            })
        })
        .collect();

    DisplayState {
        phase,
        range: price_range(&compacted.candles, price),
        candles: compacted.candles,
        price,
        markers: placed,
        progress: frame.progress,
        group_size: compacted.group_size,
        mobile,
    }
}
