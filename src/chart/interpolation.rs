//! Time-based interpolation between the last rendered chart state and the
//! newest accumulated one.
//!
//! The engine is an explicit two-state machine. The host calls
//! [`InterpolationEngine::frame`] once per display refresh while
//! [`InterpolationEngine::needs_frame`] is true; starting a new transition while
//! one is in flight replaces it, so there is never more than one loop.

use crate::model::candle::Candle;

pub const DEFAULT_ANIMATION_MS: u64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Prices settle and/or new candles grow in.
    Update,
    /// A flat candle fades in after a tick boundary.
    FlatCandle,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub kind: TransitionKind,
    pub started_ms: u64,
    pub from: Vec<Candle>,
    pub to: Vec<Candle>,
    pub from_price: Option<f64>,
    pub to_price: f64,
    /// Queue a [`TransitionKind::FlatCandle`] step when this one completes.
    pub then_flat: bool,
}

#[derive(Debug, Clone, Default)]
pub enum AnimationState {
    #[default]
    Idle,
    Animating(Transition),
}

/// What should be on screen at a given instant.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedFrame {
    pub candles: Vec<Candle>,
    pub price: Option<f64>,
    pub progress: f64,
}

/// Builds the chart target from accumulated history and the open candle.
///
/// On a tick boundary the open candle carries the final state of the candle
/// that just closed, so it overwrites the last stored one instead of being
/// appended. While rugged the open candle is skipped when it is the terminal
/// candle already in history.
pub fn build_target(
    history: &[Candle],
    current: Option<&Candle>,
    at_boundary: bool,
    rugged: bool,
    eps: f64,
) -> Vec<Candle> {
    let mut target = history.to_vec();
    let Some(current) = current else {
        return target;
    };
    if at_boundary && !rugged {
        if let Some(last) = target.last_mut() {
            *last = Candle {
                is_rug: last.is_rug,
                ..*current
            };
        }
        return target;
    }
    let duplicate_rug = rugged
        && target
            .last()
            .is_some_and(|last| (last.close - current.close).abs() < eps);
    if !at_boundary && !duplicate_rug {
        target.push(*current);
    }
    target
}

/// `candles` followed by a flat candle at its last close.
pub fn with_flat_candle(mut candles: Vec<Candle>) -> Vec<Candle> {
    if let Some(last) = candles.last() {
        let flat = Candle::flat(last.close);
        candles.push(flat);
    }
    candles
}

fn lerp(from: f64, to: f64, progress: f64) -> f64 {
    if progress >= 1.0 {
        to
    } else {
        from + (to - from) * progress
    }
}

/// Body of `target` growing out of a zero-range candle at `base`.
fn grow(base: f64, target: &Candle, progress: f64) -> Candle {
    Candle {
        open: lerp(base, target.open, progress),
        high: lerp(base, target.high, progress),
        low: lerp(base, target.low, progress),
        close: lerp(base, target.close, progress),
        is_flat: target.is_flat,
        is_rug: target.is_rug,
        opacity: None,
    }
}

/// Opens stay put; only close/high/low travel.
fn settle(from: &Candle, to: &Candle, progress: f64) -> Candle {
    if progress >= 1.0 {
        return *to;
    }
    Candle {
        open: from.open,
        high: lerp(from.high, to.high, progress),
        low: lerp(from.low, to.low, progress),
        close: lerp(from.close, to.close, progress),
        is_flat: to.is_flat,
        is_rug: to.is_rug,
        opacity: None,
    }
}

impl Transition {
    pub fn progress_at(&self, now_ms: u64, duration_ms: u64) -> f64 {
        if duration_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(self.started_ms) as f64;
        (elapsed / duration_ms as f64).min(1.0)
    }

    pub fn sample(&self, progress: f64) -> InterpolatedFrame {
        let price = Some(match self.from_price {
            Some(from) => lerp(from, self.to_price, progress),
            None => self.to_price,
        });
        if progress >= 1.0 {
            return InterpolatedFrame {
                candles: self.to.clone(),
                price,
                progress: 1.0,
            };
        }
        let candles = match self.kind {
            TransitionKind::Update => self.sample_update(progress),
            TransitionKind::FlatCandle => self.sample_flat(progress),
        };
        InterpolatedFrame {
            candles,
            price,
            progress,
        }
    }

    fn sample_update(&self, progress: f64) -> Vec<Candle> {
        if self.from.is_empty() {
            return self.to.clone();
        }
        let last_close = self.from.last().map(|c| c.close);

        if self.to.len() > self.from.len() {
            let base = last_close.or(self.from_price).unwrap_or(self.to_price);
            let mut out = self.from.clone();
            out.extend(self.to[self.from.len()..].iter().map(|c| grow(base, c, progress)));
            return out;
        }

        let len = self.from.len().max(self.to.len());
        (0..len)
            .map(|i| match (self.from.get(i), self.to.get(i)) {
                (Some(from), Some(to)) => settle(from, to, progress),
                (Some(from), None) => *from,
                (None, Some(to)) => {
                    let base = last_close.or(self.from_price).unwrap_or(to.open);
                    grow(base, to, progress)
                }
                (None, None) => unreachable!("index below max length"),
            })
            .collect()
    }

    fn sample_flat(&self, progress: f64) -> Vec<Candle> {
        let mut out = self.from.clone();
        if progress > 0.0 {
            if let Some(flat) = self.to.last() {
                out.push(Candle {
                    opacity: Some(progress),
                    ..*flat
                });
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct InterpolationEngine {
    duration_ms: u64,
    baseline: Vec<Candle>,
    baseline_price: Option<f64>,
    state: AnimationState,
    transitions_started: u64,
}

impl Default for InterpolationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ANIMATION_MS)
    }
}

impl InterpolationEngine {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            baseline: Vec::new(),
            baseline_price: None,
            state: AnimationState::Idle,
            transitions_started: 0,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, AnimationState::Animating(_))
    }

    /// True while the host should keep scheduling frames.
    pub fn needs_frame(&self) -> bool {
        self.is_animating()
    }

    /// Last settled state: the target of the most recent completed transition
    /// or direct assignment.
    pub fn baseline(&self) -> &[Candle] {
        &self.baseline
    }

    pub fn baseline_price(&self) -> Option<f64> {
        self.baseline_price
    }

    pub fn transitions_started(&self) -> u64 {
        self.transitions_started
    }

    pub fn reset(&mut self) {
        self.baseline.clear();
        self.baseline_price = None;
        self.state = AnimationState::Idle;
    }

    /// Show `target` immediately, cancelling any transition in flight.
    pub fn assign(&mut self, target: Vec<Candle>, price: f64, flat_follows: bool) {
        self.baseline = if flat_follows {
            with_flat_candle(target)
        } else {
            target
        };
        self.baseline_price = Some(price);
        self.state = AnimationState::Idle;
    }

    /// Start animating towards `target`. A transition already in flight is
    /// superseded and the new one starts from whatever it was showing at
    /// `now_ms`. With no previous state the target is shown directly.
    pub fn animate_to(&mut self, now_ms: u64, target: Vec<Candle>, price: f64, flat_follows: bool) {
        let (from, from_price) = match &self.state {
            AnimationState::Animating(t) => {
                let shown = t.sample(t.progress_at(now_ms, self.duration_ms));
                let candles = shown
                    .candles
                    .into_iter()
                    .map(|c| Candle { opacity: None, ..c })
                    .collect();
                tracing::trace!("Superseding in-flight chart transition");
                (candles, shown.price)
            }
            AnimationState::Idle => (self.baseline.clone(), self.baseline_price),
        };

        if from.is_empty() {
            self.assign(target, price, flat_follows);
            return;
        }

        self.transitions_started += 1;
        self.state = AnimationState::Animating(Transition {
            kind: TransitionKind::Update,
            started_ms: now_ms,
            from,
            to: target,
            from_price,
            to_price: price,
            then_flat: flat_follows,
        });
    }

    /// Advance to `now_ms` and return what should be drawn.
    pub fn frame(&mut self, now_ms: u64) -> InterpolatedFrame {
        let AnimationState::Animating(transition) = &self.state else {
            return InterpolatedFrame {
                candles: self.baseline.clone(),
                price: self.baseline_price,
                progress: 1.0,
            };
        };

        let progress = transition.progress_at(now_ms, self.duration_ms);
        let shown = transition.sample(progress);
        if progress < 1.0 {
            return shown;
        }

        let AnimationState::Animating(done) = std::mem::take(&mut self.state) else {
            return shown;
        };
        self.baseline = done.to;
        self.baseline_price = Some(done.to_price);

        if done.then_flat && !self.baseline.is_empty() {
            // The flat candle is its own step so the close settles first.
            self.transitions_started += 1;
            self.state = AnimationState::Animating(Transition {
                kind: TransitionKind::FlatCandle,
                started_ms: now_ms,
                from: self.baseline.clone(),
                to: with_flat_candle(self.baseline.clone()),
                from_price: Some(done.to_price),
                to_price: done.to_price,
                then_flat: false,
            });
        }
        shown
    }
}
