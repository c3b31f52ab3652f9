use std::collections::{HashMap, HashSet};

use crate::config::TradeMarkerConfig;
use crate::model::round::RoundPhase;
use crate::model::trade::{Trade, TradeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPhase {
    FadeIn,
    Visible,
    FadeOut,
}

/// A trade shown on the chart for a short time.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatingTradeMarker {
    pub trade: Trade,
    pub trade_id: TradeId,
    pub opacity: f64,
    pub start_ms: u64,
    pub phase: MarkerPhase,
}

/// What `on_trade` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDecision {
    OwnTrade,
    /// Pre-round or rugged.
    PhaseSuppressed,
    AlreadyProcessed,
    /// No usable cost/proceeds; marked processed but never shown.
    MissingAmount,
    /// First trade of its bucket.
    Displayed,
    /// Larger than the bucket's representative, which it replaced.
    Replaced,
    /// Not larger than the bucket's representative.
    Outranked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerLoop {
    #[default]
    Idle,
    Running,
}

#[derive(Debug, Clone)]
struct BucketEntry {
    trade_id: TradeId,
    amount: f64,
    recorded_ms: u64,
}

/// Picks which other-player trades get an on-chart marker and fades them.
///
/// One representative per `throttle_ms` bucket (largest amount wins, ties keep
/// the incumbent). Every trade id is processed at most once per round.
#[derive(Debug, Clone)]
pub struct TradeMarkerAnimator {
    timing: TradeMarkerConfig,
    local_player_id: Option<String>,
    processed: HashSet<TradeId>,
    buckets: HashMap<u64, BucketEntry>,
    markers: Vec<AnimatingTradeMarker>,
    loop_state: MarkerLoop,
    initial_load_done: bool,
    last_sweep_ms: u64,
}

impl TradeMarkerAnimator {
    pub fn new(timing: TradeMarkerConfig, local_player_id: Option<String>) -> Self {
        Self {
            timing,
            local_player_id,
            processed: HashSet::new(),
            buckets: HashMap::new(),
            markers: Vec::new(),
            loop_state: MarkerLoop::Idle,
            initial_load_done: false,
            last_sweep_ms: 0,
        }
    }

    pub fn set_local_player_id(&mut self, id: Option<String>) {
        self.local_player_id = id;
    }

    pub fn markers(&self) -> &[AnimatingTradeMarker] {
        &self.markers
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn is_processed(&self, id: &TradeId) -> bool {
        self.processed.contains(id)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Representative trade id for the bucket containing `now_ms`.
    pub fn representative_at(&self, now_ms: u64) -> Option<&TradeId> {
        self.buckets
            .get(&self.bucket_key(now_ms))
            .map(|b| &b.trade_id)
    }

    pub fn loop_state(&self) -> MarkerLoop {
        self.loop_state
    }

    pub fn needs_frame(&self) -> bool {
        self.loop_state == MarkerLoop::Running
    }

    fn bucket_key(&self, now_ms: u64) -> u64 {
        now_ms / self.timing.throttle_ms.max(1)
    }

    fn is_own(&self, trade: &Trade) -> bool {
        self.local_player_id
            .as_deref()
            .is_some_and(|id| id == trade.player_id)
    }

    /// Forget everything tied to the round: processed ids, buckets, markers.
    pub fn reset_round(&mut self) {
        self.processed.clear();
        self.buckets.clear();
        self.markers.clear();
        self.loop_state = MarkerLoop::Idle;
    }

    /// Handle a live trade push.
    pub fn on_trade(&mut self, trade: &Trade, now_ms: u64, phase: RoundPhase) -> TradeDecision {
        if self.is_own(trade) {
            return TradeDecision::OwnTrade;
        }
        if !phase.is_trading() {
            return TradeDecision::PhaseSuppressed;
        }
        let trade_id = trade.id();
        if !self.processed.insert(trade_id.clone()) {
            return TradeDecision::AlreadyProcessed;
        }
        let Some(amount) = trade.amount() else {
            return TradeDecision::MissingAmount;
        };

        let key = self.bucket_key(now_ms);
        let decision = match self.buckets.get(&key) {
            Some(existing) if amount <= existing.amount => return TradeDecision::Outranked,
            Some(existing) => {
                let old = existing.trade_id.clone();
                self.markers.retain(|m| m.trade_id != old);
                TradeDecision::Replaced
            }
            None => TradeDecision::Displayed,
        };

        self.buckets.insert(
            key,
            BucketEntry {
                trade_id: trade_id.clone(),
                amount,
                recorded_ms: now_ms,
            },
        );
        self.push_marker(trade.clone(), trade_id, now_ms);
        decision
    }

    fn push_marker(&mut self, trade: Trade, trade_id: TradeId, now_ms: u64) {
        self.markers.push(AnimatingTradeMarker {
            trade,
            trade_id,
            opacity: 0.0,
            start_ms: now_ms,
            phase: MarkerPhase::FadeIn,
        });
        if self.markers.len() > self.timing.max_active {
            let excess = self.markers.len() - self.timing.max_active;
            self.markers.drain(..excess);
        }
        if self.loop_state == MarkerLoop::Idle {
            self.loop_state = MarkerLoop::Running;
        }
    }

    /// Handle a full trade list. The first list seen by this chart is history:
    /// its ids are recorded without animating. Later lists feed any unseen
    /// trades through the live path.
    pub fn on_trade_list(&mut self, trades: &[Trade], now_ms: u64, phase: RoundPhase) -> usize {
        if !self.initial_load_done {
            self.initial_load_done = true;
            let before = self.processed.len();
            let seen: Vec<TradeId> = trades
                .iter()
                .filter(|t| !self.is_own(t))
                .map(Trade::id)
                .collect();
            self.processed.extend(seen);
            tracing::debug!(
                marked = self.processed.len() - before,
                "Initial trade list marked as processed"
            );
            return 0;
        }
        trades
            .iter()
            .map(|t| self.on_trade(t, now_ms, phase))
            .filter(|d| matches!(d, TradeDecision::Displayed | TradeDecision::Replaced))
            .count()
    }

    /// Advance every marker to `now_ms`, dropping finished ones. Stops the
    /// loop once nothing is left.
    pub fn tick(&mut self, now_ms: u64) {
        let fade_in = self.timing.fade_in_ms;
        let visible_until = fade_in + self.timing.visible_ms;
        let fade_out = self.timing.fade_out_ms;
        let lifetime = self.timing.lifetime_ms();

        self.markers.retain_mut(|m| {
            let elapsed = now_ms.saturating_sub(m.start_ms);
            if elapsed >= lifetime {
                return false;
            }
            if elapsed < fade_in {
                m.phase = MarkerPhase::FadeIn;
                m.opacity = elapsed as f64 / fade_in as f64;
            } else if elapsed < visible_until {
                m.phase = MarkerPhase::Visible;
                m.opacity = 1.0;
            } else {
                m.phase = MarkerPhase::FadeOut;
                m.opacity = (1.0 - (elapsed - visible_until) as f64 / fade_out as f64).max(0.0);
            }
            true
        });

        if self.markers.is_empty() {
            self.loop_state = MarkerLoop::Idle;
        }
    }

    pub fn sweep_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_sweep_ms) >= self.timing.sweep_interval_ms
    }

    /// Drop buckets older than the retention window.
    pub fn sweep_buckets(&mut self, now_ms: u64) -> usize {
        self.last_sweep_ms = now_ms;
        let oldest_valid = now_ms.saturating_sub(self.timing.retention_ms());
        let before = self.buckets.len();
        self.buckets.retain(|_, b| b.recorded_ms > oldest_valid);
        let purged = before - self.buckets.len();
        if purged > 0 {
            tracing::trace!(purged, "Purged stale trade buckets");
        }
        purged
    }

    pub fn maybe_sweep(&mut self, now_ms: u64) {
        if self.sweep_due(now_ms) {
            self.sweep_buckets(now_ms);
        }
    }
}
