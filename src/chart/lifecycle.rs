use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::chart::display::{self, DisplayInputs, DisplayState, DEFAULT_PRICE};
use crate::chart::interpolation::{build_target, InterpolatedFrame, InterpolationEngine};
use crate::chart::markers::{TradeDecision, TradeMarkerAnimator};
use crate::chart::series::{CandleSeries, IngestOutcome, MergePolicy};
use crate::config::Config;
use crate::event::{CandleSnapshot, ChartEvent};
use crate::model::candle::{checked_price, sanitize_window, Candle};
use crate::model::round::{PositionState, RoundPhase};
use crate::model::trade::{Trade, TradeId};

/// Immutable record of a round at the moment it rugged.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSnapshot {
    pub player_id: Option<String>,
    pub candles: Vec<Candle>,
    pub trades: Vec<Trade>,
    pub position: PositionState,
    pub captured_at: DateTime<Utc>,
    pub captured_at_ms: u64,
}

impl RoundSnapshot {
    pub fn final_price(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }
}

/// Inputs that decide whether the chart needs a new target.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Fingerprint {
    phase: RoundPhase,
    price: Option<f64>,
    history_len: usize,
    history_revision: u64,
    current: Option<Candle>,
    tick_count: u64,
}

/// Owns the candle history, the interpolation engine and the trade marker
/// animator, and resets or freezes them on round transitions.
#[derive(Debug, Clone)]
pub struct RoundLifecycleController {
    phase: RoundPhase,
    series: CandleSeries,
    engine: InterpolationEngine,
    animator: TradeMarkerAnimator,
    current_candle: Option<Candle>,
    price: Option<f64>,
    tick_count: u64,
    trades: Vec<Trade>,
    trade_ids: HashSet<TradeId>,
    position: PositionState,
    local_player_id: Option<String>,
    rug_settled: bool,
    last_round: Option<Arc<RoundSnapshot>>,
    fingerprint: Option<Fingerprint>,
    ticks_per_candle: u64,
    max_candles: usize,
    match_epsilon: f64,
    animations_enabled: bool,
    mobile: bool,
}

impl RoundLifecycleController {
    pub fn new(config: &Config) -> Self {
        let local_player_id = config.local_player_id().map(str::to_string);
        Self {
            phase: RoundPhase::PreRound,
            series: CandleSeries::new(MergePolicy::from(&config.chart)),
            engine: InterpolationEngine::new(config.animation.duration_ms),
            animator: TradeMarkerAnimator::new(
                config.trade_markers.clone(),
                local_player_id.clone(),
            ),
            current_candle: None,
            price: None,
            tick_count: 0,
            trades: Vec::new(),
            trade_ids: HashSet::new(),
            position: PositionState::default(),
            local_player_id,
            rug_settled: false,
            last_round: None,
            fingerprint: None,
            ticks_per_candle: config.chart.ticks_per_candle.max(1),
            max_candles: config.chart.max_candles,
            match_epsilon: config.chart.candle_match_epsilon,
            animations_enabled: config.animation.enabled,
            mobile: config.ui.mobile,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn series(&self) -> &CandleSeries {
        &self.series
    }

    pub fn engine(&self) -> &InterpolationEngine {
        &self.engine
    }

    pub fn animator(&self) -> &TradeMarkerAnimator {
        &self.animator
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn current_candle(&self) -> Option<&Candle> {
        self.current_candle.as_ref()
    }

    pub fn position(&self) -> &PositionState {
        &self.position
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// True once the terminal candle has been stored for a rugged round.
    pub fn is_frozen(&self) -> bool {
        self.phase == RoundPhase::Rugged && self.rug_settled
    }

    /// The most recent rugged round, kept across round restarts.
    pub fn last_round_snapshot(&self) -> Option<Arc<RoundSnapshot>> {
        self.last_round.clone()
    }

    pub fn set_local_player_id(&mut self, id: Option<String>) {
        self.animator.set_local_player_id(id.clone());
        self.local_player_id = id;
    }

    pub fn set_animations_enabled(&mut self, enabled: bool) {
        self.animations_enabled = enabled;
    }

    pub fn set_mobile(&mut self, mobile: bool) {
        self.mobile = mobile;
    }

    /// True while either animation loop wants another frame.
    pub fn needs_frame(&self) -> bool {
        self.engine.needs_frame() || self.animator.needs_frame()
    }

    fn at_tick_boundary(&self) -> bool {
        self.tick_count > 0 && self.tick_count % self.ticks_per_candle == 0
    }

    pub fn handle_event(&mut self, event: ChartEvent, now_ms: u64) {
        self.sweep(now_ms);
        match event {
            ChartEvent::PriceTick { price, tick_count } => {
                let price = match checked_price(price) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping price tick");
                        return;
                    }
                };
                self.price = Some(price);
                self.tick_count = tick_count;
                self.retarget(now_ms);
            }
            ChartEvent::CandleSnapshot(snapshot) => self.on_snapshot(snapshot, now_ms),
            ChartEvent::NewTrade(trade) => self.on_new_trade(trade, now_ms),
            ChartEvent::TradeList(trades) => {
                let shown = self.animator.on_trade_list(&trades, now_ms, self.phase);
                tracing::debug!(count = trades.len(), shown, "Trade list received");
                self.trade_ids = trades.iter().map(Trade::id).collect();
                self.trades = trades;
                self.refresh_rugged_snapshot(now_ms);
            }
            ChartEvent::RoundStateChanged(phase) => {
                self.enter_phase(phase, now_ms);
                self.retarget(now_ms);
            }
            ChartEvent::PositionUpdate(position) => {
                self.position = position;
                self.refresh_rugged_snapshot(now_ms);
            }
        }
    }

    fn enter_phase(&mut self, next: RoundPhase, now_ms: u64) {
        let prev = self.phase;
        if prev == next {
            return;
        }
        tracing::info!(from = ?prev, to = ?next, "Round phase changed");

        if prev == RoundPhase::Rugged {
            // Only leaving RUGGED marks a genuine new round; other gaps in
            // updates leave the history alone.
            tracing::info!(
                preserved_snapshot = self.last_round.is_some(),
                "New round detected"
            );
            self.series.reset();
            self.engine.reset();
            self.current_candle = None;
            self.rug_settled = false;
        }

        self.phase = next;
        self.fingerprint = None;

        match next {
            RoundPhase::PreRound => {
                self.series.reset();
                self.engine.reset();
                self.animator.reset_round();
                self.trades.clear();
                self.trade_ids.clear();
                self.current_candle = None;
                self.tick_count = 0;
                self.rug_settled = false;
            }
            RoundPhase::Active => {}
            RoundPhase::Rugged => self.capture_snapshot(now_ms),
        }
    }

    fn on_snapshot(&mut self, snapshot: CandleSnapshot, now_ms: u64) {
        let (window, dropped) = sanitize_window(&snapshot.candles);
        if dropped > 0 {
            tracing::warn!(dropped, kept = window.len(), "Snapshot contained malformed candles");
        }
        let current = snapshot
            .current_candle
            .as_ref()
            .and_then(|raw| match Candle::try_from(raw) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed current candle");
                    None
                }
            });

        if snapshot.rugged && self.phase != RoundPhase::Rugged {
            self.enter_phase(RoundPhase::Rugged, now_ms);
        } else if !snapshot.rugged && self.phase == RoundPhase::Rugged {
            self.enter_phase(RoundPhase::Active, now_ms);
        }

        if let Some(tick_count) = snapshot.tick_count {
            self.tick_count = tick_count;
        }
        if let Some(price) = snapshot.price.and_then(|p| checked_price(p).ok()) {
            self.price = Some(price);
        }
        self.current_candle = current;

        match self.phase {
            RoundPhase::PreRound => {
                // Stale history must not leak into the next round.
                self.series.reset();
            }
            RoundPhase::Rugged if self.rug_settled => {
                tracing::trace!("Round frozen; ignoring snapshot");
            }
            phase => {
                let rugged = phase == RoundPhase::Rugged;
                let outcome = self.series.ingest_with_hint(
                    &window,
                    rugged,
                    current.as_ref(),
                    snapshot.full_resync,
                );
                tracing::debug!(?outcome, len = self.series.len(), "Snapshot ingested");
                let settled = outcome.settles_rug()
                    || (matches!(outcome, IngestOutcome::Resynced { .. }) && current.is_some());
                if rugged && settled {
                    self.rug_settled = true;
                    self.capture_snapshot(now_ms);
                }
            }
        }

        self.retarget(now_ms);
    }

    fn on_new_trade(&mut self, trade: Trade, now_ms: u64) {
        let decision = self.animator.on_trade(&trade, now_ms, self.phase);
        tracing::trace!(trade_id = %trade.id(), ?decision, "Trade received");
        if decision != TradeDecision::AlreadyProcessed && self.trade_ids.insert(trade.id()) {
            self.trades.push(trade);
        }
        self.refresh_rugged_snapshot(now_ms);
    }

    fn refresh_rugged_snapshot(&mut self, now_ms: u64) {
        if self.phase == RoundPhase::Rugged {
            self.capture_snapshot(now_ms);
        }
    }

    fn capture_snapshot(&mut self, now_ms: u64) {
        let mut candles = self.series.candles().to_vec();
        if candles.is_empty() {
            if let Some(c) = &self.current_candle {
                candles.push(c.as_rug());
            }
        }
        let snapshot = RoundSnapshot {
            player_id: self.local_player_id.clone(),
            candles,
            trades: self.trades.clone(),
            position: self.position,
            captured_at: i64::try_from(now_ms)
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .unwrap_or_default(),
            captured_at_ms: now_ms,
        };
        tracing::info!(
            candles = snapshot.candles.len(),
            trades = snapshot.trades.len(),
            final_price = ?snapshot.final_price(),
            "Rugged round captured"
        );
        self.last_round = Some(Arc::new(snapshot));
    }

    fn retarget(&mut self, now_ms: u64) {
        let fingerprint = Fingerprint {
            phase: self.phase,
            price: self.price,
            history_len: self.series.len(),
            history_revision: self.series.revision(),
            current: self.current_candle,
            tick_count: self.tick_count,
        };
        let previous = self.fingerprint.replace(fingerprint);
        if previous == Some(fingerprint) {
            return;
        }

        let price = self
            .price
            .or_else(|| self.series.last().map(|c| c.close))
            .unwrap_or(DEFAULT_PRICE);

        if self.phase == RoundPhase::PreRound {
            self.engine.assign(Vec::new(), price, false);
            return;
        }

        let rugged = self.phase == RoundPhase::Rugged;
        let at_boundary = self.at_tick_boundary();
        let target = build_target(
            self.series.candles(),
            self.current_candle.as_ref(),
            at_boundary,
            rugged,
            self.match_epsilon,
        );
        let flat_follows = at_boundary && !rugged;

        let eps = self.match_epsilon;
        let visual_change = match previous {
            None => true,
            Some(prev) => {
                let moved = |a: Option<f64>, b: Option<f64>| match (a, b) {
                    (Some(a), Some(b)) => (a - b).abs() > eps,
                    (a, b) => a.is_some() != b.is_some(),
                };
                let reshaped = match (prev.current, fingerprint.current) {
                    (Some(a), Some(b)) => !a.matches_ohlc(&b, eps),
                    (a, b) => a.is_some() != b.is_some(),
                };
                moved(prev.price, fingerprint.price)
                    || prev.history_len != fingerprint.history_len
                    || prev.history_revision != fingerprint.history_revision
                    || reshaped
            }
        };

        if self.animations_enabled && self.phase == RoundPhase::Active && visual_change {
            self.engine.animate_to(now_ms, target, price, flat_follows);
        } else {
            self.engine.assign(target, price, flat_follows);
        }
    }

    /// Purge stale trade buckets when the sweep interval has elapsed. Runs on
    /// every event and frame, so it does not depend on markers being active.
    pub fn sweep(&mut self, now_ms: u64) {
        self.animator.maybe_sweep(now_ms);
    }

    /// Advance both animation loops to `now_ms` and assemble what to draw.
    pub fn frame(&mut self, now_ms: u64) -> DisplayState {
        self.animator.tick(now_ms);
        self.sweep(now_ms);

        let frame = if self.phase == RoundPhase::PreRound {
            InterpolatedFrame {
                candles: Vec::new(),
                price: self.price,
                progress: 1.0,
            }
        } else {
            self.engine.frame(now_ms)
        };

        display::assemble(DisplayInputs {
            phase: self.phase,
            frame,
            markers: self.animator.markers(),
            ticks_per_candle: self.ticks_per_candle,
            max_candles: self.max_candles,
            mobile: self.mobile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::candle::RawCandle;
    use crate::model::trade::TradeSide;

    fn c(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(open, high, low, close)
    }

    fn snapshot(candles: &[Candle], rugged: bool, current: Option<Candle>) -> ChartEvent {
        ChartEvent::CandleSnapshot(CandleSnapshot {
            candles: candles.iter().copied().map(RawCandle::from).collect(),
            rugged,
            current_candle: current.map(RawCandle::from),
            tick_count: None,
            price: None,
            full_resync: None,
        })
    }

    fn controller() -> RoundLifecycleController {
        let mut config = Config::default();
        config.player.id = "me".to_string();
        RoundLifecycleController::new(&config)
    }

    fn trade(player: &str, tick: u64) -> Trade {
        Trade {
            player_id: player.to_string(),
            username: None,
            tick_index: tick,
            price: 1.1,
            side: TradeSide::Buy,
            coin_address: "0xcoin".to_string(),
            cost: Some(2.0),
            proceeds: None,
        }
    }

    #[test]
    fn pre_round_snapshots_are_not_ingested() {
        let mut ctl = controller();
        ctl.handle_event(snapshot(&[c(1.0, 1.1, 0.9, 1.0)], false, None), 0);
        assert_eq!(ctl.phase(), RoundPhase::PreRound);
        assert!(ctl.series().is_empty());
    }

    #[test]
    fn malformed_candles_are_dropped_at_the_boundary() {
        let mut ctl = controller();
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        ctl.handle_event(
            ChartEvent::CandleSnapshot(CandleSnapshot {
                candles: vec![
                    RawCandle::from(c(1.0, 1.1, 0.9, 1.0)),
                    RawCandle {
                        open: Some(1.0),
                        high: Some(f64::NAN),
                        low: Some(0.9),
                        close: Some(1.0),
                        ..RawCandle::default()
                    },
                ],
                rugged: false,
                current_candle: None,
                tick_count: None,
                price: None,
                full_resync: None,
            }),
            10,
        );
        assert_eq!(ctl.series().len(), 1);
        let state = ctl.frame(20);
        assert!(state.candles.iter().all(Candle::all_finite));
    }

    #[test]
    fn invalid_price_tick_is_ignored() {
        let mut ctl = controller();
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        ctl.handle_event(ChartEvent::PriceTick { price: 1.2, tick_count: 1 }, 1);
        ctl.handle_event(
            ChartEvent::PriceTick {
                price: f64::INFINITY,
                tick_count: 2,
            },
            2,
        );
        assert_eq!(ctl.price(), Some(1.2));
        assert_eq!(ctl.tick_count(), 1);
    }

    #[test]
    fn rug_edge_captures_snapshot_and_freezes_after_rug_candle() {
        let mut ctl = controller();
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        let hist = vec![c(1.0, 1.2, 0.9, 1.1), c(1.1, 1.4, 1.0, 1.3)];
        ctl.handle_event(snapshot(&hist, false, None), 10);

        let rug = c(1.3, 1.3, 0.0, 0.0);
        ctl.handle_event(snapshot(&hist[1..], true, Some(rug)), 20);
        assert_eq!(ctl.phase(), RoundPhase::Rugged);
        assert!(ctl.is_frozen());
        assert_eq!(ctl.series().len(), 3);

        let snap = ctl.last_round_snapshot().expect("snapshot captured");
        assert_eq!(snap.candles.len(), 3);
        assert_eq!(snap.final_price(), Some(0.0));

        // Frozen: later rugged snapshots change nothing.
        ctl.handle_event(snapshot(&[c(9.0, 9.0, 9.0, 9.0)], true, Some(c(5.0, 5.0, 5.0, 5.0))), 30);
        assert_eq!(ctl.series().len(), 3);
    }

    #[test]
    fn snapshot_survives_next_round() {
        let mut ctl = controller();
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        ctl.handle_event(snapshot(&[c(1.0, 1.2, 0.9, 1.1)], false, None), 10);
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Rugged), 20);
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::PreRound), 30);
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 40);

        assert!(ctl.series().is_empty());
        let snap = ctl.last_round_snapshot().expect("snapshot kept");
        assert_eq!(snap.candles.len(), 1);
    }

    #[test]
    fn leaving_rugged_without_pre_round_is_a_round_boundary() {
        let mut ctl = controller();
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        ctl.handle_event(snapshot(&[c(1.0, 1.2, 0.9, 1.1)], false, None), 10);
        ctl.handle_event(snapshot(&[], true, Some(c(1.1, 1.1, 0.0, 0.0))), 20);
        assert_eq!(ctl.series().len(), 2);

        ctl.handle_event(snapshot(&[c(1.0, 1.0, 1.0, 1.0)], false, None), 30);
        assert_eq!(ctl.phase(), RoundPhase::Active);
        assert_eq!(ctl.series().len(), 1);
    }

    #[test]
    fn pre_round_resets_processed_trades() {
        let mut ctl = controller();
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        let t = trade("p2", 3);
        ctl.handle_event(ChartEvent::NewTrade(t.clone()), 10);
        assert!(ctl.animator().is_processed(&t.id()));
        assert_eq!(ctl.trades().len(), 1);

        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Rugged), 20);
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::PreRound), 30);
        assert!(!ctl.animator().is_processed(&t.id()));
        assert!(ctl.trades().is_empty());
    }

    #[test]
    fn price_change_starts_animation_only_when_active() {
        let mut ctl = controller();
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        ctl.handle_event(snapshot(&[c(1.0, 1.2, 0.9, 1.1)], false, None), 0);
        ctl.handle_event(ChartEvent::PriceTick { price: 1.1, tick_count: 1 }, 0);
        ctl.frame(500);
        ctl.handle_event(ChartEvent::PriceTick { price: 1.3, tick_count: 2 }, 1_000);
        assert!(ctl.engine().is_animating());

        let mid = ctl.frame(1_075);
        assert!(mid.price > 1.1 && mid.price < 1.3);
        let done = ctl.frame(1_150);
        assert!((done.price - 1.3).abs() < 1e-12);
    }

    #[test]
    fn disabled_animation_assigns_directly() {
        let mut ctl = controller();
        ctl.set_animations_enabled(false);
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        ctl.handle_event(snapshot(&[c(1.0, 1.2, 0.9, 1.1)], false, None), 0);
        ctl.handle_event(ChartEvent::PriceTick { price: 1.4, tick_count: 1 }, 10);
        assert!(!ctl.engine().is_animating());
        assert!((ctl.frame(10).price - 1.4).abs() < f64::EPSILON);
    }

    #[test]
    fn rug_mid_animation_shows_true_rug_candle() {
        let mut ctl = controller();
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        ctl.handle_event(snapshot(&[c(1.0, 1.2, 0.9, 1.1)], false, None), 0);
        ctl.handle_event(ChartEvent::PriceTick { price: 1.1, tick_count: 1 }, 0);
        ctl.frame(200);
        ctl.handle_event(ChartEvent::PriceTick { price: 1.5, tick_count: 2 }, 1_000);
        assert!(ctl.engine().is_animating());

        let rug = c(1.5, 1.5, 0.0, 0.0);
        ctl.handle_event(snapshot(&[], true, Some(rug)), 1_050);
        assert!(!ctl.engine().is_animating());
        let state = ctl.frame(1_060);
        let last = state.candles.last().expect("rug candle shown");
        assert!(last.is_rug);
        assert_eq!(last.close, 0.0);
    }

    #[test]
    fn own_trades_never_animate() {
        let mut ctl = controller();
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        ctl.handle_event(ChartEvent::NewTrade(trade("me", 1)), 10);
        assert!(ctl.animator().markers().is_empty());
        assert_eq!(ctl.trades().len(), 1);
    }

    #[test]
    fn identity_inputs_apply_to_later_updates() {
        let mut ctl = controller();
        ctl.set_mobile(true);
        ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
        assert!(ctl.frame(0).mobile);

        ctl.set_local_player_id(Some("other".to_string()));
        ctl.handle_event(ChartEvent::NewTrade(trade("other", 1)), 10);
        assert!(ctl.animator().markers().is_empty());
        ctl.handle_event(ChartEvent::NewTrade(trade("me", 2)), 20);
        assert_eq!(ctl.animator().markers().len(), 1);
    }
}
