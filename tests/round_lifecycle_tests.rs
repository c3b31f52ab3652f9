use rug_chart::chart::lifecycle::RoundLifecycleController;
use rug_chart::config::Config;
use rug_chart::event::{CandleSnapshot, ChartEvent};
use rug_chart::model::candle::{Candle, RawCandle};
use rug_chart::model::round::{PositionState, RoundPhase};
use rug_chart::model::trade::{Trade, TradeSide};

fn c(open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle::new(open, high, low, close)
}

fn snapshot(candles: &[Candle], rugged: bool, current: Option<Candle>) -> ChartEvent {
    ChartEvent::CandleSnapshot(CandleSnapshot {
        candles: candles.iter().copied().map(RawCandle::from).collect(),
        rugged,
        current_candle: current.map(RawCandle::from),
        ..CandleSnapshot::default()
    })
}

fn phase(p: RoundPhase) -> ChartEvent {
    ChartEvent::RoundStateChanged(p)
}

fn trade(player: &str, tick: u64, side: TradeSide, amount: f64) -> Trade {
    Trade {
        player_id: player.to_string(),
        username: None,
        tick_index: tick,
        price: 1.2,
        side,
        coin_address: "0xcoin".to_string(),
        cost: (side == TradeSide::Buy).then_some(amount),
        proceeds: (side == TradeSide::Sell).then_some(amount),
    }
}

fn controller() -> RoundLifecycleController {
    let mut config = Config::default();
    config.player.id = "local".to_string();
    RoundLifecycleController::new(&config)
}

#[test]
/// Verifies a full round: accumulate, rug, then reset for the next round.
fn full_round_accumulates_rugs_and_resets() {
    let mut ctl = controller();
    let c1 = c(1.0, 1.1, 0.95, 1.05);
    let c2 = c(1.05, 1.2, 1.0, 1.15);
    let c3 = c(1.15, 1.3, 1.1, 1.25);
    let c4 = c(1.25, 1.4, 1.2, 1.35);

    ctl.handle_event(phase(RoundPhase::PreRound), 0);
    assert!(ctl.series().is_empty());

    ctl.handle_event(phase(RoundPhase::Active), 10);
    ctl.handle_event(snapshot(&[c1, c2, c3], false, None), 20);
    assert_eq!(ctl.series().len(), 3);

    // Incremental window: overlap on the stored tail plus one new candle.
    ctl.handle_event(snapshot(&[c3, c4], false, None), 30);
    assert_eq!(ctl.series().len(), 4);
    assert_eq!(ctl.series().candles(), &[c1, c2, c3, c4]);

    let rug = c(1.35, 1.35, 0.0, 0.0);
    ctl.handle_event(snapshot(&[c4], true, Some(rug)), 40);
    assert_eq!(ctl.phase(), RoundPhase::Rugged);
    assert_eq!(ctl.series().len(), 5);
    let last = ctl.series().last().copied().expect("rug candle stored");
    assert!(last.is_rug);
    assert_eq!(last.close, 0.0);

    ctl.handle_event(phase(RoundPhase::PreRound), 50);
    assert_eq!(ctl.series().len(), 0);
    assert_eq!(
        ctl.last_round_snapshot().map(|s| s.candles.len()),
        Some(5)
    );
}

#[test]
fn rugged_display_marks_last_candle_as_rug() {
    let mut ctl = controller();
    ctl.handle_event(phase(RoundPhase::Active), 0);
    ctl.handle_event(snapshot(&[c(1.0, 1.1, 0.9, 1.05), c(1.05, 1.3, 1.0, 1.2)], false, None), 0);
    ctl.handle_event(phase(RoundPhase::Rugged), 100);

    let state = ctl.frame(200);
    assert_eq!(state.phase, RoundPhase::Rugged);
    assert!(state.candles.last().is_some_and(|c| c.is_rug));
    assert!(state.candles[..state.candles.len() - 1].iter().all(|c| !c.is_rug));
}

#[test]
fn snapshot_refreshes_while_rugged() {
    let mut ctl = controller();
    ctl.handle_event(phase(RoundPhase::Active), 0);
    ctl.handle_event(snapshot(&[c(1.0, 1.2, 0.9, 1.1)], false, None), 0);

    ctl.handle_event(phase(RoundPhase::Rugged), 10);
    let first = ctl.last_round_snapshot().expect("captured on rug edge");
    assert_eq!(first.candles.len(), 1);

    ctl.handle_event(snapshot(&[], true, Some(c(1.1, 1.1, 0.0, 0.0))), 20);
    ctl.handle_event(
        ChartEvent::PositionUpdate(PositionState {
            position_qty: 0.0,
            cumulative_pnl: -0.5,
            pnl_percent: -50.0,
        }),
        30,
    );

    let latest = ctl.last_round_snapshot().expect("still captured");
    assert_eq!(latest.candles.len(), 2);
    assert!(latest.candles[1].is_rug);
    assert_eq!(latest.position.cumulative_pnl, -0.5);
    assert_eq!(latest.captured_at_ms, 30);
    assert_eq!(latest.player_id.as_deref(), Some("local"));
}

#[test]
fn trades_outside_active_phase_are_not_animated() {
    let mut ctl = controller();
    ctl.handle_event(ChartEvent::NewTrade(trade("p1", 0, TradeSide::Buy, 1.0)), 0);
    assert!(ctl.animator().markers().is_empty());

    ctl.handle_event(phase(RoundPhase::Active), 10);
    ctl.handle_event(phase(RoundPhase::Rugged), 20);
    ctl.handle_event(ChartEvent::NewTrade(trade("p2", 5, TradeSide::Sell, 1.0)), 30);
    assert!(ctl.animator().markers().is_empty());
}

#[test]
/// Verifies markers land on the candle of their tick and fade out on schedule.
fn markers_placed_on_their_candle() {
    let mut ctl = controller();
    ctl.handle_event(phase(RoundPhase::Active), 0);
    let hist: Vec<Candle> = (0..4)
        .map(|i| {
            let o = 1.0 + f64::from(i) * 0.1;
            c(o, o + 0.12, o - 0.02, o + 0.1)
        })
        .collect();
    ctl.handle_event(snapshot(&hist, false, None), 0);
    ctl.handle_event(ChartEvent::TradeList(Vec::new()), 0);
    ctl.handle_event(ChartEvent::NewTrade(trade("p1", 12, TradeSide::Buy, 3.0)), 1_000);

    let state = ctl.frame(1_500);
    assert_eq!(state.markers.len(), 1);
    assert_eq!(state.markers[0].candle_index, 2);
    assert!((state.markers[0].opacity - 1.0).abs() < f64::EPSILON);

    let later = ctl.frame(1_000 + 2_300);
    assert!(later.markers.is_empty());
    assert!(!ctl.animator().needs_frame());
}

#[test]
fn initial_trade_list_is_history() {
    let mut ctl = controller();
    ctl.handle_event(phase(RoundPhase::Active), 0);
    let existing = vec![
        trade("p1", 1, TradeSide::Buy, 1.0),
        trade("p2", 2, TradeSide::Sell, 2.0),
    ];
    ctl.handle_event(ChartEvent::TradeList(existing.clone()), 0);
    assert!(ctl.animator().markers().is_empty());
    assert_eq!(ctl.trades().len(), 2);

    // Replaying the same trades live does nothing.
    for t in existing {
        ctl.handle_event(ChartEvent::NewTrade(t), 100);
    }
    assert!(ctl.animator().markers().is_empty());
}

#[test]
fn unchanged_inputs_do_not_restart_animation() {
    let mut ctl = controller();
    ctl.handle_event(phase(RoundPhase::Active), 0);
    ctl.handle_event(snapshot(&[c(1.0, 1.2, 0.9, 1.1)], false, None), 0);
    ctl.handle_event(ChartEvent::PriceTick { price: 1.1, tick_count: 1 }, 0);
    ctl.frame(1_000);
    let started = ctl.engine().transitions_started();

    ctl.handle_event(ChartEvent::PriceTick { price: 1.1, tick_count: 1 }, 1_100);
    assert_eq!(ctl.engine().transitions_started(), started);
    assert!(!ctl.needs_frame());
}

#[test]
fn boundary_tick_settles_then_adds_flat_candle() {
    let mut ctl = controller();
    ctl.handle_event(phase(RoundPhase::Active), 0);
    let stored = c(1.0, 1.2, 0.9, 1.1);
    ctl.handle_event(snapshot(&[stored], false, None), 0);
    ctl.handle_event(ChartEvent::PriceTick { price: 1.1, tick_count: 4 }, 0);
    ctl.frame(1_000);

    // Tick 5 closes the candle; the open candle carries its final values.
    let closing = c(1.0, 1.3, 0.9, 1.25);
    ctl.handle_event(
        ChartEvent::CandleSnapshot(CandleSnapshot {
            candles: vec![RawCandle::from(stored)],
            current_candle: Some(RawCandle::from(closing)),
            tick_count: Some(5),
            price: Some(1.25),
            ..CandleSnapshot::default()
        }),
        2_000,
    );
    let settled = ctl.frame(2_150);
    assert_eq!(settled.candles.len(), 1);
    assert!((settled.candles[0].close - 1.25).abs() < 1e-12);

    let flat_mid = ctl.frame(2_225);
    assert_eq!(flat_mid.candles.len(), 2);
    assert!(flat_mid.candles[1].is_flat);

    let done = ctl.frame(2_400);
    assert_eq!(done.candles.len(), 2);
    assert!(!ctl.engine().is_animating());
}

fn backfill(n: usize, start: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let o = start + i as f64 * 0.1;
            c(o, o + 0.15, o - 0.05, o + 0.1)
        })
        .collect()
}

#[test]
/// Verifies a corrected backfill of the same length replaces what is drawn.
fn same_length_resync_redraws_corrected_candles() {
    let mut config = Config::default();
    config.animation.enabled = false;
    let mut ctl = RoundLifecycleController::new(&config);
    ctl.handle_event(phase(RoundPhase::Active), 0);

    ctl.handle_event(snapshot(&backfill(12, 1.0), false, None), 10);
    let before = ctl.frame(20);
    assert!((before.candles.last().expect("candles").close - 2.2).abs() < 1e-9);

    let corrected = backfill(12, 3.0);
    ctl.handle_event(snapshot(&corrected, false, None), 30);
    assert_eq!(ctl.series().candles(), &corrected[..]);

    let after = ctl.frame(40);
    assert_eq!(after.candles.len(), 12);
    let shown = after.candles.last().expect("candles").close;
    let stored = ctl.series().last().expect("history").close;
    assert!((shown - stored).abs() < 1e-9);
}

#[test]
fn current_candle_wick_change_reaches_display() {
    let mut ctl = controller();
    ctl.handle_event(phase(RoundPhase::Active), 0);
    let hist = [c(1.0, 1.2, 0.9, 1.1)];
    ctl.handle_event(snapshot(&hist, false, Some(c(1.1, 1.3, 1.05, 1.2))), 10);
    ctl.frame(1_000);

    ctl.handle_event(snapshot(&hist, false, Some(c(1.1, 1.6, 0.95, 1.2))), 1_010);
    let state = ctl.frame(2_000);
    let open = state.candles.last().expect("open candle shown");
    assert!((open.high - 1.6).abs() < 1e-9);
    assert!((open.low - 0.95).abs() < 1e-9);
}

#[test]
/// Verifies stale trade buckets are purged by events alone, without frames.
fn bucket_sweep_runs_without_frames() {
    let mut ctl = controller();
    ctl.handle_event(phase(RoundPhase::Active), 0);
    ctl.handle_event(
        ChartEvent::NewTrade(trade("other", 1, TradeSide::Buy, 1.0)),
        1_000,
    );
    assert_eq!(ctl.animator().bucket_count(), 1);

    // No frame() calls: only price ticks keep arriving.
    for (i, now) in (5_000..=40_000).step_by(5_000).enumerate() {
        ctl.handle_event(
            ChartEvent::PriceTick {
                price: 1.0,
                tick_count: i as u64 + 1,
            },
            now,
        );
    }
    assert_eq!(ctl.animator().bucket_count(), 0);
}

#[test]
fn repeated_trade_is_recorded_once() {
    let mut ctl = controller();
    ctl.handle_event(phase(RoundPhase::Active), 0);
    let own = trade("local", 2, TradeSide::Sell, 0.5);
    ctl.handle_event(ChartEvent::NewTrade(own.clone()), 10);
    ctl.handle_event(ChartEvent::NewTrade(own), 20);
    let other = trade("other", 3, TradeSide::Buy, 1.0);
    ctl.handle_event(ChartEvent::NewTrade(other.clone()), 30);
    ctl.handle_event(ChartEvent::NewTrade(other), 40);
    assert_eq!(ctl.trades().len(), 2);
}
