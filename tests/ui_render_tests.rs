use ratatui::backend::TestBackend;
use ratatui::Terminal;

use rug_chart::chart::lifecycle::RoundLifecycleController;
use rug_chart::config::Config;
use rug_chart::event::{CandleSnapshot, ChartEvent};
use rug_chart::model::candle::{Candle, RawCandle};
use rug_chart::model::round::RoundPhase;
use rug_chart::surface::ChartRenderer;
use rug_chart::ui::{self, AppState};

fn screen(terminal: &Terminal<TestBackend>) -> String {
    terminal
        .backend()
        .buffer()
        .content()
        .iter()
        .map(|c| c.symbol())
        .collect()
}

fn controller_with_round() -> RoundLifecycleController {
    let mut ctl = RoundLifecycleController::new(&Config::default());
    ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Active), 0);
    ctl.handle_event(
        ChartEvent::CandleSnapshot(CandleSnapshot {
            candles: vec![
                RawCandle::from(Candle::new(1.0, 1.2, 0.95, 1.15)),
                RawCandle::from(Candle::new(1.15, 1.4, 1.1, 1.35)),
            ],
            ..CandleSnapshot::default()
        }),
        0,
    );
    ctl
}

#[test]
/// Verifies the dashboard renders the round phase and chart without panicking.
fn dashboard_renders_active_round() {
    let mut ctl = controller_with_round();
    let display = ctl.frame(16);
    let app = AppState::new(true, false);
    let renderer = ChartRenderer::default();

    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    terminal
        .draw(|f| ui::render(f, &app, &display, None, &renderer))
        .unwrap();

    let text = screen(&terminal);
    assert!(text.contains("rug-chart"));
    assert!(text.contains("LIVE"));
    assert!(text.contains("no completed round"));
}

#[test]
fn last_round_panel_shows_snapshot() {
    let mut ctl = controller_with_round();
    ctl.handle_event(ChartEvent::RoundStateChanged(RoundPhase::Rugged), 100);
    let display = ctl.frame(200);
    let snapshot = ctl.last_round_snapshot();
    let renderer = ChartRenderer::default();

    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    terminal
        .draw(|f| {
            ui::render(
                f,
                &AppState::new(true, false),
                &display,
                snapshot.as_deref(),
                &renderer,
            )
        })
        .unwrap();

    let text = screen(&terminal);
    assert!(text.contains("RUGGED"));
    assert!(text.contains("Peak:"));
}

#[test]
fn mobile_layout_hides_side_panels() {
    let mut ctl = controller_with_round();
    let display = ctl.frame(16);
    let renderer = ChartRenderer::default();

    let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
    terminal
        .draw(|f| ui::render(f, &AppState::new(true, true), &display, None, &renderer))
        .unwrap();

    assert!(!screen(&terminal).contains("Last Round"));
}
