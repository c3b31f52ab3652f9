pub mod chart;
pub mod dashboard;

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

use crate::chart::display::DisplayState;
use crate::chart::lifecycle::RoundSnapshot;
use crate::model::round::PositionState;
use crate::surface::ChartRenderer;

use chart::RoundChart;
use dashboard::{KeybindBar, LastRoundPanel, PositionPanel, StatusBar};

/// Demo-only view state layered over the chart.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub paused: bool,
    pub animations: bool,
    pub mobile: bool,
    pub tick_count: u64,
    pub history_len: usize,
    pub position: PositionState,
}

impl AppState {
    pub fn new(animations: bool, mobile: bool) -> Self {
        Self {
            animations,
            mobile,
            ..Self::default()
        }
    }
}

pub fn render(
    frame: &mut Frame,
    state: &AppState,
    display: &DisplayState,
    last_round: Option<&RoundSnapshot>,
    renderer: &ChartRenderer,
) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(8),    // chart + side panels
            Constraint::Length(1), // keybinds
        ])
        .split(frame.area());

    frame.render_widget(
        StatusBar {
            phase: display.phase,
            tick_count: state.tick_count,
            candles: state.history_len,
            paused: state.paused,
            animations: state.animations,
        },
        outer[0],
    );

    let side_width = if state.mobile { 0 } else { 26 };
    let main_area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(side_width)])
        .split(outer[1]);

    frame.render_widget(RoundChart::new(display, renderer), main_area[0]);

    if side_width > 0 {
        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(7), Constraint::Min(7)])
            .split(main_area[1]);
        frame.render_widget(
            PositionPanel::new(&state.position, display.price, display.markers.len()),
            side[0],
        );
        frame.render_widget(LastRoundPanel::new(last_round), side[1]);
    }

    frame.render_widget(KeybindBar, outer[2]);
}
