use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::chart::lifecycle::RoundSnapshot;
use crate::model::round::{PositionState, RoundPhase};

fn pnl_color(val: f64) -> Color {
    if val > 0.0 {
        Color::Green
    } else if val < 0.0 {
        Color::Red
    } else {
        Color::White
    }
}

pub struct PositionPanel<'a> {
    position: &'a PositionState,
    price: f64,
    markers: usize,
}

impl<'a> PositionPanel<'a> {
    pub fn new(position: &'a PositionState, price: f64, markers: usize) -> Self {
        Self {
            position,
            price,
            markers,
        }
    }
}

impl Widget for PositionPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let label = Style::default().fg(Color::DarkGray);
        let lines = vec![
            Line::from(vec![
                Span::styled("Price: ", label),
                Span::styled(
                    format!("{:.4}x", self.price),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::styled("Qty:   ", label),
                Span::styled(
                    format!("{:.5}", self.position.position_qty),
                    Style::default().fg(Color::White),
                ),
            ]),
            Line::from(vec![
                Span::styled("PnL:   ", label),
                Span::styled(
                    format!("{:+.4}", self.position.cumulative_pnl),
                    Style::default().fg(pnl_color(self.position.cumulative_pnl)),
                ),
            ]),
            Line::from(vec![
                Span::styled("PnL %: ", label),
                Span::styled(
                    format!("{:+.2}%", self.position.pnl_percent),
                    Style::default().fg(pnl_color(self.position.pnl_percent)),
                ),
            ]),
            Line::from(vec![
                Span::styled("Live:  ", label),
                Span::styled(
                    format!("{} markers", self.markers),
                    Style::default().fg(Color::Cyan),
                ),
            ]),
        ];

        let block = Block::default()
            .title(" Position ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        Paragraph::new(lines).block(block).render(area, buf);
    }
}

pub struct LastRoundPanel<'a> {
    snapshot: Option<&'a RoundSnapshot>,
}

impl<'a> LastRoundPanel<'a> {
    pub fn new(snapshot: Option<&'a RoundSnapshot>) -> Self {
        Self { snapshot }
    }
}

impl Widget for LastRoundPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Last Round ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        let label = Style::default().fg(Color::DarkGray);
        let lines = match self.snapshot {
            None => vec![Line::from(Span::styled("no completed round", label))],
            Some(snap) => {
                let peak = snap
                    .candles
                    .iter()
                    .map(|c| c.high)
                    .fold(0.0_f64, f64::max);
                vec![
                    Line::from(vec![
                        Span::styled("Peak:    ", label),
                        Span::styled(format!("{peak:.2}x"), Style::default().fg(Color::Green)),
                    ]),
                    Line::from(vec![
                        Span::styled("Candles: ", label),
                        Span::raw(snap.candles.len().to_string()),
                    ]),
                    Line::from(vec![
                        Span::styled("Trades:  ", label),
                        Span::raw(snap.trades.len().to_string()),
                    ]),
                    Line::from(vec![
                        Span::styled("PnL:     ", label),
                        Span::styled(
                            format!("{:+.4}", snap.position.cumulative_pnl),
                            Style::default().fg(pnl_color(snap.position.cumulative_pnl)),
                        ),
                    ]),
                    Line::from(vec![
                        Span::styled("At:      ", label),
                        Span::raw(snap.captured_at.format("%H:%M:%S").to_string()),
                    ]),
                ]
            }
        };

        Paragraph::new(lines).block(block).render(area, buf);
    }
}

pub struct StatusBar {
    pub phase: RoundPhase,
    pub tick_count: u64,
    pub candles: usize,
    pub paused: bool,
    pub animations: bool,
}

impl Widget for StatusBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let phase_color = match self.phase {
            RoundPhase::PreRound => Color::Yellow,
            RoundPhase::Active => Color::Green,
            RoundPhase::Rugged => Color::Red,
        };

        let pause_status = if self.paused {
            Span::styled(" PAUSED ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        } else {
            Span::styled(" RUNNING ", Style::default().fg(Color::Green))
        };

        let line = Line::from(vec![
            Span::styled(
                " rug-chart ",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("| ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                self.phase.label(),
                Style::default().fg(phase_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            pause_status,
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("ticks: {}  candles: {}", self.tick_count, self.candles),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                if self.animations { "anim on" } else { "anim off" },
                Style::default().fg(Color::DarkGray),
            ),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}

pub struct KeybindBar;

impl Widget for KeybindBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = Line::from(vec![
            Span::styled(" [Q]", Style::default().fg(Color::Yellow)),
            Span::styled("uit  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[P]", Style::default().fg(Color::Yellow)),
            Span::styled("ause  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[A]", Style::default().fg(Color::Yellow)),
            Span::styled("nimations  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[M]", Style::default().fg(Color::Yellow)),
            Span::styled("obile  ", Style::default().fg(Color::DarkGray)),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}
