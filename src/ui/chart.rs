use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Widget},
};

use crate::chart::display::DisplayState;
use crate::model::round::RoundPhase;
use crate::surface::{ChartRenderer, DrawSurface, Rgba};

/// [`DrawSurface`] over a ratatui buffer region, one unit per cell.
pub struct TerminalSurface<'a> {
    buf: &'a mut Buffer,
    area: Rect,
}

impl<'a> TerminalSurface<'a> {
    pub fn new(buf: &'a mut Buffer, area: Rect) -> Self {
        Self { buf, area }
    }

    fn cell_pos(&self, x: f64, y: f64) -> Option<(u16, u16)> {
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }
        let (cx, cy) = (x.floor() as u32, y.floor() as u32);
        if cx >= u32::from(self.area.width) || cy >= u32::from(self.area.height) {
            return None;
        }
        Some((self.area.x + cx as u16, self.area.y + cy as u16))
    }

    fn put(&mut self, x: f64, y: f64, symbol: &str, style: Style) {
        if let Some(pos) = self.cell_pos(x, y) {
            if let Some(cell) = self.buf.cell_mut(pos) {
                cell.set_symbol(symbol);
                cell.set_style(style);
            }
        }
    }
}

fn fg(color: Rgba) -> Style {
    let style = Style::default().fg(Color::Rgb(color.r, color.g, color.b));
    if color.a < 0.5 {
        style.add_modifier(Modifier::DIM)
    } else {
        style
    }
}

impl DrawSurface for TerminalSurface<'_> {
    fn size(&self) -> (f64, f64) {
        (f64::from(self.area.width), f64::from(self.area.height))
    }

    fn clear(&mut self) {
        for y in self.area.top()..self.area.bottom() {
            for x in self.area.left()..self.area.right() {
                if let Some(cell) = self.buf.cell_mut((x, y)) {
                    cell.reset();
                }
            }
        }
    }

    fn draw_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba) {
        if !color.is_visible() {
            return;
        }
        let style = fg(color);
        let (dx, dy) = (x1 - x0, y1 - y0);
        if dx.abs() < 0.5 {
            let (top, bottom) = (y0.min(y1).round(), y0.max(y1).round());
            let mut y = top;
            while y <= bottom {
                self.put(x0, y, "│", style);
                y += 1.0;
            }
        } else if dy.abs() < 0.5 {
            let (left, right) = (x0.min(x1).round(), x0.max(x1).round());
            let mut x = left;
            while x < right {
                self.put(x, y0, "─", style);
                x += 1.0;
            }
        } else {
            let steps = dx.abs().max(dy.abs()).ceil() as u32;
            for i in 0..=steps {
                let t = f64::from(i) / f64::from(steps);
                self.put(x0 + dx * t, y0 + dy * t, "·", style);
            }
        }
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgba) {
        if !color.is_visible() {
            return;
        }
        let style = Style::default().bg(Color::Rgb(color.r, color.g, color.b));
        let (x0, y0) = (x.round(), y.round());
        let (x1, y1) = ((x + w).round().max(x0 + 1.0), (y + h).round().max(y0 + 1.0));
        let mut row = y0;
        while row < y1 {
            let mut col = x0;
            while col < x1 {
                self.put(col, row, " ", style);
                col += 1.0;
            }
            row += 1.0;
        }
    }

    fn draw_circle(&mut self, cx: f64, cy: f64, _radius: f64, color: Rgba) {
        if color.is_visible() {
            self.put(cx, cy, "●", fg(color).add_modifier(Modifier::BOLD));
        }
    }

    fn draw_text(&mut self, x: f64, y: f64, text: &str, color: Rgba) {
        let Some((px, py)) = self.cell_pos(x, y) else {
            return;
        };
        let room = self.area.right().saturating_sub(px) as usize;
        self.buf.set_stringn(px, py, text, room, fg(color));
    }

    fn measure_text(&self, text: &str) -> f64 {
        text.chars().count() as f64
    }
}

pub struct RoundChart<'a> {
    state: &'a DisplayState,
    renderer: &'a ChartRenderer,
}

impl<'a> RoundChart<'a> {
    pub fn new(state: &'a DisplayState, renderer: &'a ChartRenderer) -> Self {
        Self { state, renderer }
    }
}

impl Widget for RoundChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border = match self.state.phase {
            RoundPhase::Rugged => Color::Red,
            RoundPhase::Active => Color::DarkGray,
            RoundPhase::PreRound => Color::Yellow,
        };
        let title = if self.state.group_size > 1 {
            format!(" Round ({}x candles) ", self.state.group_size)
        } else {
            " Round ".to_string()
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height < 2 || inner.width < 4 {
            return;
        }
        let mut surface = TerminalSurface::new(buf, inner);
        self.renderer.render(self.state, &mut surface);
    }
}
