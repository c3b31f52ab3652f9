//! Backend-neutral drawing.
//!
//! [`ChartRenderer`] turns a [`DisplayState`] into primitive draw calls on a
//! [`DrawSurface`]. Coordinates are in surface units with the origin at the
//! top-left; the terminal surface in `ui` uses one unit per cell.

use crate::chart::display::DisplayState;
use crate::model::round::RoundPhase;
use crate::model::trade::TradeSide;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// 0.0 transparent, 1.0 opaque.
    pub a: f64,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn is_visible(&self) -> bool {
        self.a > 0.0
    }
}

pub trait DrawSurface {
    /// Width and height in surface units.
    fn size(&self) -> (f64, f64);
    fn clear(&mut self);
    fn draw_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgba);
    fn draw_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Rgba);
    fn draw_text(&mut self, x: f64, y: f64, text: &str, color: Rgba);
    fn measure_text(&self, text: &str) -> f64;

    /// Draw a cached avatar clipped to a circle. Returns false when the
    /// surface cannot draw images; callers fall back to a plain marker.
    fn draw_image_circular(&mut self, _cx: f64, _cy: f64, _radius: f64, _key: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theme {
    pub background: Rgba,
    pub grid: Rgba,
    pub axis_text: Rgba,
    pub bullish: Rgba,
    pub bearish: Rgba,
    pub flat: Rgba,
    pub rug: Rgba,
    pub price_line: Rgba,
    pub buy: Rgba,
    pub sell: Rgba,
    pub banner: Rgba,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Rgba::rgb(14, 16, 24),
            grid: Rgba::rgb(48, 52, 66),
            axis_text: Rgba::rgb(130, 136, 150),
            bullish: Rgba::rgb(46, 204, 113),
            bearish: Rgba::rgb(231, 76, 60),
            flat: Rgba::rgb(150, 150, 150),
            rug: Rgba::rgb(255, 30, 30),
            price_line: Rgba::rgb(241, 196, 15),
            buy: Rgba::rgb(39, 174, 96),
            sell: Rgba::rgb(192, 57, 43),
            banner: Rgba::rgb(255, 255, 255),
        }
    }
}

/// Width reserved on the right for price labels.
const AXIS_WIDTH: f64 = 7.0;

#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    theme: Theme,
}

impl ChartRenderer {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Draw one frame. Returns false without touching the surface when it
    /// has no area yet.
    pub fn render<S: DrawSurface + ?Sized>(&self, state: &DisplayState, surface: &mut S) -> bool {
        let (width, height) = surface.size();
        if width <= 0.0 || height <= 0.0 {
            return false;
        }
        surface.clear();
        surface.fill_rect(0.0, 0.0, width, height, self.theme.background);

        let axis = if width > AXIS_WIDTH * 2.0 { AXIS_WIDTH } else { 0.0 };
        let plot_w = width - axis;
        self.draw_grid(state, surface, plot_w, height);

        if state.phase == RoundPhase::PreRound {
            self.draw_banner(surface, width, height, "NEXT ROUND STARTING");
            return true;
        }

        let slots = state.candles.len().max(1) as f64;
        let slot_w = plot_w / slots;
        let body_w = (slot_w * 0.7).max(1.0);

        for (i, candle) in state.candles.iter().enumerate() {
            let alpha = candle.opacity.unwrap_or(1.0);
            let color = if candle.is_rug {
                self.theme.rug
            } else if candle.is_flat {
                self.theme.flat
            } else if candle.is_bullish() {
                self.theme.bullish
            } else {
                self.theme.bearish
            }
            .with_alpha(alpha);
            if !color.is_visible() {
                continue;
            }

            let cx = slot_w * i as f64 + slot_w / 2.0;
            let y_high = state.range.y_for(candle.high, height);
            let y_low = state.range.y_for(candle.low, height);
            surface.draw_line(cx, y_high, cx, y_low, color);

            let y_open = state.range.y_for(candle.open, height);
            let y_close = state.range.y_for(candle.close, height);
            let top = y_open.min(y_close);
            let body_h = (y_open - y_close).abs().max(1.0);
            surface.fill_rect(cx - body_w / 2.0, top, body_w, body_h, color);
        }

        let price_y = state.range.y_for(state.price, height);
        surface.draw_line(0.0, price_y, plot_w, price_y, self.theme.price_line);
        if axis > 0.0 {
            surface.draw_text(
                plot_w + 1.0,
                price_y,
                &format!("{:.2}x", state.price),
                self.theme.price_line,
            );
        }

        let radius = if state.mobile { 0.5 } else { (slot_w * 0.3).max(0.5) };
        for marker in &state.markers {
            let color = match marker.side {
                TradeSide::Buy => self.theme.buy,
                TradeSide::Sell => self.theme.sell,
            }
            .with_alpha(marker.opacity);
            if !color.is_visible() {
                continue;
            }
            let cx = slot_w * marker.candle_index as f64 + slot_w / 2.0;
            let cy = state.range.y_for(marker.price, height);
            if !surface.draw_image_circular(cx, cy, radius, &marker.trade.player_id) {
                surface.draw_circle(cx, cy, radius, color);
            }
        }

        if state.phase == RoundPhase::Rugged {
            self.draw_banner(surface, width, height, "RUGGED");
        }
        true
    }

    fn draw_grid<S: DrawSurface + ?Sized>(
        &self,
        state: &DisplayState,
        surface: &mut S,
        plot_w: f64,
        height: f64,
    ) {
        let lines = if state.mobile { 3 } else { 5 };
        let span = state.range.span();
        if span <= 0.0 {
            return;
        }
        for i in 0..=lines {
            let price = state.range.min + span * i as f64 / lines as f64;
            let y = state.range.y_for(price, height);
            surface.draw_line(0.0, y, plot_w, y, self.theme.grid);
            if plot_w + 1.0 < surface.size().0 {
                surface.draw_text(plot_w + 1.0, y, &format!("{price:.2}x"), self.theme.axis_text);
            }
        }
    }

    fn draw_banner<S: DrawSurface + ?Sized>(&self, surface: &mut S, width: f64, height: f64, text: &str) {
        let x = ((width - surface.measure_text(text)) / 2.0).max(0.0);
        surface.draw_text(x, height / 2.0, text, self.theme.banner);
    }
}
