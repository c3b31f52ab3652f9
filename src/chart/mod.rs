pub mod display;
pub mod interpolation;
pub mod lifecycle;
pub mod markers;
pub mod series;

pub use display::{DisplayState, PlacedMarker, PriceRange};
pub use interpolation::{AnimationState, InterpolatedFrame, InterpolationEngine};
pub use lifecycle::{RoundLifecycleController, RoundSnapshot};
pub use markers::{AnimatingTradeMarker, MarkerPhase, TradeDecision, TradeMarkerAnimator};
pub use series::{CandleSeries, IngestOutcome, MergePolicy};

use uuid::Uuid;

use crate::config::Config;
use crate::event::{EventSource, Subscription};
use crate::surface::{ChartRenderer, DrawSurface};

/// One mounted chart: a lifecycle controller fed by an event subscription.
///
/// Dropping the chart drops its subscription, which unregisters it.
#[derive(Debug)]
pub struct RugChart {
    id: Uuid,
    controller: RoundLifecycleController,
    renderer: ChartRenderer,
    subscription: Option<Subscription>,
}

impl RugChart {
    pub fn new(config: &Config) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(chart_id = %id, "Chart created");
        Self {
            id,
            controller: RoundLifecycleController::new(config),
            renderer: ChartRenderer::default(),
            subscription: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn controller(&self) -> &RoundLifecycleController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut RoundLifecycleController {
        &mut self.controller
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribe to `source`, replacing any previous subscription.
    pub fn attach<S: EventSource + ?Sized>(&mut self, source: &S) {
        self.subscription = Some(source.subscribe());
        tracing::debug!(chart_id = %self.id, "Chart attached");
    }

    pub fn detach(&mut self) {
        if self.subscription.take().is_some() {
            tracing::debug!(chart_id = %self.id, "Chart detached");
        }
    }

    /// Apply every queued event. Returns how many were handled.
    pub fn pump(&mut self, now_ms: u64) -> usize {
        let Some(sub) = self.subscription.as_mut() else {
            return 0;
        };
        let events = sub.drain();
        let count = events.len();
        for event in events {
            self.controller.handle_event(event, now_ms);
        }
        count
    }

    pub fn frame(&mut self, now_ms: u64) -> DisplayState {
        self.controller.frame(now_ms)
    }

    /// Pump pending events, then draw one frame onto `surface`.
    pub fn render<S: DrawSurface + ?Sized>(&mut self, surface: &mut S, now_ms: u64) -> bool {
        self.pump(now_ms);
        let state = self.controller.frame(now_ms);
        self.renderer.render(&state, surface)
    }
}

impl Drop for RugChart {
    fn drop(&mut self) {
        tracing::debug!(chart_id = %self.id, "Chart dropped");
    }
}
