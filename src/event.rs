use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ChartError;
use crate::model::candle::RawCandle;
use crate::model::round::{PositionState, RoundPhase};
use crate::model::trade::Trade;

/// Candle window pushed by the game state feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleSnapshot {
    #[serde(default)]
    pub candles: Vec<RawCandle>,
    #[serde(default)]
    pub rugged: bool,
    #[serde(default)]
    pub current_candle: Option<RawCandle>,
    #[serde(default)]
    pub tick_count: Option<u64>,
    #[serde(default)]
    pub price: Option<f64>,
    /// Set when the feed knows whether this window is a backfill.
    #[serde(default)]
    pub full_resync: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ChartEvent {
    #[serde(rename_all = "camelCase")]
    PriceTick { price: f64, tick_count: u64 },
    CandleSnapshot(CandleSnapshot),
    NewTrade(Trade),
    TradeList(Vec<Trade>),
    RoundStateChanged(RoundPhase),
    PositionUpdate(PositionState),
}

impl ChartEvent {
    pub fn from_json(s: &str) -> Result<Self, ChartError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String, ChartError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PriceTick { .. } => "priceTick",
            Self::CandleSnapshot(_) => "candleSnapshot",
            Self::NewTrade(_) => "newTrade",
            Self::TradeList(_) => "tradeList",
            Self::RoundStateChanged(_) => "roundStateChanged",
            Self::PositionUpdate(_) => "positionUpdate",
        }
    }
}

/// Anything a chart can subscribe to for [`ChartEvent`]s.
pub trait EventSource {
    fn subscribe(&self) -> Subscription;
}

#[derive(Debug, Default)]
struct BusInner {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::UnboundedSender<ChartEvent>>,
}

fn lock(inner: &Mutex<BusInner>) -> MutexGuard<'_, BusInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process fan-out of chart events. Cloning shares the same bus.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every live subscriber. Returns how many received it.
    pub fn publish(&self, event: ChartEvent) -> usize {
        let mut inner = lock(&self.inner);
        let mut delivered = 0;
        inner.subscribers.retain(|id, tx| match tx.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::debug!(subscriber = id, "Pruning closed subscriber");
                false
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

impl EventSource for EventBus {
    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, tx);
        tracing::debug!(subscriber = id, "Subscribed to chart events");
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
            rx,
        }
    }
}

/// Live registration on an [`EventBus`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<Mutex<BusInner>>,
    rx: mpsc::UnboundedReceiver<ChartEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<ChartEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChartEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, in publish order.
    pub fn drain(&mut self) -> Vec<ChartEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            lock(&bus).subscribers.remove(&self.id);
            tracing::debug!(subscriber = self.id, "Unsubscribed from chart events");
        }
    }
}
