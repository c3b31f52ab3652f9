use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::event::{CandleSnapshot, ChartEvent};
use crate::model::candle::{Candle, CandleBuilder, RawCandle};
use crate::model::round::{PositionState, RoundPhase};
use crate::model::trade::{Trade, TradeSide};

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub ticks_per_candle: u64,
    /// Candles sent in each incremental snapshot, including the overlap.
    pub window: usize,
    pub rug_chance: f64,
    pub trade_chance: f64,
    pub pre_round_ticks: u32,
    pub rugged_ticks: u32,
    pub players: Vec<String>,
    pub local_player_id: Option<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks_per_candle: 5,
            window: 3,
            rug_chance: 0.004,
            trade_chance: 0.25,
            pre_round_ticks: 20,
            rugged_ticks: 30,
            players: ["whale", "degen", "paperhands", "moon", "anon"]
                .into_iter()
                .map(String::from)
                .collect(),
            local_player_id: None,
        }
    }
}

/// Synthetic game feed: random-walk rounds that end in a rug.
#[derive(Debug)]
pub struct RoundSimulator {
    cfg: SimConfig,
    rng: StdRng,
    phase: RoundPhase,
    countdown: u32,
    price: f64,
    tick_count: u64,
    candles: Vec<Candle>,
    builder: CandleBuilder,
    position: PositionState,
    rounds: u64,
}

impl RoundSimulator {
    pub fn new(seed: u64, cfg: SimConfig) -> Self {
        let countdown = cfg.pre_round_ticks;
        Self {
            cfg,
            rng: StdRng::seed_from_u64(seed),
            phase: RoundPhase::PreRound,
            countdown,
            price: 1.0,
            tick_count: 0,
            candles: Vec::new(),
            builder: CandleBuilder::new(1.0),
            position: PositionState::default(),
            rounds: 0,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn rounds_started(&self) -> u64 {
        self.rounds
    }

    /// Advance one game tick and return the events it produced.
    pub fn step(&mut self) -> Vec<ChartEvent> {
        match self.phase {
            RoundPhase::PreRound => self.step_pre_round(),
            RoundPhase::Active => self.step_active(),
            RoundPhase::Rugged => self.step_rugged(),
        }
    }

    fn step_pre_round(&mut self) -> Vec<ChartEvent> {
        if self.countdown > 0 {
            self.countdown -= 1;
            return Vec::new();
        }
        self.phase = RoundPhase::Active;
        self.price = 1.0;
        self.tick_count = 0;
        self.candles.clear();
        self.builder = CandleBuilder::new(self.price);
        self.position = PositionState::default();
        self.rounds += 1;
        tracing::info!(round = self.rounds, "Simulated round started");
        vec![
            ChartEvent::RoundStateChanged(RoundPhase::Active),
            ChartEvent::TradeList(Vec::new()),
            ChartEvent::PositionUpdate(self.position),
        ]
    }

    fn step_active(&mut self) -> Vec<ChartEvent> {
        let mut events = Vec::new();
        self.tick_count += 1;

        if self.rng.random_bool(self.cfg.rug_chance.clamp(0.0, 1.0)) {
            return self.rug(events);
        }

        let drift: f64 = self.rng.random_range(-0.045..0.05);
        self.price = (self.price * (1.0 + drift)).max(0.01);
        self.builder.update(self.price);
        events.push(ChartEvent::PriceTick {
            price: self.price,
            tick_count: self.tick_count,
        });

        if self.rng.random_bool(self.cfg.trade_chance.clamp(0.0, 1.0)) {
            events.extend(self.random_trade());
        }

        if self.tick_count % self.cfg.ticks_per_candle.max(1) == 0 {
            self.candles.push(self.builder.finish());
            self.builder = CandleBuilder::new(self.price);
            events.push(self.snapshot(false));
        }
        events
    }

    fn step_rugged(&mut self) -> Vec<ChartEvent> {
        if self.countdown > 0 {
            self.countdown -= 1;
            return Vec::new();
        }
        self.phase = RoundPhase::PreRound;
        self.countdown = self.cfg.pre_round_ticks;
        vec![ChartEvent::RoundStateChanged(RoundPhase::PreRound)]
    }

    fn rug(&mut self, mut events: Vec<ChartEvent>) -> Vec<ChartEvent> {
        self.price = 0.0;
        self.builder.update(0.0);
        tracing::info!(round = self.rounds, tick = self.tick_count, "Simulated rug");
        self.phase = RoundPhase::Rugged;
        self.countdown = self.cfg.rugged_ticks;
        events.push(ChartEvent::PriceTick {
            price: 0.0,
            tick_count: self.tick_count,
        });
        events.push(self.snapshot(true));
        events.push(ChartEvent::RoundStateChanged(RoundPhase::Rugged));
        events
    }

    fn snapshot(&self, rugged: bool) -> ChartEvent {
        let start = self.candles.len().saturating_sub(self.cfg.window.max(1));
        ChartEvent::CandleSnapshot(CandleSnapshot {
            candles: self.candles[start..].iter().copied().map(RawCandle::from).collect(),
            rugged,
            current_candle: Some(RawCandle::from(self.builder.finish())),
            tick_count: Some(self.tick_count),
            price: Some(self.price),
            full_resync: None,
        })
    }

    fn random_trade(&mut self) -> Vec<ChartEvent> {
        let local = self.cfg.local_player_id.clone();
        let own = local.is_some() && self.rng.random_bool(0.1);
        let player_id = match (own, local) {
            (true, Some(id)) => id,
            _ => {
                if self.cfg.players.is_empty() {
                    return Vec::new();
                }
                let i = self.rng.random_range(0..self.cfg.players.len());
                self.cfg.players[i].clone()
            }
        };
        let side = if self.rng.random_bool(0.6) {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        };
        let amount: f64 = self.rng.random_range(0.01..2.0);
        let trade = Trade {
            username: Some(player_id.clone()),
            player_id,
            tick_index: self.tick_count,
            price: self.price,
            side,
            coin_address: "0xsim".to_string(),
            cost: (side == TradeSide::Buy).then_some(amount),
            proceeds: (side == TradeSide::Sell).then_some(amount),
        };

        let mut events = Vec::new();
        if own {
            let qty = amount / self.price.max(0.01);
            match side {
                TradeSide::Buy => self.position.position_qty += qty,
                TradeSide::Sell => {
                    self.position.position_qty = (self.position.position_qty - qty).max(0.0);
                    self.position.cumulative_pnl += amount;
                }
            }
            events.push(ChartEvent::PositionUpdate(self.position));
        }
        events.insert(0, ChartEvent::NewTrade(trade));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_feed() {
        let mut a = RoundSimulator::new(7, SimConfig::default());
        let mut b = RoundSimulator::new(7, SimConfig::default());
        for _ in 0..200 {
            assert_eq!(a.step(), b.step());
        }
    }

    #[test]
    fn pre_round_counts_down_before_active() {
        let cfg = SimConfig {
            pre_round_ticks: 2,
            ..SimConfig::default()
        };
        let mut sim = RoundSimulator::new(1, cfg);
        assert!(sim.step().is_empty());
        assert!(sim.step().is_empty());
        let events = sim.step();
        assert_eq!(events[0], ChartEvent::RoundStateChanged(RoundPhase::Active));
        assert_eq!(sim.phase(), RoundPhase::Active);
    }
}
