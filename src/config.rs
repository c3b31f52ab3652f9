use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::model::candle::DEFAULT_MATCH_EPSILON;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chart: ChartConfig,
    pub animation: AnimationConfig,
    pub trade_markers: TradeMarkerConfig,
    pub player: PlayerConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub ticks_per_candle: u64,
    /// Above this many candles the display combines neighbours.
    pub max_candles: usize,
    /// A snapshot window at least this long is treated as a full backfill.
    pub full_resync_threshold: usize,
    pub candle_match_epsilon: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            ticks_per_candle: 5,
            max_candles: 32,
            full_resync_threshold: 10,
            candle_match_epsilon: DEFAULT_MATCH_EPSILON,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub enabled: bool,
    pub duration_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradeMarkerConfig {
    pub throttle_ms: u64,
    pub fade_in_ms: u64,
    pub visible_ms: u64,
    pub fade_out_ms: u64,
    /// Buckets older than `throttle_ms * bucket_retention_factor` are purged.
    pub bucket_retention_factor: u64,
    pub sweep_interval_ms: u64,
    pub max_active: usize,
}

impl Default for TradeMarkerConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 3_000,
            fade_in_ms: 300,
            visible_ms: 1_700,
            fade_out_ms: 300,
            bucket_retention_factor: 10,
            sweep_interval_ms: 5_000,
            max_active: 32,
        }
    }
}

impl TradeMarkerConfig {
    pub fn lifetime_ms(&self) -> u64 {
        self.fade_in_ms + self.visible_ms + self.fade_out_ms
    }

    pub fn retention_ms(&self) -> u64 {
        self.throttle_ms.saturating_mul(self.bucket_retention_factor)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub refresh_rate_ms: u64,
    pub mobile: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            refresh_rate_ms: 16,
            mobile: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, then apply `RUG_CHART_PLAYER_ID` from `.env` or the
    /// environment if set.
    pub fn load(path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config = Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if let Ok(player_id) = std::env::var("RUG_CHART_PLAYER_ID") {
            if !player_id.trim().is_empty() {
                config.player.id = player_id.trim().to_string();
            }
        }

        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("invalid config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chart.ticks_per_candle == 0 {
            bail!("chart.ticks_per_candle must be > 0");
        }
        if self.chart.max_candles == 0 {
            bail!("chart.max_candles must be > 0");
        }
        if !self.chart.candle_match_epsilon.is_finite() || self.chart.candle_match_epsilon <= 0.0 {
            bail!(
                "chart.candle_match_epsilon must be a positive number, got {}",
                self.chart.candle_match_epsilon
            );
        }
        if self.animation.duration_ms == 0 {
            bail!("animation.duration_ms must be > 0");
        }
        if self.trade_markers.throttle_ms == 0 {
            bail!("trade_markers.throttle_ms must be > 0");
        }
        if self.trade_markers.fade_in_ms == 0 || self.trade_markers.fade_out_ms == 0 {
            bail!("trade_markers fade durations must be > 0");
        }
        Ok(())
    }

    /// The local player id, if one is configured.
    pub fn local_player_id(&self) -> Option<&str> {
        let id = self.player.id.trim();
        (!id.is_empty()).then_some(id)
    }
}
