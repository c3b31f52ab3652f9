use crate::config::ChartConfig;
use crate::model::candle::{Candle, DEFAULT_MATCH_EPSILON};

/// How incoming snapshot windows are reconciled with the stored history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergePolicy {
    /// Windows at least this long replace the history. The transport does not
    /// say whether a window is a backfill or a sliding update, so length is
    /// the only signal unless the snapshot carries an explicit flag.
    pub full_resync_threshold: usize,
    pub match_epsilon: f64,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            full_resync_threshold: 10,
            match_epsilon: DEFAULT_MATCH_EPSILON,
        }
    }
}

impl From<&ChartConfig> for MergePolicy {
    fn from(cfg: &ChartConfig) -> Self {
        Self {
            full_resync_threshold: cfg.full_resync_threshold,
            match_epsilon: cfg.candle_match_epsilon,
        }
    }
}

/// What a single `ingest` call did to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Nothing to merge.
    Unchanged,
    /// History replaced with the incoming window.
    Resynced { len: usize },
    /// `added` candles appended after the overlap point.
    Appended { added: usize, overlap_found: bool },
    /// Terminal rug candle appended.
    RugCandleAppended,
    /// The terminal candle was already the last stored one.
    RugCandleAlreadyPresent,
    /// Rugged snapshot without a current candle; history kept as is.
    RuggedWithoutCandle,
}

impl IngestOutcome {
    /// The rug candle is now the last stored candle.
    pub fn settles_rug(&self) -> bool {
        matches!(self, Self::RugCandleAppended | Self::RugCandleAlreadyPresent)
    }
}

/// Accumulated candle history for the current round.
///
/// Grows monotonically between resets. Only a full resync may replace
/// previously stored candles.
#[derive(Debug, Clone, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
    policy: MergePolicy,
    /// Bumped on every change to `candles`, including same-length resyncs.
    revision: u64,
}

impl CandleSeries {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            candles: Vec::new(),
            policy,
            revision: 0,
        }
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn reset(&mut self) {
        if !self.candles.is_empty() {
            tracing::debug!(len = self.candles.len(), "Candle history cleared");
            self.revision += 1;
        }
        self.candles.clear();
    }

    /// Merge a snapshot window using the length heuristic to detect backfills.
    pub fn ingest(
        &mut self,
        window: &[Candle],
        rugged: bool,
        current: Option<&Candle>,
    ) -> IngestOutcome {
        self.ingest_with_hint(window, rugged, current, None)
    }

    /// Merge a snapshot window. `full_resync` overrides the length heuristic
    /// when the transport states explicitly whether the window is a backfill.
    pub fn ingest_with_hint(
        &mut self,
        window: &[Candle],
        rugged: bool,
        current: Option<&Candle>,
        full_resync: Option<bool>,
    ) -> IngestOutcome {
        let is_full = full_resync
            .unwrap_or_else(|| window.len() >= self.policy.full_resync_threshold);

        if !window.is_empty() && (self.candles.is_empty() || is_full) {
            if self.candles != window {
                self.revision += 1;
            }
            self.candles = window.to_vec();
            tracing::debug!(len = self.candles.len(), full = is_full, "Candle history resynced");
            if rugged {
                // A backfill delivered after the crash may end before it.
                if let Some(c) = current {
                    self.settle_rug_candle(c);
                }
            }
            return IngestOutcome::Resynced {
                len: self.candles.len(),
            };
        }

        if rugged {
            return match current {
                Some(c) => self.settle_rug_candle(c),
                None => IngestOutcome::RuggedWithoutCandle,
            };
        }

        let Some(last) = self.candles.last().copied() else {
            return IngestOutcome::Unchanged;
        };
        if window.is_empty() {
            return IngestOutcome::Unchanged;
        }

        let eps = self.policy.match_epsilon;
        match window.iter().position(|c| c.matches_ohlc(&last, eps)) {
            Some(i) => {
                let fresh = &window[i + 1..];
                if !fresh.is_empty() {
                    self.revision += 1;
                }
                self.candles.extend_from_slice(fresh);
                IngestOutcome::Appended {
                    added: fresh.len(),
                    overlap_found: true,
                }
            }
            None => {
                // No overlap: keep everything rather than risk a gap.
                tracing::debug!(
                    window = window.len(),
                    "No overlap with stored history; appending whole window"
                );
                self.revision += 1;
                self.candles.extend_from_slice(window);
                IngestOutcome::Appended {
                    added: window.len(),
                    overlap_found: false,
                }
            }
        }
    }

    fn settle_rug_candle(&mut self, current: &Candle) -> IngestOutcome {
        let eps = self.policy.match_epsilon;
        match self.candles.last_mut() {
            Some(last) if last.matches_close_range(current, eps) => {
                if !last.is_rug {
                    last.is_rug = true;
                    self.revision += 1;
                }
                IngestOutcome::RugCandleAlreadyPresent
            }
            _ => {
                self.revision += 1;
                self.candles.push(current.as_rug());
                tracing::info!(
                    close = current.close,
                    len = self.candles.len(),
                    "Final rug candle appended"
                );
                IngestOutcome::RugCandleAppended
            }
        }
    }
}
