use rug_chart::chart::series::{CandleSeries, IngestOutcome, MergePolicy};
use rug_chart::model::candle::{sanitize_window, Candle, RawCandle};

fn c(open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle::new(open, high, low, close)
}

fn ramp(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let o = 1.0 + i as f64 * 0.05;
            c(o, o + 0.08, o - 0.02, o + 0.05)
        })
        .collect()
}

#[test]
/// Verifies sliding windows accumulate into a history longer than any window.
fn sliding_windows_accumulate_full_round() {
    let all = ramp(20);
    let mut series = CandleSeries::default();
    series.ingest(&all[..3], false, None);
    for end in 4usize..=20 {
        let start = end.saturating_sub(3);
        series.ingest(&all[start..end], false, None);
    }
    assert_eq!(series.len(), 20);
    assert_eq!(series.candles(), &all[..]);
}

#[test]
fn approximate_ohlc_match_counts_as_overlap() {
    let all = ramp(3);
    let mut series = CandleSeries::default();
    series.ingest(&all[..2], false, None);

    let jitter = Candle {
        open: all[1].open + 0.00003,
        close: all[1].close - 0.00002,
        ..all[1]
    };
    let out = series.ingest(&[jitter, all[2]], false, None);
    assert_eq!(
        out,
        IngestOutcome::Appended {
            added: 1,
            overlap_found: true
        }
    );
    assert_eq!(series.len(), 3);
}

#[test]
fn wider_epsilon_from_policy_is_honoured() {
    let policy = MergePolicy {
        full_resync_threshold: 10,
        match_epsilon: 0.01,
    };
    let mut series = CandleSeries::new(policy);
    series.ingest(&[c(1.0, 1.1, 0.9, 1.05)], false, None);
    let out = series.ingest(&[c(1.005, 1.1, 0.9, 1.05), c(1.05, 1.2, 1.0, 1.1)], false, None);
    assert_eq!(
        out,
        IngestOutcome::Appended {
            added: 1,
            overlap_found: true
        }
    );
}

#[test]
fn resync_threshold_is_inclusive() {
    let mut series = CandleSeries::default();
    series.ingest(&ramp(2), false, None);
    let backfill: Vec<Candle> = ramp(10)
        .into_iter()
        .map(|k| c(k.open + 3.0, k.high + 3.0, k.low + 3.0, k.close + 3.0))
        .collect();
    let out = series.ingest(&backfill, false, None);
    assert_eq!(out, IngestOutcome::Resynced { len: 10 });
}

#[test]
fn empty_window_into_empty_history_is_noop() {
    let mut series = CandleSeries::default();
    assert_eq!(series.ingest(&[], false, None), IngestOutcome::Unchanged);
    assert!(series.is_empty());
}

#[test]
fn rugged_with_empty_history_appends_rug_candle() {
    let mut series = CandleSeries::default();
    let rug = c(1.2, 1.2, 0.0, 0.0);
    let out = series.ingest(&[], true, Some(&rug));
    assert_eq!(out, IngestOutcome::RugCandleAppended);
    assert_eq!(series.len(), 1);
    assert!(series.candles()[0].is_rug);
}

#[test]
/// Verifies malformed transport candles never reach the history.
fn sanitized_window_feeds_series() {
    let raw = vec![
        RawCandle::from(c(1.0, 1.1, 0.9, 1.05)),
        RawCandle {
            open: Some(1.05),
            high: None,
            low: Some(1.0),
            close: Some(1.1),
            ..RawCandle::default()
        },
        RawCandle::from(c(1.1, 1.2, 1.0, 1.15)),
    ];
    let (window, dropped) = sanitize_window(&raw);
    assert_eq!(dropped, 1);

    let mut series = CandleSeries::default();
    series.ingest(&window, false, None);
    assert_eq!(series.len(), 2);
    assert!(series.candles().iter().all(Candle::all_finite));
}
