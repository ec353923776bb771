//! Volume anomaly detection.
//!
//! Scores a candle series by comparing each of the most recent candles'
//! volume against the trailing moving average of the candles before it.
//! The moving-average window never includes the candle being scored.

use tracing::trace;

use crate::config::DetectorSettings;
use crate::types::{AnomalyScore, CandleSeries};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Detector parameters.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Number of most recent candles examined.
    pub recent_window: usize,
    /// Length of the trailing volume moving average.
    pub ma_window: usize,
    /// A ratio must strictly exceed this to count as anomalous.
    pub threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            recent_window: 5,
            ma_window: 20,
            threshold: 1.5,
        }
    }
}

impl From<&DetectorSettings> for DetectorConfig {
    fn from(s: &DetectorSettings) -> Self {
        Self {
            recent_window: s.recent_window,
            ma_window: s.ma_window,
            threshold: s.threshold,
        }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

pub struct AnomalyDetector {
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Minimum series length worth scoring.
    pub fn min_candles(&self) -> usize {
        self.config.recent_window + self.config.ma_window
    }

    /// Maximum volume ratio over the recent window, or zero when it does
    /// not strictly exceed the threshold. Never fails: anything that
    /// cannot be computed scores zero.
    pub fn score(&self, series: &CandleSeries) -> AnomalyScore {
        let volumes = series.volumes();
        let DetectorConfig {
            recent_window,
            ma_window,
            threshold,
        } = self.config;

        if volumes.len() < recent_window + ma_window {
            return AnomalyScore::NONE;
        }

        let n = volumes.len();
        let mut max_ratio = 0.0_f64;

        for i in (n - recent_window)..n {
            let Some(ma) = trailing_mean(&volumes[i - ma_window..i]) else {
                continue;
            };
            let ratio = volumes[i] / ma;
            if ratio.is_finite() && ratio > threshold {
                max_ratio = max_ratio.max(ratio);
            }
        }

        trace!(max_ratio, threshold, "Volume window scored");

        if max_ratio > threshold {
            AnomalyScore::new(max_ratio)
        } else {
            AnomalyScore::NONE
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

/// Mean of the finite values in `window`; `None` unless strictly positive.
fn trailing_mean(window: &[f64]) -> Option<f64> {
    let (sum, count) = window
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));

    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    (mean > 0.0).then_some(mean)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use chrono::{Duration, TimeZone, Utc};

    fn series(volumes: &[f64]) -> CandleSeries {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let candles = volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| Candle {
                open_time: start + Duration::hours(i as i64),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: v,
            })
            .collect();
        CandleSeries::new(candles).unwrap()
    }

    #[test]
    fn test_spike_on_last_candle_scores_ratio() {
        let mut v = vec![1.0; 29];
        v.push(10.0);
        let score = AnomalyDetector::default().score(&series(&v));
        assert!((score.ratio() - 10.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_flat_volume_scores_zero() {
        let score = AnomalyDetector::default().score(&series(&[5.0; 30]));
        assert_eq!(score, AnomalyScore::NONE);
    }

    #[test]
    fn test_exactly_threshold_is_not_anomalous() {
        let mut v = vec![2.0; 29];
        v.push(3.0); // 3 / 2 == 1.5, not strictly greater
        let score = AnomalyDetector::default().score(&series(&v));
        assert_eq!(score, AnomalyScore::NONE);
    }

    #[test]
    fn test_below_threshold_everywhere_is_zero() {
        let mut v = vec![1.0; 25];
        v.extend([1.2, 1.4, 1.1, 1.5, 1.3]);
        assert_eq!(AnomalyDetector::default().score(&series(&v)), AnomalyScore::NONE);
    }

    #[test]
    fn test_max_ratio_across_recent_window() {
        // Spike at offset -5 (ratio 4) then a smaller one at -1.
        let mut v = vec![1.0; 25];
        v.extend([4.0, 1.0, 1.0, 1.0, 2.0]);
        let score = AnomalyDetector::default().score(&series(&v));
        assert!((score.ratio() - 4.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_moving_average_excludes_current_candle() {
        // Exactly 25 candles: the last candle's window is indices 4..24.
        let mut v = vec![1.0; 24];
        v.push(3.0);
        let score = AnomalyDetector::default().score(&series(&v));
        // Including the candle itself would give 3 / 1.1 instead.
        assert!((score.ratio() - 3.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_window_boundaries_use_preceding_twenty() {
        // A large volume 21 candles before the last one must not count
        // toward the last candle's average.
        let mut v = vec![1.0; 30];
        v[8] = 1000.0; // inside windows of offsets -5..-2, outside -1
        v[29] = 2.0;
        let score = AnomalyDetector::default().score(&series(&v));
        assert!((score.ratio() - 2.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_short_series_scores_zero() {
        let mut v = vec![1.0; 23];
        v.push(50.0);
        assert_eq!(AnomalyDetector::default().score(&series(&v)), AnomalyScore::NONE);
    }

    #[test]
    fn test_zero_baseline_degrades_to_zero() {
        let mut v = vec![0.0; 29];
        v.push(10.0);
        assert_eq!(AnomalyDetector::default().score(&series(&v)), AnomalyScore::NONE);
    }

    #[test]
    fn test_min_candles() {
        assert_eq!(AnomalyDetector::default().min_candles(), 25);
        let d = AnomalyDetector::new(DetectorConfig {
            recent_window: 3,
            ma_window: 10,
            threshold: 2.0,
        });
        assert_eq!(d.min_candles(), 13);
    }

    #[test]
    fn test_trailing_mean() {
        assert_eq!(trailing_mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(trailing_mean(&[f64::NAN, 2.0]), Some(2.0));
        assert_eq!(trailing_mean(&[]), None);
        assert_eq!(trailing_mean(&[0.0, 0.0]), None);
    }
}
