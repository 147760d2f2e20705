//! Glucose series analysis - control-quality metrics over one simulation run.
//!
//! The analyzer is a pure function of its input: no I/O, no shared state.
//! Empty input yields an explicit "unavailable" report rather than zeros.

use serde::{Deserialize, Serialize, Serializer};

use crate::series::TimeSeries;

// =============================================================================
// Configuration
// =============================================================================

/// Clinical band used to classify samples (mg/dL).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeThresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for RangeThresholds {
    fn default() -> Self {
        Self {
            low: 70.0,
            high: 180.0,
        }
    }
}

impl RangeThresholds {
    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low <= self.high
    }

    pub fn classify(&self, g: f64) -> RangeClass {
        if g < self.low {
            RangeClass::Below
        } else if g > self.high {
            RangeClass::Above
        } else {
            RangeClass::InRange
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub thresholds: RangeThresholds,
    /// Fixed baseline for IAE/ISE. The `target` channel of the data is
    /// deliberately not used here.
    pub target_glucose: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            thresholds: RangeThresholds::default(),
            target_glucose: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeClass {
    Below,
    InRange,
    Above,
}

// =============================================================================
// Report
// =============================================================================

/// Metrics for a non-empty series.
#[derive(Debug, Clone, PartialEq)]
pub struct GlucoseMetrics {
    pub g_min: f64,
    pub g_max: f64,
    pub g_mean: f64,
    pub g_std: f64,
    pub time_in_range_pct: f64,
    pub time_below_range_pct: f64,
    pub time_above_range_pct: f64,
    pub hypo_episodes: u64,
    pub hyper_episodes: u64,
    pub iae: f64,
    pub ise: f64,
}

/// Either every metric or none of them.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsReport {
    Available(GlucoseMetrics),
    Unavailable,
}

impl MetricsReport {
    pub fn metrics(&self) -> Option<&GlucoseMetrics> {
        match self {
            MetricsReport::Available(m) => Some(m),
            MetricsReport::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, MetricsReport::Available(_))
    }
}

/// Wire shape of a report: unavailable fields become `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub g_min: Option<f64>,
    pub g_max: Option<f64>,
    pub g_mean: Option<f64>,
    pub g_std: Option<f64>,
    pub time_in_range_pct: Option<f64>,
    pub time_below_range_pct: Option<f64>,
    pub time_above_range_pct: Option<f64>,
    pub hypo_episodes: Option<u64>,
    pub hyper_episodes: Option<u64>,
    pub iae: Option<f64>,
    pub ise: Option<f64>,
}

impl From<&MetricsReport> for SummaryPayload {
    fn from(report: &MetricsReport) -> Self {
        match report.metrics() {
            None => SummaryPayload::default(),
            Some(m) => SummaryPayload {
                g_min: Some(m.g_min),
                g_max: Some(m.g_max),
                g_mean: Some(m.g_mean),
                g_std: Some(m.g_std),
                time_in_range_pct: Some(m.time_in_range_pct),
                time_below_range_pct: Some(m.time_below_range_pct),
                time_above_range_pct: Some(m.time_above_range_pct),
                hypo_episodes: Some(m.hypo_episodes),
                hyper_episodes: Some(m.hyper_episodes),
                iae: Some(m.iae),
                ise: Some(m.ise),
            },
        }
    }
}

impl Serialize for MetricsReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SummaryPayload::from(self).serialize(serializer)
    }
}

// =============================================================================
// Analyzer
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct GlucoseAnalyzer {
    cfg: AnalysisConfig,
}

impl GlucoseAnalyzer {
    pub fn new(cfg: AnalysisConfig) -> Self {
        Self { cfg }
    }

    pub fn analyze_series(&self, series: &TimeSeries<'_>) -> MetricsReport {
        self.analyze(series.time, series.glucose)
    }

    /// Compute the report. `time` and `glucose` are assumed to be aligned.
    pub fn analyze(&self, time: &[f64], glucose: &[f64]) -> MetricsReport {
        if time.is_empty() || glucose.is_empty() {
            return MetricsReport::Unavailable;
        }

        let n = glucose.len() as f64;
        let dt = sample_interval(time);

        let g_min = glucose.iter().copied().fold(f64::INFINITY, f64::min);
        let g_max = glucose.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let g_mean = glucose.iter().sum::<f64>() / n;
        let variance = glucose.iter().map(|g| (g - g_mean).powi(2)).sum::<f64>() / n;

        let mut n_below = 0u64;
        let mut n_above = 0u64;
        let mut hypo_episodes = 0u64;
        let mut hyper_episodes = 0u64;
        let mut prev: Option<RangeClass> = None;
        for &g in glucose {
            let class = self.cfg.thresholds.classify(g);
            match class {
                RangeClass::Below => {
                    n_below += 1;
                    if prev != Some(RangeClass::Below) {
                        hypo_episodes += 1;
                    }
                }
                RangeClass::Above => {
                    n_above += 1;
                    if prev != Some(RangeClass::Above) {
                        hyper_episodes += 1;
                    }
                }
                RangeClass::InRange => {}
            }
            prev = Some(class);
        }
        let n_in = glucose.len() as u64 - n_below - n_above;

        // Every sample carries the same dt, so it cancels out of the share.
        let pct = |count: u64| count as f64 / n * 100.0;

        let target = self.cfg.target_glucose;
        let (abs_sum, sq_sum) = glucose.iter().fold((0.0, 0.0), |(a, s), g| {
            let e = g - target;
            (a + e.abs(), s + e * e)
        });

        MetricsReport::Available(GlucoseMetrics {
            g_min,
            g_max,
            g_mean,
            g_std: variance.sqrt(),
            time_in_range_pct: pct(n_in),
            time_below_range_pct: pct(n_below),
            time_above_range_pct: pct(n_above),
            hypo_episodes,
            hyper_episodes,
            iae: abs_sum * dt,
            ise: sq_sum * dt,
        })
    }
}

/// Analyze with the default 70-180 mg/dL band and a 100 mg/dL target.
pub fn analyze(time: &[f64], glucose: &[f64]) -> MetricsReport {
    GlucoseAnalyzer::default().analyze(time, glucose)
}

/// Mean spacing of the time vector; 1.0 when there is a single sample.
pub fn sample_interval(time: &[f64]) -> f64 {
    if time.len() < 2 {
        return 1.0;
    }
    let span: f64 = time.windows(2).map(|w| w[1] - w[0]).sum();
    span / (time.len() - 1) as f64
}

/// Number of false -> true transitions, treating the sample before the
/// first one as false.
pub fn count_episodes(mask: &[bool]) -> u64 {
    let mut prev = false;
    let mut episodes = 0;
    for &m in mask {
        if m && !prev {
            episodes += 1;
        }
        prev = m;
    }
    episodes
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn available(report: MetricsReport) -> GlucoseMetrics {
        match report {
            MetricsReport::Available(m) => m,
            MetricsReport::Unavailable => panic!("expected metrics"),
        }
    }

    #[test]
    fn test_constant_series_at_target() {
        let m = available(analyze(
            &[0.0, 5.0, 10.0, 15.0, 20.0],
            &[100.0, 100.0, 100.0, 100.0, 100.0],
        ));
        assert_eq!(m.g_mean, 100.0);
        assert_eq!(m.g_std, 0.0);
        assert_eq!(m.time_in_range_pct, 100.0);
        assert_eq!(m.hypo_episodes, 0);
        assert_eq!(m.hyper_episodes, 0);
        assert_eq!(m.iae, 0.0);
        assert_eq!(m.ise, 0.0);
    }

    #[test]
    fn test_alternating_excursions() {
        let m = available(analyze(&[0.0, 5.0, 10.0], &[50.0, 250.0, 50.0]));
        assert_eq!(m.hypo_episodes, 2);
        assert_eq!(m.hyper_episodes, 1);
        assert_eq!(m.time_in_range_pct, 0.0);
        assert!((m.time_below_range_pct - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.g_min, 50.0);
        assert_eq!(m.g_max, 250.0);
        // |e| = 50, 150, 50 ; dt = 5
        assert!((m.iae - 1250.0).abs() < 1e-9);
        assert!((m.ise - 5.0 * (2500.0 + 22500.0 + 2500.0)).abs() < 1e-6);
    }

    #[test]
    fn test_single_sample_defaults_dt() {
        assert_eq!(sample_interval(&[0.0]), 1.0);
        let m = available(analyze(&[0.0], &[120.0]));
        assert_eq!(m.time_in_range_pct, 100.0);
        assert!((m.iae - 20.0).abs() < 1e-12);
        assert!((m.ise - 400.0).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_timestamps_keep_percentages() {
        let m = available(analyze(&[0.0, 0.0, 0.0], &[100.0, 50.0, 250.0]));
        assert_eq!(sample_interval(&[0.0, 0.0, 0.0]), 0.0);
        assert!((m.time_in_range_pct - 100.0 / 3.0).abs() < 1e-9);
        assert!((m.time_below_range_pct - 100.0 / 3.0).abs() < 1e-9);
        assert!((m.time_above_range_pct - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.hypo_episodes, 1);
        assert_eq!(m.hyper_episodes, 1);
        assert_eq!(m.iae, 0.0);
        assert_eq!(m.ise, 0.0);

        let v = serde_json::to_value(analyze(&[0.0, 0.0, 0.0], &[100.0, 50.0, 250.0])).unwrap();
        assert!(v.as_object().unwrap().values().all(|f| !f.is_null()));
    }

    #[test]
    fn test_empty_input_is_unavailable() {
        assert_eq!(analyze(&[], &[]), MetricsReport::Unavailable);
        assert_eq!(analyze(&[0.0, 1.0], &[]), MetricsReport::Unavailable);
        assert_eq!(analyze(&[], &[100.0]), MetricsReport::Unavailable);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let t = RangeThresholds::default();
        assert_eq!(t.classify(70.0), RangeClass::InRange);
        assert_eq!(t.classify(180.0), RangeClass::InRange);
        assert_eq!(t.classify(69.999), RangeClass::Below);
        assert_eq!(t.classify(180.001), RangeClass::Above);
    }

    #[test]
    fn test_sample_interval_averages_irregular_steps() {
        // steps 4, 6, 5 -> mean 5
        assert!((sample_interval(&[0.0, 4.0, 10.0, 15.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_count_episodes_runs() {
        assert_eq!(count_episodes(&[]), 0);
        assert_eq!(count_episodes(&[false, false]), 0);
        assert_eq!(count_episodes(&[true]), 1);
        assert_eq!(count_episodes(&[true, true, false, true]), 2);
        assert_eq!(count_episodes(&[false, true, true, true, false]), 1);
    }

    #[test]
    fn test_custom_config() {
        let analyzer = GlucoseAnalyzer::new(AnalysisConfig {
            thresholds: RangeThresholds {
                low: 80.0,
                high: 140.0,
            },
            target_glucose: 110.0,
        });
        let m = available(analyzer.analyze(&[0.0, 1.0], &[75.0, 110.0]));
        assert_eq!(m.hypo_episodes, 1);
        assert_eq!(m.time_in_range_pct, 50.0);
        assert!((m.iae - 35.0).abs() < 1e-12);
    }

    #[test]
    fn test_unavailable_serializes_as_nulls() {
        let v = serde_json::to_value(MetricsReport::Unavailable).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 11);
        assert!(obj.values().all(|v| v.is_null()));
    }

    #[test]
    fn test_available_serializes_integers() {
        let v = serde_json::to_value(analyze(&[0.0, 5.0], &[60.0, 200.0])).unwrap();
        assert_eq!(v["hypo_episodes"], 1);
        assert_eq!(v["hyper_episodes"], 1);
        assert_eq!(v["time_in_range_pct"], 0.0);
    }
}
