use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analysis::{AnalysisConfig, RangeThresholds};
use crate::logging::{log, obj, v_num, Domain, Level};

pub const DEFAULT_SERVED_FILES: [&str; 5] = [
    "glucose.png",
    "insulin.png",
    "meal.png",
    "error.png",
    "results.zip",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub results_file: PathBuf,
    pub results_dir: PathBuf,
    pub bind_addr: String,
    pub served_files: Vec<String>,
    pub analysis: AnalysisConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            results_file: PathBuf::from("latest_results.json"),
            results_dir: PathBuf::from("results"),
            bind_addr: "127.0.0.1:8765".to_string(),
            served_files: DEFAULT_SERVED_FILES.iter().map(|s| s.to_string()).collect(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let analysis_defaults = defaults.analysis;

        let thresholds = RangeThresholds {
            low: env_f64("APDASH_LOW_MGDL").unwrap_or(analysis_defaults.thresholds.low),
            high: env_f64("APDASH_HIGH_MGDL").unwrap_or(analysis_defaults.thresholds.high),
        };
        let thresholds = if thresholds.is_valid() {
            thresholds
        } else {
            log(
                Level::Warn,
                Domain::System,
                "config.invalid_thresholds",
                obj(&[
                    ("low", v_num(thresholds.low)),
                    ("high", v_num(thresholds.high)),
                    ("fallback", json!(analysis_defaults.thresholds)),
                ]),
            );
            analysis_defaults.thresholds
        };

        let target_glucose = env_f64("APDASH_TARGET_MGDL")
            .filter(|v| v.is_finite())
            .unwrap_or(analysis_defaults.target_glucose);

        Self {
            results_file: std::env::var("APDASH_RESULTS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_file),
            results_dir: std::env::var("APDASH_RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            bind_addr: std::env::var("APDASH_BIND").unwrap_or(defaults.bind_addr),
            served_files: std::env::var("APDASH_SERVED_FILES")
                .ok()
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.served_files),
            analysis: AnalysisConfig {
                thresholds,
                target_glucose,
            },
        }
    }

    pub fn is_served(&self, name: &str) -> bool {
        self.served_files.iter().any(|f| f == name)
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
